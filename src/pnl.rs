//! Unrealized P&L: pure functions over position snapshots, no state.

use rust_decimal::Decimal;

use crate::error::{LedgerError, LedgerResult};
use crate::types::position::Position;

/// Unrealized P&L: (current_price - entry_price) * quantity. The signed
/// quantity makes the one formula cover long and short.
pub fn unrealized_pnl(position: &Position, current_price: Decimal) -> Decimal {
    (current_price - position.entry_price) * position.quantity
}

/// Unrealized P&L given the latest observed price, if any. Callers decide
/// whether `PriceUnavailable` becomes an error or a null field.
pub fn compute(position: &Position, current_price: Option<Decimal>) -> LedgerResult<Decimal> {
    let price = current_price
        .ok_or_else(|| LedgerError::PriceUnavailable(position.symbol.clone()))?;
    Ok(unrealized_pnl(position, price))
}
