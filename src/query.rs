//! Read-only projections over the ledger and price feed for the API boundary.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::LedgerResult;
use crate::feed::PriceFeed;
use crate::ledger::Ledger;
use crate::pnl;
use crate::types::position::{Position, PositionSide, PositionStatus};
use crate::types::price::PricePoint;

/// Position paired with market context. `unrealized_pnl` is null when no
/// price has been observed for the symbol or the position is closed.
#[derive(Debug, Clone, Serialize)]
pub struct PositionWithPnl {
    #[serde(flatten)]
    pub position: Position,
    pub position_type: PositionSide,
    pub current_price: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
}

/// Positions with pnl where a price exists; a symbol without market data
/// degrades that row to a null pnl instead of failing the whole call.
pub async fn positions_with_pnl(
    ledger: &Ledger,
    feed: &PriceFeed,
    status: Option<PositionStatus>,
) -> Vec<PositionWithPnl> {
    let positions = ledger.list_positions(status).await;
    let mut rows = Vec::with_capacity(positions.len());
    for position in positions {
        rows.push(project(feed, position).await);
    }
    rows
}

/// Single-position projection; `NotFound` surfaces unchanged.
pub async fn position_with_pnl(
    ledger: &Ledger,
    feed: &PriceFeed,
    id: Uuid,
) -> LedgerResult<PositionWithPnl> {
    let position = ledger.get_position(id).await?;
    Ok(project(feed, position).await)
}

/// Latest market data for a symbol; `NotFound` surfaces unchanged.
pub async fn market_data(feed: &PriceFeed, symbol: &str) -> LedgerResult<PricePoint> {
    feed.latest(symbol).await
}

async fn project(feed: &PriceFeed, position: Position) -> PositionWithPnl {
    let current_price = feed
        .latest(&position.symbol)
        .await
        .ok()
        .map(|point| point.price);
    let unrealized_pnl = if position.is_open() {
        pnl::compute(&position, current_price).ok()
    } else {
        None
    };
    PositionWithPnl {
        position_type: position.side(),
        current_price,
        unrealized_pnl,
        position,
    }
}
