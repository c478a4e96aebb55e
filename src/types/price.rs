use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest observed market price for a symbol. Superseded by newer
/// observations, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub symbol: String,
    pub price: Decimal,
    pub volume: Option<Decimal>,
    pub observed_at: DateTime<Utc>,
}
