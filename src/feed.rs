//! Latest-price cache per symbol with monotonic-timestamp supersession.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::error::{LedgerError, LedgerResult};
use crate::types::price::PricePoint;

pub type SharedPriceFeed = Arc<PriceFeed>;

#[derive(Default)]
pub struct PriceFeed {
    prices: RwLock<HashMap<String, PricePoint>>,
}

impl PriceFeed {
    pub fn new() -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
        }
    }

    /// Store a new point for a symbol. An update whose timestamp is not
    /// strictly newer than the stored one is a no-op, not an error; the
    /// returned flag says whether the point was applied.
    pub async fn update(
        &self,
        symbol: &str,
        price: Decimal,
        volume: Option<Decimal>,
        observed_at: DateTime<Utc>,
    ) -> LedgerResult<bool> {
        if price <= Decimal::ZERO {
            return Err(LedgerError::InvalidInput(
                "price must be positive".to_string(),
            ));
        }
        if volume.is_some_and(|v| v < Decimal::ZERO) {
            return Err(LedgerError::InvalidInput(
                "volume must be non-negative".to_string(),
            ));
        }
        let symbol = symbol.to_uppercase();
        let mut guard = self.prices.write().await;
        if let Some(existing) = guard.get(&symbol) {
            if observed_at <= existing.observed_at {
                return Ok(false);
            }
        }
        guard.insert(
            symbol.clone(),
            PricePoint {
                symbol,
                price,
                volume,
                observed_at,
            },
        );
        Ok(true)
    }

    /// Latest observed point for a symbol.
    pub async fn latest(&self, symbol: &str) -> LedgerResult<PricePoint> {
        let symbol = symbol.to_uppercase();
        self.prices
            .read()
            .await
            .get(&symbol)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("no market data for {symbol}")))
    }

    /// Symbols with at least one observed price, sorted.
    pub async fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.prices.read().await.keys().cloned().collect();
        symbols.sort();
        symbols
    }
}
