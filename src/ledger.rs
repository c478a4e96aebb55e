//! Position ledger: open_position, adjust_position, close_position, reads.
//! Sole writer of position state. Testable without HTTP.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::types::position::{Position, PositionStatus};

pub type SharedLedger = Arc<Ledger>;

/// Each position sits behind its own mutex so read-modify-write adjustments
/// on one id serialize without blocking operations on other ids. The outer
/// map lock is held only for lookups and inserts.
#[derive(Default)]
pub struct Ledger {
    positions: RwLock<HashMap<Uuid, Arc<Mutex<Position>>>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            positions: RwLock::new(HashMap::new()),
        }
    }

    /// Open a new position. Quantity sign encodes long/short.
    pub async fn open_position(
        &self,
        symbol: &str,
        quantity: Decimal,
        entry_price: Decimal,
    ) -> LedgerResult<Position> {
        if quantity.is_zero() {
            return Err(LedgerError::InvalidInput(
                "quantity must be non-zero".to_string(),
            ));
        }
        if entry_price <= Decimal::ZERO {
            return Err(LedgerError::InvalidInput(
                "entry price must be positive".to_string(),
            ));
        }
        let position = Position {
            id: Uuid::new_v4(),
            symbol: symbol.to_uppercase(),
            quantity,
            entry_price,
            status: PositionStatus::Open,
            opened_at: Utc::now(),
            closed_at: None,
        };
        let snapshot = position.clone();
        self.positions
            .write()
            .await
            .insert(position.id, Arc::new(Mutex::new(position)));
        Ok(snapshot)
    }

    /// Adjust an open position by a signed quantity delta. `price` is the
    /// execution price of the adjustment; when the delta crosses zero the
    /// position closes and the excess is reopened as a new position at that
    /// price (net-position semantics). Returns the position that represents
    /// the outcome: the adjusted position, the closed position, or the
    /// spawned successor.
    pub async fn adjust_position(
        &self,
        id: Uuid,
        delta_quantity: Decimal,
        price: Decimal,
    ) -> LedgerResult<Position> {
        if delta_quantity.is_zero() {
            return Err(LedgerError::InvalidInput(
                "delta quantity must be non-zero".to_string(),
            ));
        }
        if price <= Decimal::ZERO {
            return Err(LedgerError::InvalidInput(
                "price must be positive".to_string(),
            ));
        }

        let entry = self.lookup(id).await?;
        let mut position = entry.lock().await;
        if position.status == PositionStatus::Closed {
            return Err(LedgerError::InvalidState(format!(
                "position {id} is closed"
            )));
        }

        let new_quantity = position.quantity + delta_quantity;

        if new_quantity.is_zero() {
            position.quantity = Decimal::ZERO;
            position.status = PositionStatus::Closed;
            position.closed_at = Some(Utc::now());
            return Ok(position.clone());
        }

        let same_direction = position.quantity.is_sign_positive() == new_quantity.is_sign_positive();
        if same_direction {
            position.quantity = new_quantity;
            return Ok(position.clone());
        }

        // Crossed zero: close this position, reopen the excess at the
        // adjustment price under a fresh id.
        let symbol = position.symbol.clone();
        position.quantity = Decimal::ZERO;
        position.status = PositionStatus::Closed;
        position.closed_at = Some(Utc::now());
        drop(position);

        let successor = Position {
            id: Uuid::new_v4(),
            symbol,
            quantity: new_quantity,
            entry_price: price,
            status: PositionStatus::Open,
            opened_at: Utc::now(),
            closed_at: None,
        };
        let snapshot = successor.clone();
        self.positions
            .write()
            .await
            .insert(successor.id, Arc::new(Mutex::new(successor)));
        Ok(snapshot)
    }

    /// Close a position. Terminal: closed_at is set once and never changes.
    pub async fn close_position(&self, id: Uuid) -> LedgerResult<Position> {
        let entry = self.lookup(id).await?;
        let mut position = entry.lock().await;
        if position.status == PositionStatus::Closed {
            return Err(LedgerError::InvalidState(format!(
                "position {id} is already closed"
            )));
        }
        position.status = PositionStatus::Closed;
        position.closed_at = Some(Utc::now());
        Ok(position.clone())
    }

    /// Snapshot of a single position.
    pub async fn get_position(&self, id: Uuid) -> LedgerResult<Position> {
        let entry = self.lookup(id).await?;
        let position = entry.lock().await;
        Ok(position.clone())
    }

    /// Snapshots of all positions, optionally filtered by status, ordered by
    /// opening time.
    pub async fn list_positions(&self, status: Option<PositionStatus>) -> Vec<Position> {
        let entries: Vec<Arc<Mutex<Position>>> =
            self.positions.read().await.values().cloned().collect();
        let mut positions = Vec::with_capacity(entries.len());
        for entry in entries {
            let position = entry.lock().await;
            if status.is_none_or(|s| position.status == s) {
                positions.push(position.clone());
            }
        }
        positions.sort_by(|a, b| a.opened_at.cmp(&b.opened_at).then(a.id.cmp(&b.id)));
        positions
    }

    /// Re-insert a persisted position under its original id (startup hydration).
    pub async fn restore(&self, position: Position) {
        self.positions
            .write()
            .await
            .insert(position.id, Arc::new(Mutex::new(position)));
    }

    async fn lookup(&self, id: Uuid) -> LedgerResult<Arc<Mutex<Position>>> {
        self.positions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("position {id}")))
    }
}
