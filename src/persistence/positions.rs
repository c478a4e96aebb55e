//! Position persistence: write-through upsert and list for hydration.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::types::position::{Position, PositionStatus};

/// Upsert the full position state under its id. Quantity, status, and
/// closed_at are the only fields that change after creation.
pub async fn upsert_position(pool: &PgPool, position: &Position) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO positions (id, symbol, quantity, entry_price, status, opened_at, closed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (id) DO UPDATE SET quantity = $3, status = $5, closed_at = $7",
    )
    .bind(position.id)
    .bind(&position.symbol)
    .bind(position.quantity)
    .bind(position.entry_price)
    .bind(position.status.as_str())
    .bind(position.opened_at)
    .bind(position.closed_at)
    .execute(pool)
    .await?;
    Ok(())
}

#[derive(Debug, FromRow)]
pub struct PositionRow {
    pub id: Uuid,
    pub symbol: String,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub status: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

fn str_to_status(s: &str) -> Option<PositionStatus> {
    match s {
        "OPEN" => Some(PositionStatus::Open),
        "CLOSED" => Some(PositionStatus::Closed),
        _ => None,
    }
}

/// Convert a PositionRow for hydration. Skips rows with an unknown status.
pub fn position_row_to_position(row: &PositionRow) -> Option<Position> {
    let status = str_to_status(&row.status)?;
    Some(Position {
        id: row.id,
        symbol: row.symbol.clone(),
        quantity: row.quantity,
        entry_price: row.entry_price,
        status,
        opened_at: row.opened_at,
        closed_at: row.closed_at,
    })
}

/// List all positions for hydration.
pub async fn list_positions(pool: &PgPool) -> Result<Vec<PositionRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PositionRow>(
        "SELECT id, symbol, quantity, entry_price, status, opened_at, closed_at FROM positions",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
