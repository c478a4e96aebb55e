//! Database layer: pool, migrations, and access for users and positions.
//! Optional: the service runs purely in-memory when no `DATABASE_URL` is
//! configured, and the ledger stays authoritative either way.

mod pool;
mod positions;
mod users;

pub use pool::{create_pool_and_migrate, run_migrations};
pub use positions::{list_positions, position_row_to_position, upsert_position, PositionRow};
pub use sqlx::PgPool;
pub use users::{insert_user, list_users, UserRow};
