use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trading_ledger::api::auth::{StoredUser, UserStore};
use trading_ledger::api::routes::{app_router, AppState};
use trading_ledger::config::AppConfig;
use trading_ledger::feed::{PriceFeed, SharedPriceFeed};
use trading_ledger::ledger::{Ledger, SharedLedger};
use trading_ledger::persistence;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    let ledger: SharedLedger = Arc::new(Ledger::new());
    let feed: SharedPriceFeed = Arc::new(PriceFeed::new());
    let user_store: UserStore = Arc::new(RwLock::new(HashMap::new()));

    let db = match &config.database_url {
        Some(url) => {
            let pool = persistence::create_pool_and_migrate(url)
                .await
                .expect("database setup failed");

            let rows = persistence::list_positions(&pool)
                .await
                .expect("position hydration failed");
            let mut restored = 0usize;
            for row in &rows {
                if let Some(position) = persistence::position_row_to_position(row) {
                    ledger.restore(position).await;
                    restored += 1;
                }
            }

            let users = persistence::list_users(&pool)
                .await
                .expect("user hydration failed");
            let user_count = users.len();
            {
                let mut store = user_store.write().await;
                for user in users {
                    store.insert(
                        user.username.clone(),
                        StoredUser {
                            id: user.id,
                            username: user.username,
                            password_hash: user.password_hash,
                            created_at: user.created_at,
                        },
                    );
                }
            }

            info!(positions = restored, users = user_count, "hydrated state from database");
            Some(pool)
        }
        None => {
            info!("no DATABASE_URL set, running in-memory only");
            None
        }
    };

    let app_state = AppState {
        ledger,
        feed,
        user_store,
        jwt_secret: config.jwt_secret.clone(),
        environment: config.environment.clone(),
        db,
    };

    let app = app_router(app_state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind listener");
    info!(addr = %config.bind_addr, environment = %config.environment, "listening");
    axum::serve(listener, app).await.expect("server error");
}
