//! Service configuration, read once from the environment at startup and
//! passed through `AppState` rather than ambient globals.

use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub jwt_secret: Vec<u8>,
    pub database_url: Option<String>,
    pub environment: String,
}

impl AppConfig {
    /// Load from process env. `.env` values are already merged by dotenvy.
    pub fn from_env() -> Self {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let jwt_secret = env::var("JWT_SECRET")
            .unwrap_or_else(|_| "dev-jwt-secret-change-in-production".to_string())
            .into_bytes();
        let database_url = env::var("DATABASE_URL").ok();
        let environment = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        Self {
            bind_addr,
            jwt_secret,
            database_url,
            environment,
        }
    }
}
