//! HTTP adapter: health, auth, positions, and market-data routes over the
//! ledger core. Error mapping: NotFound -> 404, InvalidInput/InvalidState
//! -> 400; a missing price on the read path is a null pnl, never an error.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::api::auth::{self, AuthUser, StoredUser, UserStore};
use crate::error::LedgerError;
use crate::feed::SharedPriceFeed;
use crate::ledger::SharedLedger;
use crate::persistence;
use crate::query::{self, PositionWithPnl};
use crate::types::position::{Position, PositionStatus};
use crate::types::price::PricePoint;

#[derive(Clone)]
pub struct AppState {
    pub ledger: SharedLedger,
    pub feed: SharedPriceFeed,
    pub user_store: UserStore,
    pub jwt_secret: Vec<u8>,
    pub environment: String,
    pub db: Option<PgPool>,
}

/// JSON error body `{"error": "..."}` with the mapped status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }

    pub fn unauthorized(message: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.to_string(),
        }
    }

    pub fn internal(message: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.to_string(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = match err {
            LedgerError::InvalidInput(_) | LedgerError::InvalidState(_) => StatusCode::BAD_REQUEST,
            LedgerError::NotFound(_) | LedgerError::PriceUnavailable(_) => StatusCode::NOT_FOUND,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn app_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/positions", get(list_positions).post(open_position))
        .route("/positions/{id}", get(get_position).patch(adjust_position))
        .route("/positions/{id}/close", post(close_position))
        .route(
            "/market-data/{symbol}",
            get(get_market_data).put(update_market_data),
        )
        .route("/symbols", get(symbols));
    Router::new()
        .route("/", get(root))
        .nest("/api/v1", api)
        .with_state(state)
}

async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "message": format!("Welcome to {}", env!("CARGO_PKG_NAME")),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.environment,
        "status": "running",
    }))
}

/// Per-service status map. The API itself is always reported; Postgres only
/// when configured. Always 200 with the overall status in the body.
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut services = serde_json::Map::new();
    services.insert("api".to_string(), json!({ "status": "running" }));
    let mut status = "healthy";
    if let Some(pool) = &state.db {
        match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => {
                services.insert("postgresql".to_string(), json!({ "status": "connected" }));
            }
            Err(err) => {
                status = "unhealthy";
                services.insert(
                    "postgresql".to_string(),
                    json!({ "status": "error", "message": err.to_string() }),
                );
            }
        }
    }
    Json(json!({ "status": status, "services": services }))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    username: String,
    password: String,
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let username = req.username.trim().to_lowercase();
    if username.is_empty() {
        return Err(ApiError::bad_request("username is required"));
    }
    if req.password.is_empty() {
        return Err(ApiError::bad_request("password is required"));
    }
    let password_hash = auth::hash_password(&req.password)
        .map_err(|_| ApiError::internal("could not hash password"))?;
    let user = StoredUser {
        id: Uuid::new_v4(),
        username: username.clone(),
        password_hash,
        created_at: Utc::now(),
    };
    {
        let mut store = state.user_store.write().await;
        if store.contains_key(&username) {
            return Err(ApiError::bad_request("username is already taken"));
        }
        store.insert(username, user.clone());
    }
    persist_user(&state, &user).await;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "user_id": user.id, "username": user.username })),
    ))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let username = req.username.trim().to_lowercase();
    let user = state.user_store.read().await.get(&username).cloned();
    let user = user.ok_or_else(|| ApiError::unauthorized("invalid credentials"))?;
    if !auth::verify_password(&user.password_hash, &req.password) {
        return Err(ApiError::unauthorized("invalid credentials"));
    }
    let token = auth::create_token(&state.jwt_secret, user.id)
        .map_err(|_| ApiError::internal("could not issue token"))?;
    Ok(Json(
        json!({ "access_token": token, "token_type": "bearer" }),
    ))
}

async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let store = state.user_store.read().await;
    let found = store
        .values()
        .find(|stored| stored.id == user.user_id)
        .ok_or_else(|| ApiError::unauthorized("unknown user"))?;
    Ok(Json(json!({
        "user_id": found.id,
        "username": found.username,
        "created_at": found.created_at,
    })))
}

#[derive(Debug, Deserialize)]
struct PositionsQuery {
    status: Option<String>,
}

/// GET /positions defaults to open positions with live pnl; `?status=` can
/// widen it to closed or all.
async fn list_positions(
    State(state): State<AppState>,
    Query(params): Query<PositionsQuery>,
) -> Result<Json<Vec<PositionWithPnl>>, ApiError> {
    let filter = match params.status.as_deref() {
        None => Some(PositionStatus::Open),
        Some(s) if s.eq_ignore_ascii_case("open") => Some(PositionStatus::Open),
        Some(s) if s.eq_ignore_ascii_case("closed") => Some(PositionStatus::Closed),
        Some(s) if s.eq_ignore_ascii_case("all") => None,
        Some(other) => {
            return Err(
                LedgerError::InvalidInput(format!("unknown status filter: {other}")).into(),
            );
        }
    };
    let rows = query::positions_with_pnl(&state.ledger, &state.feed, filter).await;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
struct OpenPositionRequest {
    symbol: String,
    quantity: Decimal,
    entry_price: Decimal,
}

async fn open_position(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(req): Json<OpenPositionRequest>,
) -> Result<(StatusCode, Json<Position>), ApiError> {
    let position = state
        .ledger
        .open_position(&req.symbol, req.quantity, req.entry_price)
        .await?;
    persist_position(&state, &position).await;
    Ok((StatusCode::CREATED, Json(position)))
}

async fn get_position(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PositionWithPnl>, ApiError> {
    let row = query::position_with_pnl(&state.ledger, &state.feed, id).await?;
    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
struct AdjustPositionRequest {
    delta_quantity: Decimal,
    price: Decimal,
}

async fn adjust_position(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthUser,
    Json(req): Json<AdjustPositionRequest>,
) -> Result<Json<Position>, ApiError> {
    let outcome = state
        .ledger
        .adjust_position(id, req.delta_quantity, req.price)
        .await?;
    persist_position(&state, &outcome).await;
    if outcome.id != id {
        // Crossing adjustment: the original closed and a successor opened.
        if let Ok(original) = state.ledger.get_position(id).await {
            persist_position(&state, &original).await;
        }
    }
    Ok(Json(outcome))
}

async fn close_position(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthUser,
) -> Result<Json<Position>, ApiError> {
    let position = state.ledger.close_position(id).await?;
    persist_position(&state, &position).await;
    Ok(Json(position))
}

async fn get_market_data(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<PricePoint>, ApiError> {
    let point = query::market_data(&state.feed, &symbol).await?;
    Ok(Json(point))
}

#[derive(Debug, Deserialize)]
struct PriceUpdateRequest {
    price: Decimal,
    volume: Option<Decimal>,
    observed_at: Option<DateTime<Utc>>,
}

/// Feed ingestion. A stale timestamp is reported as `applied: false`, not
/// an error.
async fn update_market_data(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    _user: AuthUser,
    Json(req): Json<PriceUpdateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let observed_at = req.observed_at.unwrap_or_else(Utc::now);
    let applied = state
        .feed
        .update(&symbol, req.price, req.volume, observed_at)
        .await?;
    Ok(Json(json!({ "applied": applied })))
}

async fn symbols(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "symbols": state.feed.symbols().await }))
}

/// Write-through after a successful mutation. The in-memory ledger stays
/// authoritative; a persistence failure is logged, not surfaced.
async fn persist_position(state: &AppState, position: &Position) {
    if let Some(pool) = &state.db {
        if let Err(err) = persistence::upsert_position(pool, position).await {
            warn!(error = %err, id = %position.id, "failed to persist position");
        }
    }
}

async fn persist_user(state: &AppState, user: &StoredUser) {
    if let Some(pool) = &state.db {
        if let Err(err) = persistence::insert_user(
            pool,
            user.id,
            &user.username,
            &user.password_hash,
            user.created_at,
        )
        .await
        {
            warn!(error = %err, username = %user.username, "failed to persist user");
        }
    }
}
