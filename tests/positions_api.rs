//! HTTP integration tests: positions and market-data routes, status mapping.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::RwLock;
use trading_ledger::api::routes::{app_router, AppState};
use trading_ledger::feed::PriceFeed;
use trading_ledger::ledger::Ledger;

fn test_app_state() -> AppState {
    AppState {
        ledger: Arc::new(Ledger::new()),
        feed: Arc::new(PriceFeed::new()),
        user_store: Arc::new(RwLock::new(HashMap::new())),
        jwt_secret: b"test-jwt-secret".to_vec(),
        environment: "test".to_string(),
        db: None,
    }
}

/// Spawn app on a random port and return (base_url, guard that keeps server running).
async fn spawn_app(state: AppState) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);
    let app = app_router(state);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (base_url, handle)
}

/// Register a user and return a bearer token for mutating routes.
async fn auth_token(client: &reqwest::Client, base_url: &str) -> String {
    let res = client
        .post(format!("{}/api/v1/auth/register", base_url))
        .json(&serde_json::json!({ "username": "trader", "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 201);

    let res = client
        .post(format!("{}/api/v1/auth/login", base_url))
        .json(&serde_json::json!({ "username": "trader", "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let json: serde_json::Value = res.json().await.unwrap();
    json["access_token"].as_str().unwrap().to_string()
}

fn as_decimal(value: &serde_json::Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn list_positions_empty_ok() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/v1/positions", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let json: serde_json::Value = res.json().await.unwrap();
    assert_eq!(json.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn open_position_returns_201_and_listing_includes_it_once() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();
    let token = auth_token(&client, &base_url).await;

    let res = client
        .post(format!("{}/api/v1/positions", base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "symbol": "btcusd",
            "quantity": "1.5",
            "entry_price": "45000.00",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 201);
    let created: serde_json::Value = res.json().await.unwrap();
    assert_eq!(created["symbol"], "BTCUSD");
    assert_eq!(created["status"], "OPEN");
    assert_eq!(as_decimal(&created["quantity"]), dec!(1.5));
    assert!(created["closed_at"].is_null());
    let id = created["id"].as_str().unwrap();

    let res = client
        .get(format!("{}/api/v1/positions", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let listed: serde_json::Value = res.json().await.unwrap();
    let rows = listed.as_array().unwrap();
    assert_eq!(rows.iter().filter(|row| row["id"] == id).count(), 1);
    // no market data yet: pnl degrades to null, the call still succeeds
    assert!(rows[0]["unrealized_pnl"].is_null());
    assert!(rows[0]["current_price"].is_null());
    assert_eq!(rows[0]["position_type"], "LONG");
}

#[tokio::test]
async fn open_position_requires_bearer_token() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/v1/positions", base_url))
        .json(&serde_json::json!({
            "symbol": "BTCUSD",
            "quantity": "1",
            "entry_price": "45000",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 401);
}

#[tokio::test]
async fn open_position_zero_quantity_returns_400() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();
    let token = auth_token(&client, &base_url).await;

    let res = client
        .post(format!("{}/api/v1/positions", base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "symbol": "BTCUSD",
            "quantity": "0",
            "entry_price": "45000",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 400);
    let json: serde_json::Value = res.json().await.unwrap();
    assert!(json["error"].as_str().unwrap().contains("invalid input"));
}

#[tokio::test]
async fn pnl_appears_after_price_update() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();
    let token = auth_token(&client, &base_url).await;

    client
        .post(format!("{}/api/v1/positions", base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "symbol": "BTCUSD",
            "quantity": "1.5",
            "entry_price": "45000.00",
        }))
        .send()
        .await
        .unwrap();

    let res = client
        .put(format!("{}/api/v1/market-data/BTCUSD", base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "price": "46500.00", "volume": "1500.75" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let json: serde_json::Value = res.json().await.unwrap();
    assert_eq!(json["applied"], true);

    let res = client
        .get(format!("{}/api/v1/positions", base_url))
        .send()
        .await
        .unwrap();
    let listed: serde_json::Value = res.json().await.unwrap();
    let row = &listed.as_array().unwrap()[0];
    assert_eq!(as_decimal(&row["current_price"]), dec!(46500.00));
    assert_eq!(as_decimal(&row["unrealized_pnl"]), dec!(2250.00));
}

#[tokio::test]
async fn get_position_by_id_and_unknown_returns_404() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();
    let token = auth_token(&client, &base_url).await;

    let res = client
        .post(format!("{}/api/v1/positions", base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "symbol": "ETHUSD",
            "quantity": "-2",
            "entry_price": "3000",
        }))
        .send()
        .await
        .unwrap();
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap();

    let res = client
        .get(format!("{}/api/v1/positions/{}", base_url, id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let json: serde_json::Value = res.json().await.unwrap();
    assert_eq!(json["position_type"], "SHORT");

    let res = client
        .get(format!(
            "{}/api/v1/positions/{}",
            base_url,
            uuid::Uuid::new_v4()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 404);
}

#[tokio::test]
async fn adjust_position_via_patch() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();
    let token = auth_token(&client, &base_url).await;

    let res = client
        .post(format!("{}/api/v1/positions", base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "symbol": "BTCUSD",
            "quantity": "10",
            "entry_price": "45000",
        }))
        .send()
        .await
        .unwrap();
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap();

    let res = client
        .patch(format!("{}/api/v1/positions/{}", base_url, id))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "delta_quantity": "-4", "price": "46000" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let adjusted: serde_json::Value = res.json().await.unwrap();
    assert_eq!(as_decimal(&adjusted["quantity"]), dec!(6));
    assert_eq!(as_decimal(&adjusted["entry_price"]), dec!(45000));

    // crossing adjustment returns the successor position
    let res = client
        .patch(format!("{}/api/v1/positions/{}", base_url, id))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "delta_quantity": "-7", "price": "46000" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let successor: serde_json::Value = res.json().await.unwrap();
    assert_ne!(successor["id"], created["id"]);
    assert_eq!(as_decimal(&successor["quantity"]), dec!(-1));
    assert_eq!(as_decimal(&successor["entry_price"]), dec!(46000));
}

#[tokio::test]
async fn close_position_twice_returns_400() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();
    let token = auth_token(&client, &base_url).await;

    let res = client
        .post(format!("{}/api/v1/positions", base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "symbol": "BTCUSD",
            "quantity": "1",
            "entry_price": "45000",
        }))
        .send()
        .await
        .unwrap();
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap();

    let res = client
        .post(format!("{}/api/v1/positions/{}/close", base_url, id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let closed: serde_json::Value = res.json().await.unwrap();
    assert_eq!(closed["status"], "CLOSED");
    assert!(!closed["closed_at"].is_null());

    let res = client
        .post(format!("{}/api/v1/positions/{}/close", base_url, id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 400);
    let json: serde_json::Value = res.json().await.unwrap();
    assert!(json["error"].as_str().unwrap().contains("invalid state"));
}

#[tokio::test]
async fn closed_positions_listed_via_status_filter() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();
    let token = auth_token(&client, &base_url).await;

    let res = client
        .post(format!("{}/api/v1/positions", base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "symbol": "BTCUSD",
            "quantity": "1",
            "entry_price": "45000",
        }))
        .send()
        .await
        .unwrap();
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap();
    client
        .post(format!("{}/api/v1/positions/{}/close", base_url, id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    let res = client
        .get(format!("{}/api/v1/positions", base_url))
        .send()
        .await
        .unwrap();
    let open: serde_json::Value = res.json().await.unwrap();
    assert_eq!(open.as_array().unwrap().len(), 0);

    let res = client
        .get(format!("{}/api/v1/positions?status=closed", base_url))
        .send()
        .await
        .unwrap();
    let closed: serde_json::Value = res.json().await.unwrap();
    let rows = closed.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0]["unrealized_pnl"].is_null());

    let res = client
        .get(format!("{}/api/v1/positions?status=bogus", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 400);
}

#[tokio::test]
async fn market_data_unknown_symbol_returns_404() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/v1/market-data/UNKNOWN", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 404);
    let json: serde_json::Value = res.json().await.unwrap();
    assert!(json["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn market_data_roundtrip_uppercases_symbol() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();
    let token = auth_token(&client, &base_url).await;

    let res = client
        .put(format!("{}/api/v1/market-data/btcusd", base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "price": "45000.00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);

    let res = client
        .get(format!("{}/api/v1/market-data/BTCUSD", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let json: serde_json::Value = res.json().await.unwrap();
    assert_eq!(json["symbol"], "BTCUSD");
    assert_eq!(as_decimal(&json["price"]), dec!(45000));
    assert!(json["volume"].is_null());

    let res = client
        .get(format!("{}/api/v1/symbols", base_url))
        .send()
        .await
        .unwrap();
    let json: serde_json::Value = res.json().await.unwrap();
    assert_eq!(json["symbols"], serde_json::json!(["BTCUSD"]));
}

#[tokio::test]
async fn stale_market_data_update_reports_applied_false() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();
    let token = auth_token(&client, &base_url).await;

    let now = Utc::now();
    client
        .put(format!("{}/api/v1/market-data/BTCUSD", base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "price": "45000", "observed_at": now }))
        .send()
        .await
        .unwrap();

    let res = client
        .put(format!("{}/api/v1/market-data/BTCUSD", base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "price": "44000",
            "observed_at": now - Duration::seconds(5),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let json: serde_json::Value = res.json().await.unwrap();
    assert_eq!(json["applied"], false);

    let res = client
        .get(format!("{}/api/v1/market-data/BTCUSD", base_url))
        .send()
        .await
        .unwrap();
    let json: serde_json::Value = res.json().await.unwrap();
    assert_eq!(as_decimal(&json["price"]), dec!(45000));
}

#[tokio::test]
async fn root_and_health_report_running() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();

    let res = client.get(&base_url).send().await.unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let json: serde_json::Value = res.json().await.unwrap();
    assert_eq!(json["status"], "running");
    assert_eq!(json["environment"], "test");

    let res = client
        .get(format!("{}/api/v1/health", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let json: serde_json::Value = res.json().await.unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["services"]["api"]["status"], "running");
}
