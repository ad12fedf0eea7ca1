//! Shared test utilities for integration tests.
//!
//! `TestClient` drives the application router against an in-memory database.
//! Methods are intentionally broad to support the different test files.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use paylog::config::{CalculatorConfig, Config};
use paylog::date_utils::WeekStart;
use paylog::db::{create_in_memory_pool, migrations, DbPool};
use paylog::handlers;
use paylog::state::AppState;
use paylog::store::DEFAULT_QUEUE_CAPACITY;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tower::ServiceExt;

/// A test client that issues sequential requests against one application state.
pub struct TestClient {
    pub state: AppState,
    /// The state's database, for tests that tamper with the schema.
    pub pool: DbPool,
}

impl TestClient {
    /// Create a new test client with a fresh in-memory database.
    pub fn new() -> Self {
        Self::with_calculator(CalculatorConfig::default())
    }

    /// Create a test client whose hours calculator talks to `calculator`.
    pub fn with_calculator(calculator: CalculatorConfig) -> Self {
        let pool = create_in_memory_pool().expect("Failed to create in-memory pool");
        {
            let conn = pool.get().expect("Failed to get connection");
            migrations::run_migrations(&conn, Path::new("migrations"))
                .expect("Failed to run migrations");
        }

        let config = Config {
            host: "127.0.0.1".into(),
            port: 7070,
            database_path: PathBuf::from(":memory:"),
            migrations_path: PathBuf::from("migrations"),
            week_start: WeekStart::default(),
            feed_capacity: DEFAULT_QUEUE_CAPACITY,
            calculator,
        };

        Self {
            state: AppState::new(pool.clone(), config),
            pool,
        }
    }

    pub fn router(&self) -> Router {
        handlers::routes().with_state(self.state.clone())
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, String) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&body).to_string())
    }

    /// Make a GET request and return status and body.
    pub async fn get(&self, uri: &str) -> (StatusCode, String) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Get JSON from an endpoint and parse it.
    pub async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, body) = self.get(uri).await;
        (status, serde_json::from_str(&body).unwrap_or(Value::Null))
    }

    async fn send_json(&self, method: &str, uri: &str, body: &Value) -> (StatusCode, Value) {
        let (status, text) = self
            .send(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await;
        (status, serde_json::from_str(&text).unwrap_or(Value::Null))
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        self.send_json("POST", uri, body).await
    }

    pub async fn put_json(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        self.send_json("PUT", uri, body).await
    }

    pub async fn delete(&self, uri: &str) -> StatusCode {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .0
    }

    // =========================================================================
    // Helper methods for creating entries through the API
    // =========================================================================

    /// Create a one-day entry and return its id.
    pub async fn create_entry(
        &self,
        owner: &str,
        date: &str,
        hours: f64,
        base: f64,
        tips: f64,
    ) -> String {
        let (status, body) = self
            .post_json(
                &format!("/api/owners/{}/entries", owner),
                &json!({
                    "periodStart": date,
                    "periodEnd": date,
                    "hoursWorked": hours,
                    "baseAmount": base,
                    "tipsAmount": tips,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
        body["id"].as_str().expect("entry id").to_string()
    }

    /// Log hours for one day and return the record's id.
    pub async fn log_hours(&self, owner: &str, date: &str, hours: f64) -> String {
        let (status, body) = self
            .post_json(
                &format!("/api/owners/{}/daily-hours", owner),
                &json!({ "date": date, "hoursWorked": hours }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "log failed: {}", body);
        body["id"].as_str().expect("daily hours id").to_string()
    }

    /// Send a JSON-RPC request to an owner's adapter and return the response.
    pub async fn rpc(&self, owner: &str, method: &str, params: Value) -> Value {
        let (status, body) = self
            .post_json(
                &format!("/api/owners/{}/rpc", owner),
                &json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body
    }
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}
