pub mod calculator;
pub mod daily_hours;
pub mod entries;
pub mod rpc;
pub mod summaries;

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        // Entry CRUD
        .route("/api/owners/:owner/entries", get(entries::list))
        .route("/api/owners/:owner/entries", post(entries::create))
        .route("/api/owners/:owner/entries/:id", put(entries::update))
        .route("/api/owners/:owner/entries/:id", delete(entries::delete))
        // Daily hours log
        .route("/api/owners/:owner/daily-hours", get(daily_hours::list))
        .route("/api/owners/:owner/daily-hours", post(daily_hours::create))
        .route("/api/owners/:owner/daily-hours/:id", put(daily_hours::update))
        .route("/api/owners/:owner/daily-hours/:id", delete(daily_hours::delete))
        // Summaries from the live view
        .route("/api/owners/:owner/weeks", get(summaries::weeks))
        .route("/api/owners/:owner/periods", get(summaries::periods))
        .route("/api/owners/:owner/stats", get(summaries::stats))
        .route("/api/owners/:owner/breakdown", get(summaries::breakdown))
        .route("/api/owners/:owner/chart", get(summaries::chart))
        .route("/api/owners/:owner/live", delete(summaries::release))
        // Protocol adapter
        .route("/api/owners/:owner/rpc", post(rpc::handle))
        // Calculator proxy
        .route("/api/hours-calculator", post(calculator::calculate))
        // Health check
        .route("/health", get(health))
}

async fn health() -> &'static str {
    "OK"
}
