/// Health check endpoint
///
/// `GET /health` answers whether the server is up and can reach its
/// database. Used by load balancers and deploy tooling; requires no
/// authentication.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use payflow_shared::db::pool;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" when all probes pass, "degraded" otherwise
    pub status: String,

    /// Application version
    pub version: String,

    /// Database probe result: "connected" or "disconnected"
    pub database: String,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let db_ok = pool::health_check(&state.db).await.is_ok();

    Ok(Json(HealthResponse {
        status: if db_ok { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if db_ok { "connected" } else { "disconnected" }.to_string(),
    }))
}
