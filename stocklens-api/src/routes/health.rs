/// Health check endpoint
///
/// Reports process liveness plus database reachability so load balancers
/// and orchestrators can probe the service.

use crate::app::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status: "healthy" or "degraded"
    pub status: String,

    /// Service version
    pub version: String,

    /// Database connectivity
    pub database: String,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database_ok = stocklens_shared::db::pool::health_check(&state.db)
        .await
        .is_ok();

    let (status_code, status, database) = if database_ok {
        (StatusCode::OK, "healthy", "connected")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unreachable")
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            version: stocklens_shared::VERSION.to_string(),
            database: database.to_string(),
        }),
    )
}
