/// Application state and router assembly
///
/// Wires the workflow, database pool, and configuration into an axum
/// router. Authentication is a bearer-token middleware that validates the
/// access token and injects an [`AuthContext`] extension for handlers.

use crate::config::Config;
use crate::error::ApiError;
use crate::routes;
use crate::workflow::Workflow;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use stocklens_shared::auth::jwt::validate_access_token;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Counting workflow orchestrator
    pub workflow: Arc<Workflow>,
}

impl AppState {
    /// JWT signing secret
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Identity of the authenticated caller, injected by the auth middleware
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID from the token's `sub` claim
    pub user_id: Uuid,

    /// User email, the key for ledger and history lookups
    pub email: String,
}

/// Bearer-token authentication middleware
///
/// Extracts the `Authorization: Bearer` token, validates it as an access
/// token, and makes an [`AuthContext`] available to handlers.
async fn jwt_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = validate_access_token(token, state.jwt_secret())?;

    request.extensions_mut().insert(AuthContext {
        user_id: claims.sub,
        email: claims.email,
    });

    Ok(next.run(request).await)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(parsed)
    }
}

/// Builds the application router
///
/// Health and auth endpoints are public; everything under `/v1` besides
/// auth requires a valid access token.
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/v1/auth/register", post(routes::auth::register))
        .route("/v1/auth/confirm", post(routes::auth::confirm))
        .route("/v1/auth/login", post(routes::auth::login))
        .route("/v1/auth/refresh", post(routes::auth::refresh));

    let authed = Router::new()
        .route("/v1/balance", get(routes::count::balance))
        .route("/v1/count/analyze", post(routes::count::analyze))
        .route("/v1/count/review", get(routes::count::review))
        .route(
            "/v1/count/items/:index",
            patch(routes::count::edit_item).delete(routes::count::remove_item),
        )
        .route("/v1/count/cancel", post(routes::count::cancel))
        .route("/v1/count/confirm", post(routes::count::confirm))
        .route("/v1/records", get(routes::records::list))
        .route(
            "/v1/records/selection/toggle",
            post(routes::records::selection_toggle),
        )
        .route(
            "/v1/records/selection/select-all",
            post(routes::records::selection_select_all),
        )
        .route(
            "/v1/records/selection/clear",
            post(routes::records::selection_clear),
        )
        .route("/v1/records/export", get(routes::records::export))
        .layer(middleware::from_fn_with_state(state.clone(), jwt_auth));

    public
        .merge(authed)
        .layer(cors_layer(&state.config.api.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
