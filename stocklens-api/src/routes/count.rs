/// Counting workflow endpoints
///
/// Balance lookup, analysis, review edits, cancel, and confirm. The image
/// arrives base64-encoded in the request body; decoding failures are the
/// client's fault and map to 400 before any tokens are touched.

use crate::app::{AppState, AuthContext};
use crate::error::{ApiError, ApiResult};
use crate::recognition::CountedItem;
use crate::workflow::COST_PER_ANALYSIS;
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use stocklens_shared::models::record::InventoryRecord;

/// Balance response
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Current token balance
    pub balance: i64,

    /// Tokens debited per analysis
    pub cost_per_analysis: i64,
}

/// Analysis request
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    /// Base64-encoded JPEG capture
    pub image_base64: String,

    /// Optional product name the model should count
    pub hint: Option<String>,
}

/// Analysis response: items under review plus the post-debit balance
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub items: Vec<CountedItem>,
    pub balance: i64,
}

/// Items currently under review
#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub items: Vec<CountedItem>,
}

/// Label edit request
#[derive(Debug, Deserialize)]
pub struct EditItemRequest {
    pub label: String,
}

/// Confirmation response: the refreshed history
#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub records: Vec<InventoryRecord>,
}

/// GET /v1/balance
pub async fn balance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<BalanceResponse>> {
    let balance = state.workflow.balance(&auth.email).await?;

    Ok(Json(BalanceResponse {
        balance,
        cost_per_analysis: COST_PER_ANALYSIS,
    }))
}

/// POST /v1/count/analyze
pub async fn analyze(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let image = base64::engine::general_purpose::STANDARD
        .decode(&request.image_base64)
        .map_err(|_| ApiError::BadRequest("image_base64 is not valid base64".to_string()))?;

    if image.is_empty() {
        return Err(ApiError::BadRequest("Image is empty".to_string()));
    }

    let hint = request
        .hint
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty());

    let outcome = state.workflow.analyze(&auth.email, image, hint).await?;

    Ok(Json(AnalyzeResponse {
        items: outcome.items,
        balance: outcome.balance,
    }))
}

/// GET /v1/count/review
pub async fn review(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ReviewResponse>> {
    let items = state.workflow.current_review(&auth.email)?;
    Ok(Json(ReviewResponse { items }))
}

/// PATCH /v1/count/items/:index
pub async fn edit_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(index): Path<usize>,
    Json(request): Json<EditItemRequest>,
) -> ApiResult<Json<ReviewResponse>> {
    let label = request.label.trim();
    if label.is_empty() {
        return Err(ApiError::BadRequest("Label cannot be empty".to_string()));
    }

    let items = state.workflow.edit_label(&auth.email, index, label)?;
    Ok(Json(ReviewResponse { items }))
}

/// DELETE /v1/count/items/:index
pub async fn remove_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(index): Path<usize>,
) -> ApiResult<Json<ReviewResponse>> {
    let items = state.workflow.remove_item(&auth.email, index)?;
    Ok(Json(ReviewResponse { items }))
}

/// POST /v1/count/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<serde_json::Value>> {
    state.workflow.cancel(&auth.email);
    Ok(Json(serde_json::json!({ "cancelled": true })))
}

/// POST /v1/count/confirm
pub async fn confirm(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ConfirmResponse>> {
    let records = state.workflow.confirm(&auth.email).await?;
    Ok(Json(ConfirmResponse { records }))
}
