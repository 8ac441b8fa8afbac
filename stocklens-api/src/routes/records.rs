/// History and export endpoints
///
/// Listing, export selection management, and the XLSX download. The
/// download sets `Content-Disposition` so browsers save the workbook under
/// its dated filename.

use crate::app::{AppState, AuthContext};
use crate::error::ApiResult;
use crate::workflow::HISTORY_LIMIT;
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use stocklens_shared::models::record::InventoryRecord;
use uuid::Uuid;

/// History query parameters
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Maximum records to return (capped server-side)
    pub limit: Option<i64>,
}

/// History response
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub records: Vec<InventoryRecord>,
}

/// Selection toggle request
#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub record_id: Uuid,
}

/// Selection state after a mutation
#[derive(Debug, Serialize)]
pub struct SelectionResponse {
    pub selected: usize,
}

/// GET /v1/records
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ListResponse>> {
    let limit = query.limit.unwrap_or(HISTORY_LIMIT);
    let records = state.workflow.history(&auth.email, limit).await?;
    Ok(Json(ListResponse { records }))
}

/// POST /v1/records/selection/toggle
pub async fn selection_toggle(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<ToggleRequest>,
) -> ApiResult<Json<SelectionResponse>> {
    let selected = state.workflow.selection_toggle(&auth.email, request.record_id);
    Ok(Json(SelectionResponse { selected }))
}

/// POST /v1/records/selection/select-all
pub async fn selection_select_all(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<SelectionResponse>> {
    let selected = state.workflow.selection_select_all(&auth.email).await?;
    Ok(Json(SelectionResponse { selected }))
}

/// POST /v1/records/selection/clear
pub async fn selection_clear(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<SelectionResponse>> {
    state.workflow.selection_clear(&auth.email);
    Ok(Json(SelectionResponse { selected: 0 }))
}

/// GET /v1/records/export
pub async fn export(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Response> {
    let (filename, bytes) = state.workflow.export(&auth.email).await?;

    tracing::info!(user = %auth.email, bytes = bytes.len(), "Exported inventory workbook");

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}
