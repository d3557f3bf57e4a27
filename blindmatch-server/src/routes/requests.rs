use crate::error::{ServerError, ServerResult};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use blindmatch_core::{PendingEntry, RequestId};

/// GET /requests/{id}
pub async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<RequestId>,
) -> ServerResult<Json<PendingEntry>> {
    state
        .service
        .pending_request(request_id)
        .await
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("No pending request {request_id}")))
}

/// DELETE /requests/{id}
pub async fn cancel_request(
    State(state): State<AppState>,
    Path(request_id): Path<RequestId>,
) -> ServerResult<StatusCode> {
    state.service.cancel_request(request_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
