use crate::error::{ServerError, ServerResult};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use blindmatch_core::{EncryptedReviewer, ReviewerCiphertexts, ReviewerId};
use serde::Serialize;

#[derive(Serialize)]
pub struct AddReviewerResponse {
    pub reviewer_id: ReviewerId,
}

/// POST /reviewers
pub async fn add_reviewer(
    State(state): State<AppState>,
    Json(body): Json<ReviewerCiphertexts>,
) -> ServerResult<(StatusCode, Json<AddReviewerResponse>)> {
    let reviewer = state.service.add_reviewer(body).await?;

    Ok((
        StatusCode::CREATED,
        Json(AddReviewerResponse {
            reviewer_id: reviewer.id,
        }),
    ))
}

/// GET /reviewers/{id}
pub async fn get_reviewer(
    State(state): State<AppState>,
    Path(reviewer_id): Path<ReviewerId>,
) -> ServerResult<Json<EncryptedReviewer>> {
    state
        .service
        .reviewer(reviewer_id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("Reviewer {reviewer_id} not found")))
}
