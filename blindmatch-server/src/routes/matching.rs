use crate::error::ServerResult;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use blindmatch_core::{CoreError, MatchView, PaperId, RequestId, ReviewerId};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct OracleRequestResponse {
    pub paper_id: PaperId,
    pub request_id: RequestId,
}

#[derive(Deserialize)]
pub struct AcknowledgeRequest {
    pub reviewer_id: ReviewerId,
}

#[derive(Serialize)]
pub struct AcknowledgeResponse {
    pub paper_id: PaperId,
    pub reviewer_id: ReviewerId,
    pub acknowledged: bool,
}

/// POST /papers/{id}/matching
pub async fn request_matching(
    State(state): State<AppState>,
    Path(paper_id): Path<PaperId>,
) -> ServerResult<(StatusCode, Json<OracleRequestResponse>)> {
    let request_id = state.service.request_matching(paper_id).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(OracleRequestResponse {
            paper_id,
            request_id,
        }),
    ))
}

/// GET /papers/{id}/match
///
/// `reviewer_id` is null until the reveal completes.
pub async fn get_match(
    State(state): State<AppState>,
    Path(paper_id): Path<PaperId>,
) -> ServerResult<Json<MatchView>> {
    let result = state
        .service
        .match_result(paper_id)
        .await
        .ok_or(CoreError::NoMatchFound(paper_id))?;
    Ok(Json(result.view()))
}

/// POST /papers/{id}/acknowledge
pub async fn acknowledge(
    State(state): State<AppState>,
    Path(paper_id): Path<PaperId>,
    Json(body): Json<AcknowledgeRequest>,
) -> ServerResult<Json<AcknowledgeResponse>> {
    state
        .service
        .acknowledge_match(paper_id, body.reviewer_id)
        .await?;

    Ok(Json(AcknowledgeResponse {
        paper_id,
        reviewer_id: body.reviewer_id,
        acknowledged: true,
    }))
}

/// POST /papers/{id}/reveal
pub async fn reveal(
    State(state): State<AppState>,
    Path(paper_id): Path<PaperId>,
) -> ServerResult<(StatusCode, Json<OracleRequestResponse>)> {
    let request_id = state.service.reveal_matched_reviewer(paper_id).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(OracleRequestResponse {
            paper_id,
            request_id,
        }),
    ))
}
