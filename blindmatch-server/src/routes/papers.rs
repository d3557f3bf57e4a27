use crate::error::{ServerError, ServerResult};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use blindmatch_core::{EncryptedPaper, PaperCiphertexts, PaperId, PaperState};
use serde::Serialize;

#[derive(Serialize)]
pub struct SubmitPaperResponse {
    pub paper_id: PaperId,
    pub submitted_at: u64,
}

#[derive(Serialize)]
pub struct PaperResponse {
    #[serde(flatten)]
    pub paper: EncryptedPaper,
    pub state: PaperState,
}

/// POST /papers
pub async fn submit_paper(
    State(state): State<AppState>,
    Json(body): Json<PaperCiphertexts>,
) -> ServerResult<(StatusCode, Json<SubmitPaperResponse>)> {
    let paper = state.service.submit_paper(body).await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitPaperResponse {
            paper_id: paper.id,
            submitted_at: paper.submitted_at,
        }),
    ))
}

/// GET /papers/{id}
pub async fn get_paper(
    State(state): State<AppState>,
    Path(paper_id): Path<PaperId>,
) -> ServerResult<Json<PaperResponse>> {
    let not_found = || ServerError::NotFound(format!("Paper {paper_id} not found"));

    let paper = state.service.paper(paper_id).await?.ok_or_else(not_found)?;
    let paper_state = state
        .service
        .paper_state(paper_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(PaperResponse {
        paper,
        state: paper_state,
    }))
}
