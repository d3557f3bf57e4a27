use crate::error::{ServerError, ServerResult};
use crate::state::AppState;
use axum::{Json, extract::State};
use base64::{Engine, engine::general_purpose::STANDARD};
use blindmatch_core::{MatchView, RequestId};
use serde::Deserialize;

/// An oracle answer; `cleartext` and `proof` are base64
#[derive(Deserialize)]
pub struct OracleCallback {
    pub request_id: RequestId,
    pub cleartext: String,
    pub proof: String,
}

impl OracleCallback {
    fn decode(&self) -> ServerResult<(Vec<u8>, Vec<u8>)> {
        let cleartext = STANDARD
            .decode(&self.cleartext)
            .map_err(|_| ServerError::BadRequest("Invalid base64 in cleartext".into()))?;
        let proof = STANDARD
            .decode(&self.proof)
            .map_err(|_| ServerError::BadRequest("Invalid base64 in proof".into()))?;
        Ok((cleartext, proof))
    }
}

/// POST /oracle/matching
pub async fn process_matching(
    State(state): State<AppState>,
    Json(body): Json<OracleCallback>,
) -> ServerResult<Json<MatchView>> {
    let (cleartext, proof) = body.decode()?;
    let result = state
        .service
        .process_matching(body.request_id, &cleartext, &proof)
        .await?;
    Ok(Json(result.view()))
}

/// POST /oracle/reveal
pub async fn finalize_reveal(
    State(state): State<AppState>,
    Json(body): Json<OracleCallback>,
) -> ServerResult<Json<MatchView>> {
    let (cleartext, proof) = body.decode()?;
    let result = state
        .service
        .finalize_reveal(body.request_id, &cleartext, &proof)
        .await?;
    Ok(Json(result.view()))
}
