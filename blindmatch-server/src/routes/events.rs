use crate::error::ServerResult;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Query, State},
};
use blindmatch_core::EventRecord;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: u64,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub papers: u64,
    pub reviewers: u64,
    pub pending_requests: usize,
    pub events: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mock_oracle_outstanding: Option<usize>,
}

/// GET /events?since=n
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Json<Vec<EventRecord>> {
    Json(state.service.events_since(query.since))
}

/// GET /stats
pub async fn stats(State(state): State<AppState>) -> ServerResult<Json<StatsResponse>> {
    let service = &state.service;
    Ok(Json(StatsResponse {
        papers: service.paper_count().await?,
        reviewers: service.reviewer_count().await?,
        pending_requests: service.pending_count().await,
        events: service.event_count(),
        mock_oracle_outstanding: state.mock_oracle.as_ref().map(|m| m.outstanding()),
    }))
}
