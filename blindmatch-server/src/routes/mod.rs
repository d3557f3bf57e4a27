use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

mod events;
mod health;
mod matching;
mod oracle;
mod papers;
mod requests;
mod reviewers;

pub fn router(state: AppState) -> Router {
    let records = Router::new()
        .route("/papers", post(papers::submit_paper))
        .route("/papers/{id}", get(papers::get_paper))
        .route("/reviewers", post(reviewers::add_reviewer))
        .route("/reviewers/{id}", get(reviewers::get_reviewer));

    let matching = Router::new()
        .route("/papers/{id}/matching", post(matching::request_matching))
        .route("/papers/{id}/match", get(matching::get_match))
        .route("/papers/{id}/acknowledge", post(matching::acknowledge))
        .route("/papers/{id}/reveal", post(matching::reveal));

    // Oracle answers; authenticity comes from the attestation, not the caller
    let callbacks = Router::new()
        .route("/oracle/matching", post(oracle::process_matching))
        .route("/oracle/reveal", post(oracle::finalize_reveal))
        .route(
            "/requests/{id}",
            get(requests::get_request).delete(requests::cancel_request),
        );

    let public = Router::new()
        .route("/health", get(health::health_check))
        .route("/stats", get(events::stats))
        .route("/events", get(events::list_events));

    Router::new()
        .merge(records)
        .merge(matching)
        .merge(callbacks)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
