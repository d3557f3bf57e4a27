//! Protocol tests: matching and reveal round-trips through the mock oracle

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use blindmatch_core::{
    Callback, CiphertextHandle, CoreError, CoreResult, DecryptionOracle, InMemoryRecordStore,
    LowestIdEvaluator, MatchEvent, MatchingService, MockOracle, OracleResponse, PaperCiphertexts,
    PaperId, PaperState, PendingRequest, RequestId, ReviewerCiphertexts, ReviewerId,
    ServicePolicy, unix_now,
};

fn handle(tag: u8, n: u8) -> CiphertextHandle {
    let mut bytes = [n; 32];
    bytes[0] = tag;
    CiphertextHandle::from_bytes(bytes)
}

fn paper(n: u8) -> PaperCiphertexts {
    PaperCiphertexts {
        title: handle(b'T', n),
        abstract_text: handle(b'A', n),
        keywords: handle(b'K', n),
        discipline: handle(b'D', n),
    }
}

fn reviewer(n: u8) -> ReviewerCiphertexts {
    ReviewerCiphertexts {
        expertise: handle(b'E', n),
        affiliation: handle(b'F', n),
        publication_count: handle(b'P', n),
        review_count: handle(b'R', n),
    }
}

fn setup_with(policy: ServicePolicy) -> (MatchingService, Arc<MockOracle>) {
    let oracle = Arc::new(MockOracle::new());
    let service = MatchingService::new(
        Arc::new(InMemoryRecordStore::new()),
        oracle.clone(),
        Arc::new(oracle.signer_set()),
        Arc::new(LowestIdEvaluator),
    )
    .with_policy(policy);
    (service, oracle)
}

fn setup() -> (MatchingService, Arc<MockOracle>) {
    setup_with(ServicePolicy::default())
}

/// Take the single outstanding oracle request and answer it
fn answer(oracle: &MockOracle) -> OracleResponse {
    let mut requests = oracle.drain();
    assert_eq!(requests.len(), 1, "expected exactly one oracle request");
    oracle.respond(&requests.remove(0))
}

async fn matched(service: &MatchingService, oracle: &MockOracle, paper_id: PaperId) {
    service.request_matching(paper_id).await.unwrap();
    let r = answer(oracle);
    service
        .process_matching(r.request_id, &r.cleartext, &r.proof)
        .await
        .unwrap();
}

fn revealed_events(service: &MatchingService) -> Vec<(PaperId, ReviewerId)> {
    service
        .events_since(0)
        .into_iter()
        .filter_map(|r| match r.event {
            MatchEvent::MatchRevealed {
                paper_id,
                reviewer_id,
            } => Some((paper_id, reviewer_id)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_identifiers_sequential_and_independent() {
    let (service, _) = setup();

    let p1 = service.submit_paper(paper(1)).await.unwrap();
    let r1 = service.add_reviewer(reviewer(1)).await.unwrap();
    let p2 = service.submit_paper(paper(2)).await.unwrap();
    let p3 = service.submit_paper(paper(3)).await.unwrap();
    let r2 = service.add_reviewer(reviewer(2)).await.unwrap();

    assert_eq!([p1.id, p2.id, p3.id], [PaperId(1), PaperId(2), PaperId(3)]);
    assert_eq!([r1.id, r2.id], [ReviewerId(1), ReviewerId(2)]);
    assert_eq!(service.paper_count().await.unwrap(), 3);
    assert_eq!(service.reviewer_count().await.unwrap(), 2);

    let events = service.events_since(0);
    assert!(matches!(
        events[0].event,
        MatchEvent::PaperSubmitted { paper_id: PaperId(1), timestamp } if timestamp == p1.submitted_at
    ));
    assert!(matches!(
        events[1].event,
        MatchEvent::ReviewerAdded { reviewer_id: ReviewerId(1) }
    ));
}

#[tokio::test]
async fn test_request_matching_rejects_unknown_papers() {
    let (service, oracle) = setup();
    service.submit_paper(paper(1)).await.unwrap();

    for id in [0, 2, 99] {
        let result = service.request_matching(PaperId(id)).await;
        assert!(matches!(result, Err(CoreError::InvalidPaperId(p)) if p == PaperId(id)));
    }
    assert_eq!(oracle.outstanding(), 0);
    assert_eq!(service.pending_count().await, 0);
}

/// Scenario A: one paper, one reviewer, one verified callback
#[tokio::test]
async fn test_scenario_a_match_computed_unrevealed() {
    let (service, oracle) = setup();
    service.submit_paper(paper(1)).await.unwrap();
    service.add_reviewer(reviewer(1)).await.unwrap();

    let request_id = service.request_matching(PaperId(1)).await.unwrap();
    assert_eq!(
        service.pending_request(request_id).await.unwrap().request,
        PendingRequest::Matching(PaperId(1))
    );
    assert!(service.events_since(0).iter().any(|r| matches!(
        r.event,
        MatchEvent::MatchingRequested { paper_id: PaperId(1), .. }
    )));
    assert_eq!(
        service.paper_state(PaperId(1)).await.unwrap(),
        Some(PaperState::MatchRequested)
    );

    // The oracle saw the paper's four handles in order
    let requests = oracle.drain();
    assert_eq!(requests[0].handles, paper(1).handles().to_vec());
    assert_eq!(requests[0].callback, Callback::ProcessMatching);
    let r = oracle.respond(&requests[0]);

    let result = service
        .process_matching(r.request_id, &r.cleartext, &r.proof)
        .await
        .unwrap();
    assert_eq!(result.reviewer_id, ReviewerId(1));
    assert!(!result.revealed);

    let stored = service.match_result(PaperId(1)).await.unwrap();
    assert_eq!(stored, result);
    assert_eq!(service.pending_count().await, 0);
    assert_eq!(
        service.paper_state(PaperId(1)).await.unwrap(),
        Some(PaperState::MatchComputed)
    );
}

/// Scenarios B and C: reveal once, then refuse a second reveal
#[tokio::test]
async fn test_scenarios_b_and_c_reveal_exactly_once() {
    let (service, oracle) = setup();
    service.submit_paper(paper(1)).await.unwrap();
    service.add_reviewer(reviewer(1)).await.unwrap();
    matched(&service, &oracle, PaperId(1)).await;

    let score_handle = service.match_result(PaperId(1)).await.unwrap().score;
    oracle.set_plaintext(score_handle, vec![0, 0, 0, 87]);

    let request_id = service.reveal_matched_reviewer(PaperId(1)).await.unwrap();
    assert_eq!(
        service.pending_request(request_id).await.unwrap().request,
        PendingRequest::Reveal(PaperId(1))
    );

    let requests = oracle.drain();
    assert_eq!(requests[0].handles, vec![score_handle]);
    assert_eq!(requests[0].callback, Callback::FinalizeReveal);
    let r = oracle.respond(&requests[0]);

    let result = service
        .finalize_reveal(r.request_id, &r.cleartext, &r.proof)
        .await
        .unwrap();
    assert!(result.revealed);
    assert_eq!(result.disclosed_score, Some(vec![0, 0, 0, 87]));
    assert!(service.match_result(PaperId(1)).await.unwrap().revealed);
    assert_eq!(revealed_events(&service), vec![(PaperId(1), ReviewerId(1))]);
    assert_eq!(
        service.paper_state(PaperId(1)).await.unwrap(),
        Some(PaperState::Revealed)
    );

    // Scenario C
    let again = service.reveal_matched_reviewer(PaperId(1)).await;
    assert!(matches!(again, Err(CoreError::AlreadyRevealed(PaperId(1)))));
    assert_eq!(revealed_events(&service).len(), 1);
}

/// Scenario D
#[tokio::test]
async fn test_scenario_d_matching_beyond_paper_count() {
    let (service, _) = setup();
    service.submit_paper(paper(1)).await.unwrap();

    let result = service.request_matching(PaperId(2)).await;
    assert!(matches!(result, Err(CoreError::InvalidPaperId(PaperId(2)))));
}

#[tokio::test]
async fn test_replayed_callback_rejected() {
    let (service, oracle) = setup();
    service.submit_paper(paper(1)).await.unwrap();
    service.add_reviewer(reviewer(1)).await.unwrap();

    service.request_matching(PaperId(1)).await.unwrap();
    let r = answer(&oracle);

    service
        .process_matching(r.request_id, &r.cleartext, &r.proof)
        .await
        .unwrap();
    let replay = service
        .process_matching(r.request_id, &r.cleartext, &r.proof)
        .await;
    assert!(matches!(replay, Err(CoreError::InvalidRequest(id)) if id == r.request_id));
}

#[tokio::test]
async fn test_never_issued_request_rejected() {
    let (service, _) = setup();
    let result = service.process_matching(RequestId(42), b"[]", &[0u8; 64]).await;
    assert!(matches!(result, Err(CoreError::InvalidRequest(RequestId(42)))));

    let result = service.finalize_reveal(RequestId(42), b"[]", &[0u8; 64]).await;
    assert!(matches!(result, Err(CoreError::InvalidRequest(RequestId(42)))));
}

#[tokio::test]
async fn test_wrong_callback_does_not_consume() {
    let (service, oracle) = setup();
    service.submit_paper(paper(1)).await.unwrap();
    service.add_reviewer(reviewer(1)).await.unwrap();

    service.request_matching(PaperId(1)).await.unwrap();
    let r = answer(&oracle);

    let wrong = service
        .finalize_reveal(r.request_id, &r.cleartext, &r.proof)
        .await;
    assert!(matches!(wrong, Err(CoreError::InvalidRequest(_))));
    assert!(service.pending_request(r.request_id).await.is_some());

    service
        .process_matching(r.request_id, &r.cleartext, &r.proof)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_empty_registry_writes_nothing() {
    let (service, oracle) = setup();
    service.submit_paper(paper(1)).await.unwrap();

    service.request_matching(PaperId(1)).await.unwrap();
    let r = answer(&oracle);

    let result = service
        .process_matching(r.request_id, &r.cleartext, &r.proof)
        .await;
    assert!(matches!(result, Err(CoreError::NoReviewersAvailable)));
    assert!(service.match_result(PaperId(1)).await.is_none());

    // The request is still pending and succeeds once a reviewer exists
    assert!(service.pending_request(r.request_id).await.is_some());
    service.add_reviewer(reviewer(1)).await.unwrap();
    service
        .process_matching(r.request_id, &r.cleartext, &r.proof)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_forged_proof_rejected_and_consumed() {
    let (service, oracle) = setup();
    service.submit_paper(paper(1)).await.unwrap();
    service.add_reviewer(reviewer(1)).await.unwrap();

    service.request_matching(PaperId(1)).await.unwrap();
    let r = answer(&oracle);

    let mut forged = r.proof.clone();
    forged[0] ^= 0xFF;
    let result = service
        .process_matching(r.request_id, &r.cleartext, &forged)
        .await;
    assert!(matches!(result, Err(CoreError::ProofRejected { .. })));
    assert!(service.match_result(PaperId(1)).await.is_none());

    // The slot is spent: even the genuine answer is now refused
    let genuine = service
        .process_matching(r.request_id, &r.cleartext, &r.proof)
        .await;
    assert!(matches!(genuine, Err(CoreError::InvalidRequest(_))));

    assert!(service.events_since(0).iter().any(|e| matches!(
        e.event,
        MatchEvent::ProofRejected { request_id } if request_id == r.request_id
    )));
}

#[tokio::test]
async fn test_tampered_cleartext_rejected() {
    let (service, oracle) = setup();
    service.submit_paper(paper(1)).await.unwrap();
    service.add_reviewer(reviewer(1)).await.unwrap();
    matched(&service, &oracle, PaperId(1)).await;

    service.reveal_matched_reviewer(PaperId(1)).await.unwrap();
    let r = answer(&oracle);

    let result = service
        .finalize_reveal(r.request_id, b"[[1,2,3]]", &r.proof)
        .await;
    assert!(matches!(result, Err(CoreError::ProofRejected { .. })));
    assert!(!service.match_result(PaperId(1)).await.unwrap().revealed);
    assert!(revealed_events(&service).is_empty());
}

#[tokio::test]
async fn test_reveal_without_match() {
    let (service, _) = setup();
    service.submit_paper(paper(1)).await.unwrap();

    let result = service.reveal_matched_reviewer(PaperId(1)).await;
    assert!(matches!(result, Err(CoreError::NoMatchFound(PaperId(1)))));
}

#[tokio::test]
async fn test_rematch_overwrites_unrevealed_result() {
    let (service, oracle) = setup();
    service.submit_paper(paper(1)).await.unwrap();
    service.add_reviewer(reviewer(1)).await.unwrap();
    matched(&service, &oracle, PaperId(1)).await;

    service.acknowledge_match(PaperId(1), ReviewerId(1)).await.unwrap();
    assert!(service.match_result(PaperId(1)).await.unwrap().acknowledged);

    matched(&service, &oracle, PaperId(1)).await;
    let result = service.match_result(PaperId(1)).await.unwrap();
    assert!(!result.acknowledged);
    assert!(!result.revealed);
}

#[tokio::test]
async fn test_rematch_after_reveal_blocked() {
    let (service, oracle) = setup();
    service.submit_paper(paper(1)).await.unwrap();
    service.add_reviewer(reviewer(1)).await.unwrap();
    matched(&service, &oracle, PaperId(1)).await;

    service.reveal_matched_reviewer(PaperId(1)).await.unwrap();
    let r = answer(&oracle);
    service
        .finalize_reveal(r.request_id, &r.cleartext, &r.proof)
        .await
        .unwrap();

    let result = service.request_matching(PaperId(1)).await;
    assert!(matches!(result, Err(CoreError::AlreadyRevealed(PaperId(1)))));
}

#[tokio::test]
async fn test_in_flight_requests_block_each_other() {
    let (service, oracle) = setup();
    service.submit_paper(paper(1)).await.unwrap();
    service.add_reviewer(reviewer(1)).await.unwrap();
    matched(&service, &oracle, PaperId(1)).await;

    // A pending rematch blocks reveal
    service.request_matching(PaperId(1)).await.unwrap();
    let reveal = service.reveal_matched_reviewer(PaperId(1)).await;
    assert!(matches!(reveal, Err(CoreError::RequestInFlight(PaperId(1)))));
    let r = answer(&oracle);
    service
        .process_matching(r.request_id, &r.cleartext, &r.proof)
        .await
        .unwrap();

    // A pending reveal blocks rematch and a second reveal
    service.reveal_matched_reviewer(PaperId(1)).await.unwrap();
    assert_eq!(
        service.paper_state(PaperId(1)).await.unwrap(),
        Some(PaperState::RevealRequested)
    );
    assert!(matches!(
        service.request_matching(PaperId(1)).await,
        Err(CoreError::RequestInFlight(_))
    ));
    assert!(matches!(
        service.reveal_matched_reviewer(PaperId(1)).await,
        Err(CoreError::RequestInFlight(_))
    ));
}

#[tokio::test]
async fn test_consent_gate() {
    let (service, oracle) = setup_with(ServicePolicy {
        require_reviewer_consent: true,
        ..Default::default()
    });
    service.submit_paper(paper(1)).await.unwrap();
    service.add_reviewer(reviewer(1)).await.unwrap();
    service.add_reviewer(reviewer(2)).await.unwrap();
    matched(&service, &oracle, PaperId(1)).await;

    let blocked = service.reveal_matched_reviewer(PaperId(1)).await;
    assert!(matches!(blocked, Err(CoreError::ConsentRequired(PaperId(1)))));
    assert_eq!(oracle.outstanding(), 0);

    let wrong = service.acknowledge_match(PaperId(1), ReviewerId(2)).await;
    assert!(matches!(
        wrong,
        Err(CoreError::ReviewerMismatch { reviewer_id: ReviewerId(2), .. })
    ));

    service.acknowledge_match(PaperId(1), ReviewerId(1)).await.unwrap();
    assert_eq!(
        service.paper_state(PaperId(1)).await.unwrap(),
        Some(PaperState::Acknowledged)
    );

    service.reveal_matched_reviewer(PaperId(1)).await.unwrap();
    let r = answer(&oracle);
    service
        .finalize_reveal(r.request_id, &r.cleartext, &r.proof)
        .await
        .unwrap();
    assert_eq!(revealed_events(&service), vec![(PaperId(1), ReviewerId(1))]);
}

#[tokio::test]
async fn test_cancelled_request_rejects_late_callback() {
    let (service, oracle) = setup();
    service.submit_paper(paper(1)).await.unwrap();
    service.add_reviewer(reviewer(1)).await.unwrap();

    let request_id = service.request_matching(PaperId(1)).await.unwrap();
    let entry = service.cancel_request(request_id).await.unwrap();
    assert_eq!(entry.request, PendingRequest::Matching(PaperId(1)));

    let r = answer(&oracle);
    let late = service
        .process_matching(r.request_id, &r.cleartext, &r.proof)
        .await;
    assert!(matches!(late, Err(CoreError::InvalidRequest(_))));

    let twice = service.cancel_request(request_id).await;
    assert!(matches!(twice, Err(CoreError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_expiry_retires_stale_requests() {
    let (service, oracle) = setup_with(ServicePolicy {
        request_ttl_secs: Some(60),
        ..Default::default()
    });
    service.submit_paper(paper(1)).await.unwrap();
    service.add_reviewer(reviewer(1)).await.unwrap();

    let request_id = service.request_matching(PaperId(1)).await.unwrap();

    assert!(service.expire_pending(unix_now()).await.is_empty());
    let expired = service.expire_pending(unix_now() + 120).await;
    assert_eq!(expired, vec![request_id]);
    assert_eq!(service.pending_count().await, 0);

    let r = answer(&oracle);
    let late = service
        .process_matching(r.request_id, &r.cleartext, &r.proof)
        .await;
    assert!(matches!(late, Err(CoreError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_no_ttl_means_no_expiry() {
    let (service, _) = setup();
    service.submit_paper(paper(1)).await.unwrap();
    service.request_matching(PaperId(1)).await.unwrap();

    assert!(service.expire_pending(u64::MAX).await.is_empty());
    assert_eq!(service.pending_count().await, 1);
}

#[tokio::test]
async fn test_racing_callbacks_single_winner() {
    let (service, oracle) = setup();
    let service = Arc::new(service);
    service.submit_paper(paper(1)).await.unwrap();
    service.add_reviewer(reviewer(1)).await.unwrap();

    service.request_matching(PaperId(1)).await.unwrap();
    let r = answer(&oracle);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        let r = r.clone();
        tasks.push(tokio::spawn(async move {
            service
                .process_matching(r.request_id, &r.cleartext, &r.proof)
                .await
        }));
    }

    let mut ok = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => ok += 1,
            Err(CoreError::InvalidRequest(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(ok, 1);
}

#[tokio::test]
async fn test_paper_state_unknown_paper() {
    let (service, _) = setup();
    assert_eq!(service.paper_state(PaperId(1)).await.unwrap(), None);

    service.submit_paper(paper(1)).await.unwrap();
    assert_eq!(
        service.paper_state(PaperId(1)).await.unwrap(),
        Some(PaperState::Submitted)
    );
}

/// Every published event, as JSON, naming a reviewer
fn events_naming_reviewers(service: &MatchingService) -> Vec<String> {
    service
        .events_since(0)
        .into_iter()
        .map(|r| serde_json::to_value(&r).unwrap())
        .filter(|v| v.get("reviewer_id").is_some())
        .map(|v| v["type"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_reviewer_sealed_until_reveal() {
    let (service, oracle) = setup();
    service.submit_paper(paper(1)).await.unwrap();
    service.add_reviewer(reviewer(1)).await.unwrap();
    matched(&service, &oracle, PaperId(1)).await;
    service
        .acknowledge_match(PaperId(1), ReviewerId(1))
        .await
        .unwrap();

    assert_eq!(events_naming_reviewers(&service), vec!["reviewer_added"]);
    let view = service.match_result(PaperId(1)).await.unwrap().view();
    assert_eq!(view.reviewer_id, None);
    assert!(view.acknowledged);

    service.reveal_matched_reviewer(PaperId(1)).await.unwrap();
    let r = answer(&oracle);
    service
        .finalize_reveal(r.request_id, &r.cleartext, &r.proof)
        .await
        .unwrap();

    assert_eq!(
        events_naming_reviewers(&service),
        vec!["reviewer_added", "match_revealed"]
    );
    let view = service.match_result(PaperId(1)).await.unwrap().view();
    assert_eq!(view.reviewer_id, Some(ReviewerId(1)));
}

/// Accepts nothing and never answers
struct StalledOracle;

#[async_trait]
impl DecryptionOracle for StalledOracle {
    fn name(&self) -> &'static str {
        "stalled"
    }

    async fn request(&self, _: &[CiphertextHandle], _: Callback) -> CoreResult<RequestId> {
        std::future::pending().await
    }
}

fn setup_stalled(policy: ServicePolicy) -> MatchingService {
    let signer = MockOracle::new();
    MatchingService::new(
        Arc::new(InMemoryRecordStore::new()),
        Arc::new(StalledOracle),
        Arc::new(signer.signer_set()),
        Arc::new(LowestIdEvaluator),
    )
    .with_policy(policy)
}

#[tokio::test]
async fn test_stalled_oracle_does_not_block_reads() {
    let service = Arc::new(setup_stalled(ServicePolicy {
        oracle_timeout: None,
        ..Default::default()
    }));
    service.submit_paper(paper(1)).await.unwrap();

    let stuck = {
        let service = service.clone();
        tokio::spawn(async move { service.request_matching(PaperId(1)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let within = Duration::from_millis(500);
    let reads = async {
        assert!(service.match_result(PaperId(1)).await.is_none());
        assert_eq!(service.pending_count().await, 0);
        service.submit_paper(paper(2)).await.unwrap();
        service.add_reviewer(reviewer(1)).await.unwrap();
        service.paper_state(PaperId(2)).await.unwrap()
    };
    let state = tokio::time::timeout(within, reads)
        .await
        .expect("reads waited on the oracle");
    assert_eq!(state, Some(PaperState::Submitted));

    assert!(!stuck.is_finished());
    stuck.abort();
}

#[tokio::test]
async fn test_oracle_timeout_leaves_nothing_pending() {
    let service = setup_stalled(ServicePolicy {
        oracle_timeout: Some(Duration::from_millis(100)),
        ..Default::default()
    });
    service.submit_paper(paper(1)).await.unwrap();

    let result = service.request_matching(PaperId(1)).await;
    assert!(matches!(result, Err(CoreError::Oracle(_))));
    assert_eq!(service.pending_count().await, 0);
    assert_eq!(
        service.paper_state(PaperId(1)).await.unwrap(),
        Some(PaperState::Submitted)
    );

    // The lock was released, so the next attempt times out on its own
    let again = tokio::time::timeout(
        Duration::from_secs(2),
        service.request_matching(PaperId(1)),
    )
    .await
    .unwrap();
    assert!(matches!(again, Err(CoreError::Oracle(_))));
}

#[cfg(feature = "sqlite")]
mod durable {
    use super::*;
    use blindmatch_core::SqliteRecordStore;

    async fn open_service(path: &str, oracle: &Arc<MockOracle>) -> MatchingService {
        let store = Arc::new(SqliteRecordStore::open(path).unwrap());
        let service = MatchingService::new(
            store.clone(),
            oracle.clone(),
            Arc::new(oracle.signer_set()),
            Arc::new(LowestIdEvaluator),
        )
        .with_ledger_store(store)
        .await
        .unwrap();
        if let Some(last) = service.last_request_id() {
            oracle.skip_past(last);
        }
        service
    }

    #[tokio::test]
    async fn test_ledger_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blindmatch.db");
        let path = path.to_str().unwrap();
        let oracle = Arc::new(MockOracle::new());

        let (reveal_answer, parked) = {
            let service = open_service(path, &oracle).await;
            service.submit_paper(paper(1)).await.unwrap();
            service.submit_paper(paper(2)).await.unwrap();
            service.add_reviewer(reviewer(1)).await.unwrap();
            matched(&service, &oracle, PaperId(1)).await;

            service.reveal_matched_reviewer(PaperId(1)).await.unwrap();
            let r = answer(&oracle);
            service
                .finalize_reveal(r.request_id, &r.cleartext, &r.proof)
                .await
                .unwrap();

            // Left waiting on the oracle across the restart
            let parked = service.request_matching(PaperId(2)).await.unwrap();
            (r, parked)
        };

        let service = open_service(path, &oracle).await;
        assert_eq!(
            service.paper_state(PaperId(1)).await.unwrap(),
            Some(PaperState::Revealed)
        );
        let restored = service.match_result(PaperId(1)).await.unwrap();
        assert!(restored.revealed);
        assert_eq!(restored.reviewer_id, ReviewerId(1));

        assert!(matches!(
            service.request_matching(PaperId(1)).await,
            Err(CoreError::AlreadyRevealed(PaperId(1)))
        ));
        let replay = service
            .finalize_reveal(
                reveal_answer.request_id,
                &reveal_answer.cleartext,
                &reveal_answer.proof,
            )
            .await;
        assert!(matches!(replay, Err(CoreError::InvalidRequest(_))));

        // The parked request is still answerable
        assert_eq!(
            service.pending_request(parked).await.unwrap().request,
            PendingRequest::Matching(PaperId(2))
        );
        let r = answer(&oracle);
        assert_eq!(r.request_id, parked);
        service
            .process_matching(r.request_id, &r.cleartext, &r.proof)
            .await
            .unwrap();

        // Fresh ids never collide with ones issued before the restart
        service.reveal_matched_reviewer(PaperId(2)).await.unwrap();
        assert!(oracle.drain()[0].request_id > parked);
    }
}
