//! End-to-end signing workflows against the in-memory store

mod common;

use common::*;
use signing_engine::{AuthProof, EngineConfig};
use signing_types::{
    AuditAction, AuditActor, RequestId, RequestStatus, SignerContext, SignerStatus, SigningError,
    SigningOrder,
};

fn actions(events: &[signing_types::AuditEvent]) -> Vec<AuditAction> {
    events.iter().map(|e| e.action).collect()
}

#[tokio::test]
async fn sequential_request_hands_off_in_order() {
    let h = harness();
    let request = h
        .manager
        .create(request(SigningOrder::Sequential, &["a@acme.io", "b@acme.io"]))
        .await
        .unwrap();

    assert_eq!(request.status, RequestStatus::InProgress);
    assert_eq!(request.signers[0].status, SignerStatus::Sent);
    assert_eq!(request.signers[1].status, SignerStatus::Pending);

    // B is out of turn.
    let err = h
        .manager
        .sign_document(&request.id, "b@acme.io", "B", &proof(), SignerContext::default())
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    h.manager
        .sign_document(&request.id, "a@acme.io", "A", &proof(), SignerContext::default())
        .await
        .unwrap();
    let mid = h.manager.get_status(&request.id).await.unwrap();
    assert_eq!(mid.signers[0].status, SignerStatus::Signed);
    assert_eq!(mid.signers[1].status, SignerStatus::Sent);
    assert_eq!(mid.status, RequestStatus::InProgress);

    h.manager
        .sign_document(&request.id, "b@acme.io", "B", &proof(), SignerContext::default())
        .await
        .unwrap();
    let done = h.manager.get_status(&request.id).await.unwrap();
    assert_eq!(done.status, RequestStatus::Completed);
    assert_eq!(done.signatures.len(), 2);
    assert!(done.completed_at.is_some());
    assert!(done.certificate_ref.as_deref().unwrap().starts_with("cert:"));

    let trail = h.manager.get_audit_trail(&request.id).await.unwrap();
    assert_eq!(
        actions(&trail),
        vec![
            AuditAction::Created,
            AuditAction::Sent,
            AuditAction::Signed,
            AuditAction::Sent,
            AuditAction::Signed,
            AuditAction::Completed,
        ]
    );
    let sequences: Vec<u64> = trail.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, (1..=6).collect::<Vec<_>>());
    assert!(h.manager.verify_audit_trail(&request.id).await.unwrap().valid);

    assert_eq!(
        h.notifier.kinds_for("b@acme.io"),
        vec!["signing_requested", "request_closed"]
    );
}

#[tokio::test]
async fn parallel_decline_closes_request_for_everyone() {
    let h = harness();
    let request = h
        .manager
        .create(request(SigningOrder::Parallel, &["a@acme.io", "b@acme.io"]))
        .await
        .unwrap();
    assert!(request
        .signers
        .iter()
        .all(|s| s.status == SignerStatus::Sent));

    let declined = h
        .manager
        .decline_signature(
            &request.id,
            "b@acme.io",
            Some("pricing is wrong".into()),
            SignerContext::new("203.0.113.9", "Mozilla/5.0"),
        )
        .await
        .unwrap();
    assert_eq!(declined.status, RequestStatus::Declined);
    assert_eq!(declined.signers[0].status, SignerStatus::Voided);
    assert_eq!(
        declined.signers[1].decline_reason.as_deref(),
        Some("pricing is wrong")
    );
    assert_eq!(declined.signers[1].ip_address.as_deref(), Some("203.0.113.9"));

    let err = h
        .manager
        .sign_document(&request.id, "a@acme.io", "A", &proof(), SignerContext::default())
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(h.manager.get_signatures(&request.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn view_is_recorded_once() {
    let h = harness();
    let request = h
        .manager
        .create(request(SigningOrder::Parallel, &["a@acme.io"]))
        .await
        .unwrap();

    let ctx = SignerContext::new("198.51.100.4", "curl/8");
    let viewed = h
        .manager
        .view_document(&request.id, "A@ACME.io", ctx.clone())
        .await
        .unwrap();
    assert_eq!(viewed.signers[0].status, SignerStatus::Viewed);
    assert_eq!(viewed.version, 2);

    let again = h
        .manager
        .view_document(&request.id, "a@acme.io", ctx)
        .await
        .unwrap();
    assert_eq!(again.version, 2);

    let trail = h.manager.get_audit_trail(&request.id).await.unwrap();
    let views: Vec<_> = trail
        .iter()
        .filter(|e| e.action == AuditAction::Viewed)
        .collect();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].actor, AuditActor::Signer("a@acme.io".into()));
    assert_eq!(views[0].metadata["ip_address"], "198.51.100.4");
}

#[tokio::test]
async fn rejected_proof_leaves_signer_waiting() {
    let h = harness();
    let request = h
        .manager
        .create(request(SigningOrder::Parallel, &["a@acme.io"]))
        .await
        .unwrap();

    let err = h
        .manager
        .sign_document(
            &request.id,
            "a@acme.io",
            "A",
            &AuthProof::new("000000"),
            SignerContext::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SigningError::Authentication(_)));

    let after = h.manager.get_status(&request.id).await.unwrap();
    assert_eq!(after.signers[0].status, SignerStatus::Sent);
    assert_eq!(after.version, request.version);

    // The same signer can simply try again.
    h.manager
        .sign_document(&request.id, "a@acme.io", "A", &proof(), SignerContext::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn signature_hashes_resolved_document() {
    let h = harness();
    let request = h
        .manager
        .create(request(SigningOrder::Parallel, &["a@acme.io"]))
        .await
        .unwrap();

    let signature = h
        .manager
        .sign_document(&request.id, "a@acme.io", "typed:Ann", &proof(), SignerContext::default())
        .await
        .unwrap();
    assert_eq!(
        signature.document_hash,
        signing_engine::document_digest(b"Statement of work v3")
    );
    assert_eq!(signature.signature_data, "typed:Ann");
}

#[tokio::test]
async fn missing_document_blocks_signing() {
    let h = harness();
    let mut input = request(SigningOrder::Parallel, &["a@acme.io"]);
    input.document_ref = signing_types::DocumentRef::new("not-uploaded");
    let request = h.manager.create(input).await.unwrap();

    let err = h
        .manager
        .sign_document(&request.id, "a@acme.io", "A", &proof(), SignerContext::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SigningError::DocumentUnavailable(_)));
    let after = h.manager.get_status(&request.id).await.unwrap();
    assert_eq!(after.signers[0].status, SignerStatus::Sent);
}

#[tokio::test]
async fn cancel_keeps_existing_signatures() {
    let h = harness();
    let untouched = h
        .manager
        .create(request(SigningOrder::Parallel, &["a@acme.io", "b@acme.io"]))
        .await
        .unwrap();
    let cancelled = h.manager.cancel(&untouched.id, "owner-7").await.unwrap();
    assert_eq!(cancelled.status, RequestStatus::Cancelled);
    assert_eq!(cancelled.cancelled_by.as_deref(), Some("owner-7"));
    assert!(cancelled.signatures.is_empty());
    assert!(cancelled
        .signers
        .iter()
        .all(|s| s.status == SignerStatus::Voided));

    let partial = h
        .manager
        .create(request(SigningOrder::Parallel, &["a@acme.io", "b@acme.io"]))
        .await
        .unwrap();
    h.manager
        .sign_document(&partial.id, "a@acme.io", "A", &proof(), SignerContext::default())
        .await
        .unwrap();
    let cancelled = h.manager.cancel(&partial.id, "owner-7").await.unwrap();
    assert_eq!(cancelled.signatures.len(), 1);
    assert_eq!(cancelled.signers[0].status, SignerStatus::Signed);
    assert_eq!(cancelled.signers[1].status, SignerStatus::Voided);

    let err = h
        .manager
        .sign_document(&partial.id, "b@acme.io", "B", &proof(), SignerContext::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SigningError::RequestTerminal { .. }));

    let err = h.manager.cancel(&partial.id, "owner-7").await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn reminders_follow_the_turn() {
    let h = harness();
    let request = h
        .manager
        .create(request(SigningOrder::Sequential, &["a@acme.io", "b@acme.io"]))
        .await
        .unwrap();

    let reminded = h
        .manager
        .send_reminder(&request.id, "a@acme.io")
        .await
        .unwrap();
    assert_eq!(reminded.signers[0].reminder_count, 1);
    assert!(reminded.signers[0].last_reminded_at.is_some());
    assert!(h.notifier.kinds_for("a@acme.io").contains(&"reminder"));

    let err = h
        .manager
        .send_reminder(&request.id, "b@acme.io")
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    h.manager
        .sign_document(&request.id, "a@acme.io", "A", &proof(), SignerContext::default())
        .await
        .unwrap();
    let err = h
        .manager
        .send_reminder(&request.id, "a@acme.io")
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn notification_failures_do_not_roll_back() {
    let h = harness_with(EngineConfig::default(), RecordingNotifier::failing());
    let request = h
        .manager
        .create(request(SigningOrder::Parallel, &["a@acme.io"]))
        .await
        .unwrap();
    h.manager
        .send_reminder(&request.id, "a@acme.io")
        .await
        .unwrap();
    h.manager
        .sign_document(&request.id, "a@acme.io", "A", &proof(), SignerContext::default())
        .await
        .unwrap();

    let done = h.manager.get_status(&request.id).await.unwrap();
    assert_eq!(done.status, RequestStatus::Completed);
    assert!(!h.notifier.sent().is_empty());
}

#[tokio::test]
async fn create_rejects_invalid_input_without_persisting() {
    let h = harness();
    let err = h
        .manager
        .create(request(SigningOrder::Parallel, &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, SigningError::Validation(_)));
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn unknown_request_is_not_found() {
    let h = harness();
    let id = RequestId::generate();
    assert!(h.manager.get_status(&id).await.unwrap_err().is_not_found());
    assert!(h.manager.get_audit_trail(&id).await.unwrap_err().is_not_found());
    assert!(h.manager.cancel(&id, "owner").await.unwrap_err().is_not_found());

    let request = h
        .manager
        .create(request(SigningOrder::Parallel, &["a@acme.io"]))
        .await
        .unwrap();
    let err = h
        .manager
        .view_document(&request.id, "stranger@acme.io", SignerContext::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn requests_are_listed_per_document() {
    let h = harness();
    let first = h
        .manager
        .create(request(SigningOrder::Parallel, &["a@acme.io"]))
        .await
        .unwrap();
    h.clock.advance(chrono::Duration::minutes(5));
    let second = h
        .manager
        .create(request(SigningOrder::Sequential, &["a@acme.io"]).with_message("Round two"))
        .await
        .unwrap();

    let listed = h
        .manager
        .get_requests_for_document(&signing_types::DocumentRef::new(DOCUMENT))
        .await
        .unwrap();
    let ids: Vec<_> = listed.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
    assert_eq!(listed[1].message.as_deref(), Some("Round two"));
}

#[tokio::test]
async fn audit_trail_has_one_event_per_change() {
    let h = harness();
    let mut events = h.manager.subscribe();
    let request = h
        .manager
        .create(
            request(SigningOrder::Parallel, &["a@acme.io", "b@acme.io", "c@acme.io"])
                .created_by("owner-1"),
        )
        .await
        .unwrap();
    // CREATED + three SENT
    let mut expected = 4;

    h.manager
        .view_document(&request.id, "a@acme.io", SignerContext::default())
        .await
        .unwrap();
    expected += 1;
    h.manager
        .view_document(&request.id, "a@acme.io", SignerContext::default())
        .await
        .unwrap();
    h.manager
        .send_reminder(&request.id, "b@acme.io")
        .await
        .unwrap();
    expected += 1;
    h.manager
        .sign_document(&request.id, "a@acme.io", "A", &proof(), SignerContext::default())
        .await
        .unwrap();
    expected += 1;
    let _ = h
        .manager
        .sign_document(&request.id, "zed@acme.io", "Z", &proof(), SignerContext::default())
        .await;
    h.manager.cancel(&request.id, "owner-1").await.unwrap();
    expected += 1;

    let trail = h.manager.get_audit_trail(&request.id).await.unwrap();
    assert_eq!(trail.len(), expected);
    assert_eq!(trail[0].actor, AuditActor::User("owner-1".into()));
    assert_eq!(trail.last().unwrap().action, AuditAction::Cancelled);
    assert!(h.manager.verify_audit_trail(&request.id).await.unwrap().valid);

    let mut streamed = 0;
    while events.try_recv().is_ok() {
        streamed += 1;
    }
    assert_eq!(streamed, expected);
}
