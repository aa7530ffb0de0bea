mod common;

use common::*;
use signflow_storage::QueryWindow;
use signflow_types::{
    ActivityAction, DocumentContent, DocumentPatch, DocumentStatus, ExportStatus, NewDocument,
    PermissionKind, SignatureStatus, Team,
};
use signflow_workflow::{
    ErrorKind, FailingNotifier, NotificationTemplate, Recipient, SignRequest, WorkflowError,
};
use std::sync::Arc;

#[tokio::test]
async fn three_tiers_sign_off_in_order() {
    let mut h = Harness::new();
    let doc = h.standard_document().await;
    assert_eq!(doc.status, DocumentStatus::Draft);
    assert_eq!(doc.revision, 1);

    let doc = h.engine.publish(&doc.id, &user(OWNER)).await.unwrap();
    assert_eq!(doc.status, DocumentStatus::AuthorReview);
    assert!(doc
        .contributors
        .iter()
        .all(|c| c.status == SignatureStatus::Pending));

    let outcome = h
        .engine
        .sign(SignRequest::approve(doc.id, OWNER, Team::Authors))
        .await
        .unwrap();
    assert!(outcome.tier_complete);
    assert_eq!(outcome.document.status, DocumentStatus::VerifierReview);
    assert_eq!(outcome.contributor.status, SignatureStatus::Signed);
    assert!(outcome.contributor.signature_date.is_some());

    let outcome = h
        .engine
        .sign(SignRequest::approve(doc.id, VERIFIER, Team::Verifiers))
        .await
        .unwrap();
    assert_eq!(outcome.document.status, DocumentStatus::ValidatorReview);

    let outcome = h
        .engine
        .sign(SignRequest::approve(doc.id, VALIDATOR, Team::Validators).with_comments("ok"))
        .await
        .unwrap();
    assert_eq!(outcome.document.status, DocumentStatus::Approved);
    assert!(outcome.document.approved_at.is_some());
    assert_eq!(outcome.transitions, vec![DocumentStatus::Approved]);

    let delivered = h.delivered().await;
    let review_requests: Vec<_> = delivered
        .iter()
        .filter(|n| n.template == NotificationTemplate::ReviewRequested)
        .map(|n| n.recipient.clone())
        .collect();
    assert_eq!(review_requests.len(), 3);
    for reviewer in [OWNER, VERIFIER, VALIDATOR] {
        assert!(review_requests.contains(&Recipient::User(user(reviewer))));
    }
    assert!(delivered
        .iter()
        .any(|n| n.template == NotificationTemplate::DocumentApproved));
    assert!(h.engine.verify_activity_chain().await.unwrap());
}

#[tokio::test]
async fn author_rejection_sends_everyone_back_to_joined() {
    let h = Harness::new();
    let doc = h.standard_document().await;
    h.engine.publish(&doc.id, &user(OWNER)).await.unwrap();

    let outcome = h
        .engine
        .sign(SignRequest::reject(doc.id, OWNER, Team::Authors, "missing section"))
        .await
        .unwrap();

    assert_eq!(outcome.contributor.status, SignatureStatus::Rejected);
    assert_eq!(outcome.contributor.comments.as_deref(), Some("missing section"));
    assert!(!outcome.tier_complete);
    assert_eq!(outcome.document.status, DocumentStatus::Draft);
    assert!(outcome
        .document
        .contributors
        .iter()
        .all(|c| c.status == SignatureStatus::Joined && c.signature_date.is_none()));

    let rejection = outcome.document.last_rejection.unwrap();
    assert_eq!(rejection.user_id, user(OWNER));
    assert_eq!(rejection.comments.as_deref(), Some("missing section"));
}

#[tokio::test]
async fn verifier_rejection_discards_author_signatures() {
    let h = Harness::new();
    let doc = h.standard_document().await;
    h.engine.publish(&doc.id, &user(OWNER)).await.unwrap();
    h.engine
        .sign(SignRequest::approve(doc.id, OWNER, Team::Authors))
        .await
        .unwrap();

    let outcome = h
        .engine
        .sign(SignRequest::reject(doc.id, VERIFIER, Team::Verifiers, "wrong torque values"))
        .await
        .unwrap();
    assert_eq!(outcome.document.status, DocumentStatus::Draft);
    let author = outcome
        .document
        .contributors
        .find(Team::Authors, &user(OWNER))
        .unwrap();
    assert_eq!(author.status, SignatureStatus::Joined);

    // A new round starts from the authors again.
    let doc = h.engine.publish(&doc.id, &user(OWNER)).await.unwrap();
    assert_eq!(doc.status, DocumentStatus::AuthorReview);
    let err = h
        .engine
        .sign(SignRequest::approve(doc.id, VERIFIER, Team::Verifiers))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "WRONG_TIER");
}

#[tokio::test]
async fn empty_tiers_are_walked_through_one_step_at_a_time() {
    let h = Harness::new();
    let doc = h
        .engine
        .create_document(&user(OWNER), NewDocument::new("TG-2", "Solo procedure"))
        .await
        .unwrap();
    h.engine.publish(&doc.id, &user(OWNER)).await.unwrap();

    let outcome = h
        .engine
        .sign(SignRequest::approve(doc.id, OWNER, Team::Authors))
        .await
        .unwrap();
    assert_eq!(
        outcome.transitions,
        vec![
            DocumentStatus::VerifierReview,
            DocumentStatus::ValidatorReview,
            DocumentStatus::Approved,
        ]
    );

    let changes: Vec<_> = h
        .engine
        .list_activity(Some(&doc.id), QueryWindow::all())
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.action == ActivityAction::StatusChanged)
        .map(|e| (e.details["from"].clone(), e.details["to"].clone()))
        .collect();
    assert_eq!(changes.len(), 4);
    for (from, to) in changes {
        let from: DocumentStatus = serde_json::from_value(from).unwrap();
        let to: DocumentStatus = serde_json::from_value(to).unwrap();
        assert!(from.can_transition_to(to), "{from} -> {to}");
    }
}

#[tokio::test]
async fn signature_preconditions_are_enforced() {
    let h = Harness::new();
    let doc = h
        .engine
        .create_document(
            &user(OWNER),
            NewDocument::new("TG-3", "Two authors")
                .with_contributor(AUTHOR, Team::Authors)
                .with_contributor(VERIFIER, Team::Verifiers),
        )
        .await
        .unwrap();

    let err = h
        .engine
        .sign(SignRequest::approve(doc.id, OWNER, Team::Authors))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState { action: "sign", .. }));

    h.engine.publish(&doc.id, &user(OWNER)).await.unwrap();

    let err = h
        .engine
        .sign(SignRequest::approve(doc.id, OUTSIDER, Team::Authors))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_A_CONTRIBUTOR");
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let err = h
        .engine
        .sign(SignRequest::approve(doc.id, VERIFIER, Team::Verifiers))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::WrongTier { team: Team::Verifiers, .. }));

    let outcome = h
        .engine
        .sign(SignRequest::approve(doc.id, OWNER, Team::Authors))
        .await
        .unwrap();
    assert!(!outcome.tier_complete);
    assert_eq!(outcome.document.status, DocumentStatus::AuthorReview);

    let err = h
        .engine
        .sign(SignRequest::approve(doc.id, OWNER, Team::Authors))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::AlreadySigned {
            status: SignatureStatus::Signed,
            ..
        }
    ));
}

#[tokio::test]
async fn publish_only_from_draft_and_only_with_write() {
    let h = Harness::new();
    let doc = h.standard_document().await;

    let err = h.engine.publish(&doc.id, &user(OUTSIDER)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let published = h.engine.publish(&doc.id, &user(OWNER)).await.unwrap();
    let err = h.engine.publish(&doc.id, &user(OWNER)).await.unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::InvalidState {
            status: DocumentStatus::AuthorReview,
            action: "publish",
            ..
        }
    ));

    let stored = h.engine.get_document(&doc.id).await.unwrap();
    assert_eq!(stored.revision, published.revision);
    let seats = |d: &signflow_types::Document| {
        d.contributors
            .iter()
            .map(|c| (c.user_id.clone(), c.team, c.status))
            .collect::<Vec<_>>()
    };
    assert_eq!(seats(&stored), seats(&published));
    assert!(stored
        .contributors
        .iter()
        .all(|c| c.status == SignatureStatus::Pending));
}

#[tokio::test]
async fn documents_are_found_and_listed_only_with_read_access() {
    let h = Harness::new();
    let first = h.standard_document().await;
    h.clock.advance(chrono::Duration::minutes(5));
    let second = h
        .engine
        .create_document(&user(AUTHOR), NewDocument::new("TG-2", "Pump inspection"))
        .await
        .unwrap();

    let found = h
        .engine
        .find_document_by_reference(" TG-1 ", &user(VERIFIER))
        .await
        .unwrap();
    assert_eq!(found.id, first.id);
    let err = h
        .engine
        .find_document_by_reference("TG-1", &user(OUTSIDER))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    let err = h
        .engine
        .find_document_by_reference("TG-404", &user(OWNER))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let ids = |docs: Vec<signflow_types::Document>| docs.into_iter().map(|d| d.id).collect::<Vec<_>>();
    let listed = |who: &'static str| {
        let engine = h.engine.clone();
        async move { engine.list_documents(&user(who), QueryWindow::all()).await.unwrap() }
    };
    assert_eq!(ids(listed(ADMIN).await), vec![second.id, first.id]);
    assert_eq!(ids(listed(OWNER).await), vec![first.id]);
    assert_eq!(ids(listed(AUTHOR).await), vec![second.id]);
    assert!(listed(OUTSIDER).await.is_empty());

    h.engine
        .grant_permission(&second.id, &user(OUTSIDER), PermissionKind::Read, &user(AUTHOR), None)
        .await
        .unwrap();
    assert_eq!(ids(listed(OUTSIDER).await), vec![second.id]);

    let page = h
        .engine
        .list_documents(&user(ADMIN), QueryWindow::first(1))
        .await
        .unwrap();
    assert_eq!(ids(page), vec![second.id]);
}

#[tokio::test]
async fn creation_validates_and_references_are_unique() {
    let h = Harness::new();
    h.standard_document().await;

    let err = h
        .engine
        .create_document(&user(AUTHOR), NewDocument::new("TG-1", "Same reference"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "DUPLICATE_REFERENCE");

    let err = h
        .engine
        .create_document(&user(OWNER), NewDocument::new("  ", "Blank"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h
        .engine
        .create_document(
            &user(OWNER),
            NewDocument::new("TG-9", "Unknown seed").with_contributor("ghost", Team::Verifiers),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn stale_edits_are_rejected() {
    let h = Harness::new();
    let doc = h.standard_document().await;

    let edited = h
        .engine
        .update_document(
            &doc.id,
            &user(OWNER),
            doc.revision,
            DocumentPatch {
                title: Some("Tank cleaning, revised".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.revision, doc.revision + 1);

    let err = h
        .engine
        .update_document(
            &doc.id,
            &user(OWNER),
            doc.revision,
            DocumentPatch {
                title: Some("Lost update".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::StaleRevision { expected: 1, found: 2, .. }
    ));
    assert_eq!(
        h.engine.get_document(&doc.id).await.unwrap().title,
        "Tank cleaning, revised"
    );
}

#[tokio::test]
async fn snapshots_follow_version_labels_and_never_change() {
    let h = Harness::new();
    let doc = h.standard_document().await;
    let initial = h.engine.list_versions(&doc.id).await.unwrap();
    assert_eq!(initial.len(), 1);
    assert_eq!(initial[0].change_note(), "Initial version");

    // Autosave-style content edit: no snapshot.
    let mut content = DocumentContent::default();
    content.metadata.objectives = vec!["Clean tank 4 safely".into()];
    let doc = h
        .engine
        .update_document(
            &doc.id,
            &user(OWNER),
            doc.revision,
            DocumentPatch {
                content: Some(content),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(h.engine.list_versions(&doc.id).await.unwrap().len(), 1);

    let doc = h
        .engine
        .update_document(
            &doc.id,
            &user(OWNER),
            doc.revision,
            DocumentPatch {
                version: Some("2.0".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let versions = h.engine.list_versions(&doc.id).await.unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].version(), "2.0");
    assert_eq!(versions[0].change_note(), "Updated to version 2.0");
    assert_eq!(
        versions[0].document().unwrap().content.metadata.objectives,
        vec!["Clean tank 4 safely".to_string()]
    );

    h.engine
        .update_document(
            &doc.id,
            &user(OWNER),
            doc.revision,
            DocumentPatch {
                title: Some("Renamed".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let reread = h.engine.get_version(&initial[0].id()).await.unwrap();
    assert_eq!(reread.content(), initial[0].content());
    assert!(reread.verify());
    assert_eq!(reread.document().unwrap().title, "Tank cleaning procedure");
}

#[tokio::test]
async fn approved_documents_are_locked_then_archived_and_exported() {
    let h = Harness::new();
    let doc = h
        .engine
        .create_document(&user(OWNER), NewDocument::new("TG-4", "Quick"))
        .await
        .unwrap();
    h.engine.publish(&doc.id, &user(OWNER)).await.unwrap();
    let approved = h
        .engine
        .sign(SignRequest::approve(doc.id, OWNER, Team::Authors))
        .await
        .unwrap()
        .document;

    let err = h
        .engine
        .update_document(
            &doc.id,
            &user(OWNER),
            approved.revision,
            DocumentPatch {
                title: Some("too late".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState { action: "edit", .. }));

    let err = h.engine.archive(&doc.id, &user(OUTSIDER)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let archived = h.engine.archive(&doc.id, &user(ADMIN)).await.unwrap();
    assert_eq!(archived.status, DocumentStatus::Archived);
    let err = h.engine.archive(&doc.id, &user(OWNER)).await.unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState { action: "archive", .. }));

    h.engine.drain_background().await;
    let events = h
        .engine
        .list_activity(Some(&doc.id), QueryWindow::all())
        .await
        .unwrap();
    assert!(events
        .iter()
        .any(|e| e.action == ActivityAction::ExportCompleted && e.success));

    let job = h.engine.request_export(&doc.id, &user(OWNER)).await.unwrap();
    assert_eq!(job.status, ExportStatus::Generating);
    h.engine.drain_background().await;
    let job = h.engine.export_status(&job.id).await.unwrap();
    assert_eq!(job.status, ExportStatus::Completed);
    assert_eq!(
        job.url.as_deref(),
        Some(format!("memory://exports/TG-4-r{}.pdf", archived.revision).as_str())
    );
}

#[tokio::test]
async fn drafts_cannot_be_exported() {
    let h = Harness::new();
    let doc = h.standard_document().await;
    let err = h.engine.request_export(&doc.id, &user(OWNER)).await.unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState { action: "export", .. }));
}

#[tokio::test]
async fn renderer_failure_is_recorded_not_raised() {
    let h = Harness::with_renderer(renderer_failing());
    let doc = h
        .engine
        .create_document(&user(OWNER), NewDocument::new("TG-5", "Doomed export"))
        .await
        .unwrap();
    h.engine.publish(&doc.id, &user(OWNER)).await.unwrap();
    h.engine
        .sign(SignRequest::approve(doc.id, OWNER, Team::Authors))
        .await
        .unwrap();

    let job = h.engine.request_export(&doc.id, &user(OWNER)).await.unwrap();
    h.engine.drain_background().await;

    let job = h.engine.export_status(&job.id).await.unwrap();
    assert_eq!(job.status, ExportStatus::Failed);
    assert!(job.error.unwrap().contains("renderer offline"));
    let failed = h
        .engine
        .list_activity(Some(&doc.id), QueryWindow::all())
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.action == ActivityAction::ExportFailed)
        .unwrap();
    assert!(!failed.success);
}

#[tokio::test]
async fn notifier_failure_is_recorded_not_raised() {
    let h = Harness::with_notifier(Arc::new(FailingNotifier::new("smtp down")));
    let doc = h.standard_document().await;
    let published = h.engine.publish(&doc.id, &user(OWNER)).await.unwrap();
    assert_eq!(published.status, DocumentStatus::AuthorReview);

    h.engine.drain_background().await;
    let failures: Vec<_> = h
        .engine
        .list_activity(Some(&doc.id), QueryWindow::all())
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.action == ActivityAction::NotificationFailed)
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(!failures[0].success);
    assert!(h.engine.verify_activity_chain().await.unwrap());
}

#[tokio::test]
async fn duplicate_starts_a_fresh_draft_owned_by_the_copier() {
    let h = Harness::new();
    let doc = h.standard_document().await;
    h.engine.publish(&doc.id, &user(OWNER)).await.unwrap();
    h.engine
        .sign(SignRequest::approve(doc.id, OWNER, Team::Authors))
        .await
        .unwrap();

    let err = h
        .engine
        .duplicate_document(&doc.id, &user(OUTSIDER))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let copy = h
        .engine
        .duplicate_document(&doc.id, &user(VERIFIER))
        .await
        .unwrap();
    assert_ne!(copy.id, doc.id);
    assert_eq!(copy.reference, "TG-1-COPY");
    assert_eq!(copy.title, "Tank cleaning procedure (Copy)");
    assert_eq!(copy.version, "1.0");
    assert_eq!(copy.status, DocumentStatus::Draft);
    assert_eq!(copy.created_by, user(VERIFIER));
    assert!(copy
        .contributors
        .iter()
        .all(|c| c.status == SignatureStatus::Joined));
    assert!(copy.contributors.find(Team::Authors, &user(VERIFIER)).is_some());
    assert!(copy.contributors.find(Team::Authors, &user(OWNER)).is_some());
    assert_eq!(h.engine.list_versions(&copy.id).await.unwrap().len(), 1);

    let err = h
        .engine
        .duplicate_document(&doc.id, &user(VERIFIER))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "DUPLICATE_REFERENCE");
}
