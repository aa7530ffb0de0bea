mod common;

use chrono::Duration;
use common::*;
use signflow_types::{
    DocumentStatus, InvitationStatus, InvitationToken, NewDocument, PermissionKind,
    PermissionStatus, SignatureStatus, Team,
};
use signflow_workflow::{
    ErrorKind, InviteRequest, NotificationTemplate, Recipient, SignRequest, WorkflowError,
};

fn invite_guest(doc: &signflow_types::Document) -> InviteRequest {
    InviteRequest::new(doc.id, OWNER, GUEST_EMAIL, Team::Verifiers, PermissionKind::Sign)
        .with_ttl(Duration::days(7))
}

#[tokio::test]
async fn invitation_is_accepted_exactly_once() {
    let mut h = Harness::new();
    let doc = h.standard_document().await;

    let invitation = h.engine.invite(invite_guest(&doc)).await.unwrap();
    assert_eq!(invitation.status, InvitationStatus::Pending);
    assert_eq!(invitation.expires_at - invitation.sent_at, Duration::days(7));

    h.clock.advance(Duration::days(6));
    let acceptance = h
        .engine
        .accept_invitation(&invitation.token, &user(GUEST))
        .await
        .unwrap();
    assert_eq!(acceptance.invitation.status, InvitationStatus::Accepted);
    assert_eq!(acceptance.invitation.accepted_by, Some(user(GUEST)));
    assert_eq!(acceptance.contributor.team, Team::Verifiers);
    assert_eq!(acceptance.contributor.status, SignatureStatus::Joined);
    assert_eq!(acceptance.contributor.identity.name, "Xavier Roe");
    assert_eq!(acceptance.permission.kind, PermissionKind::Sign);
    assert_eq!(acceptance.permission.status, PermissionStatus::Active);
    assert_eq!(acceptance.document.revision, doc.revision + 1);

    let stored = h.engine.get_document(&doc.id).await.unwrap();
    assert!(stored.contributors.find(Team::Verifiers, &user(GUEST)).is_some());
    let access = h.engine.effective_access(&doc.id, &user(GUEST)).await.unwrap();
    assert!(access.contains(PermissionKind::Sign));

    let err = h
        .engine
        .accept_invitation(&invitation.token, &user(GUEST))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::AlreadyUsed {
            status: InvitationStatus::Accepted,
            ..
        }
    ));

    let delivered = h.delivered().await;
    let sent = delivered
        .iter()
        .find(|n| n.template == NotificationTemplate::InvitationSent)
        .unwrap();
    assert_eq!(sent.recipient, Recipient::Email(GUEST_EMAIL.to_string()));
    assert_eq!(sent.payload["token"], invitation.token.as_str());
    assert!(delivered.iter().any(|n| {
        n.template == NotificationTemplate::InvitationAccepted
            && n.recipient == Recipient::User(user(OWNER))
    }));
}

#[tokio::test]
async fn expired_and_unknown_tokens_are_refused() {
    let h = Harness::new();
    let doc = h.standard_document().await;
    let invitation = h.engine.invite(invite_guest(&doc)).await.unwrap();

    let err = h
        .engine
        .accept_invitation(&InvitationToken::new("not-a-token"), &user(GUEST))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "TOKEN_NOT_FOUND");

    h.clock.advance(Duration::days(7) + Duration::seconds(1));
    let err = h
        .engine
        .accept_invitation(&invitation.token, &user(GUEST))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::TokenExpired { .. }));

    // Expiry is lazy: the record itself is untouched.
    let stored = h.engine.list_invitations(&doc.id).await.unwrap();
    assert_eq!(stored[0].status, InvitationStatus::Pending);
    assert!(h
        .engine
        .get_document(&doc.id)
        .await
        .unwrap()
        .contributors
        .find(Team::Verifiers, &user(GUEST))
        .is_none());
    assert!(h.engine.list_permissions(&doc.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn invitee_email_must_match_the_accepting_user() {
    let h = Harness::new();
    let doc = h.standard_document().await;
    let invitation = h.engine.invite(invite_guest(&doc)).await.unwrap();

    let err = h
        .engine
        .accept_invitation(&invitation.token, &user(OUTSIDER))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    // Still usable by the right person.
    h.engine
        .accept_invitation(&invitation.token, &user(GUEST))
        .await
        .unwrap();
}

#[tokio::test]
async fn declined_and_revoked_invitations_are_spent() {
    let h = Harness::new();
    let doc = h.standard_document().await;

    let declined = h.engine.invite(invite_guest(&doc)).await.unwrap();
    let result = h
        .engine
        .decline_invitation(&declined.token, Some("on leave".into()))
        .await
        .unwrap();
    assert_eq!(result.status, InvitationStatus::Declined);
    assert_eq!(result.decline_reason.as_deref(), Some("on leave"));
    let err = h
        .engine
        .accept_invitation(&declined.token, &user(GUEST))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::AlreadyUsed {
            status: InvitationStatus::Declined,
            ..
        }
    ));

    let revoked = h.engine.invite(invite_guest(&doc)).await.unwrap();
    let err = h
        .engine
        .revoke_invitation(&revoked.id, &user(OUTSIDER))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    let result = h
        .engine
        .revoke_invitation(&revoked.id, &user(ADMIN))
        .await
        .unwrap();
    assert_eq!(result.status, InvitationStatus::Revoked);
    let err = h
        .engine
        .accept_invitation(&revoked.token, &user(GUEST))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ALREADY_USED");
    let err = h
        .engine
        .revoke_invitation(&revoked.id, &user(OWNER))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ALREADY_USED");
}

#[tokio::test]
async fn resend_rotates_the_token_and_extends_expiry() {
    let h = Harness::new();
    let doc = h.standard_document().await;
    let original = h.engine.invite(invite_guest(&doc)).await.unwrap();

    h.clock.advance(Duration::days(8));
    let err = h
        .engine
        .resend_invitation(&original.id, &user(ADMIN))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let resent = h
        .engine
        .resend_invitation(&original.id, &user(OWNER))
        .await
        .unwrap();
    assert_eq!(resent.id, original.id);
    assert_ne!(resent.token, original.token);
    assert_eq!(resent.expires_at, original.expires_at + Duration::days(8));

    let err = h
        .engine
        .accept_invitation(&original.token, &user(GUEST))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::TokenNotFound));
    h.engine
        .accept_invitation(&resent.token, &user(GUEST))
        .await
        .unwrap();
}

#[tokio::test]
async fn one_live_invitation_per_address() {
    let h = Harness::new();
    let doc = h.standard_document().await;
    h.engine.invite(invite_guest(&doc)).await.unwrap();

    let err = h
        .engine
        .invite(
            InviteRequest::new(doc.id, OWNER, "X@Example.com ", Team::Validators, PermissionKind::Read),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    h.clock.advance(Duration::days(7) + Duration::seconds(1));
    h.engine.invite(invite_guest(&doc)).await.unwrap();
    assert_eq!(h.engine.list_invitations(&doc.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn invitation_input_and_document_state_are_checked() {
    let h = Harness::new();
    let doc = h.standard_document().await;

    for ttl in [Duration::zero(), Duration::days(91)] {
        let err = h
            .engine
            .invite(invite_guest(&doc).with_ttl(ttl))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    let err = h
        .engine
        .invite(InviteRequest::new(doc.id, OWNER, "nobody", Team::Authors, PermissionKind::Read))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h
        .engine
        .invite(InviteRequest::new(doc.id, OUTSIDER, GUEST_EMAIL, Team::Authors, PermissionKind::Read))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let solo = h
        .engine
        .create_document(&user(OWNER), NewDocument::new("TG-7", "Solo"))
        .await
        .unwrap();
    h.engine.publish(&solo.id, &user(OWNER)).await.unwrap();
    let approved = h
        .engine
        .sign(SignRequest::approve(solo.id, OWNER, Team::Authors))
        .await
        .unwrap()
        .document;
    assert_eq!(approved.status, DocumentStatus::Approved);
    let err = h.engine.invite(invite_guest(&solo)).await.unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState { .. }));
}

#[tokio::test]
async fn contributors_joining_an_unsigned_tier_hold_up_its_quorum() {
    let mut h = Harness::new();
    let solo = h
        .engine
        .create_document(&user(OWNER), NewDocument::new("TG-8", "Solo author"))
        .await
        .unwrap();
    h.engine.publish(&solo.id, &user(OWNER)).await.unwrap();

    let invitation = h
        .engine
        .invite(InviteRequest::new(
            solo.id,
            OWNER,
            GUEST_EMAIL,
            Team::Validators,
            PermissionKind::Sign,
        ))
        .await
        .unwrap();
    let acceptance = h
        .engine
        .accept_invitation(&invitation.token, &user(GUEST))
        .await
        .unwrap();
    assert_eq!(acceptance.contributor.status, SignatureStatus::Pending);

    // Verifiers are empty and skipped; validators now wait for the guest.
    let outcome = h
        .engine
        .sign(SignRequest::approve(solo.id, OWNER, Team::Authors))
        .await
        .unwrap();
    assert_eq!(
        outcome.transitions,
        vec![DocumentStatus::VerifierReview, DocumentStatus::ValidatorReview]
    );
    assert_eq!(outcome.document.status, DocumentStatus::ValidatorReview);
    assert!(h.delivered().await.iter().any(|n| {
        n.template == NotificationTemplate::ReviewRequested
            && n.recipient == Recipient::User(user(GUEST))
    }));

    let outcome = h
        .engine
        .sign(SignRequest::approve(solo.id, GUEST, Team::Validators))
        .await
        .unwrap();
    assert!(outcome.tier_complete);
    assert_eq!(outcome.document.status, DocumentStatus::Approved);
}

#[tokio::test]
async fn contributors_joining_a_signed_off_tier_wait_for_the_next_publish() {
    let h = Harness::new();
    let doc = h.standard_document().await;
    h.engine.publish(&doc.id, &user(OWNER)).await.unwrap();
    h.engine
        .sign(SignRequest::approve(doc.id, OWNER, Team::Authors))
        .await
        .unwrap();

    let invitation = h
        .engine
        .invite(InviteRequest::new(
            doc.id,
            OWNER,
            GUEST_EMAIL,
            Team::Authors,
            PermissionKind::Sign,
        ))
        .await
        .unwrap();
    let acceptance = h
        .engine
        .accept_invitation(&invitation.token, &user(GUEST))
        .await
        .unwrap();
    assert_eq!(acceptance.contributor.status, SignatureStatus::Joined);

    let err = h
        .engine
        .sign(SignRequest::approve(doc.id, GUEST, Team::Authors))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "WRONG_TIER");

    let outcome = h
        .engine
        .sign(SignRequest::approve(doc.id, VERIFIER, Team::Verifiers))
        .await
        .unwrap();
    assert_eq!(outcome.document.status, DocumentStatus::ValidatorReview);
}

#[tokio::test]
async fn expiry_is_reported_before_a_spent_status() {
    let h = Harness::new();
    let doc = h.standard_document().await;
    let invitation = h
        .engine
        .invite(invite_guest(&doc).with_ttl(Duration::days(1)))
        .await
        .unwrap();
    h.engine
        .accept_invitation(&invitation.token, &user(GUEST))
        .await
        .unwrap();

    let err = h
        .engine
        .accept_invitation(&invitation.token, &user(GUEST))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ALREADY_USED");

    h.clock.advance(Duration::days(2));
    let err = h
        .engine
        .accept_invitation(&invitation.token, &user(GUEST))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "TOKEN_EXPIRED");
    let err = h
        .engine
        .decline_invitation(&invitation.token, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "TOKEN_EXPIRED");
}
