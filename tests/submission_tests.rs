mod common;

use agency_reporting::auth::AuthContext;
use agency_reporting::domains::audit::{AuditAction, AuditOutcome};
use agency_reporting::domains::period::PeriodResponse;
use agency_reporting::domains::program::Program;
use agency_reporting::domains::submission::types::TargetFields;
use agency_reporting::domains::submission::{
    FinalizeRequest, NewSubmission, NewTarget, SqliteTargetRepository, StatusIndicator, TargetRepository,
    UpdateSubmission, UpdateTarget,
};
use agency_reporting::errors::{DomainError, ServiceError};
use agency_reporting::AppState;
use common::*;

struct Fixture {
    state: AppState,
    user: AuthContext,
    focal: AuthContext,
    period: PeriodResponse,
    program: Program,
}

async fn fixture() -> Fixture {
    let state = setup().await;
    let agency = create_agency(&state, "Ministry of Education").await;
    let user = agency_user(agency.id);
    let focal = focal_user(agency.id);
    let period = open_q1_2025(&state).await;
    let initiative = create_initiative(&state, "2").await;
    let program = create_program(&state, &user, Some(initiative.id), "School meals").await;
    Fixture { state, user, focal, period, program }
}

fn finalize_request(f: &Fixture) -> FinalizeRequest {
    FinalizeRequest { program_id: f.program.id, period_id: f.period.period.period_id }
}

fn target(description: &str) -> NewTarget {
    NewTarget {
        target_description: description.to_string(),
        status_indicator: None,
        status_description: None,
        remarks: None,
        start_date: None,
        end_date: None,
    }
}

fn invalid_state(err: ServiceError) -> String {
    match err {
        ServiceError::Domain(DomainError::InvalidState(msg)) => msg,
        other => panic!("expected an invalid state error, got {:?}", other),
    }
}

#[tokio::test]
async fn finalize_succeeds_once() {
    let f = fixture().await;
    let draft = create_draft(&f.state, &f.user, f.program.id, f.period.period.period_id).await;
    assert!(draft.is_draft && !draft.is_submitted);

    let finalized = f.state.submissions.finalize(draft.submission_id, finalize_request(&f), &f.focal).await.unwrap();
    assert!(!finalized.is_draft);
    assert!(finalized.is_submitted);
    assert_eq!(finalized.submitted_by, Some(f.focal.user_id));
    assert!(finalized.submitted_at.is_some());

    let err = f
        .state
        .submissions
        .finalize(draft.submission_id, finalize_request(&f), &f.focal)
        .await
        .unwrap_err();
    assert_eq!(invalid_state(err), "Submission not found or already finalized");
}

#[tokio::test]
async fn finalize_requires_matching_program_and_period() {
    let f = fixture().await;
    let draft = create_draft(&f.state, &f.user, f.program.id, f.period.period.period_id).await;

    let other_program = create_program(&f.state, &f.user, None, "Adult literacy").await;
    let request = FinalizeRequest { program_id: other_program.id, period_id: f.period.period.period_id };
    let err = f.state.submissions.finalize(draft.submission_id, request, &f.focal).await.unwrap_err();
    assert_eq!(invalid_state(err), "Submission not found or already finalized");

    let still_draft = f.state.submissions.get_submission(draft.submission_id, &f.user).await.unwrap();
    assert!(still_draft.submission.is_draft);
}

#[tokio::test]
async fn another_agency_cannot_finalize() {
    let f = fixture().await;
    let draft = create_draft(&f.state, &f.user, f.program.id, f.period.period.period_id).await;

    let outsider_agency = create_agency(&f.state, "Ministry of Finance").await;
    let outsider = focal_user(outsider_agency.id);
    let err = f
        .state
        .submissions
        .finalize(draft.submission_id, finalize_request(&f), &outsider)
        .await
        .unwrap_err();
    assert_eq!(invalid_state(err), "Submission not found or already finalized");

    let err = f.state.submissions.get_submission(draft.submission_id, &outsider).await.unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));
}

#[tokio::test]
async fn only_focal_users_finalize() {
    let f = fixture().await;
    let draft = create_draft(&f.state, &f.user, f.program.id, f.period.period.period_id).await;

    // Drafting staff of the owning agency and administrators are both refused
    for caller in [f.user.clone(), admin()] {
        let err = f
            .state
            .submissions
            .finalize(draft.submission_id, finalize_request(&f), &caller)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_)));
    }

    let still_draft = f.state.submissions.get_submission(draft.submission_id, &f.user).await.unwrap();
    assert!(still_draft.submission.is_draft);
}

#[tokio::test]
async fn unsubmit_of_a_draft_reports_the_current_state() {
    let f = fixture().await;
    let draft = create_draft(&f.state, &f.user, f.program.id, f.period.period.period_id).await;

    let err = f.state.submissions.unsubmit(draft.submission_id, &f.focal).await.unwrap_err();
    assert_eq!(
        invalid_state(err),
        "Submission cannot be unsubmitted: it is currently a draft (is_draft=1, is_submitted=0)"
    );
}

#[tokio::test]
async fn unsubmit_returns_a_finalized_submission_to_draft() {
    let f = fixture().await;
    let draft = create_draft(&f.state, &f.user, f.program.id, f.period.period.period_id).await;
    f.state.submissions.finalize(draft.submission_id, finalize_request(&f), &f.focal).await.unwrap();

    // Drafting staff cannot reopen it either
    let err = f.state.submissions.unsubmit(draft.submission_id, &f.user).await.unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    let reopened = f.state.submissions.unsubmit(draft.submission_id, &f.focal).await.unwrap();
    assert!(reopened.is_draft);
    assert!(!reopened.is_submitted);
    assert!(reopened.submitted_at.is_none());
    assert!(reopened.submitted_by.is_none());

    // and it can be finalized again
    f.state.submissions.finalize(draft.submission_id, finalize_request(&f), &f.focal).await.unwrap();
}

#[tokio::test]
async fn focal_of_another_agency_gets_not_found_on_unsubmit() {
    let f = fixture().await;
    let draft = create_draft(&f.state, &f.user, f.program.id, f.period.period.period_id).await;
    f.state.submissions.finalize(draft.submission_id, finalize_request(&f), &f.focal).await.unwrap();

    let other = create_agency(&f.state, "Ministry of Trade").await;
    let err = f.state.submissions.unsubmit(draft.submission_id, &focal_user(other.id)).await.unwrap_err();
    assert!(matches!(err, ServiceError::Domain(DomainError::EntityNotFound(_, _))));
}

#[tokio::test]
async fn lifecycle_is_recorded_in_the_audit_trail() {
    let f = fixture().await;
    let draft = create_draft(&f.state, &f.user, f.program.id, f.period.period.period_id).await;
    f.state.submissions.finalize(draft.submission_id, finalize_request(&f), &f.focal).await.unwrap();
    assert!(f.state.submissions.finalize(draft.submission_id, finalize_request(&f), &f.focal).await.is_err());
    f.state.submissions.unsubmit(draft.submission_id, &f.focal).await.unwrap();

    let history = f.state.submissions.history(draft.submission_id, &f.user).await.unwrap();
    let actions: Vec<(AuditAction, AuditOutcome)> = history.iter().map(|log| (log.action, log.outcome)).collect();
    assert_eq!(
        actions,
        vec![
            (AuditAction::Create, AuditOutcome::Success),
            (AuditAction::Finalize, AuditOutcome::Success),
            (AuditAction::Finalize, AuditOutcome::Failure),
            (AuditAction::Unsubmit, AuditOutcome::Success),
        ]
    );

    let finalize_log = &history[1];
    let changes = f.state.audit.get_log_changes(finalize_log.id, &admin()).await.unwrap();
    let fields: Vec<&str> = changes.iter().map(|c| c.field_name.as_str()).collect();
    assert!(fields.contains(&"is_draft"));
    assert!(fields.contains(&"is_submitted"));

    // The same trail is reachable through the audit service by subject
    let by_subject = f
        .state
        .audit
        .subject_history(agency_reporting::domains::audit::SubjectType::Submission, draft.submission_id, &admin())
        .await
        .unwrap();
    assert_eq!(by_subject.len(), history.len());
}

#[tokio::test]
async fn only_one_live_submission_per_program_and_period() {
    let f = fixture().await;
    create_draft(&f.state, &f.user, f.program.id, f.period.period.period_id).await;

    let err = f
        .state
        .submissions
        .create_submission(
            NewSubmission { program_id: f.program.id, period_id: f.period.period.period_id, description: None },
            &f.user,
        )
        .await
        .unwrap_err();
    match err {
        ServiceError::Domain(DomainError::Conflict(msg)) => {
            assert_eq!(msg, "A submission already exists for this program and period")
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn deleted_draft_frees_the_slot() {
    let f = fixture().await;
    let draft = create_draft(&f.state, &f.user, f.program.id, f.period.period.period_id).await;
    f.state.submissions.delete_submission(draft.submission_id, &f.user).await.unwrap();

    let replacement = create_draft(&f.state, &f.user, f.program.id, f.period.period.period_id).await;
    assert_ne!(replacement.submission_id, draft.submission_id);

    let listed = f.state.submissions.list_for_program(f.program.id, &f.user).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn finalized_submissions_cannot_be_deleted_or_edited() {
    let f = fixture().await;
    let draft = create_draft(&f.state, &f.user, f.program.id, f.period.period.period_id).await;
    f.state.submissions.finalize(draft.submission_id, finalize_request(&f), &f.focal).await.unwrap();

    let err = f.state.submissions.delete_submission(draft.submission_id, &f.user).await.unwrap_err();
    assert_eq!(invalid_state(err), "Only draft submissions can be deleted");

    let err = f
        .state
        .submissions
        .update_submission(draft.submission_id, UpdateSubmission { description: Some(Some("late".into())) }, &f.user)
        .await
        .unwrap_err();
    assert_eq!(invalid_state(err), "Only draft submissions can be edited");
}

#[tokio::test]
async fn draft_description_can_be_cleared() {
    let f = fixture().await;
    let draft = create_draft(&f.state, &f.user, f.program.id, f.period.period.period_id).await;
    assert_eq!(draft.description.as_deref(), Some("First draft"));

    let kept = f
        .state
        .submissions
        .update_submission(draft.submission_id, UpdateSubmission::default(), &f.user)
        .await
        .unwrap();
    assert_eq!(kept.description.as_deref(), Some("First draft"));

    let update: UpdateSubmission = serde_json::from_str(r#"{"description": null}"#).unwrap();
    let cleared = f.state.submissions.update_submission(draft.submission_id, update, &f.user).await.unwrap();
    assert_eq!(cleared.description, None);
}

#[tokio::test]
async fn drafts_need_an_open_period() {
    let f = fixture().await;
    let closed = f
        .state
        .periods
        .save_period(period_input("quarter", 2, 2025, "2025-04-01", "2025-06-30", "closed"), &admin())
        .await
        .unwrap();

    let err = f
        .state
        .submissions
        .create_submission(
            NewSubmission { program_id: f.program.id, period_id: closed.period.period_id, description: None },
            &f.user,
        )
        .await
        .unwrap_err();
    assert_eq!(invalid_state(err), "Reporting period Q2 2025 is not open");
}

#[tokio::test]
async fn targets_are_numbered_under_the_program() {
    let f = fixture().await;
    assert_eq!(f.program.program_number.as_deref(), Some("2.1"));
    let draft = create_draft(&f.state, &f.user, f.program.id, f.period.period.period_id).await;

    let first = f.state.submissions.add_target(draft.submission_id, target("Enrol pupils"), &f.user).await.unwrap();
    let second = f.state.submissions.add_target(draft.submission_id, target("Train cooks"), &f.user).await.unwrap();
    assert_eq!(first.target_number, "2.1.1");
    assert_eq!(second.target_number, "2.1.2");
    assert_eq!(first.status_indicator, StatusIndicator::NotStarted);

    // Numbers of deleted targets are not handed out again
    f.state.submissions.delete_target(second.target_id, &f.user).await.unwrap();
    let third = f.state.submissions.add_target(draft.submission_id, target("Build kitchens"), &f.user).await.unwrap();
    assert_eq!(third.target_number, "2.1.3");

    let listed = f.state.submissions.list_targets(draft.submission_id, &f.user).await.unwrap();
    let numbers: Vec<&str> = listed.iter().map(|t| t.target_number.as_str()).collect();
    assert_eq!(numbers, vec!["2.1.1", "2.1.3"]);
}

#[tokio::test]
async fn a_target_number_is_held_once_per_submission() {
    let f = fixture().await;
    let draft = create_draft(&f.state, &f.user, f.program.id, f.period.period.period_id).await;
    let taken = f.state.submissions.add_target(draft.submission_id, target("Enrol pupils"), &f.user).await.unwrap();

    // A writer that computed the same next number loses at insert time
    let repo = SqliteTargetRepository::new(f.state.pool.clone());
    let fields = TargetFields::from_new(&target("Train cooks")).unwrap();
    let mut tx = f.state.pool.begin().await.unwrap();
    let err = repo
        .create_with_tx(draft.submission_id, &taken.target_number, &fields, &mut tx)
        .await
        .unwrap_err();
    tx.rollback().await.unwrap();
    assert!(matches!(err, DomainError::Conflict(msg) if msg.contains("2.1.1")));

    let listed = f.state.submissions.list_targets(draft.submission_id, &f.user).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn targets_are_locked_once_finalized() {
    let f = fixture().await;
    let draft = create_draft(&f.state, &f.user, f.program.id, f.period.period.period_id).await;
    let existing = f.state.submissions.add_target(draft.submission_id, target("Enrol pupils"), &f.user).await.unwrap();
    f.state.submissions.finalize(draft.submission_id, finalize_request(&f), &f.focal).await.unwrap();

    let locked = "Targets cannot be changed after the submission is finalized";

    let err = f.state.submissions.add_target(draft.submission_id, target("Late"), &f.user).await.unwrap_err();
    assert_eq!(invalid_state(err), locked);

    let update = UpdateTarget {
        target_description: None,
        status_indicator: Some("completed".to_string()),
        status_description: None,
        remarks: None,
        start_date: None,
        end_date: None,
    };
    let err = f.state.submissions.update_target(existing.target_id, update, &f.user).await.unwrap_err();
    assert_eq!(invalid_state(err), locked);

    let err = f.state.submissions.delete_target(existing.target_id, &f.user).await.unwrap_err();
    assert_eq!(invalid_state(err), locked);
}

#[tokio::test]
async fn target_updates_validate_status_and_dates() {
    let f = fixture().await;
    let draft = create_draft(&f.state, &f.user, f.program.id, f.period.period.period_id).await;
    let created = f.state.submissions.add_target(draft.submission_id, target("Enrol pupils"), &f.user).await.unwrap();

    let bad_status = UpdateTarget {
        target_description: None,
        status_indicator: Some("finished".to_string()),
        status_description: None,
        remarks: None,
        start_date: None,
        end_date: None,
    };
    let err = f.state.submissions.update_target(created.target_id, bad_status, &f.user).await.unwrap_err();
    assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));

    let backwards = UpdateTarget {
        target_description: None,
        status_indicator: None,
        status_description: None,
        remarks: None,
        start_date: Some("2025-03-01".to_string()),
        end_date: Some("2025-01-01".to_string()),
    };
    let err = f.state.submissions.update_target(created.target_id, backwards, &f.user).await.unwrap_err();
    assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));

    let good = UpdateTarget {
        target_description: None,
        status_indicator: Some("in_progress".to_string()),
        status_description: Some("Half the districts done".to_string()),
        remarks: None,
        start_date: Some("2025-01-01".to_string()),
        end_date: Some("2025-03-01".to_string()),
    };
    let updated = f.state.submissions.update_target(created.target_id, good, &f.user).await.unwrap();
    assert_eq!(updated.status_indicator, StatusIndicator::InProgress);
    assert_eq!(updated.target_description, "Enrol pupils");
}

#[tokio::test]
async fn period_listing_is_scoped_to_the_agency() {
    let f = fixture().await;
    create_draft(&f.state, &f.user, f.program.id, f.period.period.period_id).await;

    let other_agency = create_agency(&f.state, "Ministry of Energy").await;
    let other_user = agency_user(other_agency.id);
    let other_program = create_program(&f.state, &other_user, None, "Rural grid").await;
    create_draft(&f.state, &other_user, other_program.id, f.period.period.period_id).await;

    let mine = f.state.submissions.list_for_period(f.period.period.period_id, &f.user).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].program_id, f.program.id);

    let all = f.state.submissions.list_for_period(f.period.period.period_id, &admin()).await.unwrap();
    assert_eq!(all.len(), 2);
}
