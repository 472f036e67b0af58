mod common;

use agency_reporting::domains::period::PeriodStatus;
use agency_reporting::errors::{DomainError, ServiceError};
use common::*;

#[tokio::test]
async fn duplicate_period_is_rejected_with_its_display_name() {
    let state = setup().await;
    open_q1_2025(&state).await;

    let err = state
        .periods
        .save_period(period_input("quarter", 1, 2025, "2025-01-01", "2025-03-31", "open"), &admin())
        .await
        .unwrap_err();

    match err {
        ServiceError::Domain(DomainError::Conflict(msg)) => assert_eq!(msg, "Period Q1 2025 already exists"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn opening_a_period_closes_the_others_but_a_rejected_save_does_not() {
    let state = setup().await;
    let yearly = state
        .periods
        .save_period(period_input("yearly", 1, 2024, "2024-01-01", "2024-12-31", "open"), &admin())
        .await
        .unwrap();
    assert_eq!(yearly.period.status, PeriodStatus::Open);

    let q1 = open_q1_2025(&state).await;
    let yearly_after = state.periods.get_period(yearly.period.period_id, &admin()).await.unwrap();
    assert_eq!(yearly_after.period.status, PeriodStatus::Closed);

    // Reopen the yearly period, then retry the duplicate quarter
    state.periods.set_status(yearly.period.period_id, "open", &admin()).await.unwrap();
    let q1_now = state.periods.get_period(q1.period.period_id, &admin()).await.unwrap();
    assert_eq!(q1_now.period.status, PeriodStatus::Closed);

    assert!(state
        .periods
        .save_period(period_input("quarter", 1, 2025, "2025-01-01", "2025-03-31", "open"), &admin())
        .await
        .is_err());

    let current = state.periods.current_open_period(&admin()).await.unwrap().unwrap();
    assert_eq!(current.period.period_id, yearly.period.period_id);
}

#[tokio::test]
async fn quarter_inside_yearly_period_is_compatible() {
    let state = setup().await;
    state
        .periods
        .save_period(period_input("yearly", 1, 2025, "2025-01-01", "2025-12-31", "closed"), &admin())
        .await
        .unwrap();
    state
        .periods
        .save_period(period_input("half", 1, 2025, "2025-01-01", "2025-06-30", "closed"), &admin())
        .await
        .unwrap();
    let q2 = state
        .periods
        .save_period(period_input("quarter", 2, 2025, "2025-04-01", "2025-06-30", "closed"), &admin())
        .await
        .unwrap();
    assert_eq!(q2.display_name, "Q2 2025");
}

#[tokio::test]
async fn overlapping_quarters_conflict() {
    let state = setup().await;
    open_q1_2025(&state).await;

    let err = state
        .periods
        .save_period(period_input("quarter", 2, 2025, "2025-03-15", "2025-06-30", "closed"), &admin())
        .await
        .unwrap_err();

    match err {
        ServiceError::Domain(DomainError::Conflict(msg)) => {
            assert!(msg.starts_with("Period Q2 2025 overlaps with existing period Q1 2025"), "{}", msg);
            assert!(msg.contains("2025-01-01 to 2025-03-31"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn update_ignores_the_period_itself() {
    let state = setup().await;
    let q1 = open_q1_2025(&state).await;

    let updated = state
        .periods
        .update_period(
            q1.period.period_id,
            period_input("quarter", 1, 2025, "2025-01-02", "2025-03-31", "open"),
            &admin(),
        )
        .await
        .unwrap();
    assert_eq!(updated.period.start_date.to_string(), "2025-01-02");
}

#[tokio::test]
async fn invalid_input_is_a_validation_error() {
    let state = setup().await;
    let err = state
        .periods
        .save_period(period_input("quarter", 5, 2025, "2025-01-01", "2025-03-31", "closed"), &admin())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));

    let err = state
        .periods
        .save_period(period_input("quarter", 1, 2025, "2025-03-31", "2025-01-01", "closed"), &admin())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
}

#[tokio::test]
async fn only_administrators_manage_periods() {
    let state = setup().await;
    let agency = create_agency(&state, "Ministry of Health").await;

    let err = state
        .periods
        .save_period(
            period_input("quarter", 1, 2025, "2025-01-01", "2025-03-31", "open"),
            &agency_user(agency.id),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    // but everyone can read them
    open_q1_2025(&state).await;
    let periods = state.periods.list_periods(Some(2025), &agency_user(agency.id)).await.unwrap();
    assert_eq!(periods.len(), 1);
}

#[tokio::test]
async fn period_with_live_submissions_cannot_be_deleted() {
    let state = setup().await;
    let agency = create_agency(&state, "Ministry of Works").await;
    let user = agency_user(agency.id);
    let period = open_q1_2025(&state).await;
    let program = create_program(&state, &user, None, "Road maintenance").await;
    let draft = create_draft(&state, &user, program.id, period.period.period_id).await;

    let err = state.periods.delete_period(period.period.period_id, &admin()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Domain(DomainError::DependentRecordsExist { .. })));

    state.submissions.delete_submission(draft.submission_id, &user).await.unwrap();
    state.periods.delete_period(period.period.period_id, &admin()).await.unwrap();
    assert!(state.periods.get_period(period.period.period_id, &admin()).await.is_err());
}
