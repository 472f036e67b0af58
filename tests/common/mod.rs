#![allow(dead_code)]

use agency_reporting::auth::AuthContext;
use agency_reporting::domains::agency::{Agency, NewAgency};
use agency_reporting::domains::period::{PeriodInput, PeriodResponse};
use agency_reporting::domains::program::{Initiative, NewInitiative, NewProgram, Program};
use agency_reporting::domains::submission::{NewSubmission, ProgramSubmission};
use agency_reporting::types::UserRole;
use agency_reporting::{initialize_database, AppState};
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "integration-test-secret-0123456789";

/// Fresh in-memory database with the schema applied.
/// One connection, so every query sees the same database.
pub async fn setup() -> AppState {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    initialize_database(&pool).await.expect("migrations");
    AppState::from_pool(pool, TEST_JWT_SECRET)
}

pub fn admin() -> AuthContext {
    AuthContext::new(Uuid::new_v4(), UserRole::Admin, None)
}

pub fn agency_user(agency_id: Uuid) -> AuthContext {
    AuthContext::new(Uuid::new_v4(), UserRole::Agency, Some(agency_id))
}

pub fn focal_user(agency_id: Uuid) -> AuthContext {
    AuthContext::new(Uuid::new_v4(), UserRole::Focal, Some(agency_id))
}

pub async fn create_agency(state: &AppState, name: &str) -> Agency {
    state
        .agencies
        .create_agency(
            NewAgency { name: name.to_string(), abbreviation: None },
            &admin(),
        )
        .await
        .expect("agency")
}

pub fn period_input(
    period_type: &str,
    period_number: i64,
    year: i64,
    start_date: &str,
    end_date: &str,
    status: &str,
) -> PeriodInput {
    PeriodInput {
        period_type: period_type.to_string(),
        period_number,
        year,
        start_date: start_date.to_string(),
        end_date: end_date.to_string(),
        status: Some(status.to_string()),
    }
}

pub async fn open_q1_2025(state: &AppState) -> PeriodResponse {
    state
        .periods
        .save_period(period_input("quarter", 1, 2025, "2025-01-01", "2025-03-31", "open"), &admin())
        .await
        .expect("Q1 2025")
}

pub async fn create_initiative(state: &AppState, number: &str) -> Initiative {
    state
        .programs
        .create_initiative(
            NewInitiative {
                name: format!("Initiative {}", number),
                initiative_number: number.to_string(),
                description: None,
            },
            &admin(),
        )
        .await
        .expect("initiative")
}

pub async fn create_program(state: &AppState, agency: &AuthContext, initiative_id: Option<Uuid>, name: &str) -> Program {
    state
        .programs
        .create_program(
            NewProgram {
                program_name: name.to_string(),
                description: None,
                initiative_id,
                program_number: None,
                agency_id: None,
            },
            agency,
        )
        .await
        .expect("program")
}

pub async fn create_draft(state: &AppState, agency: &AuthContext, program_id: Uuid, period_id: Uuid) -> ProgramSubmission {
    state
        .submissions
        .create_submission(
            NewSubmission { program_id, period_id, description: Some("First draft".to_string()) },
            agency,
        )
        .await
        .expect("draft")
}
