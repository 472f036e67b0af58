//! HTTP surface: JSON handlers over the domain services.

pub mod error;
pub mod extract;

mod agencies;
mod audit;
mod auth;
mod periods;
mod programs;
mod submissions;
mod users;

use crate::state::AppState;
use axum::routing::{get, post, put};
use axum::Router;

pub use error::{ApiError, ApiResult, Envelope};

pub fn router(state: AppState) -> Router {
    Router::new()
        // Auth
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        // Administration
        .route("/api/agencies", get(agencies::list).post(agencies::create))
        .route("/api/agencies/:id", get(agencies::get))
        .route("/api/users", get(users::list).post(users::create))
        .route("/api/users/:id", get(users::get))
        // Reporting periods
        .route("/api/periods", get(periods::list).post(periods::save))
        .route("/api/periods/current", get(periods::current))
        .route(
            "/api/periods/:id",
            get(periods::get).put(periods::update).delete(periods::delete),
        )
        .route("/api/periods/:id/status", post(periods::set_status))
        .route("/api/periods/:id/submissions", get(periods::submissions))
        // Initiatives and programs
        .route(
            "/api/initiatives",
            get(programs::list_initiatives).post(programs::create_initiative),
        )
        .route("/api/initiatives/:id", get(programs::get_initiative))
        .route(
            "/api/initiatives/:id/next-program-number",
            get(programs::next_program_number),
        )
        .route("/api/programs", get(programs::list).post(programs::create))
        .route("/api/programs/:id", get(programs::get).put(programs::update))
        .route("/api/programs/:id/submissions", get(programs::submissions))
        // Submissions and targets
        .route("/api/submissions", post(submissions::create))
        .route(
            "/api/submissions/:id",
            get(submissions::get)
                .put(submissions::update)
                .delete(submissions::delete),
        )
        .route("/api/submissions/:id/finalize", post(submissions::finalize))
        .route("/api/submissions/:id/unsubmit", post(submissions::unsubmit))
        .route("/api/submissions/:id/history", get(submissions::history))
        .route(
            "/api/submissions/:id/targets",
            get(submissions::list_targets).post(submissions::add_target),
        )
        .route(
            "/api/targets/:id",
            put(submissions::update_target).delete(submissions::delete_target),
        )
        // Audit trail
        .route("/api/audit-logs", get(audit::list))
        .route("/api/audit-logs/:id/changes", get(audit::changes))
        .route(
            "/api/audit-logs/subjects/:subject_type/:subject_id",
            get(audit::subject_history),
        )
        .with_state(state)
}
