//! HTTP mapping of the service error taxonomy and the JSON envelope.

use crate::errors::{DbError, DomainError, ServiceError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

const GENERIC_INTERNAL_MESSAGE: &str = "A system error occurred";

/// Successful response body: `{"success": true, "data": ...}`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

/// Failure response body: `{"success": false, "message": ..., "code": ...}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    pub code: &'static str,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope { success: true, data })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, ok(data))
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The request could not be parsed
    #[error("{0}")]
    BadRequest(String),

    /// No usable credentials were presented
    #[error("{0}")]
    Unauthorized(String),
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Service(ServiceError::Domain(err))
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Service(err) => match err {
                ServiceError::Authentication(_) | ServiceError::SessionExpired => StatusCode::UNAUTHORIZED,
                ServiceError::PermissionDenied(_) => StatusCode::FORBIDDEN,
                ServiceError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ServiceError::Domain(domain) => match domain {
                    DomainError::Validation(_) | DomainError::InvalidUuid(_) => StatusCode::BAD_REQUEST,
                    DomainError::EntityNotFound(_, _) => StatusCode::NOT_FOUND,
                    DomainError::Conflict(_)
                    | DomainError::InvalidState(_)
                    | DomainError::DependentRecordsExist { .. } => StatusCode::CONFLICT,
                    DomainError::Database(db) if db.is_unique_violation() => StatusCode::CONFLICT,
                    DomainError::Database(DbError::NotFound(_, _)) => StatusCode::NOT_FOUND,
                    DomainError::Database(_) | DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                },
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Service(err) => match err {
                ServiceError::Authentication(_) => "AUTHENTICATION_FAILED",
                ServiceError::SessionExpired => "SESSION_EXPIRED",
                ServiceError::PermissionDenied(_) => "PERMISSION_DENIED",
                ServiceError::Configuration(_) => "INTERNAL_ERROR",
                ServiceError::Domain(domain) => match domain {
                    DomainError::Validation(_) => "VALIDATION_ERROR",
                    DomainError::InvalidUuid(_) => "INVALID_ID",
                    DomainError::EntityNotFound(_, _) => "NOT_FOUND",
                    DomainError::Conflict(_) => "CONFLICT",
                    DomainError::InvalidState(_) => "INVALID_STATE",
                    DomainError::DependentRecordsExist { .. } => "DEPENDENT_RECORDS_EXIST",
                    DomainError::Database(db) if db.is_unique_violation() => "CONFLICT",
                    DomainError::Database(DbError::NotFound(_, _)) => "NOT_FOUND",
                    DomainError::Database(_) | DomainError::Internal(_) => "INTERNAL_ERROR",
                },
            },
        }
    }

    /// Message safe to show to the client
    pub fn client_message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) | ApiError::Unauthorized(msg) => msg.clone(),
            ApiError::Service(err) => match err {
                ServiceError::Authentication(_) => "Authentication failed".to_string(),
                ServiceError::SessionExpired => "Session expired, please log in again".to_string(),
                ServiceError::PermissionDenied(msg) => msg.clone(),
                ServiceError::Configuration(_) => GENERIC_INTERNAL_MESSAGE.to_string(),
                ServiceError::Domain(domain) => match domain {
                    DomainError::Validation(v) => v.to_string(),
                    DomainError::InvalidUuid(value) => format!("Invalid identifier: {}", value),
                    DomainError::EntityNotFound(entity, _) => format!("{} not found", entity),
                    DomainError::Conflict(msg) | DomainError::InvalidState(msg) => msg.clone(),
                    DomainError::DependentRecordsExist { .. } => domain.to_string(),
                    DomainError::Database(db) if db.is_unique_violation() => {
                        "The record conflicts with existing data".to_string()
                    }
                    DomainError::Database(DbError::NotFound(entity, _)) => format!("{} not found", entity),
                    DomainError::Database(_) | DomainError::Internal(_) => GENERIC_INTERNAL_MESSAGE.to_string(),
                },
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            // Details stay in the log
            log::error!("Request failed: {}", self);
        } else if matches!(status, StatusCode::UNAUTHORIZED) {
            log::debug!("Rejected credentials: {}", self);
        }

        let body = ErrorBody {
            success: false,
            message: self.client_message(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ValidationError;
    use uuid::Uuid;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (ApiError::Service(ValidationError::required("name").into()), StatusCode::BAD_REQUEST),
            (ServiceError::Authentication("bad".into()).into(), StatusCode::UNAUTHORIZED),
            (ServiceError::SessionExpired.into(), StatusCode::UNAUTHORIZED),
            (ServiceError::PermissionDenied("no".into()).into(), StatusCode::FORBIDDEN),
            (DomainError::EntityNotFound("Program".into(), Uuid::nil()).into(), StatusCode::NOT_FOUND),
            (DomainError::Conflict("Period Q1 2025 already exists".into()).into(), StatusCode::CONFLICT),
            (DomainError::InvalidState("draft".into()).into(), StatusCode::CONFLICT),
            (DomainError::Internal("boom".into()).into(), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{:?}", err);
        }
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err: ApiError = DomainError::Database(DbError::Other("disk I/O error at /var/db".into())).into();
        assert_eq!(err.client_message(), GENERIC_INTERNAL_MESSAGE);
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn conflict_messages_pass_through() {
        let err: ApiError = DomainError::Conflict("Period Q1 2025 already exists".into()).into();
        assert_eq!(err.client_message(), "Period Q1 2025 already exists");
    }
}
