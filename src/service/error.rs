use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    error::HttpError,
    models::{jobmodel::{ApplicationStatus, JobStatus}, paymentmodel::PaymentStatus},
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Job {0} not found")]
    JobNotFound(Uuid),

    #[error("Application {0} not found")]
    ApplicationNotFound(Uuid),

    #[error("Payment {0} not found")]
    PaymentNotFound(Uuid),

    #[error("Document {0} not found")]
    DocumentNotFound(Uuid),

    #[error("Emergency alert {0} not found")]
    AlertNotFound(Uuid),

    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error("File not found")]
    FileNotFound,

    #[error("Job is {}; this action requires it to be {}", .0.to_str(), .1.to_str())]
    InvalidJobStatus(JobStatus, JobStatus),

    #[error("Application is {}", .0.to_str())]
    InvalidApplicationStatus(ApplicationStatus),

    #[error("Payment is {}", .0.to_str())]
    InvalidPaymentStatus(PaymentStatus),

    #[error("You are not allowed to perform this action")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("Too many requests. Please try again later")]
    RateLimited,

    #[error("Payment or messaging provider error: {0}")]
    Gateway(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("File storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::JobNotFound(_)
            | ServiceError::ApplicationNotFound(_)
            | ServiceError::PaymentNotFound(_)
            | ServiceError::DocumentNotFound(_)
            | ServiceError::AlertNotFound(_)
            | ServiceError::UserNotFound(_)
            | ServiceError::FileNotFound => StatusCode::NOT_FOUND,

            ServiceError::InvalidJobStatus(_, _)
            | ServiceError::InvalidApplicationStatus(_)
            | ServiceError::InvalidPaymentStatus(_)
            | ServiceError::Validation(_) => StatusCode::BAD_REQUEST,

            ServiceError::Forbidden => StatusCode::FORBIDDEN,

            ServiceError::RateLimited => StatusCode::TOO_MANY_REQUESTS,

            ServiceError::Gateway(_) => StatusCode::BAD_GATEWAY,

            ServiceError::Database(_) | ServiceError::Io(_) | ServiceError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// True when the insert/update hit a unique constraint.
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .map_or(false, |db_error| db_error.is_unique_violation())
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        let status = error.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal error: {}", error);
            return HttpError::server_error("Server Error. Please try again later");
        }
        HttpError::new(error.to_string(), status)
    }
}

impl From<sqlx::Error> for HttpError {
    fn from(error: sqlx::Error) -> Self {
        ServiceError::Database(error).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let err: HttpError = ServiceError::JobNotFound(Uuid::new_v4()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_forbidden_maps_to_403() {
        let err: HttpError = ServiceError::Forbidden.into();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_invalid_status_message() {
        let err = ServiceError::InvalidJobStatus(JobStatus::InProgress, JobStatus::Active);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("in-progress"));
    }

    #[test]
    fn test_rate_limited_maps_to_429() {
        assert_eq!(ServiceError::RateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let err: HttpError = ServiceError::Other("connection refused".into()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("connection refused"));
    }
}
