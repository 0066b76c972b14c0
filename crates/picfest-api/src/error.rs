use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use picfest_core::wizard::WizardError;
use picfest_platform::PlatformError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("File too large")]
    PayloadTooLarge,

    /// Message reported by the platform.
    #[error("{0}")]
    Backend(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn forbidden() -> Self {
        Self::Forbidden("Forbidden".into())
    }

    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{} not found", what))
    }
}

impl From<PlatformError> for ApiError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::NotFound => Self::NotFound("Not found".into()),
            PlatformError::Unauthorized => Self::Unauthorized,
            PlatformError::Forbidden => Self::forbidden(),
            PlatformError::Conflict(msg) => Self::Conflict(msg),
            PlatformError::Invalid(msg) => Self::BadRequest(msg),
            PlatformError::Backend(msg) => Self::Backend(msg),
            PlatformError::Internal(e) => Self::Internal(e),
        }
    }
}

impl From<WizardError> for ApiError {
    fn from(err: WizardError) -> Self {
        match err {
            WizardError::ProfileIncomplete | WizardError::NoMedia => {
                Self::BadRequest(err.to_string())
            }
            WizardError::WrongStep(_)
            | WizardError::AlreadySubmitting
            | WizardError::NotSubmitting => Self::Conflict(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            Self::Backend(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            Self::Internal(e) => {
                // Don't leak internal error detail to client
                error!("Internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_messages_pass_through() {
        let err = ApiError::from(PlatformError::Backend("Bucket not found".into()));
        assert_eq!(err.to_string(), "Bucket not found");
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);

        let conflict = ApiError::from(PlatformError::Conflict("User already registered".into()));
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn wizard_errors_map_to_client_errors() {
        let incomplete = ApiError::from(WizardError::ProfileIncomplete).into_response();
        assert_eq!(incomplete.status(), StatusCode::BAD_REQUEST);

        let wrong_step = ApiError::from(WizardError::WrongStep(1)).into_response();
        assert_eq!(wrong_step.status(), StatusCode::CONFLICT);
    }
}
