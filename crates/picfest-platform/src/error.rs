use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Not found")]
    NotFound,

    #[error("Invalid credentials or session")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Invalid(String),

    /// Message reported by the hosted platform, passed through as-is.
    #[error("{0}")]
    Backend(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PlatformError {
    /// Classify an error coming out of the SQLite store.
    pub fn from_db(err: anyhow::Error) -> Self {
        if picfest_db::is_constraint_violation(&err) {
            Self::Conflict(err.to_string())
        } else {
            Self::Internal(err)
        }
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<tokio::task::JoinError> for PlatformError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(anyhow::anyhow!("Blocking task failed: {}", err))
    }
}
