use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    CustomerNotFound(String),

    #[error("Payment processor declined the request: {0}")]
    ProcessorDeclined(String),

    #[error("Upstream call failed: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether repeating the failed call may succeed.
    ///
    /// Transient failures (network, database, 5xx from a provider) are retried by the
    /// step's retry policy; everything else ends the step immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::Upstream(_) | AppError::Internal(_)
        )
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    DatabaseError,
    InvalidSignature,
    NotAuthenticated,
    InvalidInput,
    CustomerNotFound,
    ProcessorDeclined,
    UpstreamError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InvalidSignature => "INVALID_SIGNATURE",
            ErrorCode::NotAuthenticated => "NOT_AUTHENTICATED",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::CustomerNotFound => "CUSTOMER_NOT_FOUND",
            ErrorCode::ProcessorDeclined => "PROCESSOR_DECLINED",
            ErrorCode::UpstreamError => "UPSTREAM_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
