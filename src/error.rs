use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication failed (HTTP {status}): {message}")]
    Auth { status: StatusCode, message: String },

    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    // Body decode failures also land here: reqwest wraps serde errors.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl AppError {
    /// Whether this failure means the run cannot proceed at all, as opposed
    /// to a per-item failure the dispatcher absorbs.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Config(_) | AppError::Auth { .. })
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
