use thiserror::Error;

/// Errors surfaced at the boundaries of the assessment core.
///
/// Rejected keystrokes and out-of-range cell writes never reach this type;
/// the grid drops them silently, the same way the input filter does.
#[derive(Debug, Error)]
pub enum Error {
    #[error("please enter a valid URL: {0}")]
    InvalidUrl(String),

    #[error("please enter a valid time in 24-hour format (HH:MM): {0}")]
    InvalidCutoff(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("user session expired, please login again")]
    NoSession,

    #[error("the assessment is not available after the daily cutoff time {0}")]
    CutoffReached(String),

    #[error("result store: {0}")]
    Sink(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("csv export: {0}")]
    Csv(#[from] csv::Error),

    #[error("settings file: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
