use reqwest::StatusCode;
use thiserror::Error;

/// Failure to obtain a reading for a single thing from ThingWorx.
///
/// Always transient from the refresh loop's point of view: the sensor is
/// skipped for this cycle and fetched again on the next one.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("telemetry request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("telemetry endpoint returned {0}")]
    Status(StatusCode),

    #[error("malformed telemetry payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("telemetry payload has no rows")]
    NoRows,

    /// The refresh task for this thing panicked or was aborted.
    #[error("refresh task failed: {0}")]
    Task(#[source] tokio::task::JoinError),
}

/// Failures on the request path (directory, votes, tallies).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A vote was attempted without a live session.
    #[error("invalid session state: a session is required to vote")]
    InvalidSessionState,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
