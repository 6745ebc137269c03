use thiserror::Error;

pub type RelayResult<T> = Result<T, RelayError>;

/// Failures a room event handler can hit. None of these reach the client.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("room store failure: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("connection {0} is gone")]
    InvalidTarget(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}
