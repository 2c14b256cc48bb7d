use thiserror::Error;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors delivering a report.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Writing to the local output failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The webhook answered with a non-success status.
    #[error("webhook returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}
