use fleet_inventory::{DetailProviderError, IdentifierSourceError};
use thiserror::Error;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors talking to Azure Resource Manager.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The management endpoint cannot carry a path.
    #[error("invalid management endpoint: {0}")]
    InvalidEndpoint(String),

    /// A payload could not be decoded.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The virtual machine was returned without an instance view.
    #[error("missing instance view for {0}")]
    MissingInstanceView(String),

    /// A `nextLink` could not be parsed.
    #[error(transparent)]
    Url(#[from] url::ParseError),

    /// The control plane answered with a non-success status.
    #[error("request failed with status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

impl DetailProviderError for Error {}
impl IdentifierSourceError for Error {}
