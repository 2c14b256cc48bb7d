use fleet_inventory::{DetailProviderError, IdentifierSourceError};
use thiserror::Error;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the mock inventory.
#[derive(Debug, Error)]
pub enum Error {
    /// A fetch failure registered with `MockInventory::fail`.
    #[error("injected fetch failure for {id}: {message}")]
    Injected {
        /// The instance the failure was registered for.
        id: String,
        /// The registered message.
        message: String,
    },

    /// A listing failure registered with `MockInventory::fail_listing`.
    #[error("injected listing failure: {0}")]
    Listing(String),

    /// The requested instance is unknown to the mock.
    #[error("instance not found: {0}")]
    NotFound(String),

    /// The fixture file could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The fixture could not be parsed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DetailProviderError for Error {}
impl IdentifierSourceError for Error {}
