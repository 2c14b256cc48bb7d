use fleet_inventory::MalformedRecord;
use thiserror::Error;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors which abort a whole run.
#[derive(Debug, Error)]
pub enum Error {
    /// The identifier source could not list the fleet.
    #[error("failed to list instances: {0}")]
    List(Box<dyn std::error::Error + Send + Sync>),
}

/// Why a single fetch did not produce a record.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum FetchFailure {
    /// The provider returned an error.
    #[error("{0}")]
    Provider(String),

    /// The fetch did not finish within the per-fetch timeout or run deadline.
    #[error("timed out")]
    TimedOut,

    /// The worker handling the fetch stopped without reporting.
    #[error("worker stopped: {0}")]
    Worker(String),
}

/// Why an instance is missing from the summaries.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ExclusionReason {
    /// Its detail could not be fetched.
    #[error("fetch failed: {0}")]
    Fetch(FetchFailure),

    /// Its detail lacked a status fact needed to summarise it.
    #[error("malformed record: {0}")]
    Malformed(MalformedRecord),
}
