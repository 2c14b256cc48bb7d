//! Abstract interface for enumerating compute instances and fetching their
//! detailed runtime state from a control plane.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod instance;
mod status;

pub use error::{DetailProviderError, IdentifierSourceError, MalformedRecord};
pub use instance::{DiskStatus, InstanceDetail, InstanceId, InstanceStatus};
pub use status::{StatusKind, power_label};

use async_trait::async_trait;

/// Status label reported by instances which are currently allocated and running.
pub const RUNNING: &str = "running";

/// Source of the instance identifiers which make up the fleet.
#[async_trait]
pub trait IdentifierSource
where
    Self: Clone + Send + Sync + 'static,
{
    /// The error type for the identifier source.
    type Error: IdentifierSourceError;

    /// Lists every instance identifier visible to the source.
    async fn list_identifiers(&self) -> Result<Vec<InstanceId>, Self::Error>;
}

/// Provider of per-instance detailed state. Must be safe to call concurrently.
#[async_trait]
pub trait DetailProvider
where
    Self: Clone + Send + Sync + 'static,
{
    /// The error type for the detail provider.
    type Error: DetailProviderError;

    /// Fetches the detailed state of a single instance.
    async fn fetch_detail(&self, id: &InstanceId) -> Result<InstanceDetail, Self::Error>;
}
