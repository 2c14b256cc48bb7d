use std::error::Error;
use std::fmt::Debug;

use thiserror::Error as ThisError;

/// Marker trait for `IdentifierSource` errors.
pub trait IdentifierSourceError: Debug + Error + Send + Sync + 'static {}

/// Marker trait for `DetailProvider` errors.
pub trait DetailProviderError: Debug + Error + Send + Sync + 'static {}

/// A fetched record which lacks a status fact needed to summarise it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ThisError)]
pub enum MalformedRecord {
    /// No `ProvisioningState/*` entry in the status sequence.
    #[error("missing provisioning status")]
    MissingProvisioningStatus,

    /// No `PowerState/*` entry in the status sequence.
    #[error("missing power status")]
    MissingPowerStatus,

    /// No disk attached to the instance.
    #[error("no attached disk")]
    MissingDisk,
}
