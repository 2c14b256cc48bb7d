use std::collections::HashMap;

use chrono::{DateTime, Utc};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use crate::error::MalformedRecord;
use crate::status::StatusKind;

/// Opaque name of one compute instance.
#[derive(
    Clone, Debug, Deserialize, Display, Eq, From, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Creates a new instance identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One status fact reported for an instance.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct InstanceStatus {
    /// Raw status code, e.g. `PowerState/running`.
    pub code: String,

    /// When the status was last set, if reported.
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

impl InstanceStatus {
    /// Classifies the status by its code prefix.
    #[must_use]
    pub fn kind(&self) -> StatusKind {
        StatusKind::classify(&self.code)
    }
}

/// Status of an attached disk.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DiskStatus {
    /// Disk name.
    #[serde(default)]
    pub name: String,

    /// Time of the disk's first status entry, i.e. when it was provisioned.
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

/// Detailed runtime state of one instance as fetched from the control plane.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct InstanceDetail {
    /// The instance identifier.
    pub id: InstanceId,

    /// Tags attached to the instance.
    #[serde(default)]
    pub tags: HashMap<String, String>,

    /// All status facts in control-plane order.
    #[serde(default)]
    pub statuses: Vec<InstanceStatus>,

    /// Attached disks in control-plane order.
    #[serde(default)]
    pub disks: Vec<DiskStatus>,
}

impl InstanceDetail {
    /// Creates an empty record for the given instance.
    pub fn new(id: impl Into<InstanceId>) -> Self {
        Self {
            id: id.into(),
            tags: HashMap::new(),
            statuses: Vec::new(),
            disks: Vec::new(),
        }
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Appends a status entry.
    #[must_use]
    pub fn with_status(mut self, code: impl Into<String>, time: Option<DateTime<Utc>>) -> Self {
        self.statuses.push(InstanceStatus {
            code: code.into(),
            time,
        });
        self
    }

    /// Appends a disk.
    #[must_use]
    pub fn with_disk(mut self, name: impl Into<String>, time: Option<DateTime<Utc>>) -> Self {
        self.disks.push(DiskStatus {
            name: name.into(),
            time,
        });
        self
    }

    /// The value of the given tag, if the instance carries it.
    #[must_use]
    pub fn group_key(&self, tag: &str) -> Option<&str> {
        self.tags.get(tag).map(String::as_str)
    }

    /// The first status entry of the given kind.
    #[must_use]
    pub fn status(&self, kind: StatusKind) -> Option<&InstanceStatus> {
        self.statuses.iter().find(|status| status.kind() == kind)
    }

    /// The provisioning status entry.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord::MissingProvisioningStatus` if there is none.
    pub fn provisioning_status(&self) -> Result<&InstanceStatus, MalformedRecord> {
        self.status(StatusKind::Provisioning)
            .ok_or(MalformedRecord::MissingProvisioningStatus)
    }

    /// The power status entry.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord::MissingPowerStatus` if there is none.
    pub fn power_status(&self) -> Result<&InstanceStatus, MalformedRecord> {
        self.status(StatusKind::Power)
            .ok_or(MalformedRecord::MissingPowerStatus)
    }

    /// Creation time of the instance, taken from its first disk.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord::MissingDisk` if no disk is attached.
    pub fn created_at(&self) -> Result<Option<DateTime<Utc>>, MalformedRecord> {
        self.disks
            .first()
            .map(|disk| disk.time)
            .ok_or(MalformedRecord::MissingDisk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).single()
    }

    #[test]
    fn test_lookup_by_kind_ignores_position() {
        let detail = InstanceDetail::new("vm-1")
            .with_status("PowerState/running", at(2))
            .with_status("OSState/generalized", None)
            .with_status("ProvisioningState/succeeded", at(1));

        assert_eq!(detail.power_status().unwrap().code, "PowerState/running");
        assert_eq!(detail.provisioning_status().unwrap().time, at(1));
    }

    #[test]
    fn test_missing_statuses() {
        let detail = InstanceDetail::new("vm-1").with_status("ProvisioningState/succeeded", at(1));

        assert_eq!(
            detail.power_status(),
            Err(MalformedRecord::MissingPowerStatus)
        );
        assert_eq!(detail.created_at(), Err(MalformedRecord::MissingDisk));
    }

    #[test]
    fn test_group_key() {
        let detail = InstanceDetail::new("vm-1").with_tag("team", "search");

        assert_eq!(detail.group_key("team"), Some("search"));
        assert_eq!(detail.group_key("owner"), None);
    }

    #[test]
    fn test_deserialize_fixture_record() {
        let json = r#"{
            "id": "vm-1",
            "tags": {"team": "search"},
            "statuses": [
                {"code": "ProvisioningState/succeeded", "time": "2024-03-01T01:00:00Z"},
                {"code": "PowerState/running"}
            ],
            "disks": [{"name": "os", "time": "2024-03-01T00:00:00Z"}]
        }"#;

        let detail: InstanceDetail = serde_json::from_str(json).unwrap();

        assert_eq!(detail.id, InstanceId::new("vm-1"));
        assert_eq!(detail.power_status().unwrap().time, None);
        assert_eq!(detail.created_at().unwrap(), at(0));
    }
}
