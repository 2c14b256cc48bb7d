//! Wire types for the Azure Resource Manager compute API.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use fleet_inventory::{DiskStatus, InstanceDetail, InstanceStatus};
use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachinePage {
    #[serde(default)]
    pub value: Vec<VirtualMachine>,

    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VirtualMachine {
    pub name: String,

    #[serde(default)]
    pub tags: HashMap<String, String>,

    #[serde(default)]
    pub properties: Option<VirtualMachineProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineProperties {
    pub instance_view: Option<InstanceView>,
}

#[derive(Debug, Deserialize)]
pub struct InstanceView {
    #[serde(default)]
    pub statuses: Vec<StatusPayload>,

    #[serde(default)]
    pub disks: Vec<DiskPayload>,
}

#[derive(Debug, Deserialize)]
pub struct StatusPayload {
    #[serde(default)]
    pub code: String,

    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct DiskPayload {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub statuses: Vec<StatusPayload>,
}

impl TryFrom<VirtualMachine> for InstanceDetail {
    type Error = Error;

    fn try_from(vm: VirtualMachine) -> Result<Self> {
        let view = vm
            .properties
            .and_then(|properties| properties.instance_view)
            .ok_or_else(|| Error::MissingInstanceView(vm.name.clone()))?;

        Ok(Self {
            id: vm.name.into(),
            tags: vm.tags,
            statuses: view
                .statuses
                .into_iter()
                .map(|status| InstanceStatus {
                    code: status.code,
                    time: status.time,
                })
                .collect(),
            disks: view
                .disks
                .into_iter()
                .map(|disk| DiskStatus {
                    time: disk.statuses.first().and_then(|status| status.time),
                    name: disk.name,
                })
                .collect(),
        })
    }
}
