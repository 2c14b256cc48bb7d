const POWER_PREFIX: &str = "PowerState";
const PROVISIONING_PREFIX: &str = "ProvisioningState";

/// The kind of fact a status entry reports, taken from its code prefix.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StatusKind {
    /// `ProvisioningState/<label>`
    Provisioning,

    /// `PowerState/<label>`
    Power,

    /// Any other status code.
    Other,
}

impl StatusKind {
    /// Classifies a raw status code.
    #[must_use]
    pub fn classify(code: &str) -> Self {
        match code.split_once('/').map(|(prefix, _)| prefix.trim()) {
            Some(POWER_PREFIX) => Self::Power,
            Some(PROVISIONING_PREFIX) => Self::Provisioning,
            _ => Self::Other,
        }
    }
}

/// Returns the trimmed label following the first `/` of a status code, or the
/// whole trimmed code if it has no separator.
///
/// `PowerState/deallocated` yields `deallocated`.
#[must_use]
pub fn power_label(code: &str) -> &str {
    code.split_once('/')
        .map_or(code, |(_, label)| label)
        .trim()
}
