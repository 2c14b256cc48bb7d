//! Grouping and reduction of fetched instance details into per-group summaries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use fleet_inventory::{InstanceDetail, InstanceId, MalformedRecord, RUNNING, power_label};
use tracing::warn;

use crate::config::MergePolicy;

/// Group key used for instances which do not carry the grouping tag.
pub const UNGROUPED_KEY: &str = "ungrouped";

/// Summary of every instance sharing one group key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GroupSummary {
    /// The group key.
    pub key: String,

    /// Power label of the representative member, e.g. `running`.
    pub power_state: String,

    /// Number of members currently running.
    pub allocated: usize,

    /// Creation time of the representative member.
    pub created_at: Option<DateTime<Utc>>,

    /// Last provisioning-state change within the group.
    pub last_changed_at: Option<DateTime<Utc>>,

    /// Members in the order they were folded.
    pub members: Vec<InstanceId>,
}

/// Output of reducing a batch of details.
#[derive(Clone, Debug, Default)]
pub struct Reduction {
    /// One summary per group key, ordered by key.
    pub summaries: BTreeMap<String, GroupSummary>,

    /// Members which could not be summarised.
    pub malformed: Vec<(InstanceId, MalformedRecord)>,
}

/// The fields of one member which feed its group's summary.
#[derive(Clone, Debug)]
struct MemberState {
    id: InstanceId,
    power_state: String,
    provisioned_at: Option<DateTime<Utc>>,
    powered_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
}

impl MemberState {
    fn from_detail(detail: &InstanceDetail) -> Result<Self, MalformedRecord> {
        let provisioning = detail.provisioning_status()?;
        let power = detail.power_status()?;

        Ok(Self {
            id: detail.id.clone(),
            power_state: power_label(&power.code).to_string(),
            provisioned_at: provisioning.time,
            powered_at: power.time,
            created_at: detail.created_at()?,
        })
    }

    fn is_running(&self) -> bool {
        self.power_state == RUNNING
    }

    /// Ordering used by `MergePolicy::MostRecent`. Members without any status
    /// time rank lowest; ties go to the larger id.
    fn rank(&self) -> (Option<DateTime<Utc>>, &InstanceId) {
        (self.powered_at.or(self.provisioned_at), &self.id)
    }
}

struct Accumulator {
    summary: GroupSummary,
    leader: MemberState,
}

impl Accumulator {
    fn seed(key: String, member: MemberState) -> Self {
        let summary = GroupSummary {
            key,
            power_state: member.power_state.clone(),
            allocated: usize::from(member.is_running()),
            created_at: member.created_at,
            last_changed_at: member.provisioned_at,
            members: vec![member.id.clone()],
        };

        Self {
            summary,
            leader: member,
        }
    }

    fn absorb(&mut self, member: MemberState, policy: MergePolicy) {
        let summary = &mut self.summary;

        if member.is_running() {
            summary.allocated += 1;
        }
        summary.members.push(member.id.clone());

        match policy {
            MergePolicy::LastProcessed => {
                if member.provisioned_at.is_some() {
                    summary.last_changed_at = member.provisioned_at;
                }
                self.take_lead(member);
            }
            MergePolicy::MostRecent => {
                summary.last_changed_at = summary.last_changed_at.max(member.provisioned_at);
                if member.rank() > self.leader.rank() {
                    self.take_lead(member);
                }
            }
        }
    }

    fn take_lead(&mut self, member: MemberState) {
        self.summary.power_state.clone_from(&member.power_state);
        self.summary.created_at = member.created_at;
        self.leader = member;
    }
}

/// Partitions `details` by the value of `group_tag` and folds each partition
/// into a `GroupSummary`. Members are folded in iteration order.
///
/// Details without the tag are grouped under [`UNGROUPED_KEY`]. Details lacking
/// a provisioning status, a power status or a disk are left out of every group
/// and reported in `Reduction::malformed`.
pub fn reduce<I>(details: I, group_tag: &str, policy: MergePolicy) -> Reduction
where
    I: IntoIterator<Item = InstanceDetail>,
{
    let mut groups: BTreeMap<String, Accumulator> = BTreeMap::new();
    let mut malformed = Vec::new();

    for detail in details {
        let key = detail
            .group_key(group_tag)
            .unwrap_or(UNGROUPED_KEY)
            .to_string();

        let member = match MemberState::from_detail(&detail) {
            Ok(member) => member,
            Err(reason) => {
                warn!(id = %detail.id, %reason, "excluding malformed instance record");
                malformed.push((detail.id, reason));
                continue;
            }
        };

        match groups.get_mut(&key) {
            Some(group) => group.absorb(member, policy),
            None => {
                groups.insert(key.clone(), Accumulator::seed(key, member));
            }
        }
    }

    Reduction {
        summaries: groups
            .into_iter()
            .map(|(key, group)| (key, group.summary))
            .collect(),
        malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).single()
    }

    fn instance(
        id: &str,
        team: &str,
        power: &str,
        provisioned: Option<DateTime<Utc>>,
        powered: Option<DateTime<Utc>>,
        created: Option<DateTime<Utc>>,
    ) -> InstanceDetail {
        InstanceDetail::new(id)
            .with_tag("team", team)
            .with_status("ProvisioningState/succeeded", provisioned)
            .with_status(format!("PowerState/{power}"), powered)
            .with_disk("os", created)
    }

    #[test]
    fn test_single_instance() {
        let detail = instance("vm-1", "a", "running", at(1), at(2), at(0));

        let reduction = reduce([detail], "team", MergePolicy::LastProcessed);
        let summary = &reduction.summaries["a"];

        assert_eq!(summary.power_state, "running");
        assert_eq!(summary.allocated, 1);
        assert_eq!(summary.created_at, at(0));
        assert_eq!(summary.last_changed_at, at(1));
        assert_eq!(summary.members, vec![InstanceId::from("vm-1")]);
    }

    #[test]
    fn test_last_processed_overwrites() {
        let details = [
            instance("vm-1", "a", "running", at(5), at(5), at(1)),
            instance("vm-2", "a", "deallocated", at(3), at(3), at(2)),
            instance("vm-3", "a", "running", None, None, at(4)),
        ];

        let reduction = reduce(details, "team", MergePolicy::LastProcessed);
        let summary = &reduction.summaries["a"];

        assert_eq!(summary.power_state, "running");
        assert_eq!(summary.allocated, 2);
        assert_eq!(summary.created_at, at(4));
        // vm-3 has no provisioning time, so vm-2's stays.
        assert_eq!(summary.last_changed_at, at(3));
    }

    #[test]
    fn test_most_recent_ignores_order() {
        let details = vec![
            instance("vm-1", "a", "deallocated", at(9), at(9), at(1)),
            instance("vm-2", "a", "running", at(3), at(3), at(2)),
            instance("vm-3", "a", "stopped", None, None, at(4)),
        ];
        let mut reversed = details.clone();
        reversed.reverse();

        let forward = reduce(details, "team", MergePolicy::MostRecent);
        let backward = reduce(reversed, "team", MergePolicy::MostRecent);

        let summary = &forward.summaries["a"];
        assert_eq!(summary.power_state, "deallocated");
        assert_eq!(summary.created_at, at(1));
        assert_eq!(summary.last_changed_at, at(9));
        assert_eq!(summary.allocated, 1);

        let other = &backward.summaries["a"];
        assert_eq!(other.power_state, summary.power_state);
        assert_eq!(other.created_at, summary.created_at);
        assert_eq!(other.last_changed_at, summary.last_changed_at);
        assert_eq!(other.allocated, summary.allocated);
    }

    #[test]
    fn test_most_recent_tie_goes_to_larger_id() {
        let details = [
            instance("vm-b", "a", "running", at(1), at(1), at(0)),
            instance("vm-a", "a", "stopped", at(1), at(1), at(0)),
        ];

        let reduction = reduce(details, "team", MergePolicy::MostRecent);

        assert_eq!(reduction.summaries["a"].power_state, "running");
    }

    #[test]
    fn test_allocated_is_order_independent() {
        let mut details = vec![
            instance("vm-1", "a", "running", at(1), at(1), at(0)),
            instance("vm-2", "a", "deallocated", at(2), at(2), at(0)),
            instance("vm-3", "a", "running", at(3), at(3), at(0)),
            instance("vm-4", "a", "stopped", at(4), at(4), at(0)),
        ];

        for _ in 0..details.len() {
            details.rotate_left(1);
            for policy in [MergePolicy::LastProcessed, MergePolicy::MostRecent] {
                let reduction = reduce(details.clone(), "team", policy);
                assert_eq!(reduction.summaries["a"].allocated, 2);
            }
        }
    }

    #[test]
    fn test_missing_tag_is_ungrouped() {
        let tagged = instance("vm-1", "a", "running", at(1), at(1), at(0));
        let untagged = InstanceDetail::new("vm-2")
            .with_status("ProvisioningState/succeeded", at(1))
            .with_status("PowerState/running", at(1))
            .with_disk("os", at(0));

        let reduction = reduce([tagged, untagged], "team", MergePolicy::MostRecent);

        assert_eq!(reduction.summaries.len(), 2);
        assert_eq!(
            reduction.summaries[UNGROUPED_KEY].members,
            vec![InstanceId::from("vm-2")]
        );
    }

    #[test]
    fn test_malformed_members_are_excluded() {
        let good = instance("vm-1", "a", "running", at(1), at(1), at(0));
        let one_status = InstanceDetail::new("vm-2")
            .with_tag("team", "a")
            .with_status("ProvisioningState/succeeded", at(1))
            .with_disk("os", at(0));
        let diskless = InstanceDetail::new("vm-3")
            .with_tag("team", "b")
            .with_status("ProvisioningState/succeeded", at(1))
            .with_status("PowerState/running", at(1));

        let reduction = reduce([good, one_status, diskless], "team", MergePolicy::LastProcessed);

        assert_eq!(reduction.summaries.len(), 1);
        assert_eq!(reduction.summaries["a"].allocated, 1);
        assert_eq!(
            reduction.malformed,
            vec![
                (InstanceId::from("vm-2"), MalformedRecord::MissingPowerStatus),
                (InstanceId::from("vm-3"), MalformedRecord::MissingDisk),
            ]
        );
    }

    #[test]
    fn test_power_status_alone_is_malformed() {
        let good = instance("vm-1", "a", "running", at(1), at(1), at(0));
        let unprovisioned = InstanceDetail::new("vm-2")
            .with_tag("team", "a")
            .with_status("PowerState/running", at(1))
            .with_disk("os", at(0));

        let reduction = reduce([good, unprovisioned], "team", MergePolicy::MostRecent);

        assert_eq!(reduction.summaries["a"].allocated, 1);
        assert_eq!(reduction.summaries["a"].members, vec![InstanceId::from("vm-1")]);
        assert_eq!(
            reduction.malformed,
            vec![(InstanceId::from("vm-2"), MalformedRecord::MissingProvisioningStatus)]
        );
    }

    #[test]
    fn test_status_order_does_not_matter() {
        let detail = InstanceDetail::new("vm-1")
            .with_tag("team", "a")
            .with_status("PowerState/deallocated", at(2))
            .with_status("ProvisioningState/succeeded", at(1))
            .with_disk("os", at(0));

        let reduction = reduce([detail], "team", MergePolicy::MostRecent);
        let summary = &reduction.summaries["a"];

        assert_eq!(summary.power_state, "deallocated");
        assert_eq!(summary.allocated, 0);
        assert_eq!(summary.last_changed_at, at(1));
    }
}
