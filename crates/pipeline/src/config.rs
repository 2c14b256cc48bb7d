use std::num::NonZeroUsize;
use std::time::Duration;

/// Worker count used when none is configured.
pub const DEFAULT_WORKERS: NonZeroUsize = NonZeroUsize::new(5).unwrap();

/// Rule deciding which member's fields represent a group.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MergePolicy {
    /// The member with the latest power-status time wins; the latest
    /// provisioning time becomes the change time. Independent of fetch order.
    #[default]
    MostRecent,

    /// Whichever member is folded last wins, so the result follows fetch
    /// completion order.
    LastProcessed,
}

/// Settings for one pipeline run.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Maximum number of fetches in flight.
    pub workers: NonZeroUsize,

    /// Tag whose value groups instances together.
    pub group_tag: String,

    /// How each group's representative fields are chosen.
    pub merge_policy: MergePolicy,

    /// Upper bound on a single fetch.
    pub fetch_timeout: Option<Duration>,

    /// Upper bound on the whole fetch phase. Instances still pending when it
    /// elapses are excluded and the rest are summarised.
    pub deadline: Option<Duration>,
}

impl PipelineConfig {
    /// Creates a config grouping by `group_tag` with default settings.
    pub fn new(group_tag: impl Into<String>) -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            group_tag: group_tag.into(),
            merge_policy: MergePolicy::default(),
            fetch_timeout: None,
            deadline: None,
        }
    }

    /// Sets the worker count.
    #[must_use]
    pub const fn with_workers(mut self, workers: NonZeroUsize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the merge policy.
    #[must_use]
    pub const fn with_merge_policy(mut self, merge_policy: MergePolicy) -> Self {
        self.merge_policy = merge_policy;
        self
    }

    /// Sets the per-fetch timeout.
    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Sets the deadline for the fetch phase.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}
