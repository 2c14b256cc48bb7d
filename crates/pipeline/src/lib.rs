//! Concurrent fetch-and-reduce pipeline turning a fleet of instances into
//! per-group power-state summaries.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod error;
pub mod fetcher;
pub mod reduce;

pub use config::{DEFAULT_WORKERS, MergePolicy, PipelineConfig};
pub use error::{Error, ExclusionReason, FetchFailure, Result};
pub use fetcher::{FetchOutcome, NO_WORKER_LEFT, fetch_all};
pub use reduce::{GroupSummary, Reduction, UNGROUPED_KEY, reduce};

use std::collections::BTreeMap;

use fleet_inventory::{DetailProvider, IdentifierSource, InstanceId};
use tracing::info;

/// An instance left out of the summaries.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Exclusion {
    /// The excluded instance.
    pub id: InstanceId,

    /// Why it was excluded.
    pub reason: ExclusionReason,
}

/// Everything produced by one run of the pipeline.
#[derive(Clone, Debug, Default)]
pub struct RunReport {
    /// Number of identifiers fed into the fetch phase.
    pub listed: usize,

    /// One summary per group key, ordered by key.
    pub summaries: BTreeMap<String, GroupSummary>,

    /// Instances which did not make it into any summary.
    pub exclusions: Vec<Exclusion>,
}

impl RunReport {
    /// Number of instances summarised.
    #[must_use]
    pub fn included_count(&self) -> usize {
        self.summaries
            .values()
            .map(|summary| summary.members.len())
            .sum()
    }

    /// Number of instances left out.
    #[must_use]
    pub fn excluded_count(&self) -> usize {
        self.exclusions.len()
    }
}

/// Lists the fleet, fetches every instance and reduces the results.
///
/// # Errors
///
/// Returns `Error::List` if the identifier source fails. Failures of single
/// instances never fail the run; they are reported in `RunReport::exclusions`.
pub async fn run_pipeline<S, P>(source: &S, provider: &P, config: &PipelineConfig) -> Result<RunReport>
where
    S: IdentifierSource,
    P: DetailProvider,
{
    let ids = source
        .list_identifiers()
        .await
        .map_err(|e| Error::List(Box::new(e)))?;

    info!(count = ids.len(), "listed instances");

    Ok(fetch_and_reduce(ids, provider, config).await)
}

/// Fetches the given instances and reduces the results.
pub async fn fetch_and_reduce<P>(
    ids: Vec<InstanceId>,
    provider: &P,
    config: &PipelineConfig,
) -> RunReport
where
    P: DetailProvider,
{
    let listed = ids.len();
    let outcomes = fetch_all(provider, ids, config).await;

    let mut exclusions = Vec::new();
    let mut details = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome {
            FetchOutcome::Fetched(detail) => details.push(detail),
            FetchOutcome::Failed { id, failure } => exclusions.push(Exclusion {
                id,
                reason: ExclusionReason::Fetch(failure),
            }),
        }
    }

    let reduction = reduce(details, &config.group_tag, config.merge_policy);
    exclusions.extend(
        reduction
            .malformed
            .into_iter()
            .map(|(id, malformed)| Exclusion {
                id,
                reason: ExclusionReason::Malformed(malformed),
            }),
    );

    let report = RunReport {
        listed,
        summaries: reduction.summaries,
        exclusions,
    };

    info!(
        groups = report.summaries.len(),
        included = report.included_count(),
        excluded = report.excluded_count(),
        "reduced instance details"
    );

    report
}
