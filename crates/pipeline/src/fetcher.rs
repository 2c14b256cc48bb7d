//! Bounded pool of workers fetching instance details concurrently.
//!
//! Identifiers are queued up front on a job channel sized to the batch, at most
//! `workers` tasks drain it, and every outcome is pushed onto a result channel
//! which the coordinator reads until one outcome per identifier has arrived.

use std::collections::HashMap;
use std::time::Duration;

use fleet_inventory::{DetailProvider, InstanceDetail, InstanceId};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::FetchFailure;

/// Failure message for identifiers still queued after every worker exited.
pub const NO_WORKER_LEFT: &str = "no worker left";

/// Result of fetching one identifier.
#[derive(Clone, Debug)]
pub enum FetchOutcome {
    /// The detail was fetched.
    Fetched(InstanceDetail),

    /// The fetch did not produce a detail.
    Failed {
        /// The identifier which was requested.
        id: InstanceId,
        /// Why it failed.
        failure: FetchFailure,
    },
}

impl FetchOutcome {
    /// The identifier this outcome belongs to.
    #[must_use]
    pub const fn id(&self) -> &InstanceId {
        match self {
            Self::Fetched(detail) => &detail.id,
            Self::Failed { id, .. } => id,
        }
    }
}

/// Fetches every identifier through a pool of at most `config.workers`
/// concurrent fetches. Returns exactly one outcome per identifier, in
/// completion order.
pub async fn fetch_all<P>(
    provider: &P,
    ids: Vec<InstanceId>,
    config: &PipelineConfig,
) -> Vec<FetchOutcome>
where
    P: DetailProvider,
{
    let total = ids.len();
    if total == 0 {
        return Vec::new();
    }

    let mut pending: HashMap<InstanceId, usize> = HashMap::with_capacity(total);
    for id in &ids {
        *pending.entry(id.clone()).or_default() += 1;
    }

    let (job_tx, job_rx) = flume::bounded(total);
    for id in &ids {
        // Capacity matches the batch and `job_rx` is alive, so this cannot fail.
        let _ = job_tx.send(id.clone());
    }
    drop(job_tx);

    let (result_tx, mut result_rx) = mpsc::channel(total);
    let worker_count = config.workers.get().min(total);
    let mut workers = JoinSet::new();

    for worker in 0..worker_count {
        let jobs = job_rx.clone();
        let results = result_tx.clone();
        let provider = provider.clone();
        let fetch_timeout = config.fetch_timeout;

        workers.spawn(async move {
            while let Ok(id) = jobs.recv_async().await {
                debug!(worker, %id, "fetching instance detail");
                let outcome = fetch_one(&provider, id.clone(), fetch_timeout).await;

                if results.send((id, outcome)).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(result_tx);

    let mut outcomes = Vec::with_capacity(total);
    let collect = async {
        while outcomes.len() < total {
            match result_rx.recv().await {
                Some((requested, outcome)) => {
                    if let Some(count) = pending.get_mut(&requested) {
                        *count = count.saturating_sub(1);
                    }
                    if let FetchOutcome::Failed { id, failure } = &outcome {
                        warn!(%id, %failure, "failed to fetch instance detail");
                    }
                    outcomes.push(outcome);
                }
                None => break,
            }
        }
    };

    let timed_out = match config.deadline {
        Some(deadline) => tokio::time::timeout(deadline, collect).await.is_err(),
        None => {
            collect.await;
            false
        }
    };

    workers.abort_all();
    let mut worker_failure = None;
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                worker_failure = Some(e.to_string());
            }
        }
    }

    let mut never_started: HashMap<InstanceId, usize> = HashMap::new();
    for id in job_rx.drain() {
        *never_started.entry(id).or_default() += 1;
    }

    if outcomes.len() < total {
        if timed_out {
            warn!(
                collected = outcomes.len(),
                total, "fetch deadline elapsed, summarising partial results"
            );
        }

        for id in ids {
            let Some(count) = pending.get_mut(&id) else {
                continue;
            };
            if *count == 0 {
                continue;
            }
            *count -= 1;

            let queued = never_started.get_mut(&id).filter(|queued| **queued > 0);
            let failure = if timed_out {
                FetchFailure::TimedOut
            } else if let Some(queued) = queued {
                *queued -= 1;
                FetchFailure::Worker(NO_WORKER_LEFT.to_string())
            } else {
                FetchFailure::Worker(
                    worker_failure
                        .clone()
                        .unwrap_or_else(|| "exited before reporting".to_string()),
                )
            };
            outcomes.push(FetchOutcome::Failed { id, failure });
        }
    }

    let failed = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, FetchOutcome::Failed { .. }))
        .count();
    info!(
        total,
        workers = worker_count,
        failed,
        "fetched instance details"
    );

    outcomes
}

async fn fetch_one<P>(provider: &P, id: InstanceId, fetch_timeout: Option<Duration>) -> FetchOutcome
where
    P: DetailProvider,
{
    let fetch = provider.fetch_detail(&id);

    let result = match fetch_timeout {
        Some(limit) => match tokio::time::timeout(limit, fetch).await {
            Ok(result) => result.map_err(|e| FetchFailure::Provider(e.to_string())),
            Err(_) => Err(FetchFailure::TimedOut),
        },
        None => fetch
            .await
            .map_err(|e| FetchFailure::Provider(e.to_string())),
    };

    match result {
        Ok(detail) => FetchOutcome::Fetched(detail),
        Err(failure) => FetchOutcome::Failed { id, failure },
    }
}
