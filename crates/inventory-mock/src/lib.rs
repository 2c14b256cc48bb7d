//! In-memory implementation of the inventory traits for local runs and tests.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::{Error, Result};

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use fleet_inventory::{DetailProvider, IdentifierSource, InstanceDetail, InstanceId};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct State {
    order: Vec<InstanceId>,
    details: HashMap<InstanceId, InstanceDetail>,
    failures: HashMap<InstanceId, String>,
    delays: HashMap<InstanceId, Duration>,
    listing_failure: Option<String>,
}

impl State {
    fn register(&mut self, id: &InstanceId) {
        if !self.order.contains(id) {
            self.order.push(id.clone());
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fetches: AtomicUsize,
}

/// A mock fleet which serves both identifiers and instance details from memory.
#[derive(Clone, Debug, Default)]
pub struct MockInventory {
    state: Arc<Mutex<State>>,
    counters: Arc<Counters>,
    latency: Duration,
}

impl MockInventory {
    /// Creates an empty mock fleet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a fleet from a JSON file holding an array of instance details.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_fixture_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_fixture_str(&json)
    }

    /// Loads a fleet from a JSON array of instance details.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed.
    pub fn from_fixture_str(json: &str) -> Result<Self> {
        let details: Vec<InstanceDetail> = serde_json::from_str(json)?;

        let mut state = State::default();
        for detail in details {
            state.register(&detail.id);
            state.details.insert(detail.id.clone(), detail);
        }

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            ..Self::default()
        })
    }

    /// Adds a fixed delay to every fetch.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Adds or replaces an instance.
    pub async fn insert(&self, detail: InstanceDetail) {
        let mut state = self.state.lock().await;
        state.register(&detail.id);
        state.details.insert(detail.id.clone(), detail);
    }

    /// Makes every fetch of `id` fail. The id is still listed.
    pub async fn fail(&self, id: impl Into<InstanceId>, message: impl Into<String>) {
        let id = id.into();
        let mut state = self.state.lock().await;
        state.register(&id);
        state.failures.insert(id, message.into());
    }

    /// Delays fetches of `id` by `delay` instead of the fleet-wide latency.
    pub async fn delay(&self, id: impl Into<InstanceId>, delay: Duration) {
        self.state.lock().await.delays.insert(id.into(), delay);
    }

    /// Makes listing fail.
    pub async fn fail_listing(&self, message: impl Into<String>) {
        self.state.lock().await.listing_failure = Some(message.into());
    }

    /// Number of fetches currently executing.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of fetches observed executing at the same time.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    /// Total number of fetches started.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.counters.fetches.load(Ordering::SeqCst)
    }

    async fn lookup(&self, id: &InstanceId) -> (Duration, Result<InstanceDetail>) {
        let state = self.state.lock().await;
        let delay = state.delays.get(id).copied().unwrap_or(self.latency);

        let result = if let Some(message) = state.failures.get(id) {
            Err(Error::Injected {
                id: id.to_string(),
                message: message.clone(),
            })
        } else {
            state
                .details
                .get(id)
                .cloned()
                .ok_or_else(|| Error::NotFound(id.to_string()))
        };

        (delay, result)
    }
}

struct InFlightGuard<'a>(&'a Counters);

impl<'a> InFlightGuard<'a> {
    fn enter(counters: &'a Counters) -> Self {
        counters.fetches.fetch_add(1, Ordering::SeqCst);
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentifierSource for MockInventory {
    type Error = Error;

    async fn list_identifiers(&self) -> Result<Vec<InstanceId>> {
        let state = self.state.lock().await;

        if let Some(message) = &state.listing_failure {
            return Err(Error::Listing(message.clone()));
        }

        Ok(state.order.clone())
    }
}

#[async_trait]
impl DetailProvider for MockInventory {
    type Error = Error;

    async fn fetch_detail(&self, id: &InstanceId) -> Result<InstanceDetail> {
        let _guard = InFlightGuard::enter(&self.counters);

        let (delay, result) = self.lookup(id).await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        debug!(%id, ok = result.is_ok(), "mock fetch");
        result
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_list_in_insertion_order() {
        let inventory = MockInventory::new();
        inventory.insert(InstanceDetail::new("b")).await;
        inventory.insert(InstanceDetail::new("a")).await;
        inventory.fail("c", "boom").await;

        let ids = inventory.list_identifiers().await.unwrap();

        assert_eq!(
            ids,
            vec![
                InstanceId::from("b"),
                InstanceId::from("a"),
                InstanceId::from("c")
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_known_and_failing() {
        let inventory = MockInventory::new();
        inventory
            .insert(InstanceDetail::new("a").with_tag("team", "x"))
            .await;
        inventory.fail("b", "boom").await;

        let detail = inventory.fetch_detail(&"a".into()).await.unwrap();
        assert_eq!(detail.group_key("team"), Some("x"));

        assert!(matches!(
            inventory.fetch_detail(&"b".into()).await,
            Err(Error::Injected { message, .. }) if message == "boom"
        ));
        assert!(matches!(
            inventory.fetch_detail(&"zzz".into()).await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(inventory.fetch_count(), 3);
        assert_eq!(inventory.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_listing_failure() {
        let inventory = MockInventory::new();
        inventory.fail_listing("unauthorized").await;

        assert!(matches!(
            inventory.list_identifiers().await,
            Err(Error::Listing(_))
        ));
    }

    #[tokio::test]
    async fn test_from_fixture_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{
                    "id": "vm-1",
                    "tags": {{"team": "search"}},
                    "statuses": [{{"code": "PowerState/running"}}],
                    "disks": [{{"name": "os", "time": "2024-03-01T00:00:00Z"}}]
                }},
                {{"id": "vm-2"}}
            ]"#
        )
        .unwrap();

        let inventory = MockInventory::from_fixture_file(file.path()).unwrap();
        let ids = inventory.list_identifiers().await.unwrap();
        let detail = inventory.fetch_detail(&"vm-1".into()).await.unwrap();

        assert_eq!(ids.len(), 2);
        assert_eq!(
            detail.created_at().unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).single()
        );
    }

    #[tokio::test]
    async fn test_high_water_mark() {
        let inventory = MockInventory::new().with_latency(Duration::from_millis(20));
        inventory.insert(InstanceDetail::new("a")).await;
        inventory.insert(InstanceDetail::new("b")).await;

        let (a_id, b_id) = (InstanceId::from("a"), InstanceId::from("b"));
        let (a, b) = tokio::join!(inventory.fetch_detail(&a_id), inventory.fetch_detail(&b_id));

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(inventory.max_in_flight(), 2);
        assert_eq!(inventory.in_flight(), 0);
    }
}
