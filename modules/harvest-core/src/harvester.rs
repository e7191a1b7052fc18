//! One harvest run end to end: derive the place, load what is already
//! known, drive a session through the right collector, persist the result.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use serde::Serialize;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::collect::{collect_cold, collect_unordered, collect_warm, Collected, CollectionPath};
use crate::config::HarvestConfig;
use crate::error::{HarvestError, Result};
use crate::identity::ExistingIdentitySet;
use crate::persist::{CommitReport, Persistence};
use crate::place::PlaceId;
use crate::session::{ContentSession, SessionFactory};
use crate::snapshot::load_existing;
use crate::surface::{ReviewSurface, SessionSurface};

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestOutcome {
    pub place: PlaceId,
    pub path: CollectionPath,
    pub new_reviews: usize,
    pub reveal_steps: usize,
    pub commit: CommitReport,
}

impl HarvestOutcome {
    /// Non-fatal problems worth reporting to the caller.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.path == CollectionPath::Unsorted {
            out.push("listing could not be sorted newest first; filtered the full list".to_string());
        }
        out.extend(self.commit.warnings());
        out
    }
}

pub struct Harvester {
    config: Arc<HarvestConfig>,
    sessions: Arc<dyn SessionFactory>,
    persistence: Persistence,
    /// Runs on the same place are serialized; the snapshot is read-modify-write.
    place_locks: PlaceLocks,
}

impl Harvester {
    pub fn new(
        config: Arc<HarvestConfig>,
        sessions: Arc<dyn SessionFactory>,
        persistence: Persistence,
    ) -> Self {
        Self {
            config,
            sessions,
            persistence,
            place_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Collect reviews added since the last run on `url` and persist them.
    pub async fn run(&self, url: &str) -> Result<HarvestOutcome> {
        let url = url.trim();
        if url.is_empty() {
            return Err(HarvestError::InvalidInput("url is required".to_string()));
        }

        let place = PlaceId::from_url(url);
        let span = tracing::info_span!("harvest", run_id = %Uuid::new_v4(), place = %place);
        self.run_place(url, place).instrument(span).await
    }

    async fn run_place(&self, url: &str, place: PlaceId) -> Result<HarvestOutcome> {
        let lease = self.lease_place(&place);
        let _guard = lease.lock.lock().await;

        let mut identities = load_existing(self.persistence.flat(), place.as_str()).await;

        let session = self.sessions.open().await?;
        let collected = AssertUnwindSafe(self.collect(session.as_ref(), url, &mut identities))
            .catch_unwind()
            .await;
        if let Err(e) = session.close().await {
            warn!(error = %e, "Session close failed");
        }
        let collected = match collected {
            Ok(result) => result?,
            Err(panic) => std::panic::resume_unwind(panic),
        };

        let commit = self.persistence.commit(&collected.reviews, &place).await;
        info!(
            path = %collected.path,
            new = collected.reviews.len(),
            reveal_steps = collected.reveal_steps,
            "Harvest complete"
        );

        Ok(HarvestOutcome {
            place,
            path: collected.path,
            new_reviews: collected.reviews.len(),
            reveal_steps: collected.reveal_steps,
            commit,
        })
    }

    async fn collect(
        &self,
        session: &dyn ContentSession,
        url: &str,
        identities: &mut ExistingIdentitySet,
    ) -> Result<Collected> {
        let opts = &self.config.collection;
        let surface = SessionSurface::new(session, &self.config.selectors, &self.config.timing);
        surface.open(url).await?;

        let order = match surface.sort_newest_first().await {
            Ok(order) => Some(order),
            Err(e) => {
                warn!(error = %e, "Could not sort listing newest first");
                None
            }
        };

        if identities.is_empty() {
            info!("No existing snapshot, revealing the full listing");
            return collect_cold(&surface, identities, opts).await;
        }

        info!(known = identities.len(), "Existing snapshot found, collecting new reviews only");
        match order {
            Some(order) => {
                let (collected, stop) = collect_warm(&surface, identities, order, opts).await?;
                info!(stop = ?stop, "Warm pass stopped");
                Ok(collected)
            }
            None => collect_unordered(&surface, identities, opts).await,
        }
    }

    fn lease_place(&self, place: &PlaceId) -> PlaceLease<'_> {
        let mut locks = self
            .place_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        PlaceLease {
            locks: &self.place_locks,
            place: place.clone(),
            lock: locks.entry(place.clone()).or_default().clone(),
        }
    }
}

type PlaceLocks = Mutex<HashMap<PlaceId, Arc<tokio::sync::Mutex<()>>>>;

/// Shared handle on a place's lock. The last lease to go removes the map
/// entry, so the map only holds places with a run in flight.
struct PlaceLease<'a> {
    locks: &'a PlaceLocks,
    place: PlaceId,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for PlaceLease<'_> {
    fn drop(&mut self) {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // One reference in the map, one here: nobody else holds or waits.
        let last = locks
            .get(&self.place)
            .is_some_and(|l| Arc::ptr_eq(l, &self.lock) && Arc::strong_count(&self.lock) == 2);
        if last {
            locks.remove(&self.place);
        }
    }
}
