//! Background provisioning poller
//!
//! Periodically scans for resources in a reconciling status and drives each
//! through one engine tick. Concurrency is bounded by a semaphore and an
//! in-flight set guarantees at most one tick per resource at a time, so the
//! engine never races itself on a snapshot.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::model::{AccountRequest, AccountRequestStatus, EnvironmentStatus, TeamEnvironment};
use crate::reconciler::{Reconciler, TickOutcome};
use crate::repository::ResourceRepository;

/// Poller configuration.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Milliseconds between scan rounds.
    pub poll_interval_ms: u64,
    /// Maximum ticks in flight at once.
    pub concurrency: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            concurrency: 8,
        }
    }
}

/// Which collection a scanned resource belongs to.
#[derive(Debug, Clone, Copy)]
enum ResourceKind {
    AccountRequest,
    Environment,
}

/// The background poller. Construct, then call [`ProvisioningPoller::run`] on
/// a dedicated task; flip the shutdown flag to stop.
pub struct ProvisioningPoller {
    reconciler: Arc<Reconciler>,
    requests: Arc<dyn ResourceRepository<AccountRequest>>,
    environments: Arc<dyn ResourceRepository<TeamEnvironment>>,
    config: PollerConfig,
    shutdown: Arc<AtomicBool>,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
    semaphore: Arc<tokio::sync::Semaphore>,
}

impl ProvisioningPoller {
    pub fn new(
        reconciler: Arc<Reconciler>,
        requests: Arc<dyn ResourceRepository<AccountRequest>>,
        environments: Arc<dyn ResourceRepository<TeamEnvironment>>,
        config: PollerConfig,
    ) -> Self {
        let semaphore = Arc::new(tokio::sync::Semaphore::new(config.concurrency));
        Self {
            reconciler,
            requests,
            environments,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            semaphore,
        }
    }

    /// Handle for requesting shutdown from another task.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Main loop. Returns after shutdown is requested and all in-flight ticks
    /// have drained.
    pub async fn run(&self) {
        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            concurrency = self.config.concurrency,
            "Provisioning poller started"
        );
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            if let Err(e) = self.scan_and_dispatch().await {
                error!(error = %e, "Poller scan failed");
            }
        }

        // Drain: taking every permit means every spawned tick has finished.
        let _ = self
            .semaphore
            .acquire_many(self.config.concurrency as u32)
            .await;
        info!("Provisioning poller stopped");
    }

    /// One scan round: collect every reconciling resource and dispatch a tick
    /// for each that is not already being worked on.
    #[instrument(skip(self))]
    async fn scan_and_dispatch(&self) -> Result<(), crate::repository::RepoError> {
        let mut work = Vec::new();

        for status in AccountRequestStatus::all() {
            if status.is_terminal() {
                continue;
            }
            for request in self.requests.find_by_status(status.as_str()).await? {
                work.push((ResourceKind::AccountRequest, *request.id.as_uuid()));
            }
        }
        for status in EnvironmentStatus::all() {
            if !status.is_reconciling() {
                continue;
            }
            for environment in self.environments.find_by_status(status.as_str()).await? {
                work.push((ResourceKind::Environment, *environment.id.as_uuid()));
            }
        }

        if !work.is_empty() {
            debug!(count = work.len(), "Dispatching reconciliation ticks");
        }
        for (kind, id) in work {
            self.dispatch(kind, id).await;
        }
        Ok(())
    }

    async fn dispatch(&self, kind: ResourceKind, id: Uuid) {
        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
            if !in_flight.insert(id) {
                // Previous tick for this resource is still running.
                return;
            }
        }

        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                // Closed semaphore; release the reservation so the resource
                // stays eligible for future scans.
                let mut in_flight = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
                in_flight.remove(&id);
                return;
            }
        };
        let reconciler = self.reconciler.clone();
        let in_flight = self.in_flight.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let result = match kind {
                ResourceKind::AccountRequest => reconciler.tick_account_request(id).await,
                ResourceKind::Environment => reconciler.tick_environment(id).await,
            };
            match result {
                Ok(TickOutcome::Advanced) => debug!(resource_id = %id, "Tick advanced resource"),
                Ok(TickOutcome::Pending) => debug!(resource_id = %id, "Tick pending"),
                Ok(TickOutcome::Terminal) => {}
                Err(e) => warn!(resource_id = %id, error = %e, "Tick failed"),
            }
            let mut in_flight = in_flight.lock().unwrap_or_else(|p| p.into_inner());
            in_flight.remove(&id);
        });
    }
}
