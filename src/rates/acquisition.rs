//! Scheduled rate refresh with bounded retries.
//!
//! States move `Idle -> Fetching -> Idle` on success and
//! `Fetching -> Retrying -> Fetching` on failure until the retry policy is
//! exhausted, at which point the state is `GivenUp`. Readers always see the
//! last complete snapshot through a watch channel; a failed refresh never
//! clears it.

use super::backoff::RetryPolicy;
use super::source::RateSource;
use super::store::RateStore;
use crate::conversion::rates::{RateSnapshot, RateTable};
use crate::conversion::{ConversionEngine, FormatOptions};
use crate::error::PriceScanResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Where the refresh cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AcquisitionState {
    Idle,
    Fetching,
    Retrying { attempt: u32, delay_ms: u64 },
    GivenUp,
}

/// Observable refresh status.
///
/// `given_up` stays set until the next successful refresh; stale rates
/// remain usable meanwhile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateStatus {
    pub state: AcquisitionState,
    pub last_error: Option<String>,
    pub given_up: bool,
    pub fetched_at: Option<DateTime<Utc>>,
    pub retry_attempt: u32,
}

impl Default for RateStatus {
    fn default() -> Self {
        Self {
            state: AcquisitionState::Idle,
            last_error: None,
            given_up: false,
            fetched_at: None,
            retry_attempt: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionSettings {
    pub refresh_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(300),
            retry: RetryPolicy::default(),
        }
    }
}

/// Outcome of a [`RateAcquisition::refresh`] call.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Updated(Arc<RateSnapshot>),
    /// Another refresh was already running.
    AlreadyRunning,
}

/// Clears the in-flight flag when a refresh cycle ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct RateAcquisition {
    fiat: Arc<dyn RateSource>,
    crypto: Arc<dyn RateSource>,
    store: Arc<dyn RateStore>,
    settings: AcquisitionSettings,
    in_flight: AtomicBool,
    force: Notify,
    snapshot_tx: watch::Sender<Option<Arc<RateSnapshot>>>,
    status_tx: watch::Sender<RateStatus>,
}

impl RateAcquisition {
    pub fn new(
        fiat: Arc<dyn RateSource>,
        crypto: Arc<dyn RateSource>,
        store: Arc<dyn RateStore>,
        settings: AcquisitionSettings,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(None);
        let (status_tx, _) = watch::channel(RateStatus::default());
        Self {
            fiat,
            crypto,
            store,
            settings,
            in_flight: AtomicBool::new(false),
            force: Notify::new(),
            snapshot_tx,
            status_tx,
        }
    }

    pub fn settings(&self) -> &AcquisitionSettings {
        &self.settings
    }

    /// The last complete snapshot, if any.
    pub fn current(&self) -> Option<Arc<RateSnapshot>> {
        self.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<RateSnapshot>>> {
        self.snapshot_tx.subscribe()
    }

    pub fn status(&self) -> RateStatus {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<RateStatus> {
        self.status_tx.subscribe()
    }

    /// A conversion engine over the current snapshot.
    pub fn engine(&self, options: FormatOptions) -> Option<ConversionEngine> {
        self.current()
            .map(|snapshot| ConversionEngine::with_options(Arc::new(snapshot.rates.clone()), options))
    }

    /// Publishes the persisted snapshot, if any, for a cold start.
    ///
    /// Returns true when that snapshot is younger than the refresh interval
    /// so the first fetch can wait for the timer.
    pub fn load_persisted(&self) -> bool {
        let snapshot = match self.store.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return false,
            Err(err) => {
                warn!(error = %err, "Ignoring unreadable persisted rates");
                return false;
            }
        };

        let max_age = chrono::Duration::from_std(self.settings.refresh_interval)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let fresh = snapshot.is_fresh(Utc::now(), max_age);
        info!(fetched_at = %snapshot.fetched_at, fresh, "Serving persisted rates");

        self.status_tx
            .send_modify(|status| status.fetched_at = Some(snapshot.fetched_at));
        self.snapshot_tx.send_replace(Some(Arc::new(snapshot)));
        fresh
    }

    /// Requests an immediate refresh from the background task.
    ///
    /// Cancels a pending backoff wait. Ignored while a fetch is in progress.
    pub fn force_refresh(&self) {
        if self.status_tx.borrow().state == AcquisitionState::Fetching {
            debug!("Refresh already in progress");
            return;
        }
        self.force.notify_one();
    }

    /// Both sources concurrently, merged into one timestamped snapshot.
    pub async fn fetch_once(&self) -> PriceScanResult<RateSnapshot> {
        let (fiat, crypto) = tokio::try_join!(self.fiat.fetch(), self.crypto.fetch())?;
        debug!(
            fiat = fiat.len(),
            crypto = crypto.len(),
            "Fetched rates from {} and {}",
            self.fiat.name(),
            self.crypto.name()
        );
        Ok(RateSnapshot::new(RateTable::merge(fiat, crypto), Utc::now()))
    }

    /// Runs one refresh cycle, retrying with backoff.
    ///
    /// Returns the last error once retries are exhausted. Calls made while a
    /// cycle is already running return [`RefreshOutcome::AlreadyRunning`].
    pub async fn refresh(&self) -> PriceScanResult<RefreshOutcome> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return Ok(RefreshOutcome::AlreadyRunning);
        }
        let _in_flight = InFlight(&self.in_flight);

        let mut attempt = 0;
        loop {
            self.status_tx.send_modify(|status| {
                status.state = AcquisitionState::Fetching;
                status.retry_attempt = attempt;
            });

            let err = match self.fetch_once().await {
                Ok(snapshot) => return Ok(RefreshOutcome::Updated(self.publish(snapshot))),
                Err(err) => err,
            };

            attempt += 1;
            let message = err.to_string();
            match self.settings.retry.delay_for_attempt(attempt) {
                Some(delay) => {
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %message, "Rate refresh failed, retrying");
                    self.status_tx.send_modify(|status| {
                        status.state = AcquisitionState::Retrying {
                            attempt,
                            delay_ms: delay.as_millis() as u64,
                        };
                        status.retry_attempt = attempt;
                        status.last_error = Some(message);
                    });
                    tokio::select! {
                        _ = time::sleep(delay) => {}
                        _ = self.force.notified() => debug!("Backoff cancelled by forced refresh"),
                    }
                }
                None => {
                    error!(attempts = attempt, error = %message, "Giving up on rate refresh");
                    self.status_tx.send_modify(|status| {
                        status.state = AcquisitionState::GivenUp;
                        status.given_up = true;
                        status.retry_attempt = attempt;
                        status.last_error = Some(message);
                    });
                    return Err(err);
                }
            }
        }
    }

    fn publish(&self, snapshot: RateSnapshot) -> Arc<RateSnapshot> {
        if let Err(err) = self.store.save(&snapshot) {
            warn!(error = %err, "Failed to persist rates");
        }

        let fetched_at = snapshot.fetched_at;
        let snapshot = Arc::new(snapshot);
        self.snapshot_tx.send_replace(Some(Arc::clone(&snapshot)));
        self.status_tx.send_replace(RateStatus {
            state: AcquisitionState::Idle,
            last_error: None,
            given_up: false,
            fetched_at: Some(fetched_at),
            retry_attempt: 0,
        });
        info!(rates = snapshot.rates.len(), "Rates refreshed");
        snapshot
    }

    /// Starts the timer-driven refresh loop on the current runtime.
    ///
    /// A fresh persisted snapshot postpones the first fetch by one interval.
    pub fn spawn(self: Arc<Self>) -> AcquisitionHandle {
        let acquisition = Arc::clone(&self);
        let task = tokio::spawn(async move {
            let period = self.settings.refresh_interval;
            let start = if self.load_persisted() {
                Instant::now() + period
            } else {
                Instant::now()
            };
            let mut ticker = time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = self.force.notified() => ticker.reset(),
                }
                if let Err(err) = self.refresh().await {
                    warn!(error = %err, "Rate refresh cycle failed");
                }
            }
        });

        AcquisitionHandle { acquisition, task }
    }
}

/// Handle to a running refresh loop.
pub struct AcquisitionHandle {
    acquisition: Arc<RateAcquisition>,
    task: JoinHandle<()>,
}

impl AcquisitionHandle {
    pub fn acquisition(&self) -> &Arc<RateAcquisition> {
        &self.acquisition
    }

    pub fn force_refresh(&self) {
        self.acquisition.force_refresh();
    }

    /// Stops the loop; the last snapshot stays readable.
    pub async fn shutdown(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}
