//! Push scheduler — background task per push target.
//!
//! `schedule` validates the configuration, then spawns a task that ticks
//! at the configured interval for as long as the process runs (or until
//! the returned handle is shut down).
//!
//! Deliveries are awaited inside the task, so two pushes of the same
//! target never overlap. Ticks that fall due while a push is still in
//! flight are dropped rather than queued, and the request timeout
//! defaults to the interval, so a slow collector costs at most one tick.
//!
//! The snapshot and label buffers live for the whole task. The payload is
//! handed to the HTTP client as `Bytes` without copying and taken back
//! once the request completes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::Uri;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use metricpush_labels::{inject, ExtraLabels};

use crate::client::{parse_push_url, PushClient};
use crate::config::PushConfig;
use crate::error::{PushError, PushResult};
use crate::producer::SnapshotProducer;

/// Longest accepted push interval.
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// How long `PushHandle::shutdown` waits for the task before aborting it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A validated push destination.
#[derive(Debug, Clone)]
pub struct PushTarget {
    url: String,
    uri: Uri,
    interval: Duration,
    timeout: Duration,
    extra_labels: ExtraLabels,
}

impl PushTarget {
    /// Validate a config. This is the only place configuration faults are
    /// detected; nothing is re-checked per tick.
    pub fn from_config(config: &PushConfig) -> PushResult<Self> {
        if config.interval.is_zero() || config.interval > MAX_INTERVAL {
            return Err(PushError::InvalidInterval(config.interval));
        }
        let timeout = config.effective_timeout();
        if timeout.is_zero() {
            return Err(PushError::InvalidTimeout(timeout));
        }
        let extra_labels = ExtraLabels::parse(&config.extra_labels)?;
        let uri = parse_push_url(&config.push_url)?;

        Ok(Self {
            url: config.push_url.clone(),
            uri,
            interval: config.interval,
            timeout,
            extra_labels,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn extra_labels(&self) -> &ExtraLabels {
        &self.extra_labels
    }
}

/// Per-target counters, updated by the push task.
#[derive(Debug, Default)]
struct PushStats {
    ticks: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl PushStats {
    fn snapshot(&self) -> PushStatsSnapshot {
        PushStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a target's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushStatsSnapshot {
    /// Ticks handled so far.
    pub ticks: u64,
    /// Pushes answered with 2xx.
    pub delivered: u64,
    /// Pushes that hit a transport error, timeout, or non-2xx status.
    pub failed: u64,
    /// Ticks abandoned before sending because the snapshot could not be
    /// rendered or labelled.
    pub skipped: u64,
}

/// Handle to a running push target.
///
/// Dropping the handle detaches the task: it keeps pushing for the rest
/// of the process lifetime.
#[derive(Debug)]
pub struct PushHandle {
    url: String,
    interval: Duration,
    stats: Arc<PushStats>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PushHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stats(&self) -> PushStatsSnapshot {
        self.stats.snapshot()
    }

    /// Whether the push task has exited. Only true after shutdown.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the push task and wait for it to exit. A push in flight is
    /// abandoned.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut self.task)
            .await
            .is_err()
        {
            warn!(url = %self.url, "metrics push did not stop in time; aborting");
            self.task.abort();
        }
    }
}

/// Start pushing `producer`'s snapshots according to `config`.
///
/// Fails synchronously, without spawning anything, if the config is
/// invalid or no tokio runtime is running. Calling this several times,
/// even with the same URL, starts fully independent targets.
pub fn schedule<P>(config: PushConfig, producer: P) -> PushResult<PushHandle>
where
    P: SnapshotProducer,
{
    let target = PushTarget::from_config(&config)?;
    let runtime = tokio::runtime::Handle::try_current().map_err(|_| PushError::NoRuntime)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let stats = Arc::new(PushStats::default());

    let url = target.url.clone();
    let interval = target.interval;
    let task = runtime.spawn(run_push_loop(target, producer, stats.clone(), shutdown_rx));

    Ok(PushHandle {
        url,
        interval,
        stats,
        shutdown_tx,
        task,
    })
}

/// Owns a set of push targets so they can be stopped together.
#[derive(Debug, Default)]
pub struct PushScheduler {
    targets: Vec<PushHandle>,
}

impl PushScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule one more target. See [`schedule`].
    pub fn schedule<P>(&mut self, config: PushConfig, producer: P) -> PushResult<()>
    where
        P: SnapshotProducer,
    {
        let handle = schedule(config, producer)?;
        self.targets.push(handle);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Counters for every target, in scheduling order.
    pub fn stats(&self) -> Vec<(String, PushStatsSnapshot)> {
        self.targets
            .iter()
            .map(|t| (t.url.clone(), t.stats()))
            .collect()
    }

    /// Stop all targets (for graceful shutdown).
    pub async fn shutdown_all(&mut self) {
        for handle in self.targets.drain(..) {
            handle.shutdown().await;
        }
        info!("all metrics push targets stopped");
    }
}

/// The push loop for a single target.
async fn run_push_loop<P: SnapshotProducer>(
    target: PushTarget,
    producer: P,
    stats: Arc<PushStats>,
    mut shutdown: watch::Receiver<bool>,
) {
    let client = PushClient::new(target.uri.clone(), target.timeout);

    // First push one interval from now, like a plain ticker.
    let mut ticker = tokio::time::interval_at(Instant::now() + target.interval, target.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut snapshot = Vec::new();
    let mut labelled = Vec::new();

    info!(
        url = %target.url,
        interval_ms = target.interval.as_millis() as u64,
        extra_labels = %target.extra_labels,
        "metrics push started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop_requested(&mut shutdown) => break,
        }
        stats.ticks.fetch_add(1, Ordering::Relaxed);

        let Some(payload) = render(&target, &producer, &mut snapshot, &mut labelled) else {
            stats.skipped.fetch_add(1, Ordering::Relaxed);
            continue;
        };

        let body = Bytes::from(std::mem::take(payload));
        let result = tokio::select! {
            result = client.post(body.clone()) => result,
            _ = stop_requested(&mut shutdown) => break,
        };
        *payload = reclaim(body);

        match result {
            Ok(_) => {
                stats.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(url = %target.url, error = %e, "cannot push metrics");
            }
        }
    }

    info!(url = %target.url, "metrics push stopped");
}

/// Resolves once shutdown is signalled. If the handle was dropped instead,
/// never resolves: the target keeps pushing for the process lifetime.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let signalled = shutdown.wait_for(|stop| *stop).await.is_ok();
    if !signalled {
        std::future::pending::<()>().await;
    }
}

/// Take a sent payload's allocation back for the next tick, if the client
/// no longer holds it.
fn reclaim(body: Bytes) -> Vec<u8> {
    match body.try_into_mut() {
        Ok(buf) => Vec::from(buf),
        Err(_) => Vec::new(),
    }
}

/// Render one tick's payload into the task-owned buffers.
///
/// Returns the buffer holding the payload, or `None` if the tick must be
/// skipped; the cause is logged here.
fn render<'a, P: SnapshotProducer>(
    target: &PushTarget,
    producer: &P,
    snapshot: &'a mut Vec<u8>,
    labelled: &'a mut Vec<u8>,
) -> Option<&'a mut Vec<u8>> {
    snapshot.clear();
    if let Err(e) = producer.write_snapshot(snapshot) {
        warn!(url = %target.url, error = %e, "cannot render metrics snapshot");
        return None;
    }

    if target.extra_labels.is_empty() {
        return Some(snapshot);
    }

    labelled.clear();
    match inject(labelled, snapshot, &target.extra_labels) {
        Ok(()) => Some(labelled),
        Err(e) => {
            error!(url = %target.url, error = %e, "BUG: snapshot producer emitted malformed exposition text");
            None
        }
    }
}
