//! Background task that runs dispatch passes on a fixed cadence.
//!
//! Each iteration locks the swarm, runs one pass, releases the lock and then
//! waits for either the pass interval to elapse or shutdown to be requested,
//! whichever comes first. Shutdown is observed between passes only; a pass in
//! progress always finishes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{PassReport, SchedulerError, SharedSwarm, Swarm};
use crate::config::SchedulerConfig;
use crate::swarm::Download;

/// Lifecycle of a spawned scheduler task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Stopped,
}

/// What a scheduler task did over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerSummary {
    pub passes: u64,
    pub totals: PassReport,
}

/// Periodic request scheduler over a shared swarm.
pub struct Scheduler<D> {
    swarm: SharedSwarm<D>,
    config: SchedulerConfig,
    passes: Arc<AtomicU64>,
    stopped: Arc<AtomicBool>,
}

impl<D> Scheduler<D>
where
    D: Download + Send + 'static,
{
    /// Creates a scheduler over `swarm`. Nothing runs until [`Scheduler::run`]
    /// or [`Scheduler::spawn`].
    pub fn new(swarm: SharedSwarm<D>, config: SchedulerConfig) -> Self {
        Self {
            swarm,
            config,
            passes: Arc::new(AtomicU64::new(0)),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawns the scheduler on the current tokio runtime.
    ///
    /// The returned handle owns the shutdown signal; dropping it also stops
    /// the task after the pass in progress.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let passes = Arc::clone(&self.passes);
        let stopped = Arc::clone(&self.stopped);

        let task = tokio::spawn(self.run(shutdown_rx));

        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
            passes,
            stopped,
        }
    }

    /// Runs passes until `shutdown` reads true or its sender is dropped.
    ///
    /// The first pass starts immediately. A shutdown already requested when
    /// the loop starts still lets that first pass complete.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> SchedulerSummary {
        tracing::debug!(
            "Request scheduler started (interval {:?}, skip already requested: {})",
            self.config.pass_interval,
            self.config.skip_already_requested
        );

        let mut summary = SchedulerSummary::default();
        loop {
            let report = run_locked(&self.swarm, &self.config);
            summary.passes = self.passes.fetch_add(1, Ordering::Relaxed) + 1;
            summary.totals.accumulate(&report);
            tracing::trace!(?report, "Dispatch pass finished");

            tokio::select! {
                biased;
                () = shutdown_requested(&mut shutdown) => break,
                () = tokio::time::sleep(self.config.pass_interval) => {}
            }
        }

        self.stopped.store(true, Ordering::Release);
        tracing::debug!("Request scheduler stopped after {} passes", summary.passes);
        summary
    }
}

/// Runs one pass with the swarm locked. The guard never outlives this call.
fn run_locked<D: Download>(swarm: &Mutex<Swarm<D>>, config: &SchedulerConfig) -> PassReport {
    swarm.lock().run_pass(config)
}

/// Resolves once shutdown is requested or the sender side is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|&stop| stop).await;
}

/// Handle to a spawned [`Scheduler`] task.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<SchedulerSummary>,
    passes: Arc<AtomicU64>,
    stopped: Arc<AtomicBool>,
}

impl SchedulerHandle {
    /// Number of passes completed so far.
    pub fn passes_completed(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Current lifecycle state of the task.
    pub fn state(&self) -> SchedulerState {
        if self.stopped.load(Ordering::Acquire) || self.task.is_finished() {
            SchedulerState::Stopped
        } else {
            SchedulerState::Running
        }
    }

    /// Requests shutdown and waits for the pass in progress to finish.
    ///
    /// # Errors
    /// - `SchedulerError::TaskFailed` - The scheduler task panicked or was aborted
    pub async fn shutdown(self) -> Result<SchedulerSummary, SchedulerError> {
        // A send error only means the task already exited
        let _ = self.shutdown.send(true);

        self.task.await.map_err(|e| SchedulerError::TaskFailed {
            reason: e.to_string(),
        })
    }
}
