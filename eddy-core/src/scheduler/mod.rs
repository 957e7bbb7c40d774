//! Request scheduling across every active download
//!
//! A [`Swarm`] owns the downloads; [`Swarm::run_pass`] performs one dispatch
//! pass synchronously, and [`Scheduler`] drives passes on a fixed cadence
//! from a background task.

pub mod admission;
pub mod dispatch;
pub mod driver;
pub mod peer_ranking;
pub mod piece_order;

use std::sync::Arc;

use parking_lot::Mutex;

pub use admission::AdmissionTracker;
pub use dispatch::{PassReport, run_pass};
pub use driver::{Scheduler, SchedulerHandle, SchedulerState, SchedulerSummary};
pub use peer_ranking::PeerRanking;
pub use piece_order::{DownloadSlot, PieceRecord, RequestOrder};

use crate::config::SchedulerConfig;
use crate::swarm::{Download, InfoHash};

/// Errors from swarm bookkeeping and the scheduler task.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Download not found: {info_hash}")]
    DownloadNotFound { info_hash: InfoHash },

    #[error("Download already scheduled: {info_hash}")]
    DuplicateDownload { info_hash: InfoHash },

    #[error("Scheduler task failed: {reason}")]
    TaskFailed { reason: String },
}

/// Swarm shared between the scheduler task and the rest of the client.
///
/// The lock is held for the duration of one pass and released while the
/// scheduler waits for the next one.
pub type SharedSwarm<D> = Arc<Mutex<Swarm<D>>>;

/// Every download the scheduler serves, in insertion order.
#[derive(Debug)]
pub struct Swarm<D> {
    downloads: Vec<D>,
}

impl<D> Default for Swarm<D> {
    fn default() -> Self {
        Self {
            downloads: Vec::new(),
        }
    }
}

impl<D: Download> Swarm<D> {
    /// Creates an empty swarm.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a download to be scheduled from the next pass on.
    ///
    /// # Errors
    /// - `SchedulerError::DuplicateDownload` - A download with the same info hash exists
    pub fn add_download(&mut self, download: D) -> Result<(), SchedulerError> {
        let info_hash = download.info_hash();
        if self.download(info_hash).is_some() {
            return Err(SchedulerError::DuplicateDownload { info_hash });
        }

        tracing::debug!("Scheduling download {}", info_hash);
        self.downloads.push(download);
        Ok(())
    }

    /// Removes a download and returns it.
    ///
    /// # Errors
    /// - `SchedulerError::DownloadNotFound` - No download has this info hash
    pub fn remove_download(&mut self, info_hash: InfoHash) -> Result<D, SchedulerError> {
        let position = self
            .downloads
            .iter()
            .position(|download| download.info_hash() == info_hash)
            .ok_or(SchedulerError::DownloadNotFound { info_hash })?;

        tracing::debug!("Unscheduling download {}", info_hash);
        Ok(self.downloads.remove(position))
    }

    /// Looks up a download by info hash.
    pub fn download(&self, info_hash: InfoHash) -> Option<&D> {
        self.downloads
            .iter()
            .find(|download| download.info_hash() == info_hash)
    }

    /// Looks up a download by info hash for mutation.
    pub fn download_mut(&mut self, info_hash: InfoHash) -> Option<&mut D> {
        self.downloads
            .iter_mut()
            .find(|download| download.info_hash() == info_hash)
    }

    /// All downloads in insertion order.
    pub fn downloads(&self) -> &[D] {
        &self.downloads
    }

    /// All downloads in insertion order, mutably.
    pub fn downloads_mut(&mut self) -> &mut [D] {
        &mut self.downloads
    }

    pub fn len(&self) -> usize {
        self.downloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.downloads.is_empty()
    }

    /// Runs one dispatch pass over every download.
    pub fn run_pass(&mut self, config: &SchedulerConfig) -> PassReport {
        run_pass(&mut self.downloads, config)
    }

    /// Wraps the swarm for sharing with a [`Scheduler`].
    pub fn into_shared(self) -> SharedSwarm<D> {
        Arc::new(Mutex::new(self))
    }
}
