//! Simulated chunk delivery between dispatch passes.

use eddy_core::swarm::MemoryDownload;
use eddy_core::{Download, PeerConnection};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

/// Wall-clock time one delivery step stands for, in seconds.
const STEP_SECONDS: f64 = 0.1;

/// Chance per step that a choking peer unchokes us.
const UNCHOKE_PROBABILITY: f64 = 0.2;

/// Chance per step that an unchoked peer chokes us, dropping its queue.
const CHOKE_PROBABILITY: f64 = 0.01;

/// What one or more delivery steps did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    /// Chunks received and newly stored
    pub chunks_delivered: u64,
    /// Chunks received that were already stored
    pub duplicate_chunks: u64,
    pub unchokes: u64,
    pub chokes: u64,
}

impl DeliveryStats {
    /// Adds every counter of `other` to these stats.
    pub fn accumulate(&mut self, other: &DeliveryStats) {
        self.chunks_delivered += other.chunks_delivered;
        self.duplicate_chunks += other.duplicate_chunks;
        self.unchokes += other.unchokes;
        self.chokes += other.chokes;
    }
}

/// Peers serving outstanding requests at their download rate.
///
/// Each step a live, unchoked peer serves `rate * STEP_SECONDS / chunk_length`
/// of its oldest requests; the fractional part is served with matching
/// probability. Choke state flips at random between steps.
pub struct DeliveryModel {
    rng: ChaCha8Rng,
}

impl DeliveryModel {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Runs one delivery step over every download.
    pub fn step(&mut self, downloads: &mut [MemoryDownload]) -> DeliveryStats {
        let mut stats = DeliveryStats::default();
        for download in downloads.iter_mut() {
            self.step_download(download, &mut stats);
        }
        stats
    }

    fn step_download(&mut self, download: &mut MemoryDownload, stats: &mut DeliveryStats) {
        let chunk_length = f64::from(download.chunk_length());

        for peer_index in 0..download.peers().len() {
            let Some(peer) = download.peer_mut(peer_index) else {
                continue;
            };
            if peer.is_closed() {
                continue;
            }

            if peer.is_choking() {
                if self.rng.random_bool(UNCHOKE_PROBABILITY) {
                    peer.set_choking(false);
                    stats.unchokes += 1;
                }
                continue;
            }

            // Never more than the queue holds, so unbounded rates stay finite
            let queued = peer.outstanding_request_count() as f64;
            let budget =
                (peer.download_rate().max(0.0) * STEP_SECONDS / chunk_length).min(queued);
            let mut serve = budget.trunc() as usize;
            if self.rng.random_bool(budget.fract().clamp(0.0, 1.0)) {
                serve += 1;
            }
            let served = peer.take_served_requests(serve);

            if self.rng.random_bool(CHOKE_PROBABILITY) {
                peer.set_choking(true);
                stats.chokes += 1;
            }

            for request in &served {
                if download.deliver(request) {
                    stats.chunks_delivered += 1;
                } else {
                    stats.duplicate_chunks += 1;
                }
            }
        }
    }
}
