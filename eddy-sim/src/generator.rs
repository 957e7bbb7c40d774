//! Seeded swarm generation.

use eddy_core::swarm::{MemoryDownload, MemoryPeer};
use eddy_core::{InfoHash, PieceIndex, PiecePriority, SimulationConfig, StorageBudget, Swarm};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::SimulationError;

/// Chance that a non-seeding peer has any given piece.
const PIECE_COVERAGE: f64 = 0.6;

/// Chance that a peer beyond the first seeds the whole download.
const SEEDER_PROBABILITY: f64 = 0.25;

/// Chance that a generated peer starts out choking us.
const INITIAL_CHOKE_PROBABILITY: f64 = 0.3;

/// Leading pieces of each download raised to readahead priority.
const READAHEAD_PIECES: u32 = 4;

/// Slowest and fastest generated download rates in bytes per second.
const MIN_PEER_RATE: f64 = 16.0 * 1024.0;
const MAX_PEER_RATE: f64 = 4.0 * 1024.0 * 1024.0;

/// Builds reproducible swarms from a [`SimulationConfig`].
///
/// Each download gets a random info hash, a truncated final piece, a mix of
/// piece priorities and peers with random rates and bitfields. Peer 0 of
/// every download is a seeder so every wanted piece is obtainable. With a
/// storage budget configured, one budget is shared by every download.
pub struct SwarmGenerator {
    config: SimulationConfig,
    rng: ChaCha8Rng,
}

impl SwarmGenerator {
    /// Creates a generator seeded from `config.seed`.
    pub fn new(config: SimulationConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self { config, rng }
    }

    /// Generates the swarm.
    ///
    /// # Errors
    /// - `SimulationError::InvalidConfig` - A count or length in the configuration is zero
    /// - `SimulationError::Swarm` - Two generated downloads share an info hash
    pub fn generate(&mut self) -> Result<Swarm<MemoryDownload>, SimulationError> {
        self.validate()?;

        let budget = self.config.storage_budget.map(StorageBudget::fixed);
        let mut swarm = Swarm::new();
        for _ in 0..self.config.downloads {
            let mut download = self.generate_download();
            if let Some(budget) = &budget {
                download = download.with_storage_budget(budget.clone());
            }
            swarm.add_download(download)?;
        }

        tracing::debug!(
            "Generated swarm of {} downloads (seed {})",
            swarm.len(),
            self.config.seed
        );
        Ok(swarm)
    }

    fn validate(&self) -> Result<(), SimulationError> {
        let config = &self.config;
        let zero_field = [
            ("downloads", config.downloads == 0),
            ("peers_per_download", config.peers_per_download == 0),
            ("pieces_per_download", config.pieces_per_download == 0),
            ("piece_length", config.piece_length == 0),
            ("chunk_length", config.chunk_length == 0),
            ("peer_queue_depth", config.peer_queue_depth == 0),
        ]
        .into_iter()
        .find_map(|(name, is_zero)| is_zero.then_some(name));

        match zero_field {
            Some(name) => Err(SimulationError::InvalidConfig {
                reason: format!("{name} must be greater than zero"),
            }),
            None => Ok(()),
        }
    }

    fn generate_download(&mut self) -> MemoryDownload {
        let piece_count = self.config.pieces_per_download;
        let piece_length = self.config.piece_length;
        let tail_shortfall = u64::from(self.rng.random_range(0..piece_length));
        let total_length = u64::from(piece_count) * u64::from(piece_length) - tail_shortfall;

        let mut download = MemoryDownload::new(
            InfoHash::new(self.rng.random()),
            total_length,
            piece_length,
        )
        .with_chunk_length(self.config.chunk_length);

        for index in 0..piece_count {
            let priority = self.piece_priority(index);
            download.set_piece_priority(PieceIndex::new(index), priority);
        }

        for peer_index in 0..self.config.peers_per_download {
            let peer = self.generate_peer(piece_count, peer_index == 0);
            download.add_peer(peer);
        }

        download
    }

    fn piece_priority(&mut self, index: u32) -> PiecePriority {
        if index == 0 {
            return PiecePriority::NOW;
        }
        if index < READAHEAD_PIECES {
            return PiecePriority::READAHEAD;
        }
        match self.rng.random_range(0..10) {
            0 => PiecePriority::NONE,
            1 | 2 => PiecePriority::HIGH,
            _ => PiecePriority::NORMAL,
        }
    }

    fn generate_peer(&mut self, piece_count: u32, force_seeder: bool) -> MemoryPeer {
        let rate = self.rng.random_range(MIN_PEER_RATE..MAX_PEER_RATE);
        let seeder = force_seeder || self.rng.random_bool(SEEDER_PROBABILITY);

        let mut peer = if seeder {
            MemoryPeer::seeder(piece_count)
        } else {
            let pieces: Vec<u32> = (0..piece_count)
                .filter(|_| self.rng.random_bool(PIECE_COVERAGE))
                .collect();
            MemoryPeer::new(piece_count).unchoked().with_pieces(pieces)
        };

        if self.rng.random_bool(INITIAL_CHOKE_PROBABILITY) {
            peer.set_choking(true);
        }

        peer.with_download_rate(rate)
            .with_queue_depth(self.config.peer_queue_depth)
    }
}
