//! Centralized configuration for Eddy.
//!
//! All tunable parameters are defined here to avoid hard-coded values
//! scattered throughout the scheduler and simulator.

use std::time::Duration;

use crate::EddyError;

/// Standard BitTorrent block size requested from peers.
pub const DEFAULT_CHUNK_LENGTH: u32 = 16 * 1024;

/// Central configuration for all Eddy components.
#[derive(Debug, Clone, Default)]
pub struct EddyConfig {
    pub scheduler: SchedulerConfig,
    pub simulation: SimulationConfig,
}

/// Request scheduler configuration.
///
/// Controls the cadence of dispatch passes and optional dispatch behaviour.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Delay between the end of one dispatch pass and the start of the next
    pub pass_interval: Duration,
    /// Leave a chunk alone when any peer of its download already holds a
    /// request for it, instead of re-offering it down the peer ranking
    pub skip_already_requested: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pass_interval: Duration::from_millis(10),
            skip_already_requested: false,
        }
    }
}

impl SchedulerConfig {
    /// Checks that the configuration can drive a scheduler.
    ///
    /// # Errors
    /// - `EddyError::Configuration` - Pass interval is zero
    pub fn validate(&self) -> Result<(), EddyError> {
        if self.pass_interval.is_zero() {
            return Err(EddyError::Configuration {
                reason: "pass interval must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Deterministic swarm simulation parameters.
///
/// Used by the simulator and CLI to generate reproducible swarms.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Seed for the swarm generator
    pub seed: u64,
    /// Number of downloads in the swarm
    pub downloads: usize,
    /// Peers attached to each download
    pub peers_per_download: usize,
    /// Pieces in each download
    pub pieces_per_download: u32,
    /// Length of every piece except possibly the last
    pub piece_length: u32,
    /// Chunk length pieces are split into
    pub chunk_length: u32,
    /// Maximum outstanding requests a simulated peer accepts
    pub peer_queue_depth: usize,
    /// Shared storage budget in bytes per pass (None = unlimited)
    pub storage_budget: Option<u64>,
    /// Upper bound on dispatch passes before giving up
    pub max_passes: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            downloads: 2,
            peers_per_download: 8,
            pieces_per_download: 64,
            piece_length: 256 * 1024, // 256 KiB
            chunk_length: DEFAULT_CHUNK_LENGTH,
            peer_queue_depth: 16,
            storage_budget: None,
            max_passes: 10_000,
        }
    }
}

impl SimulationConfig {
    /// Creates a small configuration for fast deterministic tests.
    pub fn deterministic_testing() -> Self {
        Self {
            seed: 7,
            downloads: 2,
            peers_per_download: 4,
            pieces_per_download: 8,
            piece_length: 64 * 1024,
            chunk_length: DEFAULT_CHUNK_LENGTH,
            peer_queue_depth: 8,
            storage_budget: None,
            max_passes: 1_000,
        }
    }
}

impl EddyConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Unparsable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(interval) = std::env::var("EDDY_PASS_INTERVAL_MS")
            && let Ok(millis) = interval.parse::<u64>()
        {
            config.scheduler.pass_interval = Duration::from_millis(millis);
        }

        if let Ok(skip) = std::env::var("EDDY_SKIP_ALREADY_REQUESTED") {
            config.scheduler.skip_already_requested = skip.parse().unwrap_or(false);
        }

        if let Ok(seed) = std::env::var("EDDY_SIMULATION_SEED")
            && let Ok(seed_value) = seed.parse::<u64>()
        {
            config.simulation.seed = seed_value;
        }

        config
    }

    /// Creates a configuration optimized for testing.
    pub fn for_testing() -> Self {
        Self {
            scheduler: SchedulerConfig {
                pass_interval: Duration::from_millis(1),
                ..Default::default()
            },
            simulation: SimulationConfig::deterministic_testing(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = EddyConfig::default();

        assert_eq!(config.scheduler.pass_interval, Duration::from_millis(10));
        assert!(!config.scheduler.skip_already_requested);
        assert_eq!(config.simulation.chunk_length, 16384);
        assert_eq!(config.simulation.storage_budget, None);
    }

    #[test]
    fn test_validate_zero_interval_rejected() {
        let config = SchedulerConfig {
            pass_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EddyError::Configuration { .. })
        ));
        assert!(SchedulerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_testing_preset_small_swarm() {
        let config = EddyConfig::for_testing();
        assert_eq!(config.scheduler.pass_interval, Duration::from_millis(1));
        assert_eq!(config.simulation.pieces_per_download, 8);
        assert_eq!(config.simulation.seed, 7);
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("EDDY_PASS_INTERVAL_MS", "25");
            std::env::set_var("EDDY_SKIP_ALREADY_REQUESTED", "true");
            std::env::set_var("EDDY_SIMULATION_SEED", "12345");
        }

        let config = EddyConfig::from_env();

        assert_eq!(config.scheduler.pass_interval, Duration::from_millis(25));
        assert!(config.scheduler.skip_already_requested);
        assert_eq!(config.simulation.seed, 12345);

        // Cleanup
        unsafe {
            std::env::remove_var("EDDY_PASS_INTERVAL_MS");
            std::env::remove_var("EDDY_SKIP_ALREADY_REQUESTED");
            std::env::remove_var("EDDY_SIMULATION_SEED");
        }
    }
}
