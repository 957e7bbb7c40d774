//! Eddy Simulation - Deterministic swarms for exercising the request scheduler
//!
//! Generates reproducible in-memory swarms from a seed, alternates dispatch
//! passes with simulated chunk delivery, and reports what happened. The same
//! seed and configuration always produce an identical [`SimulationReport`].
//!
//! ```rust,no_run
//! use eddy_core::{SchedulerConfig, SimulationConfig};
//! use eddy_sim::SimulationRunner;
//!
//! # fn main() -> Result<(), eddy_sim::SimulationError> {
//! let runner = SimulationRunner::new(SimulationConfig::default(), SchedulerConfig::default());
//! let report = runner.run()?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod delivery;
pub mod generator;
pub mod runner;

pub use delivery::{DeliveryModel, DeliveryStats};
use eddy_core::SchedulerError;
pub use generator::SwarmGenerator;
pub use runner::{DownloadOutcome, SimulationReport, SimulationRunner};

/// Errors that can occur while setting up or running a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// Configuration cannot produce a usable swarm
    #[error("Invalid simulation configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration
        reason: String,
    },

    /// Swarm bookkeeping rejected a generated download
    #[error("Swarm setup failed: {0}")]
    Swarm(#[from] SchedulerError),
}
