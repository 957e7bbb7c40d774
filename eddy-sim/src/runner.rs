//! Alternates dispatch passes and delivery steps until the swarm completes.

use eddy_core::swarm::MemoryDownload;
use eddy_core::{Download, PassReport, SchedulerConfig, SimulationConfig, Swarm};
use serde::Serialize;

use crate::SimulationError;
use crate::delivery::{DeliveryModel, DeliveryStats};
use crate::generator::SwarmGenerator;

/// Offset mixed into the seed so delivery draws from its own stream.
const DELIVERY_STREAM: u64 = 0x9e37_79b9_7f4a_7c15;

/// Final state of one simulated download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadOutcome {
    /// Hex-encoded info hash
    pub info_hash: String,
    pub pieces: u32,
    pub completed_pieces: u32,
    pub complete: bool,
}

/// Result of a simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    /// Seed used for reproduction
    pub seed: u64,
    /// Dispatch passes executed
    pub passes: u32,
    /// Whether every download completed within the pass limit
    pub completed: bool,
    /// Dispatch counters summed over all passes
    pub dispatch: PassReport,
    /// Delivery counters summed over all steps
    pub delivery: DeliveryStats,
    pub downloads: Vec<DownloadOutcome>,
}

impl SimulationReport {
    /// Generates human-readable summary.
    pub fn summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str(&format!("Simulation Report (seed: {})\n", self.seed));
        summary.push_str(&format!("Passes: {}\n", self.passes));
        summary.push_str(&format!("Completed: {}\n", self.completed));

        summary.push_str("\nDispatch:\n");
        summary.push_str(&format!(
            "  Requests accepted: {}\n  Requests rejected: {}\n  Cancels sent: {}\n",
            self.dispatch.requests_accepted,
            self.dispatch.requests_rejected,
            self.dispatch.cancels_sent
        ));
        summary.push_str(&format!(
            "  Pieces over budget: {}\n  Interest cleared: {}\n",
            self.dispatch.pieces_over_budget, self.dispatch.interest_cleared
        ));

        summary.push_str("\nDelivery:\n");
        summary.push_str(&format!(
            "  Chunks delivered: {}\n  Duplicate chunks: {}\n  Unchokes: {}\n  Chokes: {}\n",
            self.delivery.chunks_delivered,
            self.delivery.duplicate_chunks,
            self.delivery.unchokes,
            self.delivery.chokes
        ));

        summary.push_str("\nDownloads:\n");
        for download in &self.downloads {
            summary.push_str(&format!(
                "  {}: {}/{} pieces{}\n",
                download.info_hash,
                download.completed_pieces,
                download.pieces,
                if download.complete { " (complete)" } else { "" }
            ));
        }

        summary
    }
}

/// Runs a seeded simulation to completion or to the pass limit.
pub struct SimulationRunner {
    simulation: SimulationConfig,
    scheduler: SchedulerConfig,
}

impl SimulationRunner {
    pub fn new(simulation: SimulationConfig, scheduler: SchedulerConfig) -> Self {
        Self {
            simulation,
            scheduler,
        }
    }

    /// Generates the swarm and runs it.
    ///
    /// # Errors
    /// - `SimulationError::InvalidConfig` - Configuration cannot produce a swarm
    /// - `SimulationError::Swarm` - Generated downloads collide
    pub fn run(&self) -> Result<SimulationReport, SimulationError> {
        let mut swarm = SwarmGenerator::new(self.simulation.clone()).generate()?;
        Ok(self.run_swarm(&mut swarm))
    }

    /// Runs an existing swarm, leaving it in its final state.
    pub fn run_swarm(&self, swarm: &mut Swarm<MemoryDownload>) -> SimulationReport {
        let mut delivery = DeliveryModel::new(self.simulation.seed ^ DELIVERY_STREAM);
        let mut dispatch_totals = PassReport::default();
        let mut delivery_totals = DeliveryStats::default();
        let mut passes = 0;

        while passes < self.simulation.max_passes && !is_swarm_complete(swarm) {
            let report = swarm.run_pass(&self.scheduler);
            dispatch_totals.accumulate(&report);
            passes += 1;

            let stats = delivery.step(swarm.downloads_mut());
            delivery_totals.accumulate(&stats);
        }

        let completed = is_swarm_complete(swarm);
        if completed {
            tracing::debug!("Simulation completed after {} passes", passes);
        } else {
            tracing::warn!(
                "Simulation stopped at pass limit {} before completion",
                self.simulation.max_passes
            );
        }

        SimulationReport {
            seed: self.simulation.seed,
            passes,
            completed,
            dispatch: dispatch_totals,
            delivery: delivery_totals,
            downloads: swarm.downloads().iter().map(outcome).collect(),
        }
    }
}

fn is_swarm_complete(swarm: &Swarm<MemoryDownload>) -> bool {
    swarm.downloads().iter().all(MemoryDownload::is_complete)
}

fn outcome(download: &MemoryDownload) -> DownloadOutcome {
    DownloadOutcome {
        info_hash: download.info_hash().to_string(),
        pieces: download.piece_count(),
        completed_pieces: download.completed_piece_count(),
        complete: download.is_complete(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_small_swarm_completes() {
        let runner = SimulationRunner::new(
            SimulationConfig::deterministic_testing(),
            SchedulerConfig::default(),
        );

        let report = runner.run().unwrap();

        assert!(report.completed);
        assert!(report.passes > 0);
        assert!(report.downloads.iter().all(|download| download.complete));
        assert!(report.delivery.chunks_delivered > 0);
    }

    #[test]
    fn test_run_pass_limit_reached_not_completed() {
        // More chunks than four peer queues can hold
        let simulation = SimulationConfig {
            max_passes: 1,
            pieces_per_download: 64,
            ..SimulationConfig::deterministic_testing()
        };
        let report = SimulationRunner::new(simulation, SchedulerConfig::default())
            .run()
            .unwrap();

        assert_eq!(report.passes, 1);
        assert!(!report.completed);
    }

    #[test]
    fn test_run_exhausted_budget_requests_nothing() {
        let simulation = SimulationConfig {
            storage_budget: Some(0),
            max_passes: 20,
            ..SimulationConfig::deterministic_testing()
        };
        let report = SimulationRunner::new(simulation, SchedulerConfig::default())
            .run()
            .unwrap();

        assert!(!report.completed);
        assert_eq!(report.dispatch.requests_accepted, 0);
        assert!(report.dispatch.pieces_over_budget > 0);
    }

    #[test]
    fn test_summary_lists_every_download() {
        let report = SimulationRunner::new(
            SimulationConfig::deterministic_testing(),
            SchedulerConfig::default(),
        )
        .run()
        .unwrap();

        let summary = report.summary();

        assert!(summary.contains("Simulation Report (seed: 7)"));
        for download in &report.downloads {
            assert!(summary.contains(&download.info_hash));
        }
    }
}
