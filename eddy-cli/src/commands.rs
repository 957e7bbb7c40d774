//! CLI command implementations

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Subcommand;
use eddy_core::swarm::MemoryDownload;
use eddy_core::{EddyConfig, Scheduler, SchedulerSummary, SharedSwarm};
use eddy_sim::{DeliveryModel, DeliveryStats, SimulationRunner, SwarmGenerator};
use tokio::sync::watch;
use tracing::info;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a deterministic simulation and print its report
    Simulate {
        #[command(flatten)]
        swarm: SwarmArgs,
        /// Upper bound on dispatch passes
        #[arg(long)]
        max_passes: Option<u32>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the scheduler task against a simulated swarm for a fixed time
    Drive {
        #[command(flatten)]
        swarm: SwarmArgs,
        /// How long to run before shutting the scheduler down
        #[arg(long, default_value = "1000")]
        duration_ms: u64,
        /// Delay between dispatch passes
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Print the scheduler summary as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Swarm and scheduler options shared by every command.
#[derive(clap::Args)]
pub struct SwarmArgs {
    /// Seed for swarm generation
    #[arg(long)]
    seed: Option<u64>,
    /// Number of downloads
    #[arg(long)]
    downloads: Option<usize>,
    /// Peers per download
    #[arg(long)]
    peers: Option<usize>,
    /// Pieces per download
    #[arg(long)]
    pieces: Option<u32>,
    /// Shared storage budget in bytes per pass
    #[arg(long)]
    budget: Option<u64>,
    /// Leave chunks alone that some peer already holds a request for
    #[arg(long)]
    skip_already_requested: bool,
}

impl SwarmArgs {
    /// Applies the arguments over environment-derived configuration.
    fn into_config(self) -> EddyConfig {
        let mut config = EddyConfig::from_env();
        let simulation = &mut config.simulation;
        if let Some(seed) = self.seed {
            simulation.seed = seed;
        }
        if let Some(downloads) = self.downloads {
            simulation.downloads = downloads;
        }
        if let Some(peers) = self.peers {
            simulation.peers_per_download = peers;
        }
        if let Some(pieces) = self.pieces {
            simulation.pieces_per_download = pieces;
        }
        if self.budget.is_some() {
            simulation.storage_budget = self.budget;
        }
        if self.skip_already_requested {
            config.scheduler.skip_already_requested = true;
        }
        config
    }
}

/// Handle the CLI command
///
/// # Errors
/// Returns the error of the command that failed
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Simulate {
            swarm,
            max_passes,
            json,
        } => simulate(swarm, max_passes, json),
        Commands::Drive {
            swarm,
            duration_ms,
            interval_ms,
            json,
        } => drive(swarm, duration_ms, interval_ms, json).await,
    }
}

fn simulate(args: SwarmArgs, max_passes: Option<u32>, json: bool) -> anyhow::Result<()> {
    let mut config = args.into_config();
    if let Some(max_passes) = max_passes {
        config.simulation.max_passes = max_passes;
    }
    config.scheduler.validate()?;

    info!(
        "Simulating {} downloads with seed {}",
        config.simulation.downloads, config.simulation.seed
    );
    let report = SimulationRunner::new(config.simulation, config.scheduler)
        .run()
        .context("Simulation failed")?;
    info!(
        "Simulation finished after {} passes (completed: {})",
        report.passes, report.completed
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.summary());
    }
    Ok(())
}

async fn drive(
    args: SwarmArgs,
    duration_ms: u64,
    interval_ms: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let mut config = args.into_config();
    if let Some(interval_ms) = interval_ms {
        config.scheduler.pass_interval = Duration::from_millis(interval_ms);
    }
    config.scheduler.validate()?;

    let swarm = SwarmGenerator::new(config.simulation.clone())
        .generate()
        .context("Failed to generate swarm")?
        .into_shared();
    let step_interval = config.scheduler.pass_interval;

    let handle = Scheduler::new(Arc::clone(&swarm), config.scheduler).spawn();
    let (stop_tx, stop_rx) = watch::channel(false);
    let delivery = tokio::spawn(run_delivery(
        Arc::clone(&swarm),
        DeliveryModel::new(config.simulation.seed),
        step_interval,
        stop_rx,
    ));

    info!(
        "Scheduler running for {} ms, pass interval {:?}",
        duration_ms, step_interval
    );
    tokio::time::sleep(Duration::from_millis(duration_ms)).await;

    let summary = handle.shutdown().await?;
    // Send only fails if the delivery task already exited
    let _ = stop_tx.send(true);
    let delivered = delivery.await.context("Delivery task failed")?;
    info!("Scheduler stopped after {} passes", summary.passes);

    print_drive_result(&swarm, &summary, &delivered, json)
}

/// Serves outstanding requests between dispatch passes until stopped.
async fn run_delivery(
    swarm: SharedSwarm<MemoryDownload>,
    mut model: DeliveryModel,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) -> DeliveryStats {
    let mut totals = DeliveryStats::default();
    loop {
        tokio::select! {
            biased;
            // Only ever flips to true, and a dropped sender errors out
            _ = stop.changed() => break,
            () = tokio::time::sleep(interval) => {}
        }

        let stats = model.step(swarm.lock().downloads_mut());
        totals.accumulate(&stats);
    }
    totals
}

fn print_drive_result(
    swarm: &SharedSwarm<MemoryDownload>,
    summary: &SchedulerSummary,
    delivered: &DeliveryStats,
    json: bool,
) -> anyhow::Result<()> {
    let guard = swarm.lock();
    let completed = guard
        .downloads()
        .iter()
        .filter(|download| download.is_complete())
        .count();

    if json {
        let output = serde_json::json!({
            "scheduler": summary,
            "delivery": delivered,
            "downloads_completed": completed,
            "downloads": guard.len(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Scheduler ran {} passes", summary.passes);
    println!(
        "Requests accepted: {}, cancels sent: {}, interest cleared: {}",
        summary.totals.requests_accepted,
        summary.totals.cancels_sent,
        summary.totals.interest_cleared
    );
    println!(
        "Chunks delivered: {} ({} duplicate)",
        delivered.chunks_delivered, delivered.duplicate_chunks
    );
    println!("Downloads complete: {}/{}", completed, guard.len());
    Ok(())
}
