//! NR Simulation Telemetry Monitor
mod alerts;
mod config;
mod dashboard;
mod listener;
mod processor;
mod report;
mod resolver;
mod snapshot;
mod stats;
mod store;

use anyhow::Context;
use config::{Command, MonitorConfig, USAGE};
use dashboard::DashboardState;
use env_logger::Env;
use listener::Listener;
use processor::SnapshotProcessor;
use stats::Stats;
use store::StateStore;

use std::sync::Arc;
use tokio::signal;
use tokio::sync::RwLock;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = match MonitorConfig::from_args(std::env::args().skip(1)) {
        Ok(Command::Run(config)) => config,
        Ok(Command::Help) => {
            println!("{}", USAGE);
            return Ok(());
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let store = Arc::new(StateStore::new());
    let stats = Arc::new(RwLock::new(Stats::new()));

    let listener = Listener::bind(config.port)
        .await
        .with_context(|| format!("cannot start monitor on UDP port {}", config.port))?;

    println!("{}", "=".repeat(70));
    println!("NR Simulation Telemetry Monitor");
    println!("Listening on UDP port {}", listener.local_addr()?.port());
    println!(
        "Started: {}",
        stats.read().await.started_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!("{}", "=".repeat(70));
    println!("\nWaiting for simulation updates...");
    println!("(Press Ctrl+C to stop)\n");

    if let Some(addr) = config.dashboard_addr {
        let state = DashboardState {
            store: Arc::clone(&store),
            stats: Arc::clone(&stats),
        };
        tokio::spawn(dashboard::start_dashboard(addr, state));
    }

    let report_handle = tokio::spawn(report::run_report_loop(
        Arc::clone(&store),
        Arc::clone(&stats),
        config.verbose,
        config.report_interval,
    ));

    let processor = SnapshotProcessor::new(Arc::clone(&store), Arc::clone(&stats));
    listener.run(processor, signal::ctrl_c()).await;

    report_handle.abort();

    println!("\n{}", "=".repeat(70));
    println!("Final Statistics");
    println!("{}", "=".repeat(70));
    print!("{}", stats.read().await.summary());
    if let Some(last) = store.latest() {
        println!(
            "Last simulation time: {:.3}s ({} UEs, {} gNBs)",
            last.timestamp.simulation_time,
            last.topology.ues.len(),
            last.topology.gnbs.len()
        );
    }
    println!("{}", "=".repeat(70));

    Ok(())
}
