//! Text report printed to stdout
use crate::alerts::evaluate_alerts;
use crate::resolver::{build_gnb_index, resolve_all};
use crate::snapshot::{Snapshot, Ue};
use crate::stats::{Stats, StatsSummary};
use crate::store::StateStore;
use std::fmt::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};

const RECENT_HANDOVERS_SHOWN: usize = 5;
const RECENT_EVENTS_SHOWN: usize = 3;
const NA: &str = "N/A";

/// Polls the store and prints a report whenever a new snapshot has landed.
pub async fn run_report_loop(
    store: Arc<StateStore>,
    stats: Arc<RwLock<Stats>>,
    verbose: bool,
    period: Duration,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut seen = 0u64;

    loop {
        ticker.tick().await;
        let (generation, latest) = store.latest_with_generation();
        if generation == seen {
            continue;
        }
        seen = generation;
        let Some(received) = latest else { continue };

        let summary = stats.read().await.summary();
        println!("{}", render(&received.snapshot, verbose, &summary));
    }
}

pub fn render(snapshot: &Snapshot, verbose: bool, stats: &StatsSummary) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = write_report(&mut out, snapshot, verbose, stats);
    out
}

fn opt<T: fmt::Display>(value: Option<T>, unit: &str) -> String {
    match value {
        Some(v) => format!("{}{}", v, unit),
        None => NA.to_string(),
    }
}

fn opt_f1(value: Option<f64>, unit: &str) -> String {
    opt(value.map(|v| format!("{:.1}", v)), unit)
}

fn opt_f2(value: Option<f64>) -> String {
    opt(value.map(|v| format!("{:.2}", v)), "")
}

fn write_report(
    out: &mut String,
    snapshot: &Snapshot,
    verbose: bool,
    stats: &StatsSummary,
) -> fmt::Result {
    let rule = "=".repeat(70);
    let sim = &snapshot.simulation;

    writeln!(out, "\n{}", rule)?;
    writeln!(
        out,
        "Time: {:.3}s | Status: {} | Progress: {}",
        snapshot.timestamp.simulation_time,
        sim.status.as_deref().unwrap_or("unknown"),
        opt_f1(sim.progress_percent, "%")
    )?;
    writeln!(out, "{}", rule)?;

    let count = |c: Option<u64>| c.map_or_else(|| "?".to_string(), |c| c.to_string());
    writeln!(
        out,
        "\nNetwork: {} gNBs, {} UEs",
        count(snapshot.config.gnb_count),
        count(snapshot.config.ue_count)
    )?;

    let index = build_gnb_index(snapshot);
    let resolved = resolve_all(snapshot, &index);

    writeln!(out, "\nUE Status:")?;
    writeln!(
        out,
        "{:<4} {:<6} {:<20} {:<15} {:<6} {:<10}",
        "ID", "IMSI", "Position", "Velocity", "Cell", "Distance"
    )?;
    writeln!(out, "{}", "-".repeat(70))?;
    for entry in &resolved {
        let ue = entry.ue;
        let position = ue
            .position
            .map(|p| format!("({:.1}, {:.1})", p.x, p.y))
            .unwrap_or_else(|| NA.to_string());
        writeln!(
            out,
            "{:<4} {:<6} {:<20} {:<15} {:<6} {:<10}",
            ue.id.as_str(),
            opt(ue.imsi.as_ref(), ""),
            position,
            opt_f1(ue.speed(), " m/s"),
            entry.serving.cell_label().unwrap_or(NA),
            opt_f1(ue.distance_to_gnb(), " m")
        )?;
    }

    if let Some(traffic) = &snapshot.traffic_summary {
        writeln!(out, "\nTraffic Summary:")?;
        writeln!(out, "  Total DL: {} Mbps", opt_f2(traffic.total_dl_throughput_mbps))?;
        writeln!(out, "  Total UL: {} Mbps", opt_f2(traffic.total_ul_throughput_mbps))?;
        writeln!(out, "  Avg Loss: {}", opt_f1(traffic.avg_packet_loss_percent, "%"))?;
    }

    if verbose {
        write_per_ue_traffic(out, &snapshot.topology.ues)?;
    }

    if let Some(handovers) = &snapshot.handovers {
        let total = handovers.total_count.unwrap_or(0);
        if total > 0 {
            writeln!(out, "\nHandovers: {} total", total)?;
            if verbose && !handovers.recent_events.is_empty() {
                writeln!(out, "\nRecent Handovers:")?;
                let skip = handovers
                    .recent_events
                    .len()
                    .saturating_sub(RECENT_HANDOVERS_SHOWN);
                for ho in &handovers.recent_events[skip..] {
                    writeln!(
                        out,
                        "  t={}: UE {} | Cell {} -> {} {}",
                        opt(ho.timestamp.map(|t| format!("{:.3}", t)), "s"),
                        opt(ho.ue_id.as_ref(), ""),
                        opt(ho.source_cell_id.as_ref(), ""),
                        opt(ho.target_cell_id.as_ref(), ""),
                        match ho.success {
                            Some(true) => "ok",
                            Some(false) => "FAILED",
                            None => "?",
                        }
                    )?;
                }
            }
        }
    }

    if verbose {
        if let Some(events) = snapshot.events.as_ref().filter(|e| !e.recent.is_empty()) {
            writeln!(out, "\nRecent Events:")?;
            let skip = events.recent.len().saturating_sub(RECENT_EVENTS_SHOWN);
            for evt in &events.recent[skip..] {
                writeln!(
                    out,
                    "  {} [{}]: {}",
                    opt(evt.timestamp.map(|t| format!("{:.3}", t)), "s"),
                    evt.kind.as_deref().unwrap_or("?"),
                    evt.description.as_deref().unwrap_or("")
                )?;
            }
        }
    }

    let alerts = evaluate_alerts(snapshot);
    if !alerts.is_empty() {
        writeln!(out, "\nALERTS:")?;
        for alert in &alerts {
            writeln!(out, "  {}", alert)?;
        }
    }

    write!(
        out,
        "\nUpdates: {} ({:.1}/s)",
        stats.received, stats.rate_per_second
    )
}

fn write_per_ue_traffic(out: &mut String, ues: &[Ue]) -> fmt::Result {
    if !ues.iter().any(|ue| ue.traffic.is_some()) {
        return Ok(());
    }

    writeln!(out, "\nPer-UE Traffic:")?;
    writeln!(
        out,
        "{:<4} {:<10} {:<10} {:<10} {:<10}",
        "UE", "DL Mbps", "DL Loss%", "UL Mbps", "UL Loss%"
    )?;
    writeln!(out, "{}", "-".repeat(50))?;
    for ue in ues.iter().filter(|ue| ue.traffic.is_some()) {
        let dl = ue.dl();
        let ul = ue.ul();
        writeln!(
            out,
            "{:<4} {:<10} {:<10} {:<10} {:<10}",
            ue.id.as_str(),
            opt_f2(dl.and_then(|l| l.throughput_mbps)),
            opt_f1(dl.and_then(|l| l.loss_percent), ""),
            opt_f2(ul.and_then(|l| l.throughput_mbps)),
            opt_f1(ul.and_then(|l| l.loss_percent), "")
        )?;
    }
    Ok(())
}
