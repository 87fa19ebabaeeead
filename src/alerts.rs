//! Threshold alerts over a single snapshot
//!
//! Alerts are recomputed from scratch for every snapshot; nothing carries
//! over between evaluations.
use crate::resolver::{build_gnb_index, resolve_all, ResolvedUe};
use crate::snapshot::Snapshot;
use serde::Serialize;
use std::fmt;

const HIGH_LOSS_PERCENT: f64 = 50.0;
const ELEVATED_LOSS_PERCENT: f64 = 30.0;
const SEVERE_UE_DL_LOSS_PERCENT: f64 = 80.0;
const OVERLOADED_CELL_UES: u64 = 8;
const STATIONARY_MOBILITY_MODEL: &str = "waypoint";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HighPacketLoss,
    ElevatedPacketLoss,
    StationaryUe,
    SevereDlLoss,
    CellOverloaded,
    CellIdle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub severity: Severity,
    pub kind: AlertKind,
    pub message: String,
}

impl Alert {
    fn medium(kind: AlertKind, message: String) -> Self {
        Self {
            severity: Severity::Medium,
            kind,
            message,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Medium => f.write_str("MEDIUM"),
            Severity::High => f.write_str("HIGH"),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

/// Network-wide average of DL and UL loss.
///
/// Taken from `traffic_summary` when the producer sent it, otherwise averaged
/// over every per-UE loss figure that is present. `None` when nothing is known.
pub fn average_loss_percent(snapshot: &Snapshot) -> Option<f64> {
    if let Some(loss) = snapshot
        .traffic_summary
        .as_ref()
        .and_then(|t| t.avg_packet_loss_percent)
    {
        return Some(loss);
    }

    let samples: Vec<f64> = snapshot
        .topology
        .ues
        .iter()
        .flat_map(|ue| [ue.dl(), ue.ul()])
        .flatten()
        .filter_map(|link| link.loss_percent)
        .collect();

    if samples.is_empty() {
        None
    } else {
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }
}

/// Evaluates every rule. Order: network loss, then UEs, then cells, each in topology order.
pub fn evaluate(snapshot: &Snapshot, resolved: &[ResolvedUe<'_>]) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if let Some(loss) = average_loss_percent(snapshot) {
        if loss > HIGH_LOSS_PERCENT {
            alerts.push(Alert {
                severity: Severity::High,
                kind: AlertKind::HighPacketLoss,
                message: format!("HIGH PACKET LOSS: {:.1}%", loss),
            });
        } else if loss > ELEVATED_LOSS_PERCENT {
            alerts.push(Alert::medium(
                AlertKind::ElevatedPacketLoss,
                format!("Elevated packet loss: {:.1}%", loss),
            ));
        }
    }

    for entry in resolved {
        let ue = entry.ue;
        let cell = entry
            .serving
            .cell_label()
            .map(|c| format!(" (cell {})", c))
            .unwrap_or_default();

        if ue.speed() == Some(0.0)
            && ue.mobility_model.as_deref() == Some(STATIONARY_MOBILITY_MODEL)
        {
            alerts.push(Alert::medium(
                AlertKind::StationaryUe,
                format!("UE {}{} not moving ({})", ue.id, cell, STATIONARY_MOBILITY_MODEL),
            ));
        }

        if let Some(dl_loss) = ue.dl().and_then(|dl| dl.loss_percent) {
            if dl_loss > SEVERE_UE_DL_LOSS_PERCENT {
                alerts.push(Alert::medium(
                    AlertKind::SevereDlLoss,
                    format!("UE {}{} severe DL loss: {:.1}%", ue.id, cell, dl_loss),
                ));
            }
        }
    }

    for gnb in &snapshot.topology.gnbs {
        match gnb.attached_count() {
            Some(count) if count > OVERLOADED_CELL_UES => alerts.push(Alert::medium(
                AlertKind::CellOverloaded,
                format!("Cell {} overloaded: {} UEs", gnb.label(), count),
            )),
            Some(0) => alerts.push(Alert::medium(
                AlertKind::CellIdle,
                format!("Cell {} has no UEs", gnb.label()),
            )),
            _ => {}
        }
    }

    alerts
}

/// Convenience entry point: index, resolve and evaluate in one call.
pub fn evaluate_alerts(snapshot: &Snapshot) -> Vec<Alert> {
    let index = build_gnb_index(snapshot);
    let resolved = resolve_all(snapshot, &index);
    evaluate(snapshot, &resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn snapshot(extra: Value) -> Snapshot {
        let mut base = json!({
            "timestamp": {"simulation_time": 3.0},
            "simulation": {"status": "running"},
            "config": {"ue_count": 0, "gnb_count": 0},
            "topology": {"ues": [], "gnbs": []}
        });
        if let (Some(base), Value::Object(extra)) = (base.as_object_mut(), extra) {
            base.extend(extra);
        }
        serde_json::from_value(base).unwrap()
    }

    fn with_loss(loss: f64) -> Snapshot {
        snapshot(json!({"traffic_summary": {"avg_packet_loss_percent": loss}}))
    }

    fn kinds(alerts: &[Alert]) -> Vec<AlertKind> {
        alerts.iter().map(|a| a.kind).collect()
    }

    #[test]
    fn loss_thresholds_are_strict() {
        assert!(evaluate_alerts(&with_loss(30.0)).is_empty());
        assert_eq!(kinds(&evaluate_alerts(&with_loss(30.1))), vec![AlertKind::ElevatedPacketLoss]);
        assert_eq!(kinds(&evaluate_alerts(&with_loss(50.0))), vec![AlertKind::ElevatedPacketLoss]);

        let alerts = evaluate_alerts(&with_loss(50.1));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::High);
        assert_eq!(alerts[0].kind, AlertKind::HighPacketLoss);
    }

    #[test]
    fn average_loss_falls_back_to_per_ue_figures() {
        let snap = snapshot(json!({"topology": {"ues": [
            {"id": 1, "traffic": {"dl": {"loss_percent": 60.0}, "ul": {"loss_percent": 50.0}}},
            {"id": 2, "traffic": {"dl": {"loss_percent": 40.0}}},
            {"id": 3}
        ]}}));
        assert_eq!(average_loss_percent(&snap), Some(50.0));
        assert_eq!(average_loss_percent(&snapshot(json!({}))), None);
    }

    #[test]
    fn stationary_waypoint_ue_needs_known_zero_speed() {
        let snap = snapshot(json!({"topology": {"ues": [
            {"id": 1, "speed": 0.0, "mobility_model": "waypoint"},
            {"id": 2, "velocity": {"x": 0.0, "y": 0.0}, "mobility_model": "waypoint"},
            {"id": 3, "mobility_model": "waypoint"},
            {"id": 4, "speed": 0.0, "mobility_model": "constant_position"},
            {"id": 5, "speed": 1.5, "mobility_model": "waypoint"},
            {"id": 6, "velocity": {}, "mobility_model": "waypoint"},
            {"id": 7, "velocity": {"y": 0.0}, "mobility_model": "waypoint"}
        ]}}));
        let alerts = evaluate_alerts(&snap);
        assert_eq!(kinds(&alerts), vec![AlertKind::StationaryUe, AlertKind::StationaryUe]);
        assert!(alerts[0].message.starts_with("UE 1 "));
        assert!(alerts[1].message.starts_with("UE 2 "));
    }

    #[test]
    fn severe_dl_loss_per_ue() {
        let snap = snapshot(json!({"topology": {
            "ues": [
                {"id": 1, "network": {"cell_id": 2}, "traffic": {"dl": {"loss_percent": 80.5}}},
                {"id": 2, "traffic": {"dl": {"loss_percent": 80.0}}}
            ],
            "gnbs": [{"cell_id": 2, "position": {"x": 0.0, "y": 0.0}}]
        }}));
        let alerts = evaluate_alerts(&snap);
        // the two per-UE figures also push the network average over 50%
        assert_eq!(kinds(&alerts), vec![AlertKind::HighPacketLoss, AlertKind::SevereDlLoss]);
        assert_eq!(alerts[1].message, "UE 1 (cell 2) severe DL loss: 80.5%");
    }

    #[test]
    fn cell_load_rules() {
        let snap = snapshot(json!({"topology": {"ues": [], "gnbs": [
            {"cell_id": 1, "attached_ues": {"count": 9}},
            {"cell_id": 2, "attached_ues": {"count": 8}},
            {"cell_id": 3, "attached_ues": {"count": 0}},
            {"cell_id": 4}
        ]}}));
        let alerts = evaluate_alerts(&snap);
        assert_eq!(kinds(&alerts), vec![AlertKind::CellOverloaded, AlertKind::CellIdle]);
        assert_eq!(alerts[0].message, "Cell 1 overloaded: 9 UEs");
        assert_eq!(alerts[1].message, "Cell 3 has no UEs");
    }

    #[test]
    fn rules_are_additive_for_one_ue() {
        let snap = snapshot(json!({
            "traffic_summary": {"avg_packet_loss_percent": 90.0},
            "topology": {"ues": [
                {"id": 7, "speed": 0, "mobility_model": "waypoint",
                 "traffic": {"dl": {"loss_percent": 95.0}}}
            ]}
        }));
        let alerts = evaluate_alerts(&snap);
        assert_eq!(
            kinds(&alerts),
            vec![AlertKind::HighPacketLoss, AlertKind::StationaryUe, AlertKind::SevereDlLoss]
        );
    }
}
