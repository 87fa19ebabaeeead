//! NR simulation snapshot definitions
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity identifier in canonical textual form.
///
/// The simulator emits identifiers as JSON numbers in some fields and strings
/// in others. Every variant is folded into one string at decode time so lookups
/// never need to try alternate encodings. An integral float (`5.0`) also keeps
/// its literal text so a reference written as `"5.0"` still finds it.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawId")]
pub struct EntityId {
    text: String,
    float_literal: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Flag(bool),
    Text(String),
}

impl From<RawId> for EntityId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Signed(v) => EntityId::from(v.to_string()),
            RawId::Unsigned(v) => EntityId::from(v.to_string()),
            RawId::Float(v) => match integral_float(v) {
                Some(n) => EntityId {
                    text: n.to_string(),
                    float_literal: Some(format!("{:.1}", v)),
                },
                None => EntityId::from(v.to_string()),
            },
            RawId::Flag(v) => EntityId::from(v.to_string()),
            RawId::Text(v) => EntityId::from(v),
        }
    }
}

// 5.0 and 5 name the same entity
fn integral_float(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

impl EntityId {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Canonical text first, then the float literal when there is one.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.text.as_str()).chain(self.float_literal.as_deref())
    }
}

impl From<String> for EntityId {
    fn from(text: String) -> Self {
        EntityId {
            text,
            float_literal: None,
        }
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId::from(s.to_string())
    }
}

impl PartialEq for EntityId {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for EntityId {}

impl std::hash::Hash for EntityId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Whole-number counts, accepting `3.0` as readily as `3`.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawCount {
        Whole(u64),
        Float(f64),
    }

    match Option::<RawCount>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawCount::Whole(n)) => Ok(Some(n)),
        Some(RawCount::Float(v)) => match integral_float(v) {
            Some(n) if n >= 0 => Ok(Some(n as u64)),
            _ => Err(de::Error::custom(format!("count must be a whole number, got {}", v))),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Velocity {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl Velocity {
    /// `None` unless both planar components are present; a missing `z` is planar motion.
    pub fn magnitude(&self) -> Option<f64> {
        let (x, y) = (self.x?, self.y?);
        let z = self.z.unwrap_or(0.0);
        Some((x * x + y * y + z * z).sqrt())
    }
}

/// One complete state document for a single simulated instant.
#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    pub timestamp: Timestamp,
    pub simulation: SimulationInfo,
    pub config: SimConfig,
    pub topology: Topology,
    #[serde(default)]
    pub traffic_summary: Option<TrafficSummary>,
    #[serde(default)]
    pub handovers: Option<Handovers>,
    #[serde(default)]
    pub events: Option<Events>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Timestamp {
    pub simulation_time: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SimulationInfo {
    pub status: Option<String>,
    pub progress_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    #[serde(deserialize_with = "lenient_count")]
    pub ue_count: Option<u64>,
    #[serde(deserialize_with = "lenient_count")]
    pub gnb_count: Option<u64>,
    pub area_size: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Topology {
    pub ues: Vec<Ue>,
    #[serde(default)]
    pub gnbs: Vec<Gnb>,
    #[serde(default)]
    pub area_size: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrafficSummary {
    pub total_dl_throughput_mbps: Option<f64>,
    pub total_ul_throughput_mbps: Option<f64>,
    pub avg_packet_loss_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Handovers {
    #[serde(deserialize_with = "lenient_count")]
    pub total_count: Option<u64>,
    pub recent_events: Vec<HandoverEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HandoverEvent {
    pub timestamp: Option<f64>,
    pub ue_id: Option<EntityId>,
    pub source_cell_id: Option<EntityId>,
    pub target_cell_id: Option<EntityId>,
    pub success: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Events {
    pub recent: Vec<SimEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SimEvent {
    pub timestamp: Option<f64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub description: Option<String>,
}

/// A simulated terminal.
#[derive(Debug, Clone, Deserialize)]
pub struct Ue {
    pub id: EntityId,
    #[serde(default)]
    pub imsi: Option<EntityId>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub velocity: Option<Velocity>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub mobility_model: Option<String>,
    #[serde(default)]
    pub network: Option<UeNetwork>,
    #[serde(default)]
    pub traffic: Option<UeTraffic>,
    #[serde(default)]
    pub radio: Option<Radio>,
}

impl Ue {
    /// Reported speed, or the velocity magnitude when only a vector was sent.
    pub fn speed(&self) -> Option<f64> {
        self.speed.or_else(|| self.velocity.and_then(|v| v.magnitude()))
    }

    pub fn dl(&self) -> Option<&LinkTraffic> {
        self.traffic.as_ref().and_then(|t| t.dl.as_ref())
    }

    pub fn ul(&self) -> Option<&LinkTraffic> {
        self.traffic.as_ref().and_then(|t| t.ul.as_ref())
    }

    pub fn distance_to_gnb(&self) -> Option<f64> {
        self.network.as_ref().and_then(|n| n.distance_to_gnb)
    }

    /// RSRP, only when the radio block marks it as available.
    pub fn rsrp_dbm(&self) -> Option<f64> {
        self.radio
            .as_ref()
            .filter(|r| r.available == Some(true))
            .and_then(|r| r.rsrp_dbm)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UeNetwork {
    pub gnb_id: Option<EntityId>,
    pub serving_gnb: Option<EntityId>,
    pub cell_id: Option<EntityId>,
    pub serving_cell_id: Option<EntityId>,
    pub distance_to_gnb: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UeTraffic {
    pub dl: Option<LinkTraffic>,
    pub ul: Option<LinkTraffic>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LinkTraffic {
    pub throughput_mbps: Option<f64>,
    pub loss_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Radio {
    pub rsrp_dbm: Option<f64>,
    pub available: Option<bool>,
}

/// A simulated base station.
#[derive(Debug, Clone, Deserialize)]
pub struct Gnb {
    #[serde(default)]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub cell_id: Option<EntityId>,
    #[serde(default)]
    pub gnb_id: Option<EntityId>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub scheduler: Option<Scheduler>,
    #[serde(default)]
    pub attached_ues: Option<AttachedUes>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Scheduler {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AttachedUes {
    #[serde(deserialize_with = "lenient_count")]
    pub count: Option<u64>,
}

const HIDDEN_SCHEDULERS: [&str; 3] = ["unknown", "unavailable", "no_device"];

impl Gnb {
    /// Every identifier this gNB is known by, in `id`, `cell_id`, `gnb_id` order.
    pub fn identifiers(&self) -> impl Iterator<Item = &EntityId> {
        [&self.id, &self.cell_id, &self.gnb_id]
            .into_iter()
            .filter_map(Option::as_ref)
    }

    /// Display label: cell id first, as operators know cells by it.
    pub fn label(&self) -> &str {
        self.cell_id
            .as_ref()
            .or(self.id.as_ref())
            .or(self.gnb_id.as_ref())
            .map(EntityId::as_str)
            .unwrap_or("?")
    }

    pub fn attached_count(&self) -> Option<u64> {
        self.attached_ues.as_ref().and_then(|a| a.count)
    }

    /// Scheduler type without the ns-3 class prefix, if it is worth showing.
    pub fn scheduler_short_name(&self) -> Option<String> {
        let kind = self.scheduler.as_ref()?.kind.as_deref()?;
        if kind.is_empty() || HIDDEN_SCHEDULERS.contains(&kind) {
            return None;
        }
        let short = kind.replace("ns3::NrMacScheduler", "").replace("ns3::", "");
        if short.is_empty() {
            None
        } else {
            Some(short)
        }
    }
}

impl Snapshot {
    /// Plot area edge length in metres.
    pub fn area_size(&self) -> f64 {
        self.config
            .area_size
            .or(self.topology.area_size)
            .unwrap_or(1000.0)
    }
}
