//! Live topology dashboard server
use crate::alerts::{evaluate, Alert};
use crate::resolver::{build_gnb_index, resolve_all, ResolvedUe};
use crate::snapshot::{Position, Snapshot};
use crate::stats::{Stats, StatsSummary};
use crate::store::StateStore;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tower_http::cors::CorsLayer;

const REFRESH_PERIOD: Duration = Duration::from_millis(500);
const PING_PERIOD: Duration = Duration::from_secs(30);
const GOOD_DL_MBPS: f64 = 1.0;

#[derive(Clone)]
pub struct DashboardState {
    pub store: Arc<StateStore>,
    pub stats: Arc<RwLock<Stats>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Good,
    Weak,
    Dead,
    Unknown,
}

impl Health {
    pub fn from_dl_mbps(dl_mbps: Option<f64>) -> Self {
        match dl_mbps {
            Some(v) if v >= GOOD_DL_MBPS => Health::Good,
            Some(v) if v > 0.0 => Health::Weak,
            Some(_) => Health::Dead,
            None => Health::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GnbMarker {
    pub label: String,
    pub position: Option<Position>,
    pub scheduler: Option<String>,
    pub attached_ues: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UeRow {
    pub id: String,
    pub imsi: Option<String>,
    pub position: Option<Position>,
    pub cell: Option<String>,
    pub resolved: bool,
    /// `None` when the serving gNB could not be resolved.
    pub serving_position: Option<Position>,
    pub dl_mbps: Option<f64>,
    pub ul_mbps: Option<f64>,
    pub dl_loss_percent: Option<f64>,
    pub distance_m: Option<f64>,
    pub rsrp_dbm: Option<f64>,
    pub health: Health,
}

/// Everything the browser needs to draw one frame.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub received_at: DateTime<Local>,
    pub simulation_time: f64,
    pub status: Option<String>,
    pub progress_percent: Option<f64>,
    pub gnb_count: Option<u64>,
    pub ue_count: Option<u64>,
    pub area_size: f64,
    pub total_dl_mbps: Option<f64>,
    pub total_ul_mbps: Option<f64>,
    pub avg_loss_percent: Option<f64>,
    pub scheduler: Option<String>,
    pub gnbs: Vec<GnbMarker>,
    pub ues: Vec<UeRow>,
    pub alerts: Vec<Alert>,
    pub stats: StatsSummary,
}

impl DashboardView {
    pub fn build(snapshot: &Snapshot, received_at: DateTime<Local>, stats: StatsSummary) -> Self {
        let index = build_gnb_index(snapshot);
        let resolved = resolve_all(snapshot, &index);
        let traffic = snapshot.traffic_summary.as_ref();

        Self {
            received_at,
            simulation_time: snapshot.timestamp.simulation_time,
            status: snapshot.simulation.status.clone(),
            progress_percent: snapshot.simulation.progress_percent,
            gnb_count: snapshot.config.gnb_count,
            ue_count: snapshot.config.ue_count,
            area_size: snapshot.area_size(),
            total_dl_mbps: traffic.and_then(|t| t.total_dl_throughput_mbps),
            total_ul_mbps: traffic.and_then(|t| t.total_ul_throughput_mbps),
            avg_loss_percent: traffic.and_then(|t| t.avg_packet_loss_percent),
            scheduler: snapshot
                .topology
                .gnbs
                .first()
                .and_then(|g| g.scheduler_short_name()),
            gnbs: snapshot
                .topology
                .gnbs
                .iter()
                .map(|g| GnbMarker {
                    label: g.label().to_string(),
                    position: g.position,
                    scheduler: g.scheduler_short_name(),
                    attached_ues: g.attached_count(),
                })
                .collect(),
            ues: resolved.iter().map(ue_row).collect(),
            alerts: evaluate(snapshot, &resolved),
            stats,
        }
    }
}

fn ue_row(entry: &ResolvedUe<'_>) -> UeRow {
    let ue = entry.ue;
    let dl_mbps = ue.dl().and_then(|l| l.throughput_mbps);
    UeRow {
        id: ue.id.to_string(),
        imsi: ue.imsi.as_ref().map(ToString::to_string),
        position: ue.position,
        cell: entry.serving.cell_label().map(str::to_string),
        resolved: entry.serving.is_resolved(),
        serving_position: entry.serving.position(),
        dl_mbps,
        ul_mbps: ue.ul().and_then(|l| l.throughput_mbps),
        dl_loss_percent: ue.dl().and_then(|l| l.loss_percent),
        distance_m: ue.distance_to_gnb(),
        rsrp_dbm: ue.rsrp_dbm(),
        health: Health::from_dl_mbps(dl_mbps),
    }
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/state", get(current_state))
        .route("/api/raw", get(raw_snapshot))
        .route("/ws", get(websocket_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves until the process exits. A bind failure only disables the dashboard.
pub async fn start_dashboard(addr: SocketAddr, state: DashboardState) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            log::warn!("Dashboard disabled, cannot bind {}: {}", addr, e);
            return;
        }
    };

    log::info!("NR telemetry dashboard: http://{}", addr);

    if let Err(e) = axum::serve(listener, router(state)).await {
        log::error!("Dashboard server stopped: {}", e);
    }
}

async fn index() -> Html<&'static str> {
    Html(include_str!("dashboard.html"))
}

async fn build_view(state: &DashboardState) -> Option<DashboardView> {
    let received = state.store.latest_received()?;
    let stats = state.stats.read().await.summary();
    Some(DashboardView::build(&received.snapshot, received.received_at, stats))
}

async fn current_state(State(state): State<DashboardState>) -> Response {
    match build_view(&state).await {
        Some(view) => Json(view).into_response(),
        None => (StatusCode::NO_CONTENT, "").into_response(),
    }
}

async fn raw_snapshot(State(state): State<DashboardState>) -> Response {
    let Some(received) = state.store.latest_received() else {
        return (StatusCode::NO_CONTENT, "").into_response();
    };
    match serde_json::from_str::<serde_json::Value>(&received.raw)
        .and_then(|v| serde_json::to_string_pretty(&v))
    {
        Ok(pretty) => ([("content-type", "application/json")], pretty).into_response(),
        Err(_) => received.raw.clone().into_response(),
    }
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<DashboardState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Pushes a frame on its own timer whenever the store holds something newer.
async fn handle_socket(mut socket: WebSocket, state: DashboardState) {
    let mut refresh = interval(REFRESH_PERIOD);
    refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ping_interval = interval(PING_PERIOD);
    let mut seen = 0u64;

    loop {
        tokio::select! {
            _ = refresh.tick() => {
                let generation = state.store.generation();
                if generation == seen {
                    continue;
                }
                seen = generation;
                let Some(view) = build_view(&state).await else { continue };
                let json = match serde_json::to_string(&view) {
                    Ok(json) => json,
                    Err(e) => {
                        log::warn!("Dashboard frame not serializable: {}", e);
                        continue;
                    }
                };
                if socket.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                if socket.send(Message::Ping(vec![])).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
