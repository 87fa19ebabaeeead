//! Datagram decoding, validation and publishing
use crate::snapshot::Snapshot;
use crate::stats::Stats;
use crate::store::StateStore;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::RwLock;

/// Paths that must be present and non-null before a value counts as a snapshot.
const REQUIRED_FIELDS: [&str; 4] = [
    "/timestamp/simulation_time",
    "/simulation",
    "/config",
    "/topology/ues",
];

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("datagram is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("malformed JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("snapshot has unexpected shape: {0}")]
    Schema(#[source] serde_json::Error),
}

/// Turn one datagram into a snapshot.
pub fn decode(data: &[u8]) -> Result<Snapshot, DecodeError> {
    let text = std::str::from_utf8(data)?;
    let value: Value = serde_json::from_str(text).map_err(DecodeError::Json)?;
    validate(&value)?;
    serde_json::from_value(value).map_err(DecodeError::Schema)
}

/// Check the minimal top-level shape without looking at anything optional.
pub fn validate(value: &Value) -> Result<(), DecodeError> {
    for path in REQUIRED_FIELDS {
        match value.pointer(path) {
            None | Some(Value::Null) => return Err(DecodeError::MissingField(&path[1..])),
            Some(_) => {}
        }
    }
    Ok(())
}

/// Runs decode → validate → publish for each datagram and keeps the counters.
pub struct SnapshotProcessor {
    store: Arc<StateStore>,
    stats: Arc<RwLock<Stats>>,
}

impl SnapshotProcessor {
    pub fn new(store: Arc<StateStore>, stats: Arc<RwLock<Stats>>) -> Self {
        Self { store, stats }
    }

    /// Failed datagrams leave the store untouched.
    pub async fn process_datagram(&self, data: &[u8]) -> Result<(), DecodeError> {
        let process_start = Instant::now();

        match decode(data) {
            Ok(snapshot) => {
                log::debug!(
                    "snapshot t={:.3}s with {} UEs, {} gNBs",
                    snapshot.timestamp.simulation_time,
                    snapshot.topology.ues.len(),
                    snapshot.topology.gnbs.len()
                );
                // already validated as UTF-8 by decode
                let raw = String::from_utf8_lossy(data).into_owned();
                self.store.publish(snapshot, raw);

                let mut stats = self.stats.write().await;
                stats.record_success(data.len());
                stats.add_latency(process_start.elapsed().as_micros() as u64);
                Ok(())
            }
            Err(e) => {
                self.stats.write().await.record_failure();
                Err(e)
            }
        }
    }

    pub async fn record_receive_error(&self) {
        self.stats.write().await.record_failure();
    }
}
