//! Single-slot holder for the most recent snapshot
use crate::snapshot::Snapshot;
use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// A decoded snapshot together with the text it came from.
#[derive(Debug)]
pub struct Received {
    pub snapshot: Arc<Snapshot>,
    pub raw: String,
    pub received_at: DateTime<Local>,
}

/// Last-write-wins cell shared between the listener and the front-ends.
///
/// The lock only guards an `Arc` swap or clone, so readers never wait on
/// decoding or rendering. Readers may see the same value across several polls
/// or miss values published between two polls.
#[derive(Debug, Default)]
pub struct StateStore {
    slot: RwLock<Option<Arc<Received>>>,
    generation: AtomicU64,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever was held.
    pub fn publish(&self, snapshot: Snapshot, raw: String) {
        let received = Arc::new(Received {
            snapshot: Arc::new(snapshot),
            raw,
            received_at: Local::now(),
        });
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(received);
        // bumped under the write lock so generation and slot move together
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.latest_received().map(|r| Arc::clone(&r.snapshot))
    }

    pub fn latest_received(&self) -> Option<Arc<Received>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Latest value plus the publish count it corresponds to.
    pub fn latest_with_generation(&self) -> (u64, Option<Arc<Received>>) {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        (self.generation.load(Ordering::Acquire), slot.clone())
    }

    /// Number of successful publishes so far. Used by pollers to skip redraws.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}
