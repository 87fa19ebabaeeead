//! Serving-gNB resolution
//!
//! Producers disagree on which field names the serving cell and on whether
//! identifiers are numbers or strings. Identifiers are canonicalized when the
//! snapshot is decoded, so the index keys every gNB once per identifier field
//! and a UE resolves through a fixed fallback chain of its network fields.
use crate::snapshot::{EntityId, Gnb, Position, Snapshot, Ue};
use std::collections::HashMap;

/// Lookup from any gNB identifier to that gNB. Borrows the snapshot it indexes.
#[derive(Debug, Default)]
pub struct GnbIndex<'a> {
    by_id: HashMap<&'a str, IndexedGnb<'a>>,
}

#[derive(Debug, Clone, Copy)]
pub struct IndexedGnb<'a> {
    pub gnb: &'a Gnb,
    pub position: Position,
}

/// Outcome of resolving one UE.
#[derive(Debug, Clone, Copy)]
pub enum ServingGnb<'a> {
    Resolved { gnb: &'a Gnb, position: Position },
    /// No candidate field, or the candidate names no indexed gNB.
    Unresolved { candidate: Option<&'a EntityId> },
}

impl<'a> ServingGnb<'a> {
    pub fn position(&self) -> Option<Position> {
        match *self {
            ServingGnb::Resolved { position, .. } => Some(position),
            ServingGnb::Unresolved { .. } => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ServingGnb::Resolved { .. })
    }

    /// Cell label for display: the gNB's label when resolved, else the raw candidate.
    pub fn cell_label(&self) -> Option<&'a str> {
        match *self {
            ServingGnb::Resolved { gnb, .. } => Some(gnb.label()),
            ServingGnb::Unresolved { candidate } => candidate.map(EntityId::as_str),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResolvedUe<'a> {
    pub ue: &'a Ue,
    pub serving: ServingGnb<'a>,
}

impl<'a> GnbIndex<'a> {
    pub fn build(snapshot: &'a Snapshot) -> Self {
        let mut by_id = HashMap::new();
        for gnb in &snapshot.topology.gnbs {
            let Some(position) = gnb.position else {
                log::debug!("gNB {} has no position, not indexed", gnb.label());
                continue;
            };
            for key in gnb.identifiers().flat_map(EntityId::keys) {
                by_id.insert(key, IndexedGnb { gnb, position });
            }
        }
        Self { by_id }
    }

    pub fn get(&self, id: &EntityId) -> Option<&IndexedGnb<'a>> {
        self.by_id.get(id.as_str())
    }
}

pub fn build_gnb_index(snapshot: &Snapshot) -> GnbIndex<'_> {
    GnbIndex::build(snapshot)
}

/// First present field of `gnb_id`, `serving_gnb`, `cell_id`, `serving_cell_id`.
///
/// Presence is structural: an id of `0` is a valid candidate.
pub fn serving_candidate(ue: &Ue) -> Option<&EntityId> {
    let net = ue.network.as_ref()?;
    net.gnb_id
        .as_ref()
        .or(net.serving_gnb.as_ref())
        .or(net.cell_id.as_ref())
        .or(net.serving_cell_id.as_ref())
}

/// Only the first present candidate is tried; a miss is not retried with later fields.
pub fn resolve_serving_gnb<'a>(ue: &'a Ue, index: &GnbIndex<'a>) -> ServingGnb<'a> {
    let candidate = serving_candidate(ue);
    match candidate.and_then(|key| index.get(key)) {
        Some(hit) => ServingGnb::Resolved {
            gnb: hit.gnb,
            position: hit.position,
        },
        None => ServingGnb::Unresolved { candidate },
    }
}

/// Resolves every UE of the snapshot, in topology order.
pub fn resolve_all<'a>(snapshot: &'a Snapshot, index: &GnbIndex<'a>) -> Vec<ResolvedUe<'a>> {
    snapshot
        .topology
        .ues
        .iter()
        .map(|ue| ResolvedUe {
            ue,
            serving: resolve_serving_gnb(ue, index),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn snapshot(ues: Value, gnbs: Value) -> Snapshot {
        serde_json::from_value(json!({
            "timestamp": {"simulation_time": 0.0},
            "simulation": {},
            "config": {},
            "topology": {"ues": ues, "gnbs": gnbs}
        }))
        .unwrap()
    }

    #[test]
    fn numeric_cell_id_matches_textual_reference() {
        let snap = snapshot(
            json!([{"id": 1, "network": {"cell_id": "3"}}]),
            json!([{"cell_id": 3, "position": {"x": 10.0, "y": 20.0}}]),
        );
        let index = build_gnb_index(&snap);
        let serving = resolve_serving_gnb(&snap.topology.ues[0], &index);
        assert_eq!(serving.position(), Some(Position { x: 10.0, y: 20.0 }));
    }

    #[test]
    fn textual_gnb_id_matches_numeric_reference() {
        let snap = snapshot(
            json!([{"id": 1, "network": {"serving_gnb": 2}}]),
            json!([{"gnb_id": "2", "position": {"x": 1.0, "y": 1.0}}]),
        );
        let index = build_gnb_index(&snap);
        assert!(resolve_serving_gnb(&snap.topology.ues[0], &index).is_resolved());
    }

    #[test]
    fn float_cell_id_matches_literal_and_integer_references() {
        let snap = snapshot(
            json!([
                {"id": 1, "network": {"cell_id": "5.0"}},
                {"id": 2, "network": {"cell_id": 5}}
            ]),
            json!([{"cell_id": 5.0, "position": {"x": 5.0, "y": 5.0}}]),
        );
        let index = build_gnb_index(&snap);
        let resolved = resolve_all(&snap, &index);
        assert!(resolved.iter().all(|r| r.serving.is_resolved()));
    }

    #[test]
    fn zero_gnb_id_is_used_not_skipped() {
        let snap = snapshot(
            json!([{"id": 1, "network": {"gnb_id": 0, "cell_id": 1}}]),
            json!([
                {"id": 0, "cell_id": 10, "position": {"x": 0.0, "y": 0.0}},
                {"id": 1, "cell_id": 11, "position": {"x": 500.0, "y": 500.0}}
            ]),
        );
        let index = build_gnb_index(&snap);
        let serving = resolve_serving_gnb(&snap.topology.ues[0], &index);
        assert_eq!(serving.position(), Some(Position { x: 0.0, y: 0.0 }));
        assert_eq!(serving.cell_label(), Some("10"));
    }

    #[test]
    fn null_fields_fall_through_in_priority_order() {
        let snap = snapshot(
            json!([
                {"id": 1, "network": {"gnb_id": null, "serving_gnb": null, "cell_id": null, "serving_cell_id": 7}},
                {"id": 2, "network": {"serving_gnb": 8, "cell_id": 7}}
            ]),
            json!([
                {"id": 7, "position": {"x": 7.0, "y": 7.0}},
                {"id": 8, "position": {"x": 8.0, "y": 8.0}}
            ]),
        );
        let index = build_gnb_index(&snap);
        let resolved = resolve_all(&snap, &index);
        assert_eq!(resolved[0].serving.position(), Some(Position { x: 7.0, y: 7.0 }));
        assert_eq!(resolved[1].serving.position(), Some(Position { x: 8.0, y: 8.0 }));
    }

    #[test]
    fn miss_is_unresolved_without_guessing() {
        let snap = snapshot(
            json!([
                {"id": 1, "network": {"gnb_id": 99, "cell_id": 1}},
                {"id": 2, "network": {"distance_to_gnb": 0.0}},
                {"id": 3}
            ]),
            json!([{"id": 1, "position": {"x": 1.0, "y": 1.0}}]),
        );
        let index = build_gnb_index(&snap);
        let resolved = resolve_all(&snap, &index);

        match resolved[0].serving {
            ServingGnb::Unresolved { candidate } => {
                assert_eq!(candidate.map(EntityId::as_str), Some("99"))
            }
            other => panic!("expected unresolved, got {other:?}"),
        }
        assert_eq!(resolved[0].serving.cell_label(), Some("99"));
        assert!(matches!(resolved[1].serving, ServingGnb::Unresolved { candidate: None }));
        assert!(matches!(resolved[2].serving, ServingGnb::Unresolved { candidate: None }));
    }

    #[test]
    fn every_identifier_field_is_indexed() {
        let snap = snapshot(
            json!([]),
            json!([
                {"id": 0, "cell_id": 1, "gnb_id": "g0", "position": {"x": 0.0, "y": 0.0}},
                {"id": 5}
            ]),
        );
        let index = build_gnb_index(&snap);
        for key in ["0", "1", "g0"] {
            assert!(index.get(&EntityId::from(key)).is_some(), "{key} not indexed");
        }
        assert!(index.get(&EntityId::from("5")).is_none());
    }
}
