// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Stable id assignment and re-derivation.

use std::collections::{HashMap, HashSet};

use flowplan_model::{NodeId, NodeKind, PlanGraph};
use tracing::{debug, info, warn};

use crate::fingerprint::fingerprint_graph;
use crate::IdentityError;

/// Hex characters of the fingerprint kept in a stable id.
pub const STABLE_ID_HEX_LEN: usize = 16;

/// Derives stable ids for every identity-requiring node.
///
/// Ids are `<kind-tag>_<16 hex>`. Nodes sharing a base id are ordered by the
/// graph's deterministic topological order; the first keeps the base id and
/// the k-th (k >= 1) gets `_<k>` appended. Relay nodes get no entry.
pub fn derive_ids(graph: &PlanGraph) -> Result<HashMap<NodeId, String>, IdentityError> {
    let prints = fingerprint_graph(graph)?;
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut ids = HashMap::new();
    for node in graph.topological_order() {
        if !node.requires_stable_id() {
            continue;
        }
        let print = prints
            .get(&node.id())
            .ok_or_else(|| IdentityError::AssignmentFailed {
                node: node.id(),
                reason: "node was not fingerprinted".to_owned(),
            })?;
        let hex = print.to_hex();
        let base = format!("{}_{}", node.kind().tag(), &hex[..STABLE_ID_HEX_LEN]);
        let ordinal = seen.entry(base.clone()).or_insert(0);
        let id = if *ordinal == 0 {
            base
        } else {
            format!("{base}_{ordinal}")
        };
        *ordinal += 1;
        debug!(node = node.id(), kind = %node.kind(), stable_id = %id, "derived stable id");
        ids.insert(node.id(), id);
    }
    Ok(ids)
}

/// Returns a copy of `graph` in which every identity-requiring node carries
/// a stable id and relay nodes carry none.
///
/// Existing stable ids are ignored and overwritten, so the pass is
/// idempotent.
pub fn assign(graph: &PlanGraph) -> Result<PlanGraph, IdentityError> {
    let ids = derive_ids(graph)?;
    let mut unique = HashSet::with_capacity(ids.len());
    for node in graph.nodes() {
        match ids.get(&node.id()) {
            Some(id) if id.trim().is_empty() => {
                return Err(IdentityError::AssignmentFailed {
                    node: node.id(),
                    reason: "derived a blank stable id".to_owned(),
                });
            }
            Some(id) if !unique.insert(id.as_str()) => {
                return Err(IdentityError::AssignmentFailed {
                    node: node.id(),
                    reason: format!("stable id {id} is not unique"),
                });
            }
            None if node.requires_stable_id() => {
                return Err(IdentityError::AssignmentFailed {
                    node: node.id(),
                    reason: "no stable id derived".to_owned(),
                });
            }
            _ => {}
        }
    }
    info!(assigned = ids.len(), nodes = graph.nodes().len(), "assigned stable ids");
    Ok(graph.with_stable_ids(&ids))
}

/// A node whose persisted stable id differs from the freshly derived one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityDrift {
    /// Graph-local node id.
    pub node: NodeId,
    /// Node kind.
    pub kind: NodeKind,
    /// Id recorded in the graph.
    pub persisted: Option<String>,
    /// Id this build would assign.
    pub derived: String,
}

/// Compares persisted ids against freshly derived ones.
///
/// Diagnostics only: persisted ids remain authoritative on restore.
pub fn rederive(graph: &PlanGraph) -> Result<Vec<IdentityDrift>, IdentityError> {
    let ids = derive_ids(graph)?;
    let mut drift = Vec::new();
    for node in graph.nodes() {
        let Some(derived) = ids.get(&node.id()) else {
            continue;
        };
        if node.stable_id() != Some(derived.as_str()) {
            warn!(
                node = node.id(),
                kind = %node.kind(),
                persisted = node.stable_id().unwrap_or(""),
                derived = %derived,
                "stable id drift"
            );
            drift.push(IdentityDrift {
                node: node.id(),
                kind: node.kind(),
                persisted: node.stable_id().map(str::to_owned),
                derived: derived.clone(),
            });
        }
    }
    Ok(drift)
}
