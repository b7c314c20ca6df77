// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Stable identities for compiled plan nodes.
//!
//! A stable id lets a recompiled plan reattach to state checkpointed by an
//! earlier build, so it is derived from what a node *does*, never from where
//! it sits in the graph.
//!
//! # Fingerprint
//!
//! `BLAKE3(NODE_FINGERPRINT_V1 || canonical_json)` where `canonical_json` is
//! `{"attributes", "inputs", "kind", "outputType"}` with every object's keys
//! sorted and no whitespace:
//!
//! - `kind`: the node kind tag.
//! - `attributes`: the kind's attribute record, with catalog references
//!   reduced to their identifier and operator payloads removed.
//! - `outputType`: the declared output type.
//! - `inputs`: predecessor fingerprints in hex, sorted.
//!
//! Node ids, descriptions, hints and existing stable ids are excluded.
//!
//! # Stable id
//!
//! `<kind-tag>_<first 16 hex chars>`, with `_<k>` appended to the k-th
//! (k >= 1) node of a colliding group in topological order. Relay nodes
//! (union) are never assigned.
#![forbid(unsafe_code)]

mod assign;
mod fingerprint;

pub use assign::{assign, derive_ids, rederive, IdentityDrift, STABLE_ID_HEX_LEN};
pub use fingerprint::{
    canonical_bytes, fingerprint_graph, fingerprint_node, Fingerprint, NODE_FINGERPRINT_V1,
};

use flowplan_model::NodeId;

/// Errors raised while assigning stable ids.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// A node that requires a stable id could not get a valid one.
    #[error("[IDENTITY_ASSIGNMENT_FAILED] node {node}: {reason}")]
    AssignmentFailed {
        /// Graph-local id of the node.
        node: NodeId,
        /// What went wrong.
        reason: String,
    },
}
