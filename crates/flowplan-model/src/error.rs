// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error type for model construction.

/// Errors raised while constructing or validating plan model values.
///
/// Every variant is fatal to the compile or restore in progress; the message
/// carries a bracketed code so log lines stay greppable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// A type descriptor violates its invariants (duplicate row fields,
    /// precision on a non-temporal type, empty names).
    #[error("[MALFORMED_TYPE] {0}")]
    MalformedType(String),
    /// An opaque function payload failed its integrity check.
    #[error("[OPAQUE_PAYLOAD_CORRUPT] {0}")]
    OpaquePayloadCorrupt(String),
    /// Node ids, edges or input arities do not form a valid DAG.
    #[error("[INVALID_GRAPH_STRUCTURE] {0}")]
    InvalidGraphStructure(String),
}
