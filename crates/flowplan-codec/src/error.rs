// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Codec errors.

use std::path::PathBuf;

use flowplan_model::{EngineVersion, ModelError};

/// Errors raised while encoding, decoding or persisting a plan document.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text is not a well-formed plan document.
    #[error("[PARSE_ERROR] {0}")]
    Parse(String),
    /// A node carries a kind tag this build does not know.
    #[error("[UNKNOWN_NODE_KIND] node {node}: unknown kind `{kind}`")]
    UnknownNodeKind {
        /// Offending tag.
        kind: String,
        /// Id of the node as written in the document.
        node: String,
    },
    /// The document was produced by a newer engine, or is older than the
    /// oldest supported format and no migration hook applied.
    #[error(
        "[UNSUPPORTED_PLAN_VERSION] plan version {found} cannot be read by engine version {supported}"
    )]
    UnsupportedPlanVersion {
        /// Version recorded in the document.
        found: EngineVersion,
        /// Version of the reading engine.
        supported: EngineVersion,
    },
    /// The decoded graph violates a model invariant.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// Encoding the document failed.
    #[error("[ENCODE_ERROR] {0}")]
    Encode(String),
    /// Reading or writing the plan file failed.
    #[error("[IO] {}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Refused to overwrite an existing plan file.
    #[error("[PLAN_FILE_EXISTS] {} already exists", .0.display())]
    PlanFileExists(PathBuf),
}
