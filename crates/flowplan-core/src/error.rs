// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error facade for compile and restore.

use std::fmt;

use flowplan_codec::CodecError;
use flowplan_ident::IdentityError;
use flowplan_model::{EngineVersion, ModelError, NodeId, NodeKind, ObjectIdentifier};

/// Any failure of a compile, restore or runtime hand-off.
///
/// All variants are fatal to the operation in progress. Use
/// [`PlanError::kind`] to branch on the failure class.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Model invariant violated.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// Document decoding, encoding or persistence failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Stable id assignment failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),
    /// An identity-requiring node has no stable id.
    #[error("[MISSING_STABLE_IDENTITY] node {node} ({kind}) has no stable id")]
    MissingStableIdentity {
        /// Graph-local id.
        node: NodeId,
        /// Node kind.
        kind: NodeKind,
    },
    /// A catalog reference cannot be resolved under its mode.
    #[error("[CATALOG_OBJECT_UNRESOLVED] node {node}: {object}: {reason}")]
    CatalogObjectUnresolved {
        /// Referencing node.
        node: NodeId,
        /// Referenced object.
        object: ObjectIdentifier,
        /// What is missing.
        reason: String,
    },
    /// Attributes disagree with the declared types.
    #[error("[TYPE_INCONSISTENCY] node {node} ({kind}): {reason}")]
    TypeInconsistency {
        /// Offending node.
        node: NodeId,
        /// Node kind.
        kind: NodeKind,
        /// Which check failed.
        reason: String,
    },
    /// The plan was produced by a newer engine.
    #[error("[UNSUPPORTED_PLAN_VERSION] plan version {found} is newer than engine version {supported}")]
    UnsupportedPlanVersion {
        /// Version tag of the plan.
        found: EngineVersion,
        /// Running engine version.
        supported: EngineVersion,
    },
    /// A runtime unit's uid disagrees with its node's stable id.
    #[error("[RUNTIME_UID_MISMATCH] unit `{unit}` of node {node}: expected uid {expected}, found {found}")]
    RuntimeUidMismatch {
        /// Runtime unit name.
        unit: String,
        /// Source node.
        node: NodeId,
        /// Stable id of the source node.
        expected: String,
        /// Uid exposed by the unit.
        found: String,
    },
    /// The function registry refused a payload.
    #[error("[FUNCTION_BINDING] operator `{operator}`: {reason}")]
    FunctionBinding {
        /// Operator name.
        operator: String,
        /// Registry message.
        reason: String,
    },
}

/// Failure class of a [`PlanError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanErrorKind {
    /// Type descriptor invariant violated.
    MalformedType,
    /// Opaque payload failed its integrity check.
    OpaquePayloadCorrupt,
    /// Ids, edges, arity or cycles.
    InvalidGraphStructure,
    /// Unknown node kind tag.
    UnknownNodeKind,
    /// Stable id could not be assigned.
    IdentityAssignmentFailed,
    /// Required stable id absent.
    MissingStableIdentity,
    /// Catalog reference unresolved.
    CatalogObjectUnresolved,
    /// Attributes disagree with types.
    TypeInconsistency,
    /// Version gate.
    UnsupportedPlanVersion,
    /// Document syntax or shape.
    ParseError,
    /// Document encoding.
    Encode,
    /// File system failure.
    Io,
    /// Refused overwrite.
    PlanFileExists,
    /// Runtime uid check.
    RuntimeUidMismatch,
    /// Function registry refusal.
    FunctionBinding,
}

impl PlanErrorKind {
    /// Stable name of the failure class.
    pub const fn name(self) -> &'static str {
        match self {
            Self::MalformedType => "MalformedType",
            Self::OpaquePayloadCorrupt => "OpaquePayloadCorrupt",
            Self::InvalidGraphStructure => "InvalidGraphStructure",
            Self::UnknownNodeKind => "UnknownNodeKind",
            Self::IdentityAssignmentFailed => "IdentityAssignmentFailed",
            Self::MissingStableIdentity => "MissingStableIdentity",
            Self::CatalogObjectUnresolved => "CatalogObjectUnresolved",
            Self::TypeInconsistency => "TypeInconsistency",
            Self::UnsupportedPlanVersion => "UnsupportedPlanVersion",
            Self::ParseError => "ParseError",
            Self::Encode => "Encode",
            Self::Io => "Io",
            Self::PlanFileExists => "PlanFileExists",
            Self::RuntimeUidMismatch => "RuntimeUidMismatch",
            Self::FunctionBinding => "FunctionBinding",
        }
    }
}

impl fmt::Display for PlanErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const fn model_kind(err: &ModelError) -> PlanErrorKind {
    match err {
        ModelError::MalformedType(_) => PlanErrorKind::MalformedType,
        ModelError::OpaquePayloadCorrupt(_) => PlanErrorKind::OpaquePayloadCorrupt,
        ModelError::InvalidGraphStructure(_) => PlanErrorKind::InvalidGraphStructure,
    }
}

impl PlanError {
    /// Failure class.
    pub const fn kind(&self) -> PlanErrorKind {
        match self {
            Self::Model(err) | Self::Codec(CodecError::Model(err)) => model_kind(err),
            Self::Codec(CodecError::Parse(_)) => PlanErrorKind::ParseError,
            Self::Codec(CodecError::UnknownNodeKind { .. }) => PlanErrorKind::UnknownNodeKind,
            Self::Codec(CodecError::UnsupportedPlanVersion { .. })
            | Self::UnsupportedPlanVersion { .. } => PlanErrorKind::UnsupportedPlanVersion,
            Self::Codec(CodecError::Encode(_)) => PlanErrorKind::Encode,
            Self::Codec(CodecError::Io { .. }) => PlanErrorKind::Io,
            Self::Codec(CodecError::PlanFileExists(_)) => PlanErrorKind::PlanFileExists,
            Self::Identity(_) => PlanErrorKind::IdentityAssignmentFailed,
            Self::MissingStableIdentity { .. } => PlanErrorKind::MissingStableIdentity,
            Self::CatalogObjectUnresolved { .. } => PlanErrorKind::CatalogObjectUnresolved,
            Self::TypeInconsistency { .. } => PlanErrorKind::TypeInconsistency,
            Self::RuntimeUidMismatch { .. } => PlanErrorKind::RuntimeUidMismatch,
            Self::FunctionBinding { .. } => PlanErrorKind::FunctionBinding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_see_through_wrapped_errors() {
        let nested = PlanError::Codec(CodecError::Model(ModelError::OpaquePayloadCorrupt(
            "bad hex".into(),
        )));
        assert_eq!(nested.kind(), PlanErrorKind::OpaquePayloadCorrupt);
        assert_eq!(
            PlanError::Codec(CodecError::Parse("eof".into())).kind(),
            PlanErrorKind::ParseError
        );
        let missing = PlanError::MissingStableIdentity {
            node: 6,
            kind: NodeKind::GroupWindowAggregate,
        };
        assert_eq!(missing.kind().name(), "MissingStableIdentity");
        assert_eq!(
            missing.to_string(),
            "[MISSING_STABLE_IDENTITY] node 6 (group-window-aggregate) has no stable id"
        );
    }
}
