// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! JSON codec for compiled plans.
//!
//! The document is `{engineVersion, nodes, edges}`. Nodes and edges keep
//! construction order. Each node object is its attribute record (tagged by
//! `kind`) flattened next to `id`, `outputType`, `description`, `stableId`
//! and `hints`.
//!
//! # Evolution
//!
//! Fields added after `1.0.0` default to a neutral value when absent (see
//! [`flowplan_model::version`]). Removals and renames go through a
//! [`MigrationHook`]. Documents newer than the reader are rejected before any
//! node is parsed.
//!
//! # Decoding order
//!
//! 1. JSON syntax and `engineVersion` (`ParseError`, `UnsupportedPlanVersion`).
//! 2. Migration hooks whose threshold is above the document version. A
//!    document older than [`EngineVersion::OLDEST_SUPPORTED`] that no hook
//!    touched is `UnsupportedPlanVersion`.
//! 3. Kind tags against the closed kind set (`UnknownNodeKind`, or skip).
//! 4. Closed attribute records (`ParseError`).
//! 5. Graph validation (`InvalidGraphStructure`, `MalformedType`,
//!    `OpaquePayloadCorrupt`).

mod document;
mod error;
mod file;
mod options;

use std::collections::HashSet;

use flowplan_model::{EngineVersion, NodeKind, PlanGraph};
use serde_json::Value;
use tracing::{debug, warn};

use crate::document::PlanDocument;

pub use error::CodecError;
pub use file::{read_from_file, write_to_file};
pub use options::{DecodeOptions, MigrationHook, UnknownNodePolicy};

/// Encodes a graph as a pretty-printed JSON document.
pub fn serialize(graph: &PlanGraph) -> Result<String, CodecError> {
    serde_json::to_string_pretty(&PlanDocument::from_graph(graph))
        .map_err(|err| CodecError::Encode(err.to_string()))
}

/// Decodes a document with [`DecodeOptions::default`].
pub fn deserialize(text: &str) -> Result<PlanGraph, CodecError> {
    deserialize_with(text, &DecodeOptions::default())
}

/// Reads only the `engineVersion` tag of a document.
pub fn peek_version(text: &str) -> Result<EngineVersion, CodecError> {
    let value: Value =
        serde_json::from_str(text).map_err(|err| CodecError::Parse(err.to_string()))?;
    document_version(&value)
}

/// Decodes a document under the given options.
pub fn deserialize_with(text: &str, options: &DecodeOptions) -> Result<PlanGraph, CodecError> {
    let mut value: Value =
        serde_json::from_str(text).map_err(|err| CodecError::Parse(err.to_string()))?;
    let version = document_version(&value)?;
    if !options.engine_version.can_read(version) {
        return Err(CodecError::UnsupportedPlanVersion {
            found: version,
            supported: options.engine_version,
        });
    }

    let mut migrated = false;
    for hook in &options.migrations {
        if version < hook.applies_below() {
            debug!(hook = hook.name(), %version, "running plan migration");
            hook.migrate(&mut value).map_err(|reason| {
                CodecError::Parse(format!("migration `{}` failed: {reason}", hook.name()))
            })?;
            migrated = true;
        }
    }
    if version < EngineVersion::OLDEST_SUPPORTED && !migrated {
        return Err(CodecError::UnsupportedPlanVersion {
            found: version,
            supported: options.engine_version,
        });
    }

    drop_unknown_nodes(&mut value, options.unknown_nodes)?;

    let document: PlanDocument =
        serde_json::from_value(value).map_err(|err| CodecError::Parse(err.to_string()))?;
    let (version, nodes, edges) = document.into_parts();
    debug!(%version, nodes = nodes.len(), edges = edges.len(), "decoded plan document");
    Ok(PlanGraph::new(version, nodes, edges)?)
}

fn document_version(value: &Value) -> Result<EngineVersion, CodecError> {
    let tag = value
        .get("engineVersion")
        .ok_or_else(|| CodecError::Parse("missing field `engineVersion`".to_owned()))?
        .as_str()
        .ok_or_else(|| CodecError::Parse("`engineVersion` must be a string".to_owned()))?;
    tag.parse()
        .map_err(|err: flowplan_model::VersionParseError| CodecError::Parse(err.to_string()))
}

/// Checks every kind tag, removing skippable unknown nodes and their edges.
fn drop_unknown_nodes(value: &mut Value, policy: UnknownNodePolicy) -> Result<(), CodecError> {
    let Some(nodes) = value.get_mut("nodes").and_then(Value::as_array_mut) else {
        return Err(CodecError::Parse("missing array `nodes`".to_owned()));
    };
    let mut dropped = HashSet::new();
    for node in nodes.iter() {
        let id = node.get("id").cloned().unwrap_or(Value::Null);
        let kind = node
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| CodecError::Parse(format!("node {id}: missing string `kind`")))?;
        if NodeKind::from_tag(kind).is_some() {
            continue;
        }
        let optional = node.get("optional").and_then(Value::as_bool) == Some(true);
        if policy == UnknownNodePolicy::SkipOptional && optional {
            warn!(node = %id, kind, "skipping optional node of unknown kind");
            dropped.insert(id.to_string());
        } else {
            return Err(CodecError::UnknownNodeKind {
                kind: kind.to_owned(),
                node: id.to_string(),
            });
        }
    }
    if dropped.is_empty() {
        return Ok(());
    }
    nodes.retain(|n| {
        !n.get("id")
            .is_some_and(|id| dropped.contains(&id.to_string()))
    });
    if let Some(edges) = value.get_mut("edges").and_then(Value::as_array_mut) {
        edges.retain(|e| {
            !["source", "target"]
                .iter()
                .any(|end| e.get(end).is_some_and(|id| dropped.contains(&id.to_string())))
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn version_is_read_before_anything_else() {
        let text = r#"{ "engineVersion": "9.0.0", "nodes": "garbage" }"#;
        assert!(matches!(
            deserialize(text),
            Err(CodecError::UnsupportedPlanVersion { found, .. }) if found == EngineVersion::new(9, 0, 0)
        ));
        assert_eq!(peek_version(text).unwrap(), EngineVersion::new(9, 0, 0));
    }

    #[test]
    fn missing_version_is_a_parse_error() {
        assert!(matches!(
            deserialize(r#"{ "nodes": [], "edges": [] }"#),
            Err(CodecError::Parse(_))
        ));
        assert!(matches!(deserialize("{"), Err(CodecError::Parse(_))));
    }

    #[test]
    fn empty_document_decodes() {
        let g = deserialize(r#"{ "engineVersion": "1.0", "nodes": [], "edges": [] }"#).unwrap();
        assert!(g.nodes().is_empty());
        assert_eq!(g.version(), EngineVersion::new(1, 0, 0));
    }
}
