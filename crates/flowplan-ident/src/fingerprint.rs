// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Node fingerprints over canonicalized semantic content.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use flowplan_model::{NodeId, PlanGraph, PlanNode};
use serde::Serialize;
use serde_json::{Number, Value};

use crate::IdentityError;

/// Domain prefix hashed ahead of every node fingerprint.
pub const NODE_FINGERPRINT_V1: &[u8] = b"flowplan:node_fingerprint:v1\0";

/// A 32-byte BLAKE3 node fingerprint.
///
/// `Display` renders lowercase hex.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    /// View the fingerprint as bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// JSON value with sorted object keys.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum CanonicalValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<CanonicalValue>),
    Object(BTreeMap<String, CanonicalValue>),
}

fn canonicalize(value: Value) -> CanonicalValue {
    match value {
        Value::Null => CanonicalValue::Null,
        Value::Bool(b) => CanonicalValue::Bool(b),
        Value::Number(n) => CanonicalValue::Number(n),
        Value::String(s) => CanonicalValue::String(s),
        Value::Array(items) => CanonicalValue::Array(items.into_iter().map(canonicalize).collect()),
        Value::Object(map) => {
            CanonicalValue::Object(map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect())
        }
    }
}

/// Removes content that must not influence identity.
///
/// Catalog references keep only their identifier; operators lose their
/// payload.
fn strip_volatile(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.contains_key("identifier") && map.contains_key("resolution") {
                map.retain(|k, _| k == "identifier");
            }
            if map.contains_key("syntax") {
                map.remove("payload");
            }
            for child in map.values_mut() {
                strip_volatile(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_volatile),
        _ => {}
    }
}

/// Replaces every row type's named fields with their bare types, so column
/// renames leave identity untouched while shapes still count.
fn erase_field_names(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("row") {
                if let Some(Value::Array(fields)) = map.get_mut("fields") {
                    for field in fields.iter_mut() {
                        if let Some(ty) = field.get_mut("type").map(Value::take) {
                            *field = ty;
                        }
                    }
                }
            }
            for child in map.values_mut() {
                erase_field_names(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(erase_field_names),
        _ => {}
    }
}

fn fail(node: &PlanNode, reason: impl Into<String>) -> IdentityError {
    IdentityError::AssignmentFailed {
        node: node.id(),
        reason: reason.into(),
    }
}

/// Canonical bytes of one node given its predecessors' fingerprints.
///
/// The document is `{kind, attributes, outputType, inputs}` with sorted keys
/// and no whitespace; `inputs` is the sorted list of predecessor fingerprints
/// in hex. Row types appear as their field types only. Ids, descriptions,
/// hints, stable ids and field names never appear.
pub fn canonical_bytes(node: &PlanNode, inputs: &[Fingerprint]) -> Result<Vec<u8>, IdentityError> {
    let mut attributes =
        serde_json::to_value(node.attrs()).map_err(|err| fail(node, err.to_string()))?;
    if let Value::Object(map) = &mut attributes {
        map.remove("kind");
    }
    strip_volatile(&mut attributes);
    erase_field_names(&mut attributes);
    let mut output_type =
        serde_json::to_value(node.output_type()).map_err(|err| fail(node, err.to_string()))?;
    erase_field_names(&mut output_type);
    let mut input_hex: Vec<String> = inputs.iter().map(Fingerprint::to_hex).collect();
    input_hex.sort_unstable();

    let document = serde_json::json!({
        "kind": node.kind().tag(),
        "attributes": attributes,
        "outputType": output_type,
        "inputs": input_hex,
    });
    serde_json::to_vec(&canonicalize(document)).map_err(|err| fail(node, err.to_string()))
}

/// Fingerprint of one node given its predecessors' fingerprints.
pub fn fingerprint_node(
    node: &PlanNode,
    inputs: &[Fingerprint],
) -> Result<Fingerprint, IdentityError> {
    let bytes = canonical_bytes(node, inputs)?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(NODE_FINGERPRINT_V1);
    hasher.update(&bytes);
    Ok(Fingerprint(*hasher.finalize().as_bytes()))
}

/// Fingerprints every node, visiting them in topological order.
pub fn fingerprint_graph(graph: &PlanGraph) -> Result<HashMap<NodeId, Fingerprint>, IdentityError> {
    let mut prints = HashMap::with_capacity(graph.nodes().len());
    for node in graph.topological_order() {
        let inputs = graph
            .input_edges(node.id())
            .map(|edge| {
                prints
                    .get(&edge.source)
                    .copied()
                    .ok_or_else(|| fail(node, format!("input {} not fingerprinted", edge.source)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        prints.insert(node.id(), fingerprint_node(node, &inputs)?);
    }
    Ok(prints)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use flowplan_model::{
        CatalogObjectRef, NodeAttrs, ObjectIdentifier, TableSnapshot, TypeDescriptor,
    };

    fn scan(table: CatalogObjectRef) -> PlanNode {
        let row = TypeDescriptor::row([("a", TypeDescriptor::int())]).unwrap();
        PlanNode::new(
            1,
            NodeAttrs::TableSourceScan {
                table,
                projected_fields: None,
            },
            row,
        )
    }

    #[test]
    fn canonical_bytes_are_sorted_and_compact() {
        let id = ObjectIdentifier::new("c", "d", "t");
        let bytes = canonical_bytes(&scan(CatalogObjectRef::live(id)), &[]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with(r#"{"attributes":{"table":{"identifier":"#));
        assert!(text.contains(r#""inputs":[],"kind":"table-source-scan","outputType""#));
        assert!(!text.contains(' '));
    }

    #[test]
    fn snapshots_and_resolution_do_not_affect_fingerprint() {
        let id = ObjectIdentifier::new("c", "d", "t");
        let row = TypeDescriptor::row([("a", TypeDescriptor::int())]).unwrap();
        let live = fingerprint_node(&scan(CatalogObjectRef::live(id.clone())), &[]).unwrap();
        let persisted = fingerprint_node(
            &scan(CatalogObjectRef::persisted(
                id,
                TableSnapshot::new(row).with_option("connector", "kafka"),
            )),
            &[],
        )
        .unwrap();
        assert_eq!(live, persisted);
    }

    #[test]
    fn row_field_names_are_not_hashed() {
        let id = ObjectIdentifier::new("c", "d", "t");
        let bytes = canonical_bytes(&scan(CatalogObjectRef::live(id)), &[]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(
            text.ends_with(
                r#""outputType":{"fields":[{"name":"INT","nullable":true,"type":"primitive"}],"type":"row"}}"#
            ),
            "{text}"
        );
    }

    #[test]
    fn input_order_does_not_matter() {
        let node = scan(CatalogObjectRef::live(ObjectIdentifier::new("c", "d", "t")));
        let a = Fingerprint([1; 32]);
        let b = Fingerprint([2; 32]);
        assert_eq!(
            fingerprint_node(&node, &[a, b]).unwrap(),
            fingerprint_node(&node, &[b, a]).unwrap()
        );
        assert_ne!(
            fingerprint_node(&node, &[a]).unwrap(),
            fingerprint_node(&node, &[a, b]).unwrap()
        );
    }
}
