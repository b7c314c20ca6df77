// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire shape of the plan document.

use flowplan_model::{
    Edge, EngineVersion, NodeAttrs, NodeHints, NodeId, PlanGraph, PlanNode, TypeDescriptor,
};
use serde::{Deserialize, Serialize};

/// Top-level document: `{engineVersion, nodes, edges}`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlanDocument {
    pub engine_version: EngineVersion,
    pub nodes: Vec<NodeDocument>,
    pub edges: Vec<Edge>,
}

/// One node: id, the flattened attribute record (`kind` plus its fields),
/// output type and bookkeeping.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NodeDocument {
    pub id: NodeId,
    #[serde(flatten)]
    pub attrs: NodeAttrs,
    pub output_type: TypeDescriptor,
    /// Written for readers; regenerated on decode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stable_id: Option<String>,
    #[serde(default, skip_serializing_if = "NodeHints::is_empty")]
    pub hints: NodeHints,
    /// Marks a node older readers may skip when they do not know its kind.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl PlanDocument {
    pub(crate) fn from_graph(graph: &PlanGraph) -> Self {
        Self {
            engine_version: graph.version(),
            nodes: graph
                .nodes()
                .iter()
                .map(|n| NodeDocument {
                    id: n.id(),
                    attrs: n.attrs().clone(),
                    output_type: n.output_type().clone(),
                    description: Some(n.description().to_owned()),
                    stable_id: n.stable_id().map(str::to_owned),
                    hints: n.hints().clone(),
                    optional: false,
                })
                .collect(),
            edges: graph.edges().to_vec(),
        }
    }

    pub(crate) fn into_parts(self) -> (EngineVersion, Vec<PlanNode>, Vec<Edge>) {
        let nodes = self
            .nodes
            .into_iter()
            .map(|n| {
                PlanNode::new(n.id, n.attrs, n.output_type)
                    .with_stable_id(n.stable_id)
                    .with_hints(n.hints)
            })
            .collect();
        (self.engine_version, nodes, self.edges)
    }
}
