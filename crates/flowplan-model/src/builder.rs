// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Incremental construction of a [`PlanGraph`].

use crate::edge::{Distribution, Edge};
use crate::error::ModelError;
use crate::graph::PlanGraph;
use crate::node::{NodeAttrs, NodeHints, NodeId, PlanNode};
use crate::types::TypeDescriptor;
use crate::version::EngineVersion;

/// Collects nodes and edges; ids are handed out as `1..=n` in declaration
/// order. Validation happens once, in [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct PlanGraphBuilder {
    version: EngineVersion,
    nodes: Vec<PlanNode>,
    edges: Vec<Edge>,
}

impl PlanGraphBuilder {
    /// Builder stamping the current engine version.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder stamping `version` instead.
    pub fn with_version(version: EngineVersion) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Declares a node and returns its id.
    pub fn node(&mut self, attrs: NodeAttrs, output_type: TypeDescriptor) -> NodeId {
        let id = self.next_id();
        self.nodes.push(PlanNode::new(id, attrs, output_type));
        id
    }

    /// Declares a node with planner hints.
    pub fn node_with_hints(
        &mut self,
        attrs: NodeAttrs,
        output_type: TypeDescriptor,
        hints: NodeHints,
    ) -> NodeId {
        let id = self.next_id();
        self.nodes
            .push(PlanNode::new(id, attrs, output_type).with_hints(hints));
        id
    }

    /// Adds a pipelined forward edge.
    pub fn edge(&mut self, source: NodeId, target: NodeId) -> &mut Self {
        self.push_edge(Edge::forward(source, target))
    }

    /// Adds a pipelined edge with an explicit distribution.
    pub fn edge_with(
        &mut self,
        source: NodeId,
        target: NodeId,
        distribution: Distribution,
    ) -> &mut Self {
        self.push_edge(Edge::new(source, target, distribution))
    }

    /// Adds a fully specified edge.
    pub fn push_edge(&mut self, edge: Edge) -> &mut Self {
        self.edges.push(edge);
        self
    }

    /// Validates and returns the graph.
    pub fn build(self) -> Result<PlanGraph, ModelError> {
        PlanGraph::new(self.version, self.nodes, self.edges)
    }

    fn next_id(&self) -> NodeId {
        NodeId::try_from(self.nodes.len() + 1).unwrap_or(NodeId::MAX)
    }
}
