// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Validated plan graph.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::edge::Edge;
use crate::error::ModelError;
use crate::node::{NodeId, PlanNode};
use crate::version::EngineVersion;

/// Physical dataflow DAG tagged with the producing engine version.
///
/// A `PlanGraph` can only be obtained through [`PlanGraph::new`], so every
/// instance satisfies the structural invariants: positive unique ids, edges
/// between existing nodes, no self loops, per-kind input arity and
/// acyclicity. Instances are immutable; annotation produces a new graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanGraph {
    version: EngineVersion,
    nodes: Vec<PlanNode>,
    edges: Vec<Edge>,
    index: HashMap<NodeId, usize>,
}

impl PlanGraph {
    /// Validates and builds a graph.
    ///
    /// # Errors
    /// - [`ModelError::InvalidGraphStructure`] for id, edge, arity or cycle
    ///   violations.
    /// - [`ModelError::MalformedType`] / [`ModelError::OpaquePayloadCorrupt`]
    ///   from node validation.
    pub fn new(
        version: EngineVersion,
        nodes: Vec<PlanNode>,
        edges: Vec<Edge>,
    ) -> Result<Self, ModelError> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (pos, node) in nodes.iter().enumerate() {
            if node.id() == 0 {
                return Err(ModelError::InvalidGraphStructure(
                    "node ids must be positive, found 0".to_owned(),
                ));
            }
            if index.insert(node.id(), pos).is_some() {
                return Err(ModelError::InvalidGraphStructure(format!(
                    "duplicate node id {}",
                    node.id()
                )));
            }
            node.validate()?;
        }

        let mut in_degree = vec![0usize; nodes.len()];
        for edge in &edges {
            for end in [edge.source, edge.target] {
                if !index.contains_key(&end) {
                    return Err(ModelError::InvalidGraphStructure(format!(
                        "edge {} -> {} references missing node {end}",
                        edge.source, edge.target
                    )));
                }
            }
            if edge.source == edge.target {
                return Err(ModelError::InvalidGraphStructure(format!(
                    "self loop on node {}",
                    edge.source
                )));
            }
            if let Some(&pos) = index.get(&edge.target) {
                in_degree[pos] += 1;
            }
        }

        for (node, &inputs) in nodes.iter().zip(&in_degree) {
            let (min, max) = node.kind().input_arity();
            if inputs < min || max.is_some_and(|m| inputs > m) {
                let expected = match max {
                    Some(m) if m == min => format!("{min}"),
                    Some(m) => format!("{min}..={m}"),
                    None => format!("at least {min}"),
                };
                return Err(ModelError::InvalidGraphStructure(format!(
                    "node {} ({}) has {inputs} inputs, expected {expected}",
                    node.id(),
                    node.kind()
                )));
            }
        }

        let graph = Self {
            version,
            nodes,
            edges,
            index,
        };
        if graph.topological_positions().len() != graph.nodes.len() {
            return Err(ModelError::InvalidGraphStructure(
                "graph contains a cycle".to_owned(),
            ));
        }
        Ok(graph)
    }

    /// Producing engine version.
    pub fn version(&self) -> EngineVersion {
        self.version
    }

    /// Nodes in construction order.
    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    /// Edges in construction order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Node with the given id.
    pub fn node(&self, id: NodeId) -> Option<&PlanNode> {
        self.index.get(&id).map(|&pos| &self.nodes[pos])
    }

    /// Declared position of the node with the given id.
    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Incoming edges of `id`, ordered by input ordinal.
    pub fn input_edges(&self, id: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.target == id)
    }

    /// Outgoing edges of `id`, in construction order.
    pub fn output_edges(&self, id: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// Input nodes of `id`, ordered by input ordinal.
    pub fn inputs(&self, id: NodeId) -> Vec<&PlanNode> {
        self.input_edges(id)
            .filter_map(|e| self.node(e.source))
            .collect()
    }

    /// Deterministic topological order.
    ///
    /// Among ready nodes the smallest `(kind, declared position)` goes first.
    /// Node ids never influence the order.
    pub fn topological_order(&self) -> Vec<&PlanNode> {
        self.topological_positions()
            .into_iter()
            .map(|pos| &self.nodes[pos])
            .collect()
    }

    fn topological_positions(&self) -> Vec<usize> {
        let mut remaining = vec![0usize; self.nodes.len()];
        let mut successors: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for edge in &self.edges {
            let ends = (self.index.get(&edge.source), self.index.get(&edge.target));
            if let (Some(&src), Some(&dst)) = ends {
                remaining[dst] += 1;
                successors.entry(src).or_default().push(dst);
            }
        }
        let mut ready: BTreeSet<_> = remaining
            .iter()
            .enumerate()
            .filter(|&(_, &n)| n == 0)
            .map(|(pos, _)| (self.nodes[pos].kind(), pos))
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some((_, pos)) = ready.pop_first() {
            order.push(pos);
            for &next in successors.get(&pos).into_iter().flatten() {
                remaining[next] -= 1;
                if remaining[next] == 0 {
                    ready.insert((self.nodes[next].kind(), next));
                }
            }
        }
        order
    }

    /// Copy of the graph with stable ids replaced from `ids`.
    ///
    /// Nodes missing from the map keep no stable id.
    #[must_use]
    pub fn with_stable_ids(&self, ids: &HashMap<NodeId, String>) -> Self {
        let nodes = self
            .nodes
            .iter()
            .map(|n| n.clone().with_stable_id(ids.get(&n.id()).cloned()))
            .collect();
        Self {
            version: self.version,
            nodes,
            edges: self.edges.clone(),
            index: self.index.clone(),
        }
    }

    /// Copy of the graph re-tagged with another engine version.
    #[must_use]
    pub fn with_version(&self, version: EngineVersion) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }

    /// Decomposes the graph.
    pub fn into_parts(self) -> (EngineVersion, Vec<PlanNode>, Vec<Edge>) {
        (self.version, self.nodes, self.edges)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogObjectRef, ObjectIdentifier, TableSnapshot};
    use crate::node::NodeAttrs;
    use crate::types::TypeDescriptor;

    fn row() -> TypeDescriptor {
        TypeDescriptor::row([("a", TypeDescriptor::int())]).unwrap()
    }

    fn table() -> CatalogObjectRef {
        CatalogObjectRef::persisted(
            ObjectIdentifier::new("cat", "db", "t"),
            TableSnapshot::new(row()),
        )
    }

    fn scan(id: NodeId) -> PlanNode {
        PlanNode::new(
            id,
            NodeAttrs::TableSourceScan {
                table: table(),
                projected_fields: None,
            },
            row(),
        )
    }

    fn sink(id: NodeId) -> PlanNode {
        PlanNode::new(id, NodeAttrs::Sink { table: table() }, row())
    }

    fn union(id: NodeId) -> PlanNode {
        PlanNode::new(id, NodeAttrs::Union {}, row())
    }

    fn err(result: Result<PlanGraph, ModelError>) -> String {
        match result {
            Err(ModelError::InvalidGraphStructure(msg)) => msg,
            other => panic!("expected InvalidGraphStructure, got {other:?}"),
        }
    }

    #[test]
    fn rejects_zero_and_duplicate_ids() {
        let msg = err(PlanGraph::new(EngineVersion::CURRENT, vec![scan(0)], vec![]));
        assert!(msg.contains("positive"));
        let msg = err(PlanGraph::new(
            EngineVersion::CURRENT,
            vec![scan(1), scan(1)],
            vec![],
        ));
        assert!(msg.contains("duplicate"));
    }

    #[test]
    fn rejects_dangling_edges_and_self_loops() {
        let msg = err(PlanGraph::new(
            EngineVersion::CURRENT,
            vec![scan(1), sink(2)],
            vec![Edge::forward(1, 2), Edge::forward(1, 9)],
        ));
        assert!(msg.contains("missing node 9"));
        let msg = err(PlanGraph::new(
            EngineVersion::CURRENT,
            vec![scan(1), sink(2)],
            vec![Edge::forward(1, 2), Edge::forward(2, 2)],
        ));
        assert!(msg.contains("self loop"));
    }

    #[test]
    fn rejects_wrong_arity() {
        let msg = err(PlanGraph::new(
            EngineVersion::CURRENT,
            vec![scan(1), sink(2)],
            vec![],
        ));
        assert!(msg.contains("node 2 (sink) has 0 inputs, expected 1"));
    }

    #[test]
    fn rejects_cycles() {
        let msg = err(PlanGraph::new(
            EngineVersion::CURRENT,
            vec![scan(1), union(2), union(3), sink(4)],
            vec![
                Edge::forward(1, 2),
                Edge::forward(3, 2),
                Edge::forward(2, 3),
                Edge::forward(1, 3),
                Edge::forward(3, 4),
            ],
        ));
        assert!(msg.contains("cycle"));
    }

    #[test]
    fn topological_order_breaks_ties_by_kind_then_position() {
        // Declared sink-first; scans still come out first.
        let g = PlanGraph::new(
            EngineVersion::CURRENT,
            vec![sink(10), union(7), scan(5), scan(3)],
            vec![Edge::forward(5, 7), Edge::forward(3, 7), Edge::forward(7, 10)],
        )
        .unwrap();
        let ids: Vec<_> = g.topological_order().iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec![5, 3, 7, 10]);
        let inputs: Vec<_> = g.inputs(7).iter().map(|n| n.id()).collect();
        assert_eq!(inputs, vec![5, 3]);
    }

    #[test]
    fn with_stable_ids_returns_new_graph() {
        let g = PlanGraph::new(
            EngineVersion::CURRENT,
            vec![scan(1), sink(2)],
            vec![Edge::forward(1, 2)],
        )
        .unwrap();
        let ids = HashMap::from([(1, "table-source-scan_abc".to_owned())]);
        let annotated = g.with_stable_ids(&ids);
        assert_eq!(
            annotated.node(1).and_then(PlanNode::stable_id),
            Some("table-source-scan_abc")
        );
        assert!(g.node(1).and_then(PlanNode::stable_id).is_none());
    }
}
