// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Runtime fakes: a translator that emits one unit per node and a function
//! registry that records what it was given.

use std::collections::HashMap;

use flowplan_core::{FunctionRegistry, RuntimeTranslator, RuntimeUnit};
use flowplan_model::{NodeId, ObjectIdentifier, PlanGraph};

/// Unit emitted by [`FakeTranslator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeUnit {
    /// Source node.
    pub node: NodeId,
    /// Uid the unit reports.
    pub uid: Option<String>,
    /// `<kind>-<node id>`.
    pub name: String,
}

impl RuntimeUnit for FakeUnit {
    fn source_node(&self) -> NodeId {
        self.node
    }

    fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Emits one unit per node, using the node's stable id as uid unless
/// overridden.
#[derive(Debug, Clone, Default)]
pub struct FakeTranslator {
    overrides: HashMap<NodeId, Option<String>>,
}

impl FakeTranslator {
    /// Translator that keeps every stable id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the uid reported for `node`.
    pub fn with_uid(mut self, node: NodeId, uid: Option<&str>) -> Self {
        self.overrides.insert(node, uid.map(str::to_owned));
        self
    }
}

impl RuntimeTranslator for FakeTranslator {
    type Unit = FakeUnit;

    fn translate(&self, graph: &PlanGraph) -> Vec<FakeUnit> {
        graph
            .topological_order()
            .into_iter()
            .map(|node| FakeUnit {
                node: node.id(),
                uid: self
                    .overrides
                    .get(&node.id())
                    .cloned()
                    .unwrap_or_else(|| node.stable_id().map(str::to_owned)),
                name: format!("{}-{}", node.kind(), node.id()),
            })
            .collect()
    }
}

/// One accepted registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Operator name.
    pub name: String,
    /// Catalog identifier, if the operator had one.
    pub function: Option<ObjectIdentifier>,
    /// Payload bytes as received.
    pub payload: Vec<u8>,
}

/// Registry that records registrations, optionally refusing all of them.
#[derive(Debug, Clone, Default)]
pub struct RecordingRegistry {
    /// Accepted registrations in call order.
    pub registered: Vec<Registration>,
    refusal: Option<String>,
}

impl RecordingRegistry {
    /// Registry that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that refuses every payload with `reason`.
    pub fn refusing(reason: impl Into<String>) -> Self {
        Self {
            registered: Vec::new(),
            refusal: Some(reason.into()),
        }
    }
}

impl FunctionRegistry for RecordingRegistry {
    fn register(
        &mut self,
        name: &str,
        function: Option<&ObjectIdentifier>,
        payload: &[u8],
    ) -> Result<(), String> {
        if let Some(reason) = &self.refusal {
            return Err(reason.clone());
        }
        self.registered.push(Registration {
            name: name.to_owned(),
            function: function.cloned(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}
