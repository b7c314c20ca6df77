// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Hand-off to the execution runtime.
//!
//! The runtime is an external collaborator. It turns the graph into its own
//! executable units and must key their state by the node's stable id; the
//! checks here hold it to that.

use flowplan_model::{ModelError, NodeId, ObjectIdentifier, Operator, PlanGraph};
use tracing::debug;

use crate::compiled::CompiledPlan;
use crate::PlanError;

/// One executable unit produced by the runtime.
pub trait RuntimeUnit {
    /// Plan node this unit executes.
    fn source_node(&self) -> NodeId;
    /// Uid the runtime keys this unit's state by.
    fn uid(&self) -> Option<&str>;
    /// Display name for diagnostics.
    fn name(&self) -> &str;
}

/// Turns a plan graph into runtime units.
pub trait RuntimeTranslator {
    /// Unit type produced.
    type Unit: RuntimeUnit;

    /// Translates every node the runtime executes.
    fn translate(&self, graph: &PlanGraph) -> Vec<Self::Unit>;
}

/// Receives user-defined function bodies during translation.
pub trait FunctionRegistry {
    /// Registers `payload` under `name`. Returns the registry's refusal
    /// message on failure.
    fn register(
        &mut self,
        name: &str,
        function: Option<&ObjectIdentifier>,
        payload: &[u8],
    ) -> Result<(), String>;
}

/// Checks that every unit of an identity-requiring node uses that node's
/// stable id as its uid.
///
/// Units of relay nodes are not checked.
pub fn check_runtime_uids<U: RuntimeUnit>(
    plan: &CompiledPlan,
    units: &[U],
) -> Result<(), PlanError> {
    let graph = plan.graph();
    for unit in units {
        let node = graph.node(unit.source_node()).ok_or_else(|| {
            ModelError::InvalidGraphStructure(format!(
                "runtime unit `{}` references missing node {}",
                unit.name(),
                unit.source_node()
            ))
        })?;
        if !node.requires_stable_id() {
            continue;
        }
        let Some(expected) = node.stable_id() else {
            return Err(PlanError::MissingStableIdentity {
                node: node.id(),
                kind: node.kind(),
            });
        };
        match unit.uid().filter(|uid| !uid.trim().is_empty()) {
            None => {
                return Err(PlanError::MissingStableIdentity {
                    node: node.id(),
                    kind: node.kind(),
                })
            }
            Some(found) if found != expected => {
                return Err(PlanError::RuntimeUidMismatch {
                    unit: unit.name().to_owned(),
                    node: node.id(),
                    expected: expected.to_owned(),
                    found: found.to_owned(),
                })
            }
            Some(_) => {}
        }
    }
    debug!(units = units.len(), "runtime uids match stable ids");
    Ok(())
}

/// Passes every operator payload to `registry`, byte for byte.
///
/// Payloads are integrity-checked first. Returns the number of payloads
/// registered.
pub fn bind_functions(
    graph: &PlanGraph,
    registry: &mut dyn FunctionRegistry,
) -> Result<usize, PlanError> {
    let mut operators: Vec<&Operator> = Vec::new();
    for node in graph.nodes() {
        for expr in node.attrs().expressions() {
            expr.for_each_operator(&mut |op| operators.push(op));
        }
        operators.extend(node.attrs().aggregate_calls().iter().map(|c| &c.function));
    }

    let mut bound = 0;
    for op in operators {
        let Some(payload) = &op.payload else {
            continue;
        };
        let bytes = payload.bytes()?;
        registry
            .register(
                &op.name,
                op.function.as_ref().map(|f| &f.identifier),
                &bytes,
            )
            .map_err(|reason| PlanError::FunctionBinding {
                operator: op.name.clone(),
                reason,
            })?;
        bound += 1;
    }
    debug!(bound, "bound function payloads");
    Ok(bound)
}

impl CompiledPlan {
    /// Translates the plan and verifies the runtime kept its stable ids.
    pub fn translate<T: RuntimeTranslator>(
        &self,
        translator: &T,
    ) -> Result<Vec<T::Unit>, PlanError> {
        let units = translator.translate(self.graph());
        check_runtime_uids(self, &units)?;
        Ok(units)
    }
}
