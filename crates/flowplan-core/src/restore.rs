// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Restore-time validation of decoded plans.

use flowplan_model::{
    CatalogObjectRef, EngineVersion, ObjectIdentifier, Operator, PlanGraph, PlanNode,
    ResolutionMode,
};
use tracing::debug;

use crate::catalog::Catalog;
use crate::typecheck::check_node;
use crate::PlanError;

/// Validates a decoded plan before it is handed to the runtime.
///
/// Checks run in a fixed order and the first failure wins:
///
/// 1. every identity-requiring node carries a stable id
/// 2. every catalog reference resolves under its mode
/// 3. node attributes agree with the declared types
/// 4. the plan version is not newer than `engine`
pub fn validate_restored(
    graph: &PlanGraph,
    catalog: &dyn Catalog,
    engine: EngineVersion,
) -> Result<(), PlanError> {
    check_stable_ids(graph)?;
    check_catalog_refs(graph, catalog)?;
    check_types(graph, Some(catalog))?;
    check_version(graph, engine)?;
    debug!(nodes = graph.nodes().len(), version = %graph.version(), "restored plan validated");
    Ok(())
}

/// Fails on the first identity-requiring node without a stable id.
pub fn check_stable_ids(graph: &PlanGraph) -> Result<(), PlanError> {
    match graph
        .nodes()
        .iter()
        .find(|n| n.requires_stable_id() && !n.has_stable_id())
    {
        Some(node) => Err(PlanError::MissingStableIdentity {
            node: node.id(),
            kind: node.kind(),
        }),
        None => Ok(()),
    }
}

/// Resolves every table and function reference.
///
/// Persisted tables must carry their snapshot, persisted functions their
/// payload. Live references must exist in `catalog`.
pub fn check_catalog_refs(graph: &PlanGraph, catalog: &dyn Catalog) -> Result<(), PlanError> {
    for node in graph.nodes() {
        if let Some(table) = node.attrs().table_ref() {
            resolve_table(node, table, catalog)?;
        }
        for expr in node.attrs().expressions() {
            let mut failure = None;
            expr.for_each_operator(&mut |op| {
                if failure.is_none() {
                    failure = check_function_ref(node, op, catalog).err();
                }
            });
            if let Some(err) = failure {
                return Err(err);
            }
        }
        for call in node.attrs().aggregate_calls() {
            check_function_ref(node, &call.function, catalog)?;
        }
    }
    Ok(())
}

fn check_function_ref(
    node: &PlanNode,
    op: &Operator,
    catalog: &dyn Catalog,
) -> Result<(), PlanError> {
    let Some(function) = &op.function else {
        return Ok(());
    };
    match function.resolution {
        ResolutionMode::AsPersistedSnapshot if op.payload.is_none() => Err(unresolved(
            node,
            &function.identifier,
            "persisted function has no payload",
        )),
        ResolutionMode::ResolveFromLiveCatalog if !catalog.has_function(&function.identifier) => {
            Err(unresolved(
                node,
                &function.identifier,
                "function is not registered in the catalog",
            ))
        }
        _ => Ok(()),
    }
}

fn resolve_table(
    node: &PlanNode,
    table: &CatalogObjectRef,
    catalog: &dyn Catalog,
) -> Result<(), PlanError> {
    match table.resolution {
        ResolutionMode::AsPersistedSnapshot if table.snapshot.is_none() => Err(unresolved(
            node,
            &table.identifier,
            "persisted reference has no snapshot",
        )),
        ResolutionMode::ResolveFromLiveCatalog if catalog.table(&table.identifier).is_none() => {
            Err(unresolved(
                node,
                &table.identifier,
                "table does not exist in the catalog",
            ))
        }
        _ => Ok(()),
    }
}

fn unresolved(node: &PlanNode, object: &ObjectIdentifier, reason: &str) -> PlanError {
    PlanError::CatalogObjectUnresolved {
        node: node.id(),
        object: object.clone(),
        reason: reason.to_owned(),
    }
}

/// Runs the per-kind type checks over every node in declared order.
///
/// Without a catalog, live table schemas are not compared.
pub fn check_types(graph: &PlanGraph, catalog: Option<&dyn Catalog>) -> Result<(), PlanError> {
    graph
        .nodes()
        .iter()
        .try_for_each(|node| check_node(graph, node, catalog))
}

/// Rejects plans tagged with a version newer than `engine`.
pub fn check_version(graph: &PlanGraph, engine: EngineVersion) -> Result<(), PlanError> {
    if graph.version() > engine {
        return Err(PlanError::UnsupportedPlanVersion {
            found: graph.version(),
            supported: engine,
        });
    }
    Ok(())
}

