// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-kind consistency between node attributes and declared row types.
//!
//! Shapes are compared with [`TypeDescriptor::same_physical_shape`]: field
//! names and nullability never matter, and a time attribute lines up with the
//! timestamp it materializes to.

use flowplan_model::{
    AggregateCall, CatalogObjectRef, Distribution, Expression, JoinType, NodeAttrs, PlanGraph,
    PlanNode, ResolutionMode, RowField, TimeMarker, TypeDescriptor,
};

use crate::catalog::Catalog;
use crate::PlanError;

type Check = Result<(), String>;

/// Checks one node. Live table references are only compared against the
/// catalog when one is supplied.
pub(crate) fn check_node(
    graph: &PlanGraph,
    node: &PlanNode,
    catalog: Option<&dyn Catalog>,
) -> Result<(), PlanError> {
    check(graph, node, catalog).map_err(|reason| PlanError::TypeInconsistency {
        node: node.id(),
        kind: node.kind(),
        reason,
    })
}

fn check(graph: &PlanGraph, node: &PlanNode, catalog: Option<&dyn Catalog>) -> Check {
    let out = row_of(node.output_type(), "output type")?;
    let input_nodes = graph.inputs(node.id());
    let inputs = input_nodes
        .iter()
        .map(|n| row_of(n.output_type(), &format!("output of input node {}", n.id())))
        .collect::<Result<Vec<_>, _>>()?;
    let first = inputs.first().copied().unwrap_or(&[]);

    match node.attrs() {
        NodeAttrs::TableSourceScan {
            table,
            projected_fields,
        } => check_scan(out, table, projected_fields.as_deref(), catalog),
        NodeAttrs::Calc {
            projection,
            condition,
        } => {
            if projection.len() != out.len() {
                return Err(format!(
                    "{} projections for {} output fields",
                    projection.len(),
                    out.len()
                ));
            }
            for (i, (expr, field)) in projection.iter().zip(out).enumerate() {
                check_refs(expr, first)?;
                if !expr.result_type().same_physical_shape(&field.ty) {
                    return Err(format!(
                        "projection {i} yields {} but output field `{}` is {}",
                        expr.result_type(),
                        field.name,
                        field.ty
                    ));
                }
            }
            if let Some(cond) = condition {
                check_refs(cond, first)?;
                if !is_boolean(cond.result_type()) {
                    return Err(format!("condition yields {}", cond.result_type()));
                }
            }
            Ok(())
        }
        NodeAttrs::WatermarkAssigner {
            rowtime_field,
            watermark_expr,
        } => {
            rows_match(out, first, "input")?;
            let rowtime = field_at(out, *rowtime_field, "rowtime field")?;
            if !rowtime.ty.is_time_attribute(TimeMarker::EventTime) {
                return Err(format!(
                    "rowtime field `{}` is {}, not an event-time attribute",
                    rowtime.name, rowtime.ty
                ));
            }
            check_refs(watermark_expr, first)?;
            if !watermark_expr.result_type().same_physical_shape(&rowtime.ty) {
                return Err(format!(
                    "watermark yields {} for rowtime {}",
                    watermark_expr.result_type(),
                    rowtime.ty
                ));
            }
            Ok(())
        }
        NodeAttrs::Exchange { distribution } => {
            rows_match(out, first, "input")?;
            if let Distribution::HashOn { keys } = distribution {
                check_indices(keys, first, "hash key")?;
            }
            if let Some(edge) = graph
                .output_edges(node.id())
                .find(|e| e.distribution != *distribution)
            {
                return Err(format!(
                    "edge to node {} carries {} but the exchange requests {distribution}",
                    edge.target, edge.distribution
                ));
            }
            Ok(())
        }
        NodeAttrs::GroupAggregate {
            grouping_keys,
            aggregate_calls,
            ..
        } => check_aggregate(out, first, grouping_keys, aggregate_calls, &[]),
        NodeAttrs::GroupWindowAggregate {
            grouping_keys,
            aggregate_calls,
            window_spec,
            ..
        } => {
            let time = field_at(first, window_spec.time_field, "window time field")?;
            if !time.ty.is_time_attribute(TimeMarker::EventTime)
                && !time.ty.is_time_attribute(TimeMarker::ProcessingTime)
            {
                return Err(format!(
                    "window time field `{}` is {}, not a time attribute",
                    time.name, time.ty
                ));
            }
            let properties: Vec<TypeDescriptor> = window_spec
                .properties
                .iter()
                .map(|p| p.result_type())
                .collect();
            check_aggregate(out, first, grouping_keys, aggregate_calls, &properties)
        }
        NodeAttrs::Deduplicate {
            unique_keys,
            rowtime_field,
            ..
        } => {
            rows_match(out, first, "input")?;
            check_indices(unique_keys, first, "unique key")?;
            if let Some(f) = rowtime_field {
                let field = field_at(first, *f, "rowtime field")?;
                if !field.ty.is_time_attribute(TimeMarker::EventTime) {
                    return Err(format!(
                        "ordering field `{}` is {}, not an event-time attribute",
                        field.name, field.ty
                    ));
                }
            }
            Ok(())
        }
        NodeAttrs::Join {
            join_type,
            left_keys,
            right_keys,
            condition,
        } => {
            let left = first;
            let right = inputs.get(1).copied().unwrap_or(&[]);
            if left_keys.len() != right_keys.len() {
                return Err(format!(
                    "{} left keys but {} right keys",
                    left_keys.len(),
                    right_keys.len()
                ));
            }
            check_indices(left_keys, left, "left key")?;
            check_indices(right_keys, right, "right key")?;
            for (l, r) in left_keys.iter().zip(right_keys) {
                if !left[*l].ty.same_physical_shape(&right[*r].ty) {
                    return Err(format!(
                        "key ${l} ({}) cannot be compared with right ${r} ({})",
                        left[*l].ty, right[*r].ty
                    ));
                }
            }
            let joined: Vec<RowField> = left.iter().chain(right).cloned().collect();
            if let Some(cond) = condition {
                check_refs(cond, &joined)?;
                if !is_boolean(cond.result_type()) {
                    return Err(format!("condition yields {}", cond.result_type()));
                }
            }
            match join_type {
                JoinType::Semi | JoinType::Anti => rows_match(out, left, "left input"),
                _ => rows_match(out, &joined, "joined inputs"),
            }
        }
        NodeAttrs::Union {} => {
            for (i, input) in inputs.iter().enumerate() {
                rows_match(out, input, &format!("input {i}"))?;
            }
            Ok(())
        }
        NodeAttrs::Sink { table } => {
            rows_match(out, first, "input")?;
            check_table_schema(out, table, catalog, "written")
        }
    }
}

fn check_scan(
    out: &[RowField],
    table: &CatalogObjectRef,
    projected: Option<&[usize]>,
    catalog: Option<&dyn Catalog>,
) -> Check {
    match (table.resolution, &table.snapshot) {
        (ResolutionMode::AsPersistedSnapshot, Some(snapshot)) => {
            let read = match projected {
                Some(indices) => snapshot
                    .schema
                    .project(indices)
                    .map_err(|err| err.to_string())?,
                None => snapshot.schema.clone(),
            };
            rows_match(out, row_of(&read, "table schema")?, "persisted table schema")
        }
        _ => check_table_schema(out, table, catalog, "read"),
    }
}

/// Compares plan fields against the table schema.
///
/// Persisted snapshots are compared positionally. Live tables are compared
/// by field name: every field the plan reads or writes must still exist with
/// the same shape, extra table columns are fine.
fn check_table_schema(
    out: &[RowField],
    table: &CatalogObjectRef,
    catalog: Option<&dyn Catalog>,
    verb: &str,
) -> Check {
    match table.resolution {
        ResolutionMode::AsPersistedSnapshot => match &table.snapshot {
            Some(snapshot) => rows_match(
                out,
                row_of(&snapshot.schema, "table schema")?,
                "persisted table schema",
            ),
            None => Ok(()),
        },
        ResolutionMode::ResolveFromLiveCatalog => {
            let Some(live) = catalog.and_then(|c| c.table(&table.identifier)) else {
                return Ok(());
            };
            let columns = row_of(&live.schema, "catalog schema")?;
            for field in out {
                let Some(column) = columns.iter().find(|c| c.name == field.name) else {
                    return Err(format!(
                        "field `{}` {verb} by the plan no longer exists in {}",
                        field.name, table.identifier
                    ));
                };
                if !column.ty.same_physical_shape(&field.ty) {
                    return Err(format!(
                        "field `{}` of {} changed from {} to {}",
                        field.name, table.identifier, field.ty, column.ty
                    ));
                }
            }
            Ok(())
        }
    }
}

fn check_aggregate(
    out: &[RowField],
    input: &[RowField],
    keys: &[usize],
    calls: &[AggregateCall],
    trailing: &[TypeDescriptor],
) -> Check {
    check_indices(keys, input, "grouping key")?;
    let expected = keys.len() + calls.len() + trailing.len();
    if out.len() != expected {
        return Err(format!(
            "{} output fields, expected {expected} ({} keys, {} aggregates, {} window properties)",
            out.len(),
            keys.len(),
            calls.len(),
            trailing.len()
        ));
    }
    for (field, key) in out.iter().zip(keys) {
        if !field.ty.same_physical_shape(&input[*key].ty) {
            return Err(format!(
                "grouping key ${key} is {} but output field `{}` is {}",
                input[*key].ty, field.name, field.ty
            ));
        }
    }
    for (field, call) in out[keys.len()..].iter().zip(calls) {
        check_indices(&call.args, input, "aggregate argument")?;
        if let Some(filter) = call.filter_arg {
            field_at(input, filter, "aggregate filter")?;
        }
        if !field.ty.same_physical_shape(&call.result_type) {
            return Err(format!(
                "aggregate `{}` yields {} but output field `{}` is {}",
                call.name, call.result_type, field.name, field.ty
            ));
        }
    }
    for (field, ty) in out[keys.len() + calls.len()..].iter().zip(trailing) {
        if !field.ty.same_physical_shape(ty) {
            return Err(format!(
                "window property field `{}` is {}, expected {ty}",
                field.name, field.ty
            ));
        }
    }
    Ok(())
}

fn row_of<'t>(ty: &'t TypeDescriptor, what: &str) -> Result<&'t [RowField], String> {
    ty.fields()
        .ok_or_else(|| format!("{what} {ty} is not a row type"))
}

fn field_at<'r>(row: &'r [RowField], index: usize, what: &str) -> Result<&'r RowField, String> {
    row.get(index)
        .ok_or_else(|| format!("{what} ${index} out of range for {} fields", row.len()))
}

fn check_indices(indices: &[usize], row: &[RowField], what: &str) -> Check {
    for &i in indices {
        field_at(row, i, what)?;
    }
    Ok(())
}

fn rows_match(actual: &[RowField], expected: &[RowField], what: &str) -> Check {
    if actual.len() != expected.len() {
        return Err(format!(
            "{} output fields but {what} has {}",
            actual.len(),
            expected.len()
        ));
    }
    for (a, e) in actual.iter().zip(expected) {
        if !a.ty.same_physical_shape(&e.ty) {
            return Err(format!(
                "output field `{}` is {} but {what} field `{}` is {}",
                a.name, a.ty, e.name, e.ty
            ));
        }
    }
    Ok(())
}

fn check_refs(expr: &Expression, input: &[RowField]) -> Check {
    let mut problem = None;
    expr.for_each_field_ref(&mut |index, ty| {
        if problem.is_some() {
            return;
        }
        match input.get(index) {
            None => {
                problem = Some(format!(
                    "field reference ${index} out of range for {} input fields",
                    input.len()
                ));
            }
            Some(field) if !field.ty.same_physical_shape(ty) => {
                problem = Some(format!(
                    "field reference ${index} typed {ty} but input field `{}` is {}",
                    field.name, field.ty
                ));
            }
            Some(_) => {}
        }
    });
    problem.map_or(Ok(()), Err)
}

fn is_boolean(ty: &TypeDescriptor) -> bool {
    matches!(ty, TypeDescriptor::Primitive { name, .. } if name.eq_ignore_ascii_case("BOOLEAN"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use flowplan_model::{ObjectIdentifier, PlanGraphBuilder, TableSnapshot};

    fn row(fields: &[(&str, TypeDescriptor)]) -> TypeDescriptor {
        TypeDescriptor::row(fields.iter().cloned()).unwrap()
    }

    fn scan(b: &mut PlanGraphBuilder, name: &str, ty: &TypeDescriptor) -> u32 {
        b.node(
            NodeAttrs::TableSourceScan {
                table: CatalogObjectRef::persisted(
                    ObjectIdentifier::new("c", "d", name),
                    TableSnapshot::new(ty.clone()),
                ),
                projected_fields: None,
            },
            ty.clone(),
        )
    }

    fn check_all(graph: &PlanGraph) -> Result<(), PlanError> {
        graph
            .nodes()
            .iter()
            .try_for_each(|n| check_node(graph, n, None))
    }

    fn join_graph(join_type: JoinType, left_keys: Vec<usize>, out: TypeDescriptor) -> PlanGraph {
        let left = row(&[("id", TypeDescriptor::bigint()), ("v", TypeDescriptor::int())]);
        let right = row(&[("rid", TypeDescriptor::bigint())]);
        let mut b = PlanGraphBuilder::new();
        let l = scan(&mut b, "L", &left);
        let r = scan(&mut b, "R", &right);
        let join = b.node(
            NodeAttrs::Join {
                join_type,
                left_keys,
                right_keys: vec![0],
                condition: None,
            },
            out,
        );
        b.edge(l, join).edge(r, join);
        b.build().unwrap()
    }

    #[test]
    fn inner_join_outputs_both_sides() {
        let out = row(&[
            ("id", TypeDescriptor::bigint()),
            ("v", TypeDescriptor::int()),
            ("rid", TypeDescriptor::bigint()),
        ]);
        check_all(&join_graph(JoinType::Inner, vec![0], out)).unwrap();
    }

    #[test]
    fn semi_join_outputs_the_left_side() {
        let out = row(&[("id", TypeDescriptor::bigint()), ("v", TypeDescriptor::int())]);
        check_all(&join_graph(JoinType::Semi, vec![0], out)).unwrap();
    }

    #[test]
    fn join_keys_must_pair_up_by_type() {
        let out = row(&[
            ("id", TypeDescriptor::bigint()),
            ("v", TypeDescriptor::int()),
            ("rid", TypeDescriptor::bigint()),
        ]);
        let err = check_all(&join_graph(JoinType::Left, vec![1], out)).unwrap_err();
        assert!(err.to_string().contains("cannot be compared"), "{err}");
    }

    #[test]
    fn deduplicate_orders_by_event_time_only() {
        let input = row(&[
            ("k", TypeDescriptor::bigint()),
            ("ts", TypeDescriptor::timestamp(3)),
        ]);
        let mut b = PlanGraphBuilder::new();
        let s = scan(&mut b, "T", &input);
        let dedup = b.node(
            NodeAttrs::Deduplicate {
                unique_keys: vec![0],
                keep_last_row: true,
                rowtime_field: Some(1),
            },
            input,
        );
        b.edge(s, dedup);
        let err = check_all(&b.build().unwrap()).unwrap_err();
        assert!(matches!(err, PlanError::TypeInconsistency { node: 2, .. }));
    }

    #[test]
    fn calc_condition_must_be_boolean() {
        let input = row(&[("a", TypeDescriptor::int())]);
        let mut b = PlanGraphBuilder::new();
        let s = scan(&mut b, "T", &input);
        let calc = b.node(
            NodeAttrs::Calc {
                projection: vec![Expression::field(0, TypeDescriptor::int())],
                condition: Some(Expression::field(0, TypeDescriptor::int())),
            },
            input,
        );
        b.edge(s, calc);
        let err = check_all(&b.build().unwrap()).unwrap_err();
        assert!(err.to_string().contains("condition yields INT"), "{err}");
    }

    #[test]
    fn field_refs_must_match_input_types() {
        let input = row(&[("a", TypeDescriptor::int())]);
        let mut b = PlanGraphBuilder::new();
        let s = scan(&mut b, "T", &input);
        let calc = b.node(
            NodeAttrs::Calc {
                projection: vec![Expression::field(0, TypeDescriptor::string())],
                condition: None,
            },
            row(&[("a", TypeDescriptor::string())]),
        );
        b.edge(s, calc);
        let err = check_all(&b.build().unwrap()).unwrap_err();
        assert!(err.to_string().contains("field reference $0"), "{err}");
    }
}
