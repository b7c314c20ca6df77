// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Plan fixtures modeled on real optimizer output.
//!
//! Every graph here type-checks. Tests break one thing at a time.

use flowplan_model::{
    AggregateCall, CatalogObjectRef, Distribution, EmitPolicy, Expression, LiteralValue,
    NodeAttrs, NodeId, ObjectIdentifier, OpaquePayload, Operator, OperatorKind, PlanGraph,
    PlanGraphBuilder, TableSnapshot, TypeDescriptor, WindowKind, WindowProperty, WindowSpec,
};

use crate::catalog::InMemoryCatalog;

/// How fixture tables are referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableMode {
    /// References carry their own snapshot.
    Persisted,
    /// References are looked up in the live catalog on restore.
    Live,
}

/// Session gap of [`session_window_pipeline`] when none is given.
pub const DEFAULT_SESSION_GAP_MS: u64 = 10_000;

/// Node ids of the session window pipeline, in construction order.
pub mod session {
    use flowplan_model::NodeId;

    /// Table scan of `T`.
    pub const SCAN: NodeId = 1;
    /// `b, TO_TIMESTAMP(c) AS rowtime, a`.
    pub const PARSE: NodeId = 2;
    /// Watermark `rowtime - 1s`.
    pub const WATERMARK: NodeId = 3;
    /// `b, a, rowtime`.
    pub const REORDER: NodeId = 4;
    /// Hash exchange on `b`.
    pub const EXCHANGE: NodeId = 5;
    /// Session window aggregate.
    pub const WINDOW: NodeId = 6;
    /// Sink into `S`.
    pub const SINK: NodeId = 7;
}

/// Identifier in the default catalog and database.
pub fn table_id(name: &str) -> ObjectIdentifier {
    ObjectIdentifier::new("default_catalog", "default_database", name)
}

#[allow(clippy::expect_used)]
fn row(fields: &[(&str, TypeDescriptor)]) -> TypeDescriptor {
    TypeDescriptor::row(fields.iter().cloned())
        .expect("fixture row should have unique field names")
}

/// `T(a INT, b BIGINT, c STRING)`.
pub fn source_row() -> TypeDescriptor {
    row(&[
        ("a", TypeDescriptor::int()),
        ("b", TypeDescriptor::bigint()),
        ("c", TypeDescriptor::string()),
    ])
}

/// Output of the session window aggregate and schema of `S`.
pub fn window_row() -> TypeDescriptor {
    row(&[
        ("b", TypeDescriptor::bigint()),
        ("cnt", TypeDescriptor::bigint().not_null()),
        ("total", TypeDescriptor::int()),
        ("w_start", TypeDescriptor::timestamp(3).not_null()),
        ("w_end", TypeDescriptor::timestamp(3).not_null()),
    ])
}

/// Output of each grouped branch of [`parallel_union`] and schema of `U`.
pub fn count_row() -> TypeDescriptor {
    row(&[
        ("a", TypeDescriptor::int()),
        ("cnt", TypeDescriptor::bigint().not_null()),
    ])
}

fn table_ref(name: &str, schema: TypeDescriptor, mode: TableMode) -> CatalogObjectRef {
    match mode {
        TableMode::Persisted => CatalogObjectRef::persisted(
            table_id(name),
            TableSnapshot::new(schema).with_option("connector", "values"),
        ),
        TableMode::Live => CatalogObjectRef::live(table_id(name)),
    }
}

/// Catalog in which every fixture table exists with its fixture schema.
pub fn fixture_catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_table(table_id("T"), source_row())
        .with_table(table_id("S"), window_row())
        .with_table(table_id("U"), count_row())
}

/// Seven-node pipeline:
///
/// ```text
/// Sink(S)
/// +- GroupWindowAggregate(groupBy=[b], Session(gap) on rowtime, COUNT(a), SUM(a), start, end)
///    +- Exchange(hash[0])
///       +- Calc(b, a, rowtime)
///          +- WatermarkAssigner(rowtime - 1000ms)
///             +- Calc(b, TO_TIMESTAMP(c) AS rowtime, a)
///                +- TableSourceScan(T)
/// ```
pub fn session_window_pipeline(gap_ms: u64, mode: TableMode) -> PlanGraph {
    let parsed = row(&[
        ("b", TypeDescriptor::bigint()),
        ("rowtime", TypeDescriptor::timestamp(3)),
        ("a", TypeDescriptor::int()),
    ]);
    let watermarked = row(&[
        ("b", TypeDescriptor::bigint()),
        ("rowtime", TypeDescriptor::event_time(3)),
        ("a", TypeDescriptor::int()),
    ]);
    let reordered = row(&[
        ("b", TypeDescriptor::bigint()),
        ("a", TypeDescriptor::int()),
        ("rowtime", TypeDescriptor::event_time(3)),
    ]);

    let mut b = PlanGraphBuilder::new();
    let scan = b.node(
        NodeAttrs::TableSourceScan {
            table: table_ref("T", source_row(), mode),
            projected_fields: None,
        },
        source_row(),
    );
    let parse = b.node(
        NodeAttrs::Calc {
            projection: vec![
                Expression::field(1, TypeDescriptor::bigint()),
                Expression::call(
                    Operator::function("TO_TIMESTAMP", OperatorKind::Cast),
                    vec![Expression::field(2, TypeDescriptor::string())],
                    TypeDescriptor::timestamp(3),
                ),
                Expression::field(0, TypeDescriptor::int()),
            ],
            condition: None,
        },
        parsed,
    );
    let watermark = b.node(
        NodeAttrs::WatermarkAssigner {
            rowtime_field: 1,
            watermark_expr: Expression::call(
                Operator::infix("-", OperatorKind::Arithmetic),
                vec![
                    Expression::field(1, TypeDescriptor::timestamp(3)),
                    Expression::literal(
                        LiteralValue::IntervalMillis(1_000),
                        TypeDescriptor::interval_millis(),
                    ),
                ],
                TypeDescriptor::timestamp(3),
            ),
        },
        watermarked,
    );
    let reorder = b.node(
        NodeAttrs::Calc {
            projection: vec![
                Expression::field(0, TypeDescriptor::bigint()),
                Expression::field(2, TypeDescriptor::int()),
                Expression::field(1, TypeDescriptor::event_time(3)),
            ],
            condition: None,
        },
        reordered.clone(),
    );
    let exchange = b.node(
        NodeAttrs::Exchange {
            distribution: Distribution::hash([0]),
        },
        reordered,
    );
    let window = b.node(
        NodeAttrs::GroupWindowAggregate {
            grouping_keys: vec![0],
            aggregate_calls: vec![
                AggregateCall::new("COUNT", vec![1], "cnt", TypeDescriptor::bigint().not_null()),
                AggregateCall::new("SUM", vec![1], "total", TypeDescriptor::int()),
            ],
            window_spec: WindowSpec {
                time_field: 2,
                kind: WindowKind::Session { gap_ms },
                properties: vec![WindowProperty::Start, WindowProperty::End],
            },
            emit_policy: EmitPolicy::default(),
        },
        window_row(),
    );
    let sink = b.node(
        NodeAttrs::Sink {
            table: table_ref("S", window_row(), mode),
        },
        window_row(),
    );
    b.edge(scan, parse)
        .edge(parse, watermark)
        .edge(watermark, reorder)
        .edge(reorder, exchange)
        .edge_with(exchange, window, Distribution::hash([0]))
        .edge(window, sink);
    build(b)
}

/// Two identical scan-and-count branches merged by a union:
///
/// ```text
/// Sink(U)
/// +- Union
///    :- GroupAggregate(groupBy=[a], COUNT(b))
///    :  +- TableSourceScan(T)
///    +- GroupAggregate(groupBy=[a], COUNT(b))
///       +- TableSourceScan(T)
/// ```
///
/// The branches fingerprint identically, so their stable ids differ only by
/// the collision suffix.
pub fn parallel_union(mode: TableMode) -> PlanGraph {
    let mut b = PlanGraphBuilder::new();
    let mut branches: Vec<NodeId> = Vec::new();
    for _ in 0..2 {
        let scan = b.node(
            NodeAttrs::TableSourceScan {
                table: table_ref("T", source_row(), mode),
                projected_fields: None,
            },
            source_row(),
        );
        let agg = b.node(
            NodeAttrs::GroupAggregate {
                grouping_keys: vec![0],
                aggregate_calls: vec![AggregateCall::new(
                    "COUNT",
                    vec![1],
                    "cnt",
                    TypeDescriptor::bigint().not_null(),
                )],
                emit_policy: EmitPolicy {
                    generate_update_before: true,
                    need_retraction: false,
                },
            },
            count_row(),
        );
        b.edge_with(scan, agg, Distribution::hash([0]));
        branches.push(agg);
    }
    let union = b.node(NodeAttrs::Union {}, count_row());
    let sink = b.node(
        NodeAttrs::Sink {
            table: table_ref("U", count_row(), mode),
        },
        count_row(),
    );
    for agg in branches {
        b.edge(agg, union);
    }
    b.edge(union, sink);
    build(b)
}

/// Identifier of the user-defined function in [`udf_pipeline`].
pub fn udf_id() -> ObjectIdentifier {
    table_id("normalize")
}

/// Scan, a calc calling a user-defined function and a sink.
///
/// With `payload` the function reference is persisted and carries the bytes;
/// without it the function must be found in the live catalog.
pub fn udf_pipeline(payload: Option<&[u8]>) -> PlanGraph {
    let out = row(&[("c", TypeDescriptor::string()), ("a", TypeDescriptor::int())]);
    let udf = match payload {
        Some(bytes) => Operator::function("NORMALIZE", OperatorKind::Other)
            .with_function_ref(CatalogObjectRef::persisted_function(udf_id()))
            .with_payload(OpaquePayload::from_bytes(bytes)),
        None => Operator::function("NORMALIZE", OperatorKind::Other)
            .with_function_ref(CatalogObjectRef::live(udf_id())),
    };

    let mut b = PlanGraphBuilder::new();
    let scan = b.node(
        NodeAttrs::TableSourceScan {
            table: table_ref("T", source_row(), TableMode::Persisted),
            projected_fields: None,
        },
        source_row(),
    );
    let calc = b.node(
        NodeAttrs::Calc {
            projection: vec![
                Expression::call(
                    udf,
                    vec![Expression::field(2, TypeDescriptor::string())],
                    TypeDescriptor::string(),
                ),
                Expression::field(0, TypeDescriptor::int()),
            ],
            condition: Some(Expression::call(
                Operator::infix(">", OperatorKind::Comparison),
                vec![
                    Expression::field(0, TypeDescriptor::int()),
                    Expression::literal(LiteralValue::Integer(0), TypeDescriptor::int()),
                ],
                TypeDescriptor::boolean(),
            )),
        },
        out.clone(),
    );
    let sink = b.node(
        NodeAttrs::Sink {
            table: table_ref("N", out.clone(), TableMode::Persisted),
        },
        out,
    );
    b.edge(scan, calc).edge(calc, sink);
    build(b)
}

#[allow(clippy::expect_used)]
fn build(builder: PlanGraphBuilder) -> PlanGraph {
    builder
        .build()
        .expect("fixture graph should pass structural validation")
}
