// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Plan nodes: closed node kinds, their attribute records and derived
//! descriptions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogObjectRef;
use crate::edge::Distribution;
use crate::error::ModelError;
use crate::expr::{AggregateCall, Expression};
use crate::types::TypeDescriptor;

/// Node id, unique within one graph. Carries no meaning across compiles.
pub type NodeId = u32;

/// Closed set of node kinds.
///
/// Declaration order is significant: it is the first tie-break of the
/// deterministic topological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeKind {
    /// Reads a catalog table.
    TableSourceScan,
    /// Projection and optional filter.
    Calc,
    /// Generates watermarks from a rowtime field.
    WatermarkAssigner,
    /// Redistributes records between parallel instances.
    Exchange,
    /// Unbounded grouped aggregation.
    GroupAggregate,
    /// Grouped aggregation over time windows.
    GroupWindowAggregate,
    /// Keeps the first or last row per key.
    Deduplicate,
    /// Two-input keyed join.
    Join,
    /// Merges several inputs of identical type.
    Union,
    /// Writes into a catalog table.
    Sink,
}

/// How a node relates to persisted runtime state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateClass {
    /// Backs a runtime unit that keeps persistent state.
    Stateful,
    /// Backs a runtime unit without persistent state.
    Stateless,
    /// Merges or forwards data and backs no runtime unit of its own.
    Relay,
}

impl NodeKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::TableSourceScan,
        Self::Calc,
        Self::WatermarkAssigner,
        Self::Exchange,
        Self::GroupAggregate,
        Self::GroupWindowAggregate,
        Self::Deduplicate,
        Self::Join,
        Self::Union,
        Self::Sink,
    ];

    /// Document tag.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::TableSourceScan => "table-source-scan",
            Self::Calc => "calc",
            Self::WatermarkAssigner => "watermark-assigner",
            Self::Exchange => "exchange",
            Self::GroupAggregate => "group-aggregate",
            Self::GroupWindowAggregate => "group-window-aggregate",
            Self::Deduplicate => "deduplicate",
            Self::Join => "join",
            Self::Union => "union",
            Self::Sink => "sink",
        }
    }

    /// Inverse of [`tag`](Self::tag).
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }

    /// State class of the kind.
    pub const fn state_class(self) -> StateClass {
        match self {
            Self::TableSourceScan
            | Self::GroupAggregate
            | Self::GroupWindowAggregate
            | Self::Deduplicate
            | Self::Join
            | Self::Sink => StateClass::Stateful,
            Self::Calc | Self::WatermarkAssigner | Self::Exchange => StateClass::Stateless,
            Self::Union => StateClass::Relay,
        }
    }

    /// Whether nodes of this kind must carry a stable id once assigned.
    pub const fn requires_stable_id(self) -> bool {
        !matches!(self.state_class(), StateClass::Relay)
    }

    /// Accepted number of inputs as `(min, max)`; `None` means unbounded.
    pub const fn input_arity(self) -> (usize, Option<usize>) {
        match self {
            Self::TableSourceScan => (0, Some(0)),
            Self::Join => (2, Some(2)),
            Self::Union => (2, None),
            _ => (1, Some(1)),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Changelog emission flags of an aggregation. Added in 1.1.0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitPolicy {
    /// Emit an update-before record ahead of each update-after.
    #[serde(default)]
    pub generate_update_before: bool,
    /// The input may contain retractions.
    #[serde(default)]
    pub need_retraction: bool,
}

/// Window shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum WindowKind {
    /// Fixed-size, non-overlapping windows.
    Tumbling {
        /// Window size in milliseconds.
        size_ms: u64,
    },
    /// Fixed-size windows starting every `slide_ms`.
    Sliding {
        /// Window size in milliseconds.
        size_ms: u64,
        /// Slide in milliseconds.
        slide_ms: u64,
    },
    /// Windows closed by a gap of inactivity.
    Session {
        /// Inactivity gap in milliseconds.
        gap_ms: u64,
    },
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tumbling { size_ms } => write!(f, "Tumbling(size={size_ms}ms)"),
            Self::Sliding { size_ms, slide_ms } => {
                write!(f, "Sliding(size={size_ms}ms, slide={slide_ms}ms)")
            }
            Self::Session { gap_ms } => write!(f, "Session(gap={gap_ms}ms)"),
        }
    }
}

/// Window metadata column appended after the aggregate results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowProperty {
    /// Window start timestamp.
    Start,
    /// Window end timestamp.
    End,
    /// Event-time attribute of the window result.
    Rowtime,
    /// Processing-time attribute of the window result.
    Proctime,
}

impl WindowProperty {
    /// Column type produced for the property.
    pub fn result_type(self) -> TypeDescriptor {
        match self {
            Self::Start | Self::End => TypeDescriptor::timestamp(3).not_null(),
            Self::Rowtime => TypeDescriptor::event_time(3).not_null(),
            Self::Proctime => TypeDescriptor::processing_time(3).not_null(),
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
            Self::Rowtime => "rowtime",
            Self::Proctime => "proctime",
        }
    }
}

/// Window specification of a windowed aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSpec {
    /// Input field index of the time attribute the window is keyed on.
    pub time_field: usize,
    /// Window shape.
    pub kind: WindowKind,
    /// Added in 1.2.0; absent means none.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<WindowProperty>,
}

/// Join semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JoinType {
    /// Inner join.
    Inner,
    /// Left outer join.
    Left,
    /// Right outer join.
    Right,
    /// Full outer join.
    Full,
    /// Left semi join.
    Semi,
    /// Left anti join.
    Anti,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inner => "InnerJoin",
            Self::Left => "LeftOuterJoin",
            Self::Right => "RightOuterJoin",
            Self::Full => "FullOuterJoin",
            Self::Semi => "LeftSemiJoin",
            Self::Anti => "LeftAntiJoin",
        })
    }
}

/// Kind-specific attribute record of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum NodeAttrs {
    /// See [`NodeKind::TableSourceScan`].
    TableSourceScan {
        /// Scanned table.
        table: CatalogObjectRef,
        /// Table fields read, in output order; `None` reads all of them.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        projected_fields: Option<Vec<usize>>,
    },
    /// See [`NodeKind::Calc`].
    Calc {
        /// One expression per output field.
        projection: Vec<Expression>,
        /// Filter applied before projecting.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<Expression>,
    },
    /// See [`NodeKind::WatermarkAssigner`].
    WatermarkAssigner {
        /// Input field index of the event-time attribute.
        rowtime_field: usize,
        /// Watermark derived from each row.
        watermark_expr: Expression,
    },
    /// See [`NodeKind::Exchange`].
    Exchange {
        /// Requested distribution of the outgoing records.
        distribution: Distribution,
    },
    /// See [`NodeKind::GroupAggregate`].
    GroupAggregate {
        /// Input field indices forming the group key.
        grouping_keys: Vec<usize>,
        /// Aggregates computed per group.
        aggregate_calls: Vec<AggregateCall>,
        /// Changelog flags.
        #[serde(default)]
        emit_policy: EmitPolicy,
    },
    /// See [`NodeKind::GroupWindowAggregate`].
    GroupWindowAggregate {
        /// Input field indices forming the group key.
        grouping_keys: Vec<usize>,
        /// Aggregates computed per group and window.
        aggregate_calls: Vec<AggregateCall>,
        /// Window definition.
        window_spec: WindowSpec,
        /// Changelog flags.
        #[serde(default)]
        emit_policy: EmitPolicy,
    },
    /// See [`NodeKind::Deduplicate`].
    Deduplicate {
        /// Input field indices identifying duplicates.
        unique_keys: Vec<usize>,
        /// Keep the last row per key instead of the first.
        keep_last_row: bool,
        /// Event-time field ordering the rows; processing time if absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rowtime_field: Option<usize>,
    },
    /// See [`NodeKind::Join`].
    Join {
        /// Join semantics.
        join_type: JoinType,
        /// Left input key field indices.
        left_keys: Vec<usize>,
        /// Right input key field indices.
        right_keys: Vec<usize>,
        /// Non-equi residual condition over the concatenated row.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<Expression>,
    },
    /// See [`NodeKind::Union`].
    Union {},
    /// See [`NodeKind::Sink`].
    Sink {
        /// Target table.
        table: CatalogObjectRef,
    },
}

impl NodeAttrs {
    /// Kind of the record.
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::TableSourceScan { .. } => NodeKind::TableSourceScan,
            Self::Calc { .. } => NodeKind::Calc,
            Self::WatermarkAssigner { .. } => NodeKind::WatermarkAssigner,
            Self::Exchange { .. } => NodeKind::Exchange,
            Self::GroupAggregate { .. } => NodeKind::GroupAggregate,
            Self::GroupWindowAggregate { .. } => NodeKind::GroupWindowAggregate,
            Self::Deduplicate { .. } => NodeKind::Deduplicate,
            Self::Join { .. } => NodeKind::Join,
            Self::Union {} => NodeKind::Union,
            Self::Sink { .. } => NodeKind::Sink,
        }
    }

    /// Catalog tables referenced directly by the node.
    pub fn table_ref(&self) -> Option<&CatalogObjectRef> {
        match self {
            Self::TableSourceScan { table, .. } | Self::Sink { table } => Some(table),
            _ => None,
        }
    }

    /// Every scalar expression held by the node.
    pub fn expressions(&self) -> Vec<&Expression> {
        match self {
            Self::Calc {
                projection,
                condition,
            } => projection.iter().chain(condition.as_ref()).collect(),
            Self::WatermarkAssigner { watermark_expr, .. } => vec![watermark_expr],
            Self::Join { condition, .. } => condition.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Every aggregate call held by the node.
    pub fn aggregate_calls(&self) -> &[AggregateCall] {
        match self {
            Self::GroupAggregate {
                aggregate_calls, ..
            }
            | Self::GroupWindowAggregate {
                aggregate_calls, ..
            } => aggregate_calls,
            _ => &[],
        }
    }

    /// Validates nested types, payloads and table snapshots.
    pub fn validate(&self) -> Result<(), ModelError> {
        if let Some(table) = self.table_ref() {
            table.validate()?;
        }
        for expr in self.expressions() {
            expr.validate()?;
        }
        for call in self.aggregate_calls() {
            call.validate()?;
        }
        Ok(())
    }

    /// Deterministic diagnostic string for a node with these attributes.
    pub fn describe(&self, output_type: &TypeDescriptor) -> String {
        let names: Vec<&str> = output_type
            .fields()
            .map(|fs| fs.iter().map(|f| f.name.as_str()).collect())
            .unwrap_or_default();
        match self {
            Self::TableSourceScan { table, .. } => format!(
                "TableSourceScan(table=[{}], fields=[{}])",
                table.identifier,
                names.join(", ")
            ),
            Self::Calc {
                projection,
                condition,
            } => {
                let select = projection
                    .iter()
                    .enumerate()
                    .map(|(i, e)| match names.get(i) {
                        Some(name) => format!("{e} AS {name}"),
                        None => e.render(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                match condition {
                    Some(c) => format!("Calc(select=[{select}], where=[{c}])"),
                    None => format!("Calc(select=[{select}])"),
                }
            }
            Self::WatermarkAssigner {
                rowtime_field,
                watermark_expr,
            } => format!(
                "WatermarkAssigner(rowtime=[{}], watermark=[{watermark_expr}])",
                names
                    .get(*rowtime_field)
                    .map_or_else(|| format!("${rowtime_field}"), |n| (*n).to_owned())
            ),
            Self::Exchange { distribution } => {
                format!("Exchange(distribution=[{distribution}])")
            }
            Self::GroupAggregate {
                grouping_keys,
                aggregate_calls,
                ..
            } => format!(
                "GroupAggregate(groupBy=[{}], select=[{}])",
                refs(grouping_keys),
                list(aggregate_calls)
            ),
            Self::GroupWindowAggregate {
                grouping_keys,
                aggregate_calls,
                window_spec,
                ..
            } => {
                let mut out = format!(
                    "GroupWindowAggregate(groupBy=[{}], window=[{} on ${}]",
                    refs(grouping_keys),
                    window_spec.kind,
                    window_spec.time_field
                );
                if !window_spec.properties.is_empty() {
                    let props: Vec<&str> =
                        window_spec.properties.iter().map(|p| p.label()).collect();
                    out.push_str(&format!(", properties=[{}]", props.join(", ")));
                }
                out.push_str(&format!(", select=[{}])", list(aggregate_calls)));
                out
            }
            Self::Deduplicate {
                unique_keys,
                keep_last_row,
                rowtime_field,
            } => format!(
                "Deduplicate(keys=[{}], keep=[{}], order=[{}])",
                refs(unique_keys),
                if *keep_last_row { "LastRow" } else { "FirstRow" },
                rowtime_field.map_or_else(|| "PROCTIME".to_owned(), |f| format!("ROWTIME ${f}"))
            ),
            Self::Join {
                join_type,
                left_keys,
                right_keys,
                condition,
            } => {
                let mut out = format!(
                    "Join(joinType=[{join_type}], leftKeys=[{}], rightKeys=[{}]",
                    refs(left_keys),
                    refs(right_keys)
                );
                if let Some(c) = condition {
                    out.push_str(&format!(", where=[{c}]"));
                }
                out.push(')');
                out
            }
            Self::Union {} => format!("Union(all=[true], union=[{}])", names.join(", ")),
            Self::Sink { table } => format!(
                "Sink(table=[{}], fields=[{}])",
                table.identifier,
                names.join(", ")
            ),
        }
    }
}

fn refs(indices: &[usize]) -> String {
    indices
        .iter()
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn list<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Volatile planner estimates. Added in 1.2.0; never part of identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeHints {
    /// Suggested parallelism.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<u32>,
    /// Estimated output row count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_row_count: Option<u64>,
}

impl NodeHints {
    /// `true` when no hint is set.
    pub fn is_empty(&self) -> bool {
        self.parallelism.is_none() && self.estimated_row_count.is_none()
    }
}

/// One operator of the physical plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanNode {
    id: NodeId,
    attrs: NodeAttrs,
    output_type: TypeDescriptor,
    description: String,
    stable_id: Option<String>,
    hints: NodeHints,
}

impl PlanNode {
    /// New node without a stable id; the description is derived.
    pub fn new(id: NodeId, attrs: NodeAttrs, output_type: TypeDescriptor) -> Self {
        let description = attrs.describe(&output_type);
        Self {
            id,
            attrs,
            output_type,
            description,
            stable_id: None,
            hints: NodeHints::default(),
        }
    }

    /// Same node with the given hints.
    #[must_use]
    pub fn with_hints(mut self, hints: NodeHints) -> Self {
        self.hints = hints;
        self
    }

    /// Same node carrying `stable_id`. Blank strings clear the id.
    #[must_use]
    pub fn with_stable_id(mut self, stable_id: Option<String>) -> Self {
        self.stable_id = stable_id.filter(|s| !s.trim().is_empty());
        self
    }

    /// Same node under a different id.
    #[must_use]
    pub fn renumbered(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    /// Graph-local id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Kind of the node.
    pub fn kind(&self) -> NodeKind {
        self.attrs.kind()
    }

    /// Attribute record.
    pub fn attrs(&self) -> &NodeAttrs {
        &self.attrs
    }

    /// Declared output row type.
    pub fn output_type(&self) -> &TypeDescriptor {
        &self.output_type
    }

    /// Derived diagnostic description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Assigned stable id, if any.
    pub fn stable_id(&self) -> Option<&str> {
        self.stable_id.as_deref()
    }

    /// Planner hints.
    pub fn hints(&self) -> &NodeHints {
        &self.hints
    }

    /// `true` if a non-blank stable id is present.
    pub fn has_stable_id(&self) -> bool {
        self.stable_id.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    /// Whether the node must carry a stable id.
    pub fn requires_stable_id(&self) -> bool {
        self.kind().requires_stable_id()
    }

    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        self.output_type.validate()?;
        self.attrs.validate()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::expr::{LiteralValue, Operator, OperatorKind};

    #[test]
    fn tags_round_trip() {
        for kind in NodeKind::ALL {
            assert_eq!(NodeKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(NodeKind::from_tag("python-calc"), None);
    }

    #[test]
    fn only_union_is_relay() {
        let relays: Vec<_> = NodeKind::ALL
            .into_iter()
            .filter(|k| !k.requires_stable_id())
            .collect();
        assert_eq!(relays, vec![NodeKind::Union]);
    }

    #[test]
    fn calc_description_uses_output_names() {
        let out = TypeDescriptor::row([
            ("b", TypeDescriptor::bigint()),
            ("rowtime", TypeDescriptor::timestamp(3)),
        ])
        .unwrap();
        let attrs = NodeAttrs::Calc {
            projection: vec![
                Expression::field(1, TypeDescriptor::bigint()),
                Expression::call(
                    Operator::function("TO_TIMESTAMP", OperatorKind::Cast),
                    vec![Expression::field(2, TypeDescriptor::string())],
                    TypeDescriptor::timestamp(3),
                ),
            ],
            condition: Some(Expression::literal(
                LiteralValue::Boolean(true),
                TypeDescriptor::boolean(),
            )),
        };
        assert_eq!(
            attrs.describe(&out),
            "Calc(select=[$1 AS b, TO_TIMESTAMP($2) AS rowtime], where=[true])"
        );
    }

    #[test]
    fn window_description() {
        let attrs = NodeAttrs::GroupWindowAggregate {
            grouping_keys: vec![0],
            aggregate_calls: vec![AggregateCall::new(
                "COUNT",
                vec![1],
                "cnt",
                TypeDescriptor::bigint().not_null(),
            )],
            window_spec: WindowSpec {
                time_field: 2,
                kind: WindowKind::Session { gap_ms: 10_000 },
                properties: vec![WindowProperty::Start, WindowProperty::End],
            },
            emit_policy: EmitPolicy::default(),
        };
        let out = TypeDescriptor::row([("b", TypeDescriptor::bigint())]).unwrap();
        assert_eq!(
            attrs.describe(&out),
            "GroupWindowAggregate(groupBy=[$0], window=[Session(gap=10000ms) on $2], \
             properties=[start, end], select=[COUNT($1) AS cnt])"
        );
    }

    #[test]
    fn attribute_records_use_kebab_tags_and_camel_fields() {
        let json = serde_json::to_value(NodeAttrs::Union {}).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "union" }));
        let dedup = NodeAttrs::Deduplicate {
            unique_keys: vec![0],
            keep_last_row: true,
            rowtime_field: None,
        };
        let json = serde_json::to_value(&dedup).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "kind": "deduplicate", "uniqueKeys": [0], "keepLastRow": true })
        );
        let back: NodeAttrs = serde_json::from_value(json).unwrap();
        assert_eq!(back, dedup);
    }

    #[test]
    fn window_properties_default_to_empty() {
        let spec: WindowSpec = serde_json::from_value(serde_json::json!({
            "timeField": 2,
            "kind": { "type": "session", "gapMs": 10000 }
        }))
        .unwrap();
        assert!(spec.properties.is_empty());
        assert_eq!(spec.kind, WindowKind::Session { gap_ms: 10_000 });
    }

    #[test]
    fn blank_stable_id_is_dropped() {
        let node = PlanNode::new(
            1,
            NodeAttrs::Union {},
            TypeDescriptor::row([("a", TypeDescriptor::int())]).unwrap(),
        )
        .with_stable_id(Some("   ".into()));
        assert!(!node.has_stable_id());
        assert_eq!(node.stable_id(), None);
    }
}
