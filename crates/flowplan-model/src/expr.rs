// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scalar and aggregate expression trees.
//!
//! Expressions are represented and rendered, never evaluated. Rendering is
//! deterministic and only used for diagnostics (node descriptions, explain
//! output); it is never parsed back.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogObjectRef;
use crate::error::ModelError;
use crate::payload::OpaquePayload;
use crate::types::TypeDescriptor;

/// Constant value of a literal expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LiteralValue {
    /// SQL `NULL`.
    Null,
    /// Boolean constant.
    Boolean(bool),
    /// Integral constant.
    Integer(i64),
    /// Exact decimal kept in its textual form.
    Decimal(String),
    /// Character string.
    Text(String),
    /// Day-time interval in milliseconds.
    IntervalMillis(i64),
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Decimal(d) => f.write_str(d),
            Self::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::IntervalMillis(ms) => write!(f, "{ms}:INTERVAL MILLISECOND"),
        }
    }
}

/// Broad classification of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperatorKind {
    /// `=`, `<`, `IS NULL`, ...
    Comparison,
    /// `+`, `-`, `*`, ...
    Arithmetic,
    /// `AND`, `OR`, `NOT`.
    Logical,
    /// Type conversions.
    Cast,
    /// Aggregate functions (`COUNT`, `SUM`, ...).
    Aggregate,
    /// Time attribute materialization and window helpers.
    TimeAttribute,
    /// Anything else, including user-defined functions.
    Other,
}

/// Rendering hint for an operator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperatorSyntax {
    /// `NAME operand`.
    Prefix,
    /// `(left NAME right)`.
    Infix,
    /// `operand NAME`.
    Postfix,
    /// `NAME(a, b, ...)`.
    Function,
}

/// Function or operator metadata attached to a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    /// Operator name as rendered (`-`, `TO_TIMESTAMP`, `COUNT`).
    pub name: String,
    /// Classification.
    pub kind: OperatorKind,
    /// Rendering hint.
    pub syntax: OperatorSyntax,
    /// Catalog reference for functions registered in a catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<CatalogObjectRef>,
    /// Serialized function body bound to an external runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<OpaquePayload>,
}

impl Operator {
    /// Built-in operator with the given rendering.
    pub fn new(name: impl Into<String>, kind: OperatorKind, syntax: OperatorSyntax) -> Self {
        Self {
            name: name.into(),
            kind,
            syntax,
            function: None,
            payload: None,
        }
    }

    /// Built-in function rendered as `NAME(args)`.
    pub fn function(name: impl Into<String>, kind: OperatorKind) -> Self {
        Self::new(name, kind, OperatorSyntax::Function)
    }

    /// Built-in infix operator.
    pub fn infix(name: impl Into<String>, kind: OperatorKind) -> Self {
        Self::new(name, kind, OperatorSyntax::Infix)
    }

    /// Aggregate function (`COUNT`, `SUM`, ...).
    pub fn aggregate(name: impl Into<String>) -> Self {
        Self::function(name, OperatorKind::Aggregate)
    }

    /// Attaches a catalog reference.
    pub fn with_function_ref(mut self, function: CatalogObjectRef) -> Self {
        self.function = Some(function);
        self
    }

    /// Attaches an opaque payload.
    pub fn with_payload(mut self, payload: OpaquePayload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        if let Some(payload) = &self.payload {
            payload.verify().map_err(|err| match err {
                ModelError::OpaquePayloadCorrupt(reason) => ModelError::OpaquePayloadCorrupt(
                    format!("operator `{}`: {reason}", self.name),
                ),
                other => other,
            })?;
        }
        if let Some(function) = &self.function {
            function.validate()?;
        }
        Ok(())
    }
}

/// Scalar expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Expression {
    /// Constant.
    Literal {
        /// Constant value.
        value: LiteralValue,
        /// Declared type.
        #[serde(rename = "type")]
        ty: TypeDescriptor,
    },
    /// Reference to a field of the node's input row.
    FieldRef {
        /// Zero-based input field index.
        index: usize,
        /// Type of the referenced field.
        #[serde(rename = "type")]
        ty: TypeDescriptor,
    },
    /// Operator applied to operands.
    Call {
        /// Operator metadata.
        operator: Operator,
        /// Operands in call order.
        operands: Vec<Expression>,
        /// Result type.
        #[serde(rename = "type")]
        ty: TypeDescriptor,
    },
}

impl Expression {
    /// Literal expression.
    pub fn literal(value: LiteralValue, ty: TypeDescriptor) -> Self {
        Self::Literal { value, ty }
    }

    /// Field reference expression.
    pub fn field(index: usize, ty: TypeDescriptor) -> Self {
        Self::FieldRef { index, ty }
    }

    /// Call expression.
    pub fn call(operator: Operator, operands: Vec<Expression>, ty: TypeDescriptor) -> Self {
        Self::Call {
            operator,
            operands,
            ty,
        }
    }

    /// Result type of the expression.
    pub fn result_type(&self) -> &TypeDescriptor {
        match self {
            Self::Literal { ty, .. } | Self::FieldRef { ty, .. } | Self::Call { ty, .. } => ty,
        }
    }

    /// Canonical diagnostic rendering.
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Visits every operator in the tree, depth first.
    pub fn for_each_operator<'a>(&'a self, f: &mut dyn FnMut(&'a Operator)) {
        if let Self::Call {
            operator, operands, ..
        } = self
        {
            f(operator);
            for operand in operands {
                operand.for_each_operator(f);
            }
        }
    }

    /// Visits every field reference as `(index, type)`, depth first.
    pub fn for_each_field_ref<'a>(&'a self, f: &mut dyn FnMut(usize, &'a TypeDescriptor)) {
        match self {
            Self::FieldRef { index, ty } => f(*index, ty),
            Self::Call { operands, .. } => {
                for operand in operands {
                    operand.for_each_field_ref(f);
                }
            }
            Self::Literal { .. } => {}
        }
    }

    /// Validates nested types and payloads.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.result_type().validate()?;
        if let Self::Call {
            operator, operands, ..
        } = self
        {
            operator.validate()?;
            for operand in operands {
                operand.validate()?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal {
                value: LiteralValue::Null,
                ty,
            } => write!(f, "null:{ty}"),
            Self::Literal { value, .. } => write!(f, "{value}"),
            Self::FieldRef { index, .. } => write!(f, "${index}"),
            Self::Call {
                operator, operands, ..
            } => match (operator.syntax, operands.as_slice()) {
                (OperatorSyntax::Infix, [lhs, rhs]) => {
                    write!(f, "({lhs} {} {rhs})", operator.name)
                }
                (OperatorSyntax::Prefix, [operand]) => write!(f, "{} {operand}", operator.name),
                (OperatorSyntax::Postfix, [operand]) => write!(f, "{operand} {}", operator.name),
                _ => {
                    write!(f, "{}(", operator.name)?;
                    write_list(f, operands)?;
                    f.write_str(")")
                }
            },
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// One aggregate function application inside an aggregation node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateCall {
    /// Aggregate function.
    pub function: Operator,
    /// Input field indices passed as arguments.
    pub args: Vec<usize>,
    /// `DISTINCT` aggregation.
    #[serde(default)]
    pub distinct: bool,
    /// Approximate aggregation allowed.
    #[serde(default)]
    pub approximate: bool,
    /// Boolean input field acting as a `FILTER (WHERE ...)` clause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_arg: Option<usize>,
    /// Output field name.
    pub name: String,
    /// Result type.
    #[serde(rename = "type")]
    pub result_type: TypeDescriptor,
}

impl AggregateCall {
    /// Plain (non-distinct, unfiltered) aggregate call.
    pub fn new(
        function: &str,
        args: Vec<usize>,
        name: impl Into<String>,
        result_type: TypeDescriptor,
    ) -> Self {
        Self {
            function: Operator::aggregate(function),
            args,
            distinct: false,
            approximate: false,
            filter_arg: None,
            name: name.into(),
            result_type,
        }
    }

    /// Marks the call `DISTINCT`.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Validates nested types and payloads.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.result_type.validate()?;
        self.function.validate()
    }
}

impl fmt::Display for AggregateCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.function.name)?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "${arg}")?;
        }
        f.write_str(")")?;
        if let Some(filter) = self.filter_arg {
            write!(f, " FILTER ${filter}")?;
        }
        write!(f, " AS {}", self.name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn minus_one_second() -> Expression {
        Expression::call(
            Operator::infix("-", OperatorKind::Arithmetic),
            vec![
                Expression::field(1, TypeDescriptor::timestamp(3)),
                Expression::literal(
                    LiteralValue::IntervalMillis(1000),
                    TypeDescriptor::interval_millis(),
                ),
            ],
            TypeDescriptor::timestamp(3),
        )
    }

    #[test]
    fn renders_by_syntax() {
        assert_eq!(minus_one_second().render(), "($1 - 1000:INTERVAL MILLISECOND)");
        let to_ts = Expression::call(
            Operator::function("TO_TIMESTAMP", OperatorKind::Cast),
            vec![Expression::field(2, TypeDescriptor::string())],
            TypeDescriptor::timestamp(3),
        );
        assert_eq!(to_ts.render(), "TO_TIMESTAMP($2)");
        let is_null = Expression::call(
            Operator::new("IS NULL", OperatorKind::Comparison, OperatorSyntax::Postfix),
            vec![Expression::field(0, TypeDescriptor::int())],
            TypeDescriptor::boolean().not_null(),
        );
        assert_eq!(is_null.render(), "$0 IS NULL");
        let null = Expression::literal(LiteralValue::Null, TypeDescriptor::int());
        assert_eq!(null.render(), "null:INT");
        let text = Expression::literal(LiteralValue::Text("it's".into()), TypeDescriptor::string());
        assert_eq!(text.render(), "'it''s'");
    }

    #[test]
    fn aggregate_call_rendering() {
        let call = AggregateCall::new("COUNT", vec![1], "cnt", TypeDescriptor::bigint().not_null())
            .distinct();
        assert_eq!(call.to_string(), "COUNT(DISTINCT $1) AS cnt");
    }

    #[test]
    fn visits_operators_and_fields() {
        let expr = minus_one_second();
        let mut names = Vec::new();
        expr.for_each_operator(&mut |op| names.push(op.name.clone()));
        assert_eq!(names, vec!["-"]);
        let mut fields = Vec::new();
        expr.for_each_field_ref(&mut |i, _| fields.push(i));
        assert_eq!(fields, vec![1]);
    }

    #[test]
    fn corrupt_payload_fails_validation() {
        let udf = Operator::function("MY_UDF", OperatorKind::Other)
            .with_payload(OpaquePayload::from_hex_unchecked("not-hex"));
        let expr = Expression::call(udf, vec![], TypeDescriptor::int());
        assert!(matches!(
            expr.validate(),
            Err(ModelError::OpaquePayloadCorrupt(msg)) if msg.contains("MY_UDF")
        ));
    }
}
