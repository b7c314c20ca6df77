// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Type descriptors for plan node outputs and expressions.
//!
//! Descriptors are pure values: structural equality plus a canonical
//! rendering. Two structurally equal descriptors always render identically,
//! and composite fields always render in declared order.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Largest fractional-second precision accepted for temporal types.
pub const MAX_TIME_PRECISION: u8 = 9;

const TEMPORAL_PRIMITIVES: &[&str] = &["TIMESTAMP", "TIMESTAMP_LTZ", "TIME"];

/// Semantic marker carried by time-attribute columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeMarker {
    /// Column tracks event time and drives watermarks.
    EventTime,
    /// Column tracks wall-clock processing time.
    ProcessingTime,
}

/// One named field of a composite (row) type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowField {
    /// Field name, unique within its row.
    pub name: String,
    /// Field type.
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
}

/// Logical type of a value flowing through the plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TypeDescriptor {
    /// Scalar type such as `INT`, `BIGINT` or `TIMESTAMP(3)`.
    Primitive {
        /// Upper-case type name.
        name: String,
        /// Whether `NULL` is a legal value.
        nullable: bool,
        /// Fractional-second precision; only legal on temporal names.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        precision: Option<u8>,
    },
    /// Ordered row of named fields.
    #[serde(rename = "row")]
    Composite {
        /// Fields in declared order.
        fields: Vec<RowField>,
    },
    /// Timestamp column tagged as an event-time or processing-time attribute.
    TimeMarked {
        /// Fractional-second precision.
        precision: u8,
        /// Which clock the column tracks.
        marker: TimeMarker,
        /// Whether `NULL` is a legal value; absent means nullable.
        #[serde(default = "nullable_by_default")]
        nullable: bool,
    },
}

const fn nullable_by_default() -> bool {
    true
}

impl TypeDescriptor {
    /// Nullable primitive with the given (upper-cased) name.
    pub fn primitive(name: impl AsRef<str>) -> Self {
        Self::Primitive {
            name: name.as_ref().to_ascii_uppercase(),
            nullable: true,
            precision: None,
        }
    }

    /// Nullable `INT`.
    pub fn int() -> Self {
        Self::primitive("INT")
    }

    /// Nullable `BIGINT`.
    pub fn bigint() -> Self {
        Self::primitive("BIGINT")
    }

    /// Nullable `STRING`.
    pub fn string() -> Self {
        Self::primitive("STRING")
    }

    /// Nullable `BOOLEAN`.
    pub fn boolean() -> Self {
        Self::primitive("BOOLEAN")
    }

    /// Nullable `TIMESTAMP(precision)`.
    pub fn timestamp(precision: u8) -> Self {
        Self::Primitive {
            name: "TIMESTAMP".to_owned(),
            nullable: true,
            precision: Some(precision),
        }
    }

    /// Nullable interval expressed in milliseconds (`INTERVAL SECOND(3)`).
    pub fn interval_millis() -> Self {
        Self::primitive("INTERVAL_SECOND")
    }

    /// Event-time attribute (`TIMESTAMP(p) *ROWTIME*`).
    pub fn event_time(precision: u8) -> Self {
        Self::TimeMarked {
            precision,
            marker: TimeMarker::EventTime,
            nullable: true,
        }
    }

    /// Processing-time attribute (`TIMESTAMP_LTZ(p) *PROCTIME*`).
    pub fn processing_time(precision: u8) -> Self {
        Self::TimeMarked {
            precision,
            marker: TimeMarker::ProcessingTime,
            nullable: true,
        }
    }

    /// Builds a composite type, rejecting duplicate field names.
    pub fn row<I, S>(fields: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = (S, TypeDescriptor)>,
        S: Into<String>,
    {
        let ty = Self::Composite {
            fields: fields
                .into_iter()
                .map(|(name, ty)| RowField {
                    name: name.into(),
                    ty,
                })
                .collect(),
        };
        ty.validate()?;
        Ok(ty)
    }

    /// Same type with `nullable = false`. Rows are returned unchanged.
    pub fn not_null(self) -> Self {
        self.with_nullability(false)
    }

    /// Same type with the given nullability. Rows are returned unchanged.
    pub fn with_nullability(self, nullable: bool) -> Self {
        match self {
            Self::Primitive {
                name, precision, ..
            } => Self::Primitive {
                name,
                nullable,
                precision,
            },
            Self::TimeMarked {
                precision, marker, ..
            } => Self::TimeMarked {
                precision,
                marker,
                nullable,
            },
            row @ Self::Composite { .. } => row,
        }
    }

    /// Whether `NULL` is a legal value. Rows report `true`.
    pub fn is_nullable(&self) -> bool {
        match self {
            Self::Primitive { nullable, .. } | Self::TimeMarked { nullable, .. } => *nullable,
            Self::Composite { .. } => true,
        }
    }

    /// Row fields, or `None` for non-composite types.
    pub fn fields(&self) -> Option<&[RowField]> {
        match self {
            Self::Composite { fields } => Some(fields),
            _ => None,
        }
    }

    /// Number of row fields, or `None` for non-composite types.
    pub fn arity(&self) -> Option<usize> {
        self.fields().map(<[RowField]>::len)
    }

    /// Field at `index` of a composite type.
    pub fn field(&self, index: usize) -> Option<&RowField> {
        self.fields().and_then(|f| f.get(index))
    }

    /// Returns `true` if this is a time attribute with the given marker.
    pub fn is_time_attribute(&self, marker: TimeMarker) -> bool {
        matches!(self, Self::TimeMarked { marker: m, .. } if *m == marker)
    }

    /// Selects `indices` out of a composite type, keeping their order.
    pub fn project(&self, indices: &[usize]) -> Result<Self, ModelError> {
        let fields = self
            .fields()
            .ok_or_else(|| ModelError::MalformedType(format!("cannot project non-row type {self}")))?;
        let picked = indices
            .iter()
            .map(|&i| {
                fields.get(i).cloned().ok_or_else(|| {
                    ModelError::MalformedType(format!(
                        "projection index {i} out of range for {self}"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let ty = Self::Composite { fields: picked };
        ty.validate()?;
        Ok(ty)
    }

    /// Structural compatibility that ignores nullability and row field names.
    ///
    /// Used by the restore validator: a renamed column still lines up with
    /// persisted state, a column whose physical type changed does not.
    pub fn same_shape(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Primitive {
                    name: a,
                    precision: pa,
                    ..
                },
                Self::Primitive {
                    name: b,
                    precision: pb,
                    ..
                },
            ) => a.eq_ignore_ascii_case(b) && pa == pb,
            (
                Self::TimeMarked {
                    precision: pa,
                    marker: ma,
                    ..
                },
                Self::TimeMarked {
                    precision: pb,
                    marker: mb,
                    ..
                },
            ) => pa == pb && ma == mb,
            (Self::Composite { fields: fa }, Self::Composite { fields: fb }) => {
                fa.len() == fb.len() && fa.iter().zip(fb).all(|(x, y)| x.ty.same_shape(&y.ty))
            }
            _ => false,
        }
    }

    /// Like [`same_shape`](Self::same_shape), but a time attribute also
    /// matches the plain timestamp it materializes to.
    pub fn same_physical_shape(&self, other: &Self) -> bool {
        self.physical().same_shape(&other.physical())
    }

    fn physical(&self) -> Self {
        match self {
            Self::TimeMarked {
                precision,
                marker: TimeMarker::EventTime,
                nullable,
            } => Self::Primitive {
                name: "TIMESTAMP".to_owned(),
                nullable: *nullable,
                precision: Some(*precision),
            },
            Self::TimeMarked {
                precision,
                marker: TimeMarker::ProcessingTime,
                nullable,
            } => Self::Primitive {
                name: "TIMESTAMP_LTZ".to_owned(),
                nullable: *nullable,
                precision: Some(*precision),
            },
            Self::Composite { fields } => Self::Composite {
                fields: fields
                    .iter()
                    .map(|f| RowField {
                        name: f.name.clone(),
                        ty: f.ty.physical(),
                    })
                    .collect(),
            },
            other => other.clone(),
        }
    }

    /// Checks the descriptor invariants recursively.
    pub fn validate(&self) -> Result<(), ModelError> {
        match self {
            Self::Primitive {
                name, precision, ..
            } => {
                if name.is_empty()
                    || name
                        .chars()
                        .any(|c| c.is_whitespace() || matches!(c, '<' | '>' | ','))
                {
                    return Err(ModelError::MalformedType(format!(
                        "invalid primitive type name {name:?}"
                    )));
                }
                if let Some(p) = precision {
                    if !TEMPORAL_PRIMITIVES
                        .iter()
                        .any(|t| t.eq_ignore_ascii_case(name))
                    {
                        return Err(ModelError::MalformedType(format!(
                            "precision is only meaningful for temporal types, got {name}({p})"
                        )));
                    }
                    check_precision(*p)?;
                }
                Ok(())
            }
            Self::TimeMarked { precision, .. } => check_precision(*precision),
            Self::Composite { fields } => {
                let mut seen = HashSet::with_capacity(fields.len());
                for field in fields {
                    if field.name.is_empty() {
                        return Err(ModelError::MalformedType(
                            "row field names must be non-empty".to_owned(),
                        ));
                    }
                    if !seen.insert(field.name.as_str()) {
                        return Err(ModelError::MalformedType(format!(
                            "duplicate row field name `{}`",
                            field.name
                        )));
                    }
                    field.ty.validate()?;
                }
                Ok(())
            }
        }
    }
}

fn check_precision(p: u8) -> Result<(), ModelError> {
    if p > MAX_TIME_PRECISION {
        return Err(ModelError::MalformedType(format!(
            "time precision {p} exceeds {MAX_TIME_PRECISION}"
        )));
    }
    Ok(())
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive {
                name,
                nullable,
                precision,
            } => {
                write!(f, "{}", name.to_ascii_uppercase())?;
                if let Some(p) = precision {
                    write!(f, "({p})")?;
                }
                if !nullable {
                    f.write_str(" NOT NULL")?;
                }
                Ok(())
            }
            Self::TimeMarked {
                precision,
                marker,
                nullable,
            } => {
                match marker {
                    TimeMarker::EventTime => write!(f, "TIMESTAMP({precision}) *ROWTIME*")?,
                    TimeMarker::ProcessingTime => {
                        write!(f, "TIMESTAMP_LTZ({precision}) *PROCTIME*")?;
                    }
                }
                if !nullable {
                    f.write_str(" NOT NULL")?;
                }
                Ok(())
            }
            Self::Composite { fields } => {
                f.write_str("ROW<")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "`{}` {}", field.name, field.ty)?;
                }
                f.write_str(">")
            }
        }
    }
}
