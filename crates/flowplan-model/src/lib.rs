// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed model of a compiled streaming plan.
//!
//! A plan is a DAG of [`PlanNode`]s joined by [`Edge`]s and tagged with the
//! [`EngineVersion`] that produced it. Node kinds form a closed set
//! ([`NodeKind`]); each kind owns exactly one attribute record
//! ([`NodeAttrs`]). Types ([`TypeDescriptor`]) and expressions
//! ([`Expression`]) are plain values with a canonical rendering used for
//! diagnostics only.
//!
//! Nothing here evaluates expressions or interprets function payloads.

pub mod builder;
pub mod catalog;
pub mod edge;
pub mod error;
pub mod expr;
pub mod graph;
pub mod node;
pub mod payload;
pub mod types;
pub mod version;

pub use builder::PlanGraphBuilder;
pub use catalog::{CatalogObjectRef, ObjectIdentifier, ResolutionMode, TableSnapshot};
pub use edge::{BufferingMode, Distribution, Edge};
pub use error::ModelError;
pub use expr::{AggregateCall, Expression, LiteralValue, Operator, OperatorKind, OperatorSyntax};
pub use graph::PlanGraph;
pub use node::{
    EmitPolicy, JoinType, NodeAttrs, NodeHints, NodeId, NodeKind, PlanNode, StateClass, WindowKind,
    WindowProperty, WindowSpec,
};
pub use payload::OpaquePayload;
pub use types::{RowField, TimeMarker, TypeDescriptor, MAX_TIME_PRECISION};
pub use version::{EngineVersion, VersionParseError};
