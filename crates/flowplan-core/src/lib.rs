// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Compile and restore contracts for compiled streaming plans.
//!
//! [`CompiledPlan::compile`] takes an optimized [`PlanGraph`], checks that
//! every node's attributes agree with its declared types and assigns stable
//! ids. The result can be persisted with [`CompiledPlan::write_to_file`] and
//! restored later by a possibly newer engine with
//! [`CompiledPlan::restore_from_str`], which runs [`validate_restored`]
//! before anything reaches the runtime.
//!
//! Restored stable ids are authoritative: the runtime must key each unit's
//! state by its node's stable id ([`check_runtime_uids`]), so an upgrade
//! that keeps a node's semantics reattaches to its checkpointed state.
//!
//! [`PlanGraph`]: flowplan_model::PlanGraph
#![forbid(unsafe_code)]

mod catalog;
mod compiled;
mod error;
mod restore;
mod runtime;
mod typecheck;

pub use catalog::{Catalog, EmptyCatalog};
pub use compiled::{CompileOptions, CompiledPlan, RestoreOptions};
pub use error::{PlanError, PlanErrorKind};
pub use restore::{
    check_catalog_refs, check_stable_ids, check_types, check_version, validate_restored,
};
pub use runtime::{
    bind_functions, check_runtime_uids, FunctionRegistry, RuntimeTranslator, RuntimeUnit,
};
