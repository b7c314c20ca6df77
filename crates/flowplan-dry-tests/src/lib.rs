// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for flowplan crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`catalog`] - In-memory catalog fake
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`runtime`] - Fake runtime translator and recording function registry
//! - [`scenarios`] - Plan fixtures (session window pipeline, parallel union, UDF)

pub mod catalog;
pub mod config;
pub mod runtime;
pub mod scenarios;

pub use catalog::InMemoryCatalog;
pub use config::InMemoryConfigStore;
pub use runtime::{FakeTranslator, FakeUnit, RecordingRegistry, Registration};
pub use scenarios::{
    fixture_catalog, parallel_union, session_window_pipeline, table_id, udf_pipeline, TableMode,
    DEFAULT_SESSION_GAP_MS,
};
