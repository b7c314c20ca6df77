// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Decode policy: reader version, unknown-node handling, migration hooks.

use std::fmt;
use std::sync::Arc;

use flowplan_model::EngineVersion;
use serde::{Deserialize, Serialize};

/// What to do with a node whose kind tag is unknown to this build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownNodePolicy {
    /// Fail with `UnknownNodeKind`.
    #[default]
    Reject,
    /// Drop nodes marked `"optional": true` together with their edges;
    /// unknown nodes without the marker still fail.
    SkipOptional,
}

/// Rewrites the raw JSON of an older document before it is parsed.
///
/// Hooks carry removals and renames; purely additive changes never need one.
pub trait MigrationHook: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// The hook runs on documents whose version is strictly below this one.
    fn applies_below(&self) -> EngineVersion;

    /// Rewrites the document in place.
    fn migrate(&self, document: &mut serde_json::Value) -> Result<(), String>;
}

/// Options for [`deserialize_with`](crate::deserialize_with).
#[derive(Clone)]
pub struct DecodeOptions {
    /// Version of the reading engine; newer documents are rejected.
    pub engine_version: EngineVersion,
    /// Unknown node handling.
    pub unknown_nodes: UnknownNodePolicy,
    /// Hooks run in registration order.
    pub migrations: Vec<Arc<dyn MigrationHook>>,
}

impl DecodeOptions {
    /// Options for the current engine, rejecting unknown nodes, no hooks.
    pub fn new() -> Self {
        Self {
            engine_version: EngineVersion::CURRENT,
            unknown_nodes: UnknownNodePolicy::Reject,
            migrations: Vec::new(),
        }
    }

    /// Overrides the reader version.
    pub fn with_engine_version(mut self, version: EngineVersion) -> Self {
        self.engine_version = version;
        self
    }

    /// Overrides the unknown-node policy.
    pub fn with_unknown_nodes(mut self, policy: UnknownNodePolicy) -> Self {
        self.unknown_nodes = policy;
        self
    }

    /// Registers a migration hook.
    pub fn with_migration(mut self, hook: impl MigrationHook + 'static) -> Self {
        self.migrations.push(Arc::new(hook));
        self
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DecodeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeOptions")
            .field("engine_version", &self.engine_version)
            .field("unknown_nodes", &self.unknown_nodes)
            .field(
                "migrations",
                &self.migrations.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
