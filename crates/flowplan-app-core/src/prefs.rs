// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Planner preferences shared by flowplan tools.

use flowplan_codec::{DecodeOptions, UnknownNodePolicy};
use flowplan_core::{CompileOptions, RestoreOptions};
use flowplan_model::EngineVersion;
use serde::{Deserialize, Serialize};

/// Config key the preferences are stored under.
pub const PREFS_KEY: &str = "planner";

/// Saved preferences for compile and restore.
///
/// Every field has a default, so partial or older config files still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlannerPrefs {
    /// Engine version to compile for and restore with; `None` means the
    /// running build.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<EngineVersion>,
    /// Unknown node handling on restore.
    pub unknown_nodes: UnknownNodePolicy,
    /// Log stable id drift after restore.
    pub check_identity_drift: bool,
    /// Leave an existing plan file alone instead of failing.
    pub ignore_if_exists: bool,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for PlannerPrefs {
    fn default() -> Self {
        Self {
            engine_version: None,
            unknown_nodes: UnknownNodePolicy::Reject,
            check_identity_drift: true,
            ignore_if_exists: false,
            log_filter: "info".to_owned(),
        }
    }
}

impl PlannerPrefs {
    /// Effective engine version.
    pub fn engine_version(&self) -> EngineVersion {
        self.engine_version.unwrap_or(EngineVersion::CURRENT)
    }

    /// Compile settings.
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions::new().with_engine_version(self.engine_version())
    }

    /// Decoder settings. Migration hooks are registered by the caller.
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions::new()
            .with_engine_version(self.engine_version())
            .with_unknown_nodes(self.unknown_nodes)
    }

    /// Restore settings.
    pub fn restore_options(&self) -> RestoreOptions {
        RestoreOptions::new()
            .with_decode_options(self.decode_options())
            .with_identity_drift_check(self.check_identity_drift)
    }
}
