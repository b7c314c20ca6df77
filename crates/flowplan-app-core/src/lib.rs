// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for flowplan tools (config storage, planner
//! preferences). Keeps CLI adapters thin.

pub mod config;
pub mod config_port;
pub mod prefs;
