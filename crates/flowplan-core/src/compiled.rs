// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The compiled plan handle: compile, persist, restore, explain.

use std::collections::BTreeMap;
use std::path::Path;

use flowplan_codec::DecodeOptions;
use flowplan_model::{EngineVersion, NodeId, PlanGraph, PlanNode};
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::restore::{check_types, validate_restored};
use crate::PlanError;

/// Settings for [`CompiledPlan::compile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Version stamped onto the compiled plan.
    pub engine_version: EngineVersion,
}

impl CompileOptions {
    /// Compile for the running engine.
    pub const fn new() -> Self {
        Self {
            engine_version: EngineVersion::CURRENT,
        }
    }

    /// Compile for a specific engine version.
    pub const fn with_engine_version(mut self, version: EngineVersion) -> Self {
        self.engine_version = version;
        self
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings for the restore path.
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Decoder settings; its engine version also gates validation.
    pub decode: DecodeOptions,
    /// Re-derive stable ids after validation and log any drift.
    pub check_identity_drift: bool,
}

impl RestoreOptions {
    /// Current engine, strict decoding, no drift check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the decoder settings.
    pub fn with_decode_options(mut self, decode: DecodeOptions) -> Self {
        self.decode = decode;
        self
    }

    /// Enables the drift diagnostic.
    pub fn with_identity_drift_check(mut self, enabled: bool) -> Self {
        self.check_identity_drift = enabled;
        self
    }
}

/// A validated plan whose stateful nodes all carry stable ids.
///
/// Obtained either by compiling a freshly optimized graph or by restoring a
/// persisted document. Both paths leave the graph immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPlan {
    graph: PlanGraph,
}

impl CompiledPlan {
    /// Stamps the engine version, checks types and assigns stable ids.
    ///
    /// Live table schemas are not consulted here; that happens on restore.
    pub fn compile(graph: &PlanGraph, options: &CompileOptions) -> Result<Self, PlanError> {
        let stamped = graph.with_version(options.engine_version);
        check_types(&stamped, None)?;
        let graph = flowplan_ident::assign(&stamped)?;
        info!(
            nodes = graph.nodes().len(),
            edges = graph.edges().len(),
            version = %graph.version(),
            "compiled plan"
        );
        Ok(Self { graph })
    }

    /// Decodes and validates a persisted document.
    ///
    /// Persisted stable ids are kept as they are. With
    /// [`RestoreOptions::check_identity_drift`] set, ids that this build would
    /// derive differently are logged.
    pub fn restore_from_str(
        text: &str,
        catalog: &dyn Catalog,
        options: &RestoreOptions,
    ) -> Result<Self, PlanError> {
        let graph = flowplan_codec::deserialize_with(text, &options.decode)?;
        Self::restore_graph(graph, catalog, options)
    }

    /// Reads, decodes and validates a persisted plan file.
    pub fn restore_from_file(
        path: impl AsRef<Path>,
        catalog: &dyn Catalog,
        options: &RestoreOptions,
    ) -> Result<Self, PlanError> {
        let graph = flowplan_codec::read_from_file(path.as_ref(), &options.decode)?;
        Self::restore_graph(graph, catalog, options)
    }

    fn restore_graph(
        graph: PlanGraph,
        catalog: &dyn Catalog,
        options: &RestoreOptions,
    ) -> Result<Self, PlanError> {
        validate_restored(&graph, catalog, options.decode.engine_version)?;
        if options.check_identity_drift {
            let drift = flowplan_ident::rederive(&graph)?;
            if !drift.is_empty() {
                warn!(
                    drifted = drift.len(),
                    "persisted stable ids differ from this build; keeping persisted ids"
                );
            }
        }
        info!(nodes = graph.nodes().len(), version = %graph.version(), "restored plan");
        Ok(Self { graph })
    }

    /// The underlying graph.
    pub fn graph(&self) -> &PlanGraph {
        &self.graph
    }

    /// Consumes the handle.
    pub fn into_graph(self) -> PlanGraph {
        self.graph
    }

    /// Version tag of the plan.
    pub fn engine_version(&self) -> EngineVersion {
        self.graph.version()
    }

    /// Stable ids keyed by node id. Relay nodes are absent.
    pub fn stable_ids(&self) -> BTreeMap<NodeId, &str> {
        self.graph
            .nodes()
            .iter()
            .filter_map(|n| n.stable_id().map(|id| (n.id(), id)))
            .collect()
    }

    /// Pretty-printed persisted document.
    pub fn as_json_string(&self) -> Result<String, PlanError> {
        Ok(flowplan_codec::serialize(&self.graph)?)
    }

    /// Writes the persisted document to `path`.
    ///
    /// Fails with a plan-file-exists error if the file is already there,
    /// unless `ignore_if_exists` is set, in which case the file is left
    /// untouched.
    pub fn write_to_file(
        &self,
        path: impl AsRef<Path>,
        ignore_if_exists: bool,
    ) -> Result<(), PlanError> {
        flowplan_codec::write_to_file(&self.graph, path.as_ref(), ignore_if_exists)?;
        Ok(())
    }

    /// Human-readable plan tree followed by the stable id table.
    ///
    /// Each sink (node without consumers) roots a tree; inputs are listed
    /// beneath their consumer in input order.
    pub fn explain(&self) -> String {
        let mut out = format!("== Compiled Plan (engine {}) ==\n", self.engine_version());
        for root in self
            .graph
            .nodes()
            .iter()
            .filter(|n| self.graph.output_edges(n.id()).next().is_none())
        {
            render_tree(&self.graph, root, "", "", &mut out);
        }
        out.push('\n');
        out.push_str("== Stable Ids ==\n");
        for node in self.graph.nodes() {
            out.push_str(&format!(
                "[{}] {}: {}\n",
                node.id(),
                node.kind(),
                node.stable_id().unwrap_or("(relay)")
            ));
        }
        out
    }
}

fn render_tree(graph: &PlanGraph, node: &PlanNode, prefix: &str, branch: &str, out: &mut String) {
    out.push_str(&format!("{prefix}{branch}{}\n", node.description()));
    let child_prefix = match branch {
        "" => prefix.to_owned(),
        ":- " => format!("{prefix}:  "),
        _ => format!("{prefix}   "),
    };
    let inputs = graph.inputs(node.id());
    let last = inputs.len().saturating_sub(1);
    for (i, input) in inputs.into_iter().enumerate() {
        let branch = if i == last { "+- " } else { ":- " };
        render_tree(graph, input, &child_prefix, branch, out);
    }
}
