// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Subcommand bodies.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use flowplan_app_core::prefs::PlannerPrefs;
use flowplan_core::{Catalog, CompiledPlan, EmptyCatalog};
use flowplan_model::EngineVersion;
use tracing::debug;

use crate::catalog::JsonCatalog;

pub fn compile(
    prefs: &PlannerPrefs,
    input: &Path,
    output: Option<&Path>,
    ignore_if_exists: bool,
) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let graph = flowplan_codec::deserialize_with(&text, &prefs.decode_options())
        .with_context(|| format!("failed to decode {}", input.display()))?;
    let plan = CompiledPlan::compile(&graph, &prefs.compile_options())?;

    let mut out = io::stdout().lock();
    match output {
        Some(path) => {
            plan.write_to_file(path, ignore_if_exists)?;
            writeln!(
                out,
                "compiled {} nodes ({} stable ids) -> {}",
                plan.graph().nodes().len(),
                plan.stable_ids().len(),
                path.display()
            )?;
        }
        None => writeln!(out, "{}", plan.as_json_string()?)?,
    }
    Ok(())
}

pub fn validate(prefs: &PlannerPrefs, plan: &Path, catalog: Option<&Path>) -> Result<()> {
    let restored = restore(prefs, plan, catalog)?;
    writeln!(
        io::stdout().lock(),
        "ok: {} nodes, engine {}",
        restored.graph().nodes().len(),
        restored.engine_version()
    )?;
    Ok(())
}

pub fn explain(prefs: &PlannerPrefs, plan: &Path, catalog: Option<&Path>) -> Result<()> {
    let restored = restore(prefs, plan, catalog)?;
    write!(io::stdout().lock(), "{}", restored.explain())?;
    Ok(())
}

pub fn rederive(prefs: &PlannerPrefs, plan: &Path) -> Result<()> {
    let graph = flowplan_codec::read_from_file(plan, &prefs.decode_options())?;
    let drift = flowplan_ident::rederive(&graph)?;
    let mut out = io::stdout().lock();
    if drift.is_empty() {
        writeln!(out, "no drift")?;
        return Ok(());
    }
    for entry in &drift {
        writeln!(
            out,
            "[{}] {}: {} -> {}",
            entry.node,
            entry.kind,
            entry.persisted.as_deref().unwrap_or("-"),
            entry.derived
        )?;
    }
    Ok(())
}

pub fn engine_version() -> Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "current: {}", EngineVersion::CURRENT)?;
    writeln!(out, "oldest supported: {}", EngineVersion::OLDEST_SUPPORTED)?;
    Ok(())
}

pub fn show_prefs(prefs: &PlannerPrefs) -> Result<()> {
    let json = serde_json::to_string_pretty(prefs)?;
    writeln!(io::stdout().lock(), "{json}")?;
    Ok(())
}

fn restore(prefs: &PlannerPrefs, plan: &Path, catalog: Option<&Path>) -> Result<CompiledPlan> {
    let catalog: Box<dyn Catalog> = match catalog {
        Some(path) => Box::new(JsonCatalog::load(path)?),
        None => Box::new(EmptyCatalog),
    };
    debug!(plan = %plan.display(), "restoring plan");
    CompiledPlan::restore_from_file(plan, catalog.as_ref(), &prefs.restore_options())
        .with_context(|| format!("failed to restore {}", plan.display()))
}
