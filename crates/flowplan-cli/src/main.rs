// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! flowplan developer CLI.
//!
//! Compiles optimizer output into persisted plans, validates persisted plans
//! against a catalog, prints plan trees and reports stable id drift.
//!
//! Results go to stdout, logs to stderr. `RUST_LOG` overrides the saved log
//! filter.

mod catalog;
mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use flowplan_app_core::config::ConfigService;
use flowplan_app_core::config_port::PrefsPort;
use flowplan_app_core::prefs::PlannerPrefs;
use flowplan_codec::UnknownNodePolicy;
use flowplan_config_fs::FsConfigStore;
use flowplan_model::EngineVersion;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "flowplan",
    author,
    version,
    about = "Compile, validate and inspect persisted streaming plans",
    disable_help_subcommand = true
)]
struct Cli {
    /// Directory holding `planner.json` (default: platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Engine version to compile for and restore with
    #[arg(long, global = true)]
    engine_version: Option<EngineVersion>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assign stable ids to an optimized graph and persist it
    Compile(CompileArgs),
    /// Restore a persisted plan and run every restore check
    Validate(RestoreArgs),
    /// Print the plan tree and stable id table
    Explain(RestoreArgs),
    /// Compare persisted stable ids with the ids this build derives
    Rederive(PlanArgs),
    /// Print the plan format versions this build reads and writes
    EngineVersion,
    /// Show or update saved preferences
    #[command(subcommand)]
    Prefs(PrefsCommand),
}

#[derive(Args, Debug)]
struct CompileArgs {
    /// Plan document produced by the optimizer (stable ids optional)
    input: PathBuf,
    /// Output file; prints to stdout when absent
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Leave an existing output file untouched instead of failing
    #[arg(long)]
    ignore_if_exists: bool,
}

#[derive(Args, Debug)]
struct RestoreArgs {
    #[command(flatten)]
    plan: PlanArgs,
    /// JSON catalog used for live-resolved references
    #[arg(long)]
    catalog: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Persisted plan file
    plan: PathBuf,
    /// Override the saved unknown node policy
    #[arg(long, value_enum)]
    unknown_nodes: Option<UnknownNodes>,
}

#[derive(Subcommand, Debug)]
enum PrefsCommand {
    /// Print the effective preferences as JSON
    Show,
    /// Update saved preferences
    Set(PrefsSetArgs),
}

#[derive(Args, Debug)]
struct PrefsSetArgs {
    #[arg(long, value_enum)]
    unknown_nodes: Option<UnknownNodes>,
    #[arg(long)]
    check_identity_drift: Option<bool>,
    #[arg(long)]
    ignore_if_exists: Option<bool>,
    #[arg(long)]
    log_filter: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum UnknownNodes {
    Reject,
    SkipOptional,
}

impl From<UnknownNodes> for UnknownNodePolicy {
    fn from(value: UnknownNodes) -> Self {
        match value {
            UnknownNodes::Reject => Self::Reject,
            UnknownNodes::SkipOptional => Self::SkipOptional,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let store = match &cli.config_dir {
        Some(dir) => FsConfigStore::with_base(dir),
        None => FsConfigStore::new(),
    }
    .context("failed to open config directory")?;
    let config = ConfigService::new(store);
    let mut prefs = config.load_prefs().context("failed to load preferences")?;
    if let Some(version) = cli.engine_version {
        prefs.engine_version = Some(version);
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&prefs.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Compile(args) => commands::compile(
            &prefs,
            &args.input,
            args.output.as_deref(),
            args.ignore_if_exists || prefs.ignore_if_exists,
        ),
        Command::Validate(args) => {
            let prefs = with_policy(prefs, args.plan.unknown_nodes);
            commands::validate(&prefs, &args.plan.plan, args.catalog.as_deref())
        }
        Command::Explain(args) => {
            let prefs = with_policy(prefs, args.plan.unknown_nodes);
            commands::explain(&prefs, &args.plan.plan, args.catalog.as_deref())
        }
        Command::Rederive(args) => {
            let prefs = with_policy(prefs, args.unknown_nodes);
            commands::rederive(&prefs, &args.plan)
        }
        Command::EngineVersion => commands::engine_version(),
        Command::Prefs(PrefsCommand::Show) => commands::show_prefs(&prefs),
        Command::Prefs(PrefsCommand::Set(args)) => {
            // Saved prefs only; the --engine-version override is not persisted.
            let mut saved = config.load_prefs()?;
            if let Some(policy) = args.unknown_nodes {
                saved.unknown_nodes = policy.into();
            }
            if let Some(check) = args.check_identity_drift {
                saved.check_identity_drift = check;
            }
            if let Some(ignore) = args.ignore_if_exists {
                saved.ignore_if_exists = ignore;
            }
            if let Some(filter) = args.log_filter {
                saved.log_filter = filter;
            }
            config
                .save_prefs(&saved)
                .context("failed to save preferences")?;
            commands::show_prefs(&saved)
        }
    }
}

fn with_policy(mut prefs: PlannerPrefs, policy: Option<UnknownNodes>) -> PlannerPrefs {
    if let Some(policy) = policy {
        prefs.unknown_nodes = policy.into();
    }
    prefs
}
