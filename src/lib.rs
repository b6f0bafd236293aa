// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod ident;
pub mod logging;
pub mod runner;
pub mod spec;
pub mod track;

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, ConfigFile};
use crate::ident::Ident;
use crate::runner::{ProcessExecutor, Runner, RunnerEvent, RunnerOptions};
use crate::spec::{Relation, TaskKind, DEFAULT_PRIORITY};
use crate::track::{Scheduler, TaskStatus, CMD_KEY};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - registry / network / queue behind the scheduler
/// - executor
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let mut scheduler = Scheduler::from_config(&cfg)?;

    if args.targets.is_empty() {
        let declared: Vec<String> = scheduler
            .registry()
            .spec_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        anyhow::bail!("no targets given; declared tasks: {}", declared.join(", "));
    }

    for target in &args.targets {
        match Ident::from_str(target)? {
            Ident::Task(name) => {
                scheduler.queue_entry(&name, true)?;
            }
            Ident::Artifact(artifact) => {
                scheduler.queue_artifact(&artifact, true)?;
            }
        }
    }

    scheduler.build_network()?;
    scheduler.validate_network()?;

    // Runner event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RunnerEvent>(64);

    // Process executor backend (real implementation in production).
    let executor = ProcessExecutor::new(rt_tx.clone());

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RunnerEvent::ShutdownRequested).await;
        });
    }

    let runner = Runner::new(scheduler, rt_rx, executor, RunnerOptions::default());
    let scheduler = runner.run().await?;

    report_goals(&scheduler, &args.targets)
}

/// Print final goal statuses and fail if any goal did not succeed.
fn report_goals(scheduler: &Scheduler, targets: &[String]) -> Result<()> {
    let mut unmet = Vec::new();

    for (name, status) in scheduler.user_goal_statuses() {
        info!(task = %name, %status, "goal finished");
        println!("{name}: {status}");
        if status != TaskStatus::Success {
            unmet.push(name.to_string());
        }
    }

    for target in targets {
        if let Ok(Ident::Artifact(artifact)) = Ident::from_str(target) {
            let status = scheduler.artifact_status(&artifact);
            println!("{artifact}: {status}");
            if !status.is_satisfied() {
                unmet.push(artifact.to_string());
            }
        }
    }

    if unmet.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} goal(s) did not succeed: {}", unmet.len(), unmet.join(", "));
    }
}

/// Simple dry-run output: print declared specs, their relations and commands.
fn print_dry_run(cfg: &ConfigFile) {
    println!("taskdag dry-run");
    println!("  config.reuse_policy = {:?}", cfg.reuse_policy());
    println!();

    let specs = cfg.specs();
    println!("tasks ({}):", specs.len());
    for spec in specs {
        println!("  - {}", spec.name);
        if let Some(cmd) = spec.extra.get(CMD_KEY) {
            println!("      cmd: {cmd}");
        }
        if !spec.sources.is_empty() {
            let sources: Vec<String> = spec.sources.iter().map(|s| s.to_string()).collect();
            println!("      sources: {sources:?}");
        }
        if !spec.depends_on.is_empty() {
            println!("      depends_on: {:?}", relation_targets(&spec.depends_on));
        }
        if !spec.required_for.is_empty() {
            println!("      required_for: {:?}", relation_targets(&spec.required_for));
        }
        if !spec.cleanup.is_empty() {
            println!("      cleanup: {:?}", relation_targets(&spec.cleanup));
        }
        if spec.kind == TaskKind::Job {
            println!("      kind: job");
        }
        if spec.is_disabled() {
            println!("      disabled: true");
        }
        if spec.priority != DEFAULT_PRIORITY {
            println!("      priority: {}", spec.priority);
        }
    }

    debug!("dry-run complete (no execution)");
}

fn relation_targets(relations: &[Relation]) -> Vec<String> {
    relations
        .iter()
        .map(|rel| rel.target.to_string())
        .collect()
}
