//! videoforge CLI: scaffolding, inspection and an offline pipeline
//! harness. The production generation backends are wired in by the
//! hosting application; `run`/`step` here use the bundled offline
//! collaborators against the file snapshot store.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, eyre};
use colored::Colorize;
use tokio::sync::mpsc;
use vf_core::clients::{Collaborators, FileSnapshotStore, SnapshotStore};
use vf_core::config::{load_config, AppConfig};
use vf_core::engine::RunAllEngine;
use vf_core::init::{generate_videoforge_structure, InitOptions};
use vf_core::state::StateStore;
use vf_core::validate;
use vf_protocol::{Event, PipelineState, RunAllStatus, StepId};

#[derive(Parser)]
#[command(name = "videoforge", version, about = "Multi-stage video generation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scaffold a .videoforge/ directory in the current project
    Init {
        /// Overwrite an existing .videoforge directory
        #[arg(long)]
        force: bool,
        /// Config and default preset only, no prompt templates
        #[arg(long)]
        minimal: bool,
    },

    /// List the pipeline steps in execution order
    Steps,

    /// Show progress and totals from the saved project snapshot
    Status {
        /// Print the raw snapshot document instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Run preflight validation against the saved project snapshot
    Validate,

    /// Execute the full pipeline offline against the file snapshot store
    Run {
        /// Topic for a fresh project (ignored with --resume)
        #[arg(long)]
        topic: Option<String>,
        /// Re-enter at the recorded failure index
        #[arg(long)]
        resume: bool,
        /// Use the bundled offline collaborators
        #[arg(long)]
        offline: bool,
    },

    /// Execute a single step offline (id in camelCase, e.g. sceneImages)
    Step {
        id: String,
        #[arg(long)]
        offline: bool,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let root = std::env::current_dir()?;

    match cli.command {
        Command::Init { force, minimal } => {
            generate_videoforge_structure(InitOptions {
                target_dir: root,
                force,
                minimal,
            })
            .await?;
            println!("{} .videoforge/ scaffolded", "ok:".green().bold());
        }
        Command::Steps => {
            for id in StepId::ALL {
                let domain = match id.domain() {
                    vf_protocol::StepDomain::Batch => "batch".cyan(),
                    vf_protocol::StepDomain::Dispatched => "tail ".magenta(),
                };
                println!("{:>2}  {}  {:<16} {}", id.index() + 1, domain, id.key(), id.label().dimmed());
            }
        }
        Command::Status { json } => {
            let config = load_config(&root).await?;
            let snapshot = load_snapshot(&root, &config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                return Ok(());
            }
            let state = snapshot.state;
            let progress = state.run_all.progress();
            println!("topic:    {}", state.topic.bold());
            println!(
                "progress: {}/{} ({:.0}%) — {}",
                progress.current_index, progress.total, progress.percent, progress.label
            );
            println!(
                "tokens:   {} session / {} total, ${:.4} session",
                state.session_totals.total_tokens,
                state.cumulative_totals.total_tokens,
                state.session_totals.cost_usd
            );
            if let Some(error) = &state.run_all.error {
                println!("{} {}", "error:".red().bold(), error.message);
                if let Some(hint) = &error.hint {
                    println!("hint:     {hint}");
                }
            }
        }
        Command::Validate => {
            let config = load_config(&root).await?;
            let snapshot = load_snapshot(&root, &config)?;
            let issues = validate::validate_preflight(&snapshot.state);
            if issues.is_empty() {
                println!("{} no issues", "ok:".green().bold());
            }
            for issue in &issues {
                let severity = match issue.severity {
                    validate::Severity::Error => "error:".red().bold(),
                    validate::Severity::Warning => "warning:".yellow().bold(),
                };
                println!("{severity} [{}] {}", issue.step.key(), issue.message);
                if let Some(hint) = &issue.hint {
                    println!("  hint: {hint}");
                }
            }
            if validate::has_blocking(&issues) {
                std::process::exit(1);
            }
        }
        Command::Run {
            topic,
            resume,
            offline,
        } => {
            require_offline(offline)?;
            let config = Arc::new(load_config(&root).await?);
            let snapshots = Arc::new(FileSnapshotStore::new(root.join(&config.settings.snapshot_path)));

            let state = if resume && snapshots.exists() {
                snapshots.load()?.state
            } else {
                let topic =
                    topic.ok_or_else(|| eyre!("--topic is required for a fresh run"))?;
                let mut state = PipelineState::new();
                state.set_topic(topic);
                state
            };
            let state = with_default_models(state, &config);

            let (events_tx, events_rx) = mpsc::channel(256);
            let printer = spawn_event_printer(events_rx);
            let engine = RunAllEngine::new(
                StateStore::new(state),
                Arc::new(Collaborators::mock()),
                Arc::clone(&config),
                snapshots as Arc<dyn SnapshotStore>,
                events_tx,
            );

            let outcome = if resume {
                engine.resume().await.map_err(|e| eyre!(e))?
            } else {
                engine.start(false).await.map_err(|e| eyre!(e))?
            };
            engine.autosave().idle().await;
            drop(engine);
            let _ = printer.await;

            match outcome {
                RunAllStatus::Completed => println!("{} pipeline completed", "ok:".green().bold()),
                other => bail!("pipeline ended in {other:?}"),
            }
        }
        Command::Step { id, offline } => {
            require_offline(offline)?;
            let step = StepId::ALL
                .iter()
                .copied()
                .find(|s| s.key() == id)
                .ok_or_else(|| eyre!("unknown step id: {id}"))?;

            let config = Arc::new(load_config(&root).await?);
            let snapshots = Arc::new(FileSnapshotStore::new(root.join(&config.settings.snapshot_path)));
            if !snapshots.exists() {
                bail!("no saved project; run `videoforge run` first");
            }
            let state = with_default_models(snapshots.load()?.state, &config);

            let (events_tx, events_rx) = mpsc::channel(256);
            let printer = spawn_event_printer(events_rx);
            let engine = RunAllEngine::new(
                StateStore::new(state),
                Arc::new(Collaborators::mock()),
                Arc::clone(&config),
                snapshots as Arc<dyn SnapshotStore>,
                events_tx,
            );

            let status = engine.run_single_step(step).await.map_err(|e| eyre!(e))?;
            engine.autosave().idle().await;
            drop(engine);
            let _ = printer.await;
            println!("{} {} -> {status:?}", "ok:".green().bold(), step.key());
        }
    }

    Ok(())
}

fn require_offline(offline: bool) -> color_eyre::Result<()> {
    if !offline {
        bail!(
            "generation backends are provided by the hosting application; \
             pass --offline to run against the bundled stub collaborators"
        );
    }
    Ok(())
}

fn load_snapshot(
    root: &std::path::Path,
    config: &AppConfig,
) -> color_eyre::Result<vf_protocol::ProjectSnapshot> {
    let path: PathBuf = root.join(&config.settings.snapshot_path);
    let store = FileSnapshotStore::new(&path);
    if !store.exists() {
        bail!("no saved project at {}", path.display());
    }
    Ok(store.load()?)
}

fn with_default_models(mut state: PipelineState, config: &AppConfig) -> PipelineState {
    if state.models.script_model.is_empty() {
        state.models.script_model = config.settings.script_model.clone();
    }
    if state.models.image_model.is_empty() {
        state.models.image_model = config.settings.image_model.clone();
    }
    if state.models.video_model.is_empty() {
        state.models.video_model = config.settings.video_model.clone();
    }
    if state.models.voice_id.is_empty() {
        state.models.voice_id = config.settings.voice_id.clone();
    }
    if state.models.style_preset.is_empty() {
        state.models.style_preset = config.settings.style_preset.clone();
    }
    state
}

fn spawn_event_printer(mut events_rx: mpsc::Receiver<Event>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            print_event(&event);
        }
    })
}

fn print_event(event: &Event) {
    match event {
        Event::RunStarted { resume, .. } => {
            let mode = if *resume { " (resume)" } else { "" };
            println!("{} run started{mode}", "run:".blue().bold());
        }
        Event::StepStarted { step, index, .. } => {
            println!(
                "{} [{:>2}/{}] {}",
                "step:".blue().bold(),
                index + 1,
                StepId::COUNT,
                step.label()
            );
        }
        Event::StepCompleted { step, metrics, .. } => {
            let usage = metrics
                .as_ref()
                .map(|m| format!(" ({} tokens, ${:.4})", m.total_tokens, m.cost_usd))
                .unwrap_or_default();
            println!("{} {}{usage}", "done:".green(), step.label());
        }
        Event::StepSkipped { step, .. } => {
            println!("{} {}", "skip:".dimmed(), step.label().dimmed());
        }
        Event::StepFailed { step, error, .. } => {
            println!("{} {}: {}", "fail:".red().bold(), step.label(), error.message);
        }
        Event::BatchCompleted { steps, .. } => {
            println!("{} script batch ({} steps)", "done:".green(), steps.len());
        }
        Event::RunCompleted { .. } => println!("{} run completed", "run:".green().bold()),
        Event::RunFailed { error, .. } => {
            println!("{} {}", "run failed:".red().bold(), error.message);
            if let Some(hint) = &error.hint {
                println!("  hint: {hint}");
            }
        }
        Event::RunCancelled { .. } => println!("{} run cancelled", "run:".yellow().bold()),
        Event::SaveFailed { error, .. } => {
            println!("{} autosave failed: {error}", "warn:".yellow());
        }
        Event::SaveCompleted { .. } | Event::ProgressUpdate { .. } => {}
    }
}
