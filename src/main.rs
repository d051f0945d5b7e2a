use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coref_runner::checkpoint::{CheckpointManager, CheckpointSelector};
use coref_runner::config::RunnerConfig;
use coref_runner::model::parameter_paths;

/// Inspect checkpoints and the best-score watermark of a coreference run.
///
/// Training and testing need a concrete model and corpus, so they are driven
/// from library code through `Trainer::train` and `Trainer::test`; this
/// binary only reads and maintains what those runs leave on disk.
#[derive(Parser)]
#[command(name = "coref-runner", about = "Coreference training run inspector")]
struct Cli {
    /// Path to TOML configuration file
    #[arg(long, default_value = "coref.toml")]
    config: PathBuf,

    /// Override the checkpoint directory
    #[arg(long)]
    ckpts_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List checkpoints, oldest first
    Checkpoints,
    /// Summarize one checkpoint: an id, `latest`, or `best`
    Inspect { checkpoint: String },
    /// Show the best-score watermark, optionally proposing a new score
    Watermark {
        #[arg(long)]
        propose: Option<f64>,
    },
    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coref_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = RunnerConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if let Some(dir) = cli.ckpts_dir {
        config.checkpoint.ckpts_dir = dir;
    }

    let manager = CheckpointManager::new(&config.checkpoint);
    match cli.command {
        Command::Checkpoints => list_checkpoints(&manager),
        Command::Inspect { checkpoint } => inspect(&manager, &checkpoint),
        Command::Watermark { propose } => watermark(&manager, propose),
        Command::Config => {
            print!(
                "{}",
                toml::to_string_pretty(&config).context("serializing configuration")?
            );
            Ok(())
        }
    }
}

fn list_checkpoints(manager: &CheckpointManager) -> Result<()> {
    let ids = manager
        .list()
        .with_context(|| format!("listing {}", manager.ckpts_dir().display()))?;
    if ids.is_empty() {
        println!("no checkpoints in {}", manager.ckpts_dir().display());
        return Ok(());
    }
    for id in &ids {
        println!("{id}\t{}", manager.path_for(id).display());
    }
    if manager.best_path().is_file() {
        println!("best\t{}", manager.best_path().display());
    }
    Ok(())
}

fn inspect(manager: &CheckpointManager, checkpoint: &str) -> Result<()> {
    let selector: CheckpointSelector = checkpoint
        .parse()
        .with_context(|| format!("'{checkpoint}' is not an id, 'latest' or 'best'"))?;
    let loaded = manager.load(&selector)?;
    let state = &loaded.state;

    println!("path:           {}", loaded.path.display());
    println!("epoch:          {}", state.epoch_idx);
    println!("resumes at:     {}", state.resume_epoch());
    println!("max score seen: {}", state.max_score_seen);
    println!("seed:           {}", state.seed);
    let params = parameter_paths(&state.model);
    println!("parameters:     {} tensors", params.len());
    for path in &params {
        println!("  {path}");
    }
    println!(
        "optimizer:      {} parameter states",
        state.optimizer.as_object().map_or(0, |entries| entries.len())
    );
    println!(
        "lr schedule:    step {} (every {}, gamma {})",
        state.lr_scheduler.last_step, state.lr_scheduler.step_size, state.lr_scheduler.gamma
    );
    Ok(())
}

fn watermark(manager: &CheckpointManager, propose: Option<f64>) -> Result<()> {
    let mark = manager.watermark();
    match propose {
        None => match mark.read()? {
            Some(score) => println!("{score}"),
            None => println!("no score recorded at {}", mark.path().display()),
        },
        Some(candidate) => {
            if manager.check_and_update_watermark(candidate)? {
                println!("watermark raised to {candidate}");
            } else {
                println!("{candidate} does not beat the recorded best, unchanged");
            }
        }
    }
    Ok(())
}
