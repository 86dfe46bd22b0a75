// paddlectl
// Command-line front end for training and evaluating the paddle-ball agent

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "paddlectl")]
#[command(about = "Train and evaluate a dueling DQN agent on paddle-ball", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train an agent, optionally resuming from a checkpoint
    Train {
        /// Number of training episodes
        #[arg(long, default_value = "100")]
        episodes: usize,

        /// JSON run configuration (see `paddlectl config`)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Resume from this checkpoint
        #[arg(long)]
        resume: Option<PathBuf>,

        /// Where to write checkpoints
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Save a checkpoint every N episodes
        #[arg(long, default_value = "10")]
        checkpoint_every: usize,

        /// Write the training history as JSON when done
        #[arg(long)]
        history: Option<PathBuf>,

        /// Seed for the agent and the game
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Play greedy episodes with a trained agent
    Evaluate {
        /// Checkpoint to load
        #[arg(long)]
        checkpoint: PathBuf,

        /// Number of evaluation episodes
        #[arg(long, default_value = "10")]
        episodes: usize,

        /// JSON run configuration for the game
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed for the game
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the default run configuration as JSON
    Config,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            episodes,
            config,
            resume,
            checkpoint,
            checkpoint_every,
            history,
            seed,
        } => {
            let options = commands::TrainOptions {
                episodes,
                config,
                resume,
                checkpoint,
                checkpoint_every,
                history,
                seed,
            };
            commands::train(options).await?;
        }

        Commands::Evaluate {
            checkpoint,
            episodes,
            config,
            seed,
        } => {
            commands::evaluate(&checkpoint, episodes, config.as_deref(), seed).await?;
        }

        Commands::Config => {
            commands::print_default_config()?;
        }
    }

    Ok(())
}
