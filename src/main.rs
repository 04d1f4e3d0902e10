mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use namo::config::NamoConfig;
use namo::orchestrator::ReflectionOrchestrator;

#[derive(Parser)]
#[command(name = "namo", version, about = "Safety-gated, emotion-weighted reflective companion")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive session over stdin
    Chat,
    /// Run one turn and print the response as JSON
    Submit {
        /// Text to reflect on
        text: String,
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Show the interaction log and recent memories
    History {
        /// Number of entries to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show memory store statistics
    Stats,
    /// Check database health, embedding provider, and threat policy
    Doctor,
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.namo/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The configured level isn't known yet; this covers warnings raised while loading.
    let bootstrap_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let config = tracing::subscriber::with_default(
        bootstrap_subscriber(bootstrap_filter, std::io::stderr),
        NamoConfig::load,
    )?;

    // stdout carries command output; logs go to stderr.
    let filter = EnvFilter::try_new(&config.logging.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Chat => {
            let orchestrator = ReflectionOrchestrator::from_config(&config);
            cli::chat::chat(&orchestrator).await?;
        }
        Command::Submit { text, pretty } => {
            let orchestrator = ReflectionOrchestrator::from_config(&config);
            cli::submit::submit(&orchestrator, &text, pretty).await?;
        }
        Command::History { limit } => {
            let orchestrator = ReflectionOrchestrator::from_config(&config);
            cli::history::history(&orchestrator, limit).await?;
        }
        Command::Stats => cli::stats::stats(&config)?,
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.embedding).await?;
            }
        },
    }

    Ok(())
}

/// Subscriber used while the config is loading.
fn bootstrap_subscriber<W>(filter: EnvFilter, writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .finish()
}
