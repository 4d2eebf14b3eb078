use anyhow::Result;
use clap::{Parser, Subcommand};
use dave_execution::LogFormat;
use dave_infrastructure::ConfigService;
use std::path::PathBuf;

mod commands;
mod console;
mod mock_backend;

#[derive(Parser)]
#[command(name = "crazy-dave")]
#[command(about = "Crazy Dave - a chat bot speaking through two generation backends", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.config/crazy-dave/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat on the console
    Run,
    /// Generate one reply and print its provenance
    Predict {
        /// Send to the legacy backend regardless of context length
        #[arg(long)]
        legacy: bool,
        /// Context utterances, oldest first
        #[arg(required = true)]
        utterances: Vec<String>,
    },
    /// Poll both backends for a model swap
    UpdateModels,
    /// Serve a local stand-in backend for trying the bot
    MockBackend {
        #[arg(long, default_value_t = 8001)]
        port: u16,
        /// Text returned by every inference
        #[arg(long, default_value = mock_backend::DEFAULT_RESPONSE)]
        response: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    dave_execution::logging::init(format)?;

    let config = ConfigService::new(cli.config).load()?;

    match cli.command {
        Commands::Run => commands::run::run(&config).await?,
        Commands::Predict { legacy, utterances } => {
            commands::predict::predict(&config, utterances, legacy).await?
        }
        Commands::UpdateModels => commands::update::update_models(&config).await?,
        Commands::MockBackend { port, response } => mock_backend::serve(port, response).await?,
    }

    Ok(())
}
