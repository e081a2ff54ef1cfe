mod doctor;
mod run;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mittai", version, about = "mittwald AI hosting client")]
struct Cli {
    /// Settings file (defaults to ~/.mittai/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List models usable for an operation type
    Models {
        /// chat, embeddings, moderation, ...
        #[arg(short, long, default_value = "chat")]
        operation: String,

        /// Required capability (vision, json, audio, video, tools, structured)
        #[arg(short, long = "capability")]
        capabilities: Vec<String>,
    },

    /// Run a chat completion
    Chat {
        #[arg(short, long)]
        model: String,

        #[arg(short, long)]
        system: Option<String>,

        /// Print chunks as they arrive
        #[arg(long)]
        stream: bool,

        prompt: String,
    },

    /// Embed a text and print the vector size
    Embed {
        #[arg(short, long)]
        model: String,

        text: String,
    },

    /// Print setup data; with --probe also run the rate-limit check
    Setup {
        #[arg(long)]
        probe: bool,
    },

    /// Validate the configured credential against /models
    AuthCheck,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mittai=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let provider = run::provider(cli.settings);

    match cli.command {
        Commands::Models {
            operation,
            capabilities,
        } => {
            run::list_models(&provider, &operation, &capabilities).await?;
        }
        Commands::Chat {
            model,
            system,
            stream,
            prompt,
        } => {
            run::chat(&provider, &model, system, stream, prompt).await?;
        }
        Commands::Embed { model, text } => {
            run::embed(&provider, &model, text).await?;
        }
        Commands::Setup { probe } => {
            doctor::run_setup(&provider, probe).await?;
        }
        Commands::AuthCheck => {
            doctor::run_auth_check(&provider).await?;
        }
    }

    Ok(())
}
