//! Triage CLI — the main entry point.
//!
//! Commands:
//! - `serve`    — Start the HTTP gateway
//! - `chat`     — Route a single message and print the reply
//! - `classify` — Show how a message would be classified
//! - `prompts`  — List or print prompt files
//! - `config`   — Show, locate, or validate configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "triage",
    about = "Triage — classify-then-route AI assistant gateway",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Classify and route one message
    Chat {
        /// The message to send
        #[arg(short, long)]
        message: String,

        /// Identity the request is metered against
        #[arg(short, long, default_value = "cli")]
        user: String,

        /// Skip context retrieval over prior turns
        #[arg(long)]
        no_rag: bool,
    },

    /// Classify a message without routing it
    Classify {
        #[arg(short, long)]
        message: String,

        #[arg(short, long, default_value = "cli")]
        user: String,
    },

    /// List prompt files, or print one by name
    Prompts {
        name: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Check the configuration for problems
    Validate,
    /// Print a default config file
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Chat {
            message,
            user,
            no_rag,
        } => commands::chat::run(&message, &user, !no_rag).await?,
        Commands::Classify { message, user } => commands::classify::run(&message, &user).await?,
        Commands::Prompts { name } => commands::prompts::run(name.as_deref()).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Init => commands::config_cmd::init().await?,
        },
    }

    Ok(())
}
