//! docent CLI - the main entry point.
//!
//! Commands:
//! - `init`   - Write a default config file
//! - `serve`  - Start the HTTP gateway
//! - `ask`    - Upload files and ask one question from the terminal

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "docent",
    about = "docent - question answering over uploaded documents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write ~/.docent/config.toml with defaults
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind address
        #[arg(long)]
        host: Option<String>,
    },

    /// Ask a question about one or more local files
    Ask {
        /// The question
        message: String,

        /// Upload this file before asking (repeatable)
        #[arg(short, long = "file")]
        files: Vec<std::path::PathBuf>,

        /// Force a specific agent (execution, structured_query, retrieval, insight, writer)
        #[arg(short, long)]
        agent: Option<String>,

        /// Print reasoning and tool events as they happen
        #[arg(long)]
        trace: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Init { force } => commands::init::run(force).await?,
        Commands::Serve { port, host } => commands::serve::run(port, host).await?,
        Commands::Ask { message, files, agent, trace } => {
            commands::ask::run(message, files, agent, trace).await?
        }
    }

    Ok(())
}
