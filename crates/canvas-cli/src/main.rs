//! Business Canvas CLI - serve the canvas API or generate canvases locally.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

mod commands;

use canvas_ops::Config;
use commands::{config as config_cmd, generate, serve};

/// Business Canvas AI - turn business problems into structured canvases.
#[derive(Parser, Debug)]
#[command(
    name = "canvas",
    author,
    version,
    about = "Business Canvas AI: generate and refine business canvases with an LLM",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the REST API server.
    Serve {
        /// Address to bind (overrides config).
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config).
        #[arg(short, long)]
        port: Option<u16>,

        /// Keep canvases in memory instead of the data directory.
        #[arg(long)]
        memory: bool,
    },

    /// Generate a canvas for a problem statement and print it.
    Generate {
        /// The business problem to work on.
        problem: String,

        /// Write the canvas JSON to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Reference documents (plain text) to include.
        #[arg(short, long = "attach")]
        attachments: Vec<PathBuf>,
    },

    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration.
    Show,

    /// Set a configuration value.
    Set {
        /// Configuration key.
        key: String,
        /// Configuration value.
        value: String,
    },

    /// Get a configuration value.
    Get {
        /// Configuration key.
        key: String,
    },

    /// Show path to config file.
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    let level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else if matches!(cli.command, Commands::Serve { .. }) {
        Level::INFO
    } else {
        Level::WARN // Default to less noise
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .init();

    // Load configuration
    let config = Config::load()?;

    match cli.command {
        Commands::Serve { host, port, memory } => {
            serve::execute(config, host, port, memory).await?;
        }

        Commands::Generate {
            problem,
            output,
            attachments,
        } => {
            generate::execute(config, &problem, output.as_deref(), &attachments).await?;
        }

        Commands::Config(config_cmd_inner) => {
            let mut config = config;
            match config_cmd_inner {
                ConfigCommands::Show => {
                    config_cmd::show(&config)?;
                }
                ConfigCommands::Set { key, value } => {
                    config_cmd::set(&mut config, &key, &value)?;
                }
                ConfigCommands::Get { key } => {
                    config_cmd::get(&config, &key)?;
                }
                ConfigCommands::Path => {
                    if let Some(path) = Config::config_file_path() {
                        println!("{}", path.display());
                    } else {
                        println!("(no config file path available)");
                    }
                }
            }
        }
    }

    Ok(())
}
