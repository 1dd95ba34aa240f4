mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "feedcheck")]
#[command(version, about = "Metadata-driven data validation CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the validation rules of a metadata workbook against data
    Validate {
        /// Path to the metadata workbook (YAML, TOML or JSON); falls back to METADATA_FILE
        metadata: Option<String>,

        /// Run configuration file (TOML)
        #[arg(short, long)]
        config: Option<String>,

        /// Only run rules of these feeds
        #[arg(long = "feed", value_delimiter = ',')]
        feeds: Vec<String>,

        /// Only run rules of these databases
        #[arg(long = "database", value_delimiter = ',')]
        databases: Vec<String>,

        /// Only run these check kinds (e.g. range,unique)
        #[arg(long = "kind", value_delimiter = ',')]
        kinds: Vec<String>,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Load and normalize a metadata workbook without touching data
    Check {
        /// Path to the metadata workbook (YAML, TOML or JSON); falls back to METADATA_FILE
        metadata: Option<String>,

        /// Run configuration file (TOML)
        #[arg(short, long)]
        config: Option<String>,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Write a sample workbook, data file and run configuration
    Init {
        /// Target directory
        #[arg(default_value = ".")]
        directory: String,

        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .with(EnvFilter::try_from_default_env().ok())
        .init();

    // Execute command
    match cli.command {
        Commands::Validate {
            metadata,
            config,
            feeds,
            databases,
            kinds,
            format,
        } => {
            let args = commands::validate::ValidateArgs {
                metadata,
                config,
                feeds,
                databases,
                kinds,
                format,
            };
            commands::validate::execute(args).await
        }

        Commands::Check {
            metadata,
            config,
            format,
        } => commands::check::execute(metadata.as_deref(), config.as_deref(), &format),

        Commands::Init { directory, force } => commands::init::execute(&directory, force),
    }
}
