// ABOUTME: CLI entry point for pg-table-migrator
// ABOUTME: Parses commands and routes to appropriate handlers

use clap::{Parser, Subcommand};
use pg_table_migrator::logging::{self, LogOptions};
use pg_table_migrator::{commands, interactive};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pg-table-migrator")]
#[command(about = "Config-driven PostgreSQL table migration with binary backup and restore", long_about = None)]
struct Cli {
    /// JSON-lines log file (appended)
    #[arg(long, global = true, default_value = logging::DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy tables from source to target as described by a JSON config
    Migrate {
        #[arg(long)]
        config: PathBuf,
    },
    /// Execute SQL statements against a database
    Exec {
        #[arg(long)]
        url: String,
        #[arg(long)]
        query: String,
    },
    /// Execute a SQL script file against a database
    RunScript {
        #[arg(long)]
        url: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Write tables to a file with binary COPY
    Backup {
        #[arg(long)]
        url: String,
        /// Backup config listing tables; all public tables when omitted
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Load tables from a binary COPY file
    Restore {
        #[arg(long)]
        url: String,
        /// Backup config listing tables; nothing is restored when omitted
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        input: PathBuf,
    },
    /// Interactive SQL shell
    Shell {
        #[arg(long)]
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init_logging(LogOptions {
        file: Some(cli.log_file),
        callback: None,
    })?;

    match cli.command {
        Commands::Migrate { config } => commands::migrate(&config).await,
        Commands::Exec { url, query } => commands::exec(&url, &query).await,
        Commands::RunScript { url, file } => commands::run_script(&url, &file).await,
        Commands::Backup {
            url,
            config,
            output,
        } => commands::backup(&url, config.as_deref(), &output).await,
        Commands::Restore { url, config, input } => {
            commands::restore(&url, config.as_deref(), &input).await
        }
        Commands::Shell { url } => interactive::run_shell(&url).await,
    }
}
