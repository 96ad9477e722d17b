// ABOUTME: Migrate command: runs a JSON-configured table migration
// ABOUTME: Renders the migrator's percent updates as a terminal progress bar

use crate::migration::Migrator;
use crate::postgres::PgConnector;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Run the migration described by `config_path`
///
/// # Examples
///
/// ```no_run
/// # use anyhow::Result;
/// # use pg_table_migrator::commands::migrate;
/// # async fn example() -> Result<()> {
/// migrate("migration.json".as_ref()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn migrate(config_path: &Path) -> Result<()> {
    tracing::info!("Loading configuration from {}", config_path.display());

    let progress = ProgressBar::new(100);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}% {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("##-"),
    );

    let bar = progress.clone();
    let migrator = Migrator::from_config_file(config_path, PgConnector)?.with_progress(
        move |percent: u8| {
            bar.set_position(u64::from(percent));
        },
    );

    match migrator.execute_migration().await {
        Ok(summary) => {
            progress.finish_with_message("Migration complete");
            println!();
            println!("Tables migrated: {}", summary.tables_migrated);
            println!("Tables skipped:  {}", summary.tables_skipped);
            println!("Rows copied:     {}", summary.rows_copied);
            Ok(())
        }
        Err(e) => {
            progress.abandon_with_message("Migration failed");
            Err(e.into())
        }
    }
}
