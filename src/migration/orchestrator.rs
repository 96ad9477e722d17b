// ABOUTME: Runs a configured migration table by table and reports progress
// ABOUTME: Progress is computed from source row counts before and after each table

use super::table::migrate_table;
use crate::config::{self, Endpoint, MigrationConfig, TableRule};
use crate::error::{MigratorError, Result, Side};
use crate::postgres::{Connector, Session};
use std::path::Path;

/// Receives integer percent-complete updates in `0..=100`
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, percent: u8);
}

impl<F> ProgressObserver for F
where
    F: Fn(u8) + Send + Sync,
{
    fn on_progress(&self, percent: u8) {
        self(percent)
    }
}

/// Totals for one completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    pub tables_migrated: usize,
    pub tables_skipped: usize,
    pub rows_copied: usize,
}

/// Config-driven migrator
///
/// The progress observer is owned by the migrator, so independent migrators
/// in one process never see each other's updates.
pub struct Migrator<C: Connector> {
    connector: C,
    config: Option<MigrationConfig>,
    observer: Option<Box<dyn ProgressObserver>>,
}

impl<C: Connector> Migrator<C> {
    /// Create a migrator with no configuration loaded yet
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            config: None,
            observer: None,
        }
    }

    /// Create a migrator from a JSON configuration file
    pub fn from_config_file(path: impl AsRef<Path>, connector: C) -> Result<Self> {
        let mut migrator = Self::new(connector);
        migrator.load_config(path)?;
        Ok(migrator)
    }

    /// Register the observer that receives progress updates
    pub fn with_progress(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn configure(&mut self, config: MigrationConfig) {
        self.config = Some(config);
    }

    pub fn load_config(&mut self, path: impl AsRef<Path>) -> Result<()> {
        match config::load_migration_config(path.as_ref()) {
            Ok(config) => {
                self.config = Some(config);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Error loading configuration: {}", e);
                Err(e.into())
            }
        }
    }

    pub fn config(&self) -> Option<&MigrationConfig> {
        self.config.as_ref()
    }

    /// Run every configured table in declaration order
    ///
    /// With a progress observer, all included tables are counted on the
    /// source before any copy starts, and after each table the observer gets
    /// `floor(copied * 100 / total)`, clamped to 100. When the total is zero
    /// every update is 100.
    ///
    /// The first failing table aborts the run.
    ///
    /// # Errors
    ///
    /// `NotConfigured` when no configuration is loaded, otherwise whatever
    /// the failing table or row count produced.
    pub async fn execute_migration(&self) -> Result<MigrationSummary> {
        tracing::info!("Starting database migration");

        match self.migrate().await {
            Ok(summary) => {
                tracing::info!(
                    "Migration completed successfully: {} table(s) migrated, {} skipped, {} row(s) copied",
                    summary.tables_migrated,
                    summary.tables_skipped,
                    summary.rows_copied
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::error!("Migration failed: {}", e);
                Err(e)
            }
        }
    }

    async fn migrate(&self) -> Result<MigrationSummary> {
        let config = self.config.as_ref().ok_or(MigratorError::NotConfigured)?;

        let mut total_rows: i64 = 0;
        if self.observer.is_some() {
            for table in config.tables.iter().filter(|t| !t.exclude) {
                total_rows += self.count_source_rows(config, table).await?;
            }
            tracing::debug!("Total rows to migrate: {}", total_rows);
        }

        let mut summary = MigrationSummary::default();
        let mut current_rows: i64 = 0;

        for table in &config.tables {
            if table.exclude {
                tracing::info!("Skipping excluded table: {}", table.source);
                summary.tables_skipped += 1;
                continue;
            }

            let report = {
                let source = self.open(&config.source_database, Side::Source).await?;
                let target = self.open(&config.target_database, Side::Target).await?;
                migrate_table(table, &source, &target).await?
            };
            summary.tables_migrated += 1;
            summary.rows_copied += report.rows_copied;

            if let Some(observer) = &self.observer {
                current_rows += self.count_source_rows(config, table).await?;
                let percent = progress_percent(current_rows, total_rows);
                tracing::debug!("Migration progress: {}%", percent);
                observer.on_progress(percent);
            }
        }

        Ok(summary)
    }

    async fn open(&self, endpoint: &Endpoint, side: Side) -> Result<C::Session> {
        self.connector
            .connect(&endpoint.connection_string())
            .await
            .map_err(|source| MigratorError::Connection { side, source })
    }

    /// Count a table's source rows on a connection of its own
    async fn count_source_rows(&self, config: &MigrationConfig, table: &TableRule) -> Result<i64> {
        let session = self.open(&config.source_database, Side::Source).await?;
        session
            .count_rows(&table.source)
            .await
            .map_err(|source| MigratorError::Query {
                table: table.source.clone(),
                source,
            })
    }
}

/// `floor(current * 100 / total)` clamped to `0..=100`; 100 when `total` is 0
pub fn progress_percent(current: i64, total: i64) -> u8 {
    if total <= 0 {
        return 100;
    }
    let percent = current.max(0).saturating_mul(100) / total;
    percent.min(100) as u8
}
