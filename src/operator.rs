// ABOUTME: Manual database operations over a single connection
// ABOUTME: Ad-hoc statements, SQL scripts, and backup/restore driven by config files

use crate::backup::{self, BackupReport, RestoreReport};
use crate::config::{self, BackupConfig};
use crate::error::{MigratorError, Result, Side};
use crate::postgres::{Connector, Session};
use std::path::Path;

/// Holds at most one open session; operations other than `connect` require it
pub struct DatabaseOperator<C: Connector> {
    connector: C,
    session: Option<C::Session>,
}

impl<C: Connector> DatabaseOperator<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            session: None,
        }
    }

    /// Open a session, dropping any existing one first
    pub async fn connect(&mut self, connection_string: &str) -> Result<()> {
        self.disconnect();

        let session = self
            .connector
            .connect(connection_string)
            .await
            .map_err(|source| {
                tracing::error!("Error during connection: {:#}", source);
                MigratorError::Connection {
                    side: Side::Source,
                    source,
                }
            })?;

        self.session = Some(session);
        tracing::info!("Connected to database");
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if self.session.take().is_some() {
            tracing::info!("Disconnected from database");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_live())
    }

    fn session(&self) -> Result<&C::Session> {
        self.session.as_ref().ok_or_else(|| {
            tracing::error!("Not connected to database");
            MigratorError::NotConnected
        })
    }

    /// Run one or more SQL statements
    pub async fn exec(&self, sql: &str) -> Result<()> {
        let session = self.session()?;
        session.execute(sql).await.map_err(|source| {
            tracing::error!("Error during query execution: {:#}", source);
            MigratorError::Statement { source }
        })
    }

    /// Read a SQL script from disk
    ///
    /// A file that is empty or only whitespace is rejected.
    pub async fn load_script(&self, path: impl AsRef<Path>) -> Result<String> {
        self.session()?;
        let path = path.as_ref();

        let script = tokio::fs::read_to_string(path).await.map_err(|e| {
            tracing::error!("Failed to open file: {}", path.display());
            MigratorError::io(format!("Failed to open file {}", path.display()), e)
        })?;

        if script.trim().is_empty() {
            return Err(MigratorError::Script(format!(
                "script file {} is empty",
                path.display()
            )));
        }

        Ok(script)
    }

    pub async fn load_and_execute(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let script = self.load_script(path).await?;
        tracing::info!("Executing script {}", path.display());
        self.exec(&script).await
    }

    /// Back up the tables named in `config_path`, or every `public` table
    /// when no config is given
    pub async fn backup(&self, config_path: Option<&Path>, output: impl AsRef<Path>) -> Result<BackupReport> {
        let session = self.session()?;
        let tables = load_table_list(config_path)?;
        backup::backup(session, tables.as_deref(), output.as_ref()).await
    }

    /// Restore the tables named in `config_path`; without a config nothing
    /// is restored
    pub async fn restore(&self, config_path: Option<&Path>, input: impl AsRef<Path>) -> Result<RestoreReport> {
        let session = self.session()?;
        let tables = load_table_list(config_path)?;
        backup::restore(session, tables.as_deref(), input.as_ref()).await
    }

    /// Close the session and consume the operator
    pub fn exit(mut self) {
        self.disconnect();
        tracing::info!("Exiting");
    }
}

fn load_table_list(config_path: Option<&Path>) -> Result<Option<Vec<String>>> {
    let Some(path) = config_path else {
        return Ok(None);
    };
    let BackupConfig { tables } = config::load_backup_config(path).map_err(|e| {
        tracing::error!("Invalid backup config: {}", e);
        e
    })?;
    Ok(Some(tables))
}
