// ABOUTME: One-shot manual commands against a single database
// ABOUTME: Each command connects, runs one operation, and disconnects

use crate::operator::DatabaseOperator;
use crate::postgres::PgConnector;
use crate::utils;
use anyhow::{Context, Result};
use std::path::Path;

async fn open(url: &str) -> Result<DatabaseOperator<PgConnector>> {
    utils::validate_connection_string(url)?;
    let mut operator = DatabaseOperator::new(PgConnector);
    operator
        .connect(url)
        .await
        .context("Failed to connect to database")?;
    Ok(operator)
}

pub async fn exec(url: &str, query: &str) -> Result<()> {
    let operator = open(url).await?;
    operator.exec(query).await?;
    tracing::info!("✓ Statement executed");
    operator.exit();
    Ok(())
}

pub async fn run_script(url: &str, file: &Path) -> Result<()> {
    let operator = open(url).await?;
    operator.load_and_execute(file).await?;
    tracing::info!("✓ Script {} executed", file.display());
    operator.exit();
    Ok(())
}

pub async fn backup(url: &str, config: Option<&Path>, output: &Path) -> Result<()> {
    let operator = open(url).await?;
    let report = operator.backup(config, output).await?;
    tracing::info!(
        "✓ Backed up {} table(s) to {} ({} bytes)",
        report.tables.len(),
        report.path.display(),
        report.bytes_written
    );
    operator.exit();
    Ok(())
}

pub async fn restore(url: &str, config: Option<&Path>, input: &Path) -> Result<()> {
    let operator = open(url).await?;
    let report = operator.restore(config, input).await?;
    tracing::info!(
        "✓ Restored {} table(s) from {} ({} bytes)",
        report.tables.len(),
        report.path.display(),
        report.bytes_read
    );
    operator.exit();
    Ok(())
}
