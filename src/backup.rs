// ABOUTME: Binary COPY backup and restore of whole tables to/from a single file
// ABOUTME: Byte streams are written and read verbatim without framing

use crate::error::{MigratorError, Result};
use crate::postgres::Session;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

/// Size of each chunk fed to `COPY ... FROM STDIN` during restore
pub const RESTORE_CHUNK_SIZE: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    pub path: PathBuf,
    pub tables: Vec<String>,
    pub bytes_written: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub path: PathBuf,
    pub tables: Vec<String>,
    pub bytes_read: u64,
}

/// Tables to back up: the explicit list when given, otherwise every base
/// table in the `public` schema
pub async fn resolve_backup_tables<S>(session: &S, explicit: Option<&[String]>) -> Result<Vec<String>>
where
    S: Session + ?Sized,
{
    match explicit {
        Some(tables) => Ok(tables.to_vec()),
        None => session
            .list_public_tables()
            .await
            .map_err(|source| MigratorError::Query {
                table: "pg_catalog.pg_tables".to_string(),
                source,
            }),
    }
}

/// Stream `COPY <table> TO STDOUT BINARY` for each table into `output`
///
/// Missing parent directories are created. Tables are written back to back
/// in order. The first table that fails aborts the backup; whatever was
/// written before the failure is flushed and left on disk.
pub async fn backup<S>(session: &S, tables: Option<&[String]>, output: &Path) -> Result<BackupReport>
where
    S: Session + ?Sized,
{
    let tables = resolve_backup_tables(session, tables).await?;
    tracing::info!(
        "Backing up {} table(s) to {}",
        tables.len(),
        output.display()
    );

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            MigratorError::io(
                format!("Failed to create backup directory {}", parent.display()),
                e,
            )
        })?;
    }

    let file = File::create(output).await.map_err(|e| {
        MigratorError::io(
            format!("Failed to open backup file {}", output.display()),
            e,
        )
    })?;
    let mut writer = BufWriter::new(file);
    let mut bytes_written = 0u64;

    for table in &tables {
        tracing::info!("Backing up table: {}", table);
        match export_table(session, table, &mut writer).await {
            Ok(written) => {
                tracing::debug!("Wrote {} byte(s) for '{}'", written, table);
                bytes_written += written;
            }
            Err(source) => {
                if let Err(e) = writer.flush().await {
                    tracing::warn!("Failed to flush partial backup file: {}", e);
                }
                tracing::error!("Failed to backup table {}: {}", table, source);
                return Err(MigratorError::Backup {
                    table: table.clone(),
                    source,
                });
            }
        }
    }

    writer.flush().await.map_err(|e| {
        MigratorError::io(
            format!("Failed to write backup file {}", output.display()),
            e,
        )
    })?;

    tracing::info!("Backup completed: {} byte(s) written", bytes_written);

    Ok(BackupReport {
        path: output.to_path_buf(),
        tables,
        bytes_written,
    })
}

/// Feed `input` into `COPY <table> FROM STDIN BINARY` for each listed table
///
/// Restore never inventories the database; with no table list nothing is
/// read. Each table consumes the file from the current position until the
/// end, in chunks of [`RESTORE_CHUNK_SIZE`].
pub async fn restore<S>(session: &S, tables: Option<&[String]>, input: &Path) -> Result<RestoreReport>
where
    S: Session + ?Sized,
{
    let tables = match tables {
        Some(tables) => tables.to_vec(),
        None => {
            tracing::warn!("No tables configured for restore; nothing to do");
            return Ok(RestoreReport {
                path: input.to_path_buf(),
                tables: Vec::new(),
                bytes_read: 0,
            });
        }
    };

    // An unreadable input fails the first table's restore
    let mut file = File::open(input).await.map_err(|e| {
        let table = tables.first().cloned().unwrap_or_default();
        tracing::error!("Failed to open restore file {}: {}", input.display(), e);
        MigratorError::Restore {
            table,
            source: anyhow::Error::new(e)
                .context(format!("Failed to open restore file {}", input.display())),
        }
    })?;

    let mut buffer = vec![0u8; RESTORE_CHUNK_SIZE];
    let mut bytes_read = 0u64;

    for table in &tables {
        tracing::info!("Restoring table: {}", table);
        let read = import_table(session, table, &mut file, &mut buffer)
            .await
            .map_err(|source| {
                tracing::error!("Failed to restore table {}: {}", table, source);
                MigratorError::Restore {
                    table: table.clone(),
                    source,
                }
            })?;
        tracing::debug!("Sent {} byte(s) into '{}'", read, table);
        bytes_read += read;
    }

    tracing::info!("Restore completed: {} byte(s) read", bytes_read);

    Ok(RestoreReport {
        path: input.to_path_buf(),
        tables,
        bytes_read,
    })
}

async fn export_table<S, W>(session: &S, table: &str, writer: &mut W) -> anyhow::Result<u64>
where
    S: Session + ?Sized,
    W: AsyncWrite + Unpin,
{
    let mut reader = session.copy_out(table).await?;
    let mut written = 0u64;

    while let Some(chunk) = reader.next().await {
        let data = chunk?;
        writer.write_all(&data).await?;
        written += data.len() as u64;
    }

    Ok(written)
}

async fn import_table<S, R>(
    session: &S,
    table: &str,
    reader: &mut R,
    buffer: &mut [u8],
) -> anyhow::Result<u64>
where
    S: Session + ?Sized,
    R: AsyncRead + Unpin,
{
    let mut writer = session.copy_in(table).await?;
    let mut sent = 0u64;

    loop {
        let n = reader.read(buffer).await?;
        if n == 0 {
            break;
        }
        writer.send(Bytes::copy_from_slice(&buffer[..n])).await?;
        sent += n as u64;
    }

    writer.close().await?;
    Ok(sent)
}
