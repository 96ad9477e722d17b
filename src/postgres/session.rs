// ABOUTME: tokio-postgres backed Session and Connector implementations
// ABOUTME: Text-mode reads, bound-parameter inserts, and binary COPY streams

use super::{connection, Connector, CopyInSink, CopyOutStream, ResultSet, Session};
use crate::utils::quote_ident;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, SimpleQueryMessage, Statement};

/// Connects to PostgreSQL through [`connection::connect`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

#[async_trait]
impl Connector for PgConnector {
    type Session = PgSession;

    async fn connect(&self, connection_string: &str) -> Result<PgSession> {
        let client = connection::connect(connection_string).await?;
        Ok(PgSession::new(client))
    }
}

/// A live tokio-postgres client; the connection closes when this is dropped
pub struct PgSession {
    client: Client,
    inserts: Mutex<HashMap<(String, usize), Statement>>,
}

impl PgSession {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            inserts: Mutex::new(HashMap::new()),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn cached_insert(&self, table: &str, arity: usize) -> Option<Statement> {
        self.inserts
            .lock()
            .ok()
            .and_then(|cache| cache.get(&(table.to_string(), arity)).cloned())
    }

    /// Prepare `INSERT INTO <table> VALUES (...)` taking text parameters
    ///
    /// A probe statement lets the server infer each target column's type;
    /// the real statement casts every `$n::text` parameter to that type, so
    /// values keep the text-literal semantics of `'...'` without being
    /// spliced into the SQL.
    async fn prepare_insert(&self, table: &str, arity: usize) -> Result<Statement> {
        if let Some(statement) = self.cached_insert(table, arity) {
            return Ok(statement);
        }

        let statement = if arity == 0 {
            self.client
                .prepare(&format!("INSERT INTO {} DEFAULT VALUES", table))
                .await?
        } else {
            let placeholders: Vec<String> = (1..=arity).map(|i| format!("${}", i)).collect();
            let probe = self
                .client
                .prepare(&format!(
                    "INSERT INTO {} VALUES ({})",
                    table,
                    placeholders.join(", ")
                ))
                .await?;

            let casts: Vec<String> = probe
                .params()
                .iter()
                .enumerate()
                .map(|(i, ty)| {
                    format!(
                        "${}::text::{}.{}",
                        i + 1,
                        quote_ident(ty.schema()),
                        quote_ident(ty.name())
                    )
                })
                .collect();

            self.client
                .prepare(&format!(
                    "INSERT INTO {} VALUES ({})",
                    table,
                    casts.join(", ")
                ))
                .await?
        };

        if let Ok(mut cache) = self.inserts.lock() {
            cache.insert((table.to_string(), arity), statement.clone());
        }

        Ok(statement)
    }
}

#[async_trait]
impl Session for PgSession {
    fn is_live(&self) -> bool {
        !self.client.is_closed()
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        self.client.batch_execute(sql).await?;
        Ok(())
    }

    async fn select_all(&self, table: &str) -> Result<ResultSet> {
        let messages = self
            .client
            .simple_query(&format!("SELECT * FROM {}", table))
            .await?;

        let mut result = ResultSet::default();
        for message in messages {
            match message {
                SimpleQueryMessage::RowDescription(columns) => {
                    result.columns = columns.iter().map(|c| c.name().to_string()).collect();
                }
                SimpleQueryMessage::Row(row) => {
                    if result.columns.is_empty() {
                        result.columns =
                            row.columns().iter().map(|c| c.name().to_string()).collect();
                    }
                    let values = (0..row.len())
                        .map(|i| row.get(i).map(str::to_string))
                        .collect();
                    result.rows.push(values);
                }
                _ => {}
            }
        }

        Ok(result)
    }

    async fn count_rows(&self, table: &str) -> Result<i64> {
        let row = self
            .client
            .query_one(&format!("SELECT COUNT(*) FROM {}", table), &[])
            .await?;
        row.try_get::<_, i64>(0)
            .with_context(|| format!("Unexpected COUNT(*) result for '{}'", table))
    }

    async fn insert_row(&self, table: &str, values: &[Option<String>]) -> Result<()> {
        let statement = self.prepare_insert(table, values.len()).await?;
        let params: Vec<&(dyn ToSql + Sync)> =
            values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        self.client.execute(&statement, &params).await?;
        Ok(())
    }

    async fn list_public_tables(&self) -> Result<Vec<String>> {
        let rows = self
            .client
            .query(
                "SELECT tablename FROM pg_catalog.pg_tables
                 WHERE schemaname = 'public'
                 ORDER BY tablename",
                &[],
            )
            .await
            .context("Failed to list tables in schema 'public'")?;

        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn copy_out(&self, table: &str) -> Result<CopyOutStream> {
        let stream = self
            .client
            .copy_out(&format!("COPY {} TO STDOUT BINARY", table))
            .await?;
        Ok(Box::pin(stream.map_err(anyhow::Error::from)))
    }

    async fn copy_in(&self, table: &str) -> Result<CopyInSink> {
        let sink = self
            .client
            .copy_in::<_, Bytes>(&format!("COPY {} FROM STDIN BINARY", table))
            .await?;
        Ok(Box::pin(sink.sink_map_err(anyhow::Error::from)))
    }
}
