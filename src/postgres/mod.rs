// ABOUTME: Database session seam used by the migrator and backup engine
// ABOUTME: Defines Connector/Session traits and the tokio-postgres implementation

pub mod connection;
pub mod session;

pub use connection::connect;
pub use session::{PgConnector, PgSession};

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Sink, Stream};
use std::pin::Pin;

/// Raw chunks produced by `COPY ... TO STDOUT BINARY`
pub type CopyOutStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Destination for `COPY ... FROM STDIN BINARY`; closing the sink finishes the copy
pub type CopyInSink = Pin<Box<dyn Sink<Bytes, Error = anyhow::Error> + Send>>;

/// A fully materialized text-mode result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    /// `None` is SQL NULL
    pub rows: Vec<Vec<Option<String>>>,
}

/// One open database connection
///
/// Table names passed to these methods are validated by the caller and are
/// placed into SQL unquoted.
#[async_trait]
pub trait Session: Send + Sync {
    /// Whether the underlying connection is still usable
    fn is_live(&self) -> bool;

    /// Run one or more statements through the simple query protocol
    async fn execute(&self, sql: &str) -> Result<()>;

    /// `SELECT * FROM <table>` with every cell in its text representation
    async fn select_all(&self, table: &str) -> Result<ResultSet>;

    /// `SELECT COUNT(*) FROM <table>`
    async fn count_rows(&self, table: &str) -> Result<i64>;

    /// Insert one row positionally; `None` values are bound as NULL
    async fn insert_row(&self, table: &str, values: &[Option<String>]) -> Result<()>;

    /// Base tables in the `public` schema
    async fn list_public_tables(&self) -> Result<Vec<String>>;

    /// Start `COPY <table> TO STDOUT BINARY`
    async fn copy_out(&self, table: &str) -> Result<CopyOutStream>;

    /// Start `COPY <table> FROM STDIN BINARY`
    async fn copy_in(&self, table: &str) -> Result<CopyInSink>;
}

/// Opens sessions from connection strings
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: Session;

    async fn connect(&self, connection_string: &str) -> Result<Self::Session>;
}
