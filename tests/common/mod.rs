// ABOUTME: In-memory Connector/Session fake shared by integration tests
// ABOUTME: Databases are keyed by the dbname found in the connection string

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use pg_table_migrator::config::{Endpoint, MigrationConfig, TableRule};
use pg_table_migrator::postgres::{Connector, CopyInSink, CopyOutStream, ResultSet, Session};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct FakeDatabase {
    /// Readable tables
    pub tables: BTreeMap<String, ResultSet>,
    /// Rows received through `insert_row`, per table
    pub inserted: HashMap<String, Vec<Vec<Option<String>>>>,
    /// Statements received through `execute`
    pub statements: Vec<String>,
    /// Chunks produced by `copy_out`, per table
    pub copy_chunks: HashMap<String, Vec<Vec<u8>>>,
    /// Bytes received through `copy_in`, per table
    pub copied_in: HashMap<String, Vec<u8>>,
    /// Number of chunks each `copy_in` received
    pub copy_in_chunks: HashMap<String, usize>,
    pub fail_execute: bool,
    pub fail_copy_out: HashSet<String>,
    /// (table, row index) whose insert is rejected
    pub reject_insert: Option<(String, usize)>,
}

#[derive(Default)]
pub struct FakeState {
    pub databases: HashMap<String, FakeDatabase>,
    /// dbnames in connection order
    pub connections: Vec<String>,
    /// (dbname, table) for each `count_rows`
    pub counts: Vec<(String, String)>,
    pub refuse: HashSet<String>,
    pub dead: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct FakeConnector {
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_db<R>(&self, dbname: &str, f: impl FnOnce(&mut FakeDatabase) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(state.databases.entry(dbname.to_string()).or_default())
    }

    pub fn add_table(&self, dbname: &str, table: &str, columns: &[&str], rows: Vec<Vec<Option<&str>>>) {
        let result = ResultSet {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(|v| v.map(str::to_string)).collect())
                .collect(),
        };
        self.with_db(dbname, |db| {
            db.tables.insert(table.to_string(), result);
        });
    }

    pub fn connections(&self) -> Vec<String> {
        self.state.lock().unwrap().connections.clone()
    }

    pub fn counts(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().counts.clone()
    }

    pub fn inserted(&self, dbname: &str, table: &str) -> Vec<Vec<Option<String>>> {
        self.with_db(dbname, |db| db.inserted.get(table).cloned().unwrap_or_default())
    }

    pub fn statements(&self, dbname: &str) -> Vec<String> {
        self.with_db(dbname, |db| db.statements.clone())
    }
}

fn dbname_of(connection_string: &str) -> String {
    connection_string
        .split_whitespace()
        .find_map(|pair| pair.strip_prefix("dbname="))
        .unwrap_or(connection_string)
        .to_string()
}

#[async_trait]
impl Connector for FakeConnector {
    type Session = FakeSession;

    async fn connect(&self, connection_string: &str) -> Result<FakeSession> {
        let dbname = dbname_of(connection_string);
        let mut state = self.state.lock().unwrap();
        state.connections.push(dbname.clone());
        if state.refuse.contains(&dbname) {
            return Err(anyhow!("connection to {} refused", dbname));
        }
        state.databases.entry(dbname.clone()).or_default();
        let live = !state.dead.contains(&dbname);
        Ok(FakeSession {
            dbname,
            state: Arc::clone(&self.state),
            live,
        })
    }
}

pub struct FakeSession {
    dbname: String,
    state: Arc<Mutex<FakeState>>,
    live: bool,
}

impl FakeSession {
    fn with_db<R>(&self, f: impl FnOnce(&mut FakeDatabase) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(state.databases.entry(self.dbname.clone()).or_default())
    }
}

#[async_trait]
impl Session for FakeSession {
    fn is_live(&self) -> bool {
        self.live
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        self.with_db(|db| {
            if db.fail_execute {
                return Err(anyhow!("syntax error at or near \"{}\"", sql));
            }
            db.statements.push(sql.to_string());
            Ok(())
        })
    }

    async fn select_all(&self, table: &str) -> Result<ResultSet> {
        self.with_db(|db| {
            db.tables
                .get(table)
                .cloned()
                .ok_or_else(|| anyhow!("relation \"{}\" does not exist", table))
        })
    }

    async fn count_rows(&self, table: &str) -> Result<i64> {
        let mut state = self.state.lock().unwrap();
        state.counts.push((self.dbname.clone(), table.to_string()));
        let db = state.databases.entry(self.dbname.clone()).or_default();
        db.tables
            .get(table)
            .map(|t| t.rows.len() as i64)
            .ok_or_else(|| anyhow!("relation \"{}\" does not exist", table))
    }

    async fn insert_row(&self, table: &str, values: &[Option<String>]) -> Result<()> {
        self.with_db(|db| {
            let rows = db.inserted.entry(table.to_string()).or_default();
            if db.reject_insert.as_ref() == Some(&(table.to_string(), rows.len())) {
                return Err(anyhow!("invalid input syntax"));
            }
            rows.push(values.to_vec());
            Ok(())
        })
    }

    async fn list_public_tables(&self) -> Result<Vec<String>> {
        self.with_db(|db| {
            let mut names: Vec<String> = db
                .tables
                .keys()
                .chain(db.copy_chunks.keys())
                .cloned()
                .collect();
            names.sort();
            names.dedup();
            Ok(names)
        })
    }

    async fn copy_out(&self, table: &str) -> Result<CopyOutStream> {
        let chunks = self.with_db(|db| {
            if db.fail_copy_out.contains(table) {
                return Err(anyhow!("permission denied for table {}", table));
            }
            db.copy_chunks
                .get(table)
                .cloned()
                .ok_or_else(|| anyhow!("relation \"{}\" does not exist", table))
        })?;
        let items: Vec<Result<Bytes>> = chunks.into_iter().map(|c| Ok(Bytes::from(c))).collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }

    async fn copy_in(&self, table: &str) -> Result<CopyInSink> {
        let state = Arc::clone(&self.state);
        let dbname = self.dbname.clone();
        let table = table.to_string();
        self.with_db(|db| {
            db.copied_in.entry(table.clone()).or_default();
            db.copy_in_chunks.entry(table.clone()).or_default();
        });

        let sink = futures::sink::unfold((), move |(), chunk: Bytes| {
            let state = Arc::clone(&state);
            let dbname = dbname.clone();
            let table = table.clone();
            async move {
                let mut state = state.lock().unwrap();
                let db = state.databases.entry(dbname).or_default();
                db.copied_in
                    .entry(table.clone())
                    .or_default()
                    .extend_from_slice(&chunk);
                *db.copy_in_chunks.entry(table).or_default() += 1;
                Ok::<_, anyhow::Error>(())
            }
        });
        Ok(Box::pin(sink))
    }
}

pub fn endpoint(dbname: &str) -> Endpoint {
    Endpoint {
        host: "localhost".into(),
        port: 5432,
        dbname: dbname.into(),
        user: "migrator".into(),
        password: "secret".into(),
    }
}

pub fn config(tables: Vec<TableRule>) -> MigrationConfig {
    MigrationConfig {
        source_database: endpoint("source"),
        target_database: endpoint("target"),
        tables,
    }
}
