// ABOUTME: Typed error taxonomy for configuration, migration, and backup/restore
// ABOUTME: Database collaborator failures are carried as anyhow sources

use std::fmt;
use thiserror::Error;

/// Which side of a migration a connection belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => write!(f, "source"),
            Side::Target => write!(f, "target"),
        }
    }
}

/// Errors raised while reading or validating a configuration document
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required field is absent
    #[error("Missing required field '{field}' in {context}")]
    MissingField { context: String, field: String },

    /// A field is present but has the wrong shape
    #[error("Field '{field}' in {context} must be {expected}")]
    TypeMismatch {
        context: String,
        field: String,
        expected: &'static str,
    },

    /// A table, column, or type name that cannot be placed into SQL safely
    #[error("Invalid {kind} '{value}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON config at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub fn missing(context: impl Into<String>, field: impl Into<String>) -> Self {
        ConfigError::MissingField {
            context: context.into(),
            field: field.into(),
        }
    }

    pub fn mismatch(
        context: impl Into<String>,
        field: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        ConfigError::TypeMismatch {
            context: context.into(),
            field: field.into(),
            expected,
        }
    }
}

/// Errors raised by the migrator, the backup/restore engine, and the operator
#[derive(Error, Debug)]
pub enum MigratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `execute_migration` was called before a configuration was loaded
    #[error("Configuration file isn't set; load a configuration before migrating")]
    NotConfigured,

    /// A manual operation was attempted without an open session
    #[error("Not connected to database")]
    NotConnected,

    #[error("Failed to connect to {side} database: {source}")]
    Connection {
        side: Side,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to create table '{table}': {source}")]
    Ddl {
        table: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Query failed for table '{table}': {source}")]
    Query {
        table: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to insert row {row} into '{table}': {source}")]
    Insert {
        table: String,
        row: usize,
        #[source]
        source: anyhow::Error,
    },

    /// A non-empty cell arrived for a column with no rule in the table config
    #[error("No column rule for column '{column}' of table '{table}'")]
    MissingColumnRule { table: String, column: String },

    #[error("Failed to backup table '{table}': {source}")]
    Backup {
        table: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to restore table '{table}': {source}")]
    Restore {
        table: String,
        #[source]
        source: anyhow::Error,
    },

    /// A statement sent through the manual operator was rejected
    #[error("Statement failed: {source}")]
    Statement {
        #[source]
        source: anyhow::Error,
    },

    #[error("Script execution failed: {0}")]
    Script(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl MigratorError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        MigratorError::Io {
            context: context.into(),
            source,
        }
    }

    /// Format error with its full source chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

pub type Result<T> = std::result::Result<T, MigratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_names_side() {
        let err = MigratorError::Connection {
            side: Side::Target,
            source: anyhow::anyhow!("refused"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to connect to target database: refused"
        );
    }

    #[test]
    fn config_error_converts_transparently() {
        let err: MigratorError = ConfigError::missing("source_database", "host").into();
        assert_eq!(
            err.to_string(),
            "Missing required field 'host' in source_database"
        );
    }

    #[test]
    fn format_detailed_includes_cause_chain() {
        let err = MigratorError::Insert {
            table: "users".to_string(),
            row: 3,
            source: anyhow::anyhow!("duplicate key"),
        };
        let detailed = err.format_detailed();
        assert!(detailed.contains("row 3"));
        assert!(detailed.contains("Caused by:"));
        assert!(detailed.contains("duplicate key"));
    }
}
