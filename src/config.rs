// ABOUTME: Parses JSON migration and backup configuration documents
// ABOUTME: Validates endpoints, table rules, and column rules into typed values

use crate::error::ConfigError;
use crate::utils;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::Path;

/// Column type used in generated DDL when a rule declares none
pub const DEFAULT_COLUMN_TYPE: &str = "TEXT";

/// One database connection target
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"********")
            .finish()
    }
}

impl Endpoint {
    /// Render the endpoint as a keyword/value connection string
    ///
    /// Values containing whitespace, quotes, or backslashes are single-quoted
    /// with `\'` and `\\` escapes, as libpq expects.
    ///
    /// # Examples
    ///
    /// ```
    /// # use pg_table_migrator::config::Endpoint;
    /// let endpoint = Endpoint {
    ///     host: "localhost".into(),
    ///     port: 5432,
    ///     dbname: "app".into(),
    ///     user: "me".into(),
    ///     password: "s3cret".into(),
    /// };
    /// assert_eq!(
    ///     endpoint.connection_string(),
    ///     "host=localhost port=5432 dbname=app user=me password=s3cret"
    /// );
    /// ```
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={}",
            quote_conninfo_value(&self.host),
            self.port,
            quote_conninfo_value(&self.dbname),
            quote_conninfo_value(&self.user),
            quote_conninfo_value(&self.password)
        )
    }

    fn from_raw(raw: Option<Checked<RawEndpoint>>, context: &str) -> Result<Self, ConfigError> {
        let raw = required(raw, "configuration", context, "an object")?;

        // Every field must be present before any type is checked
        let presence = [
            ("host", raw.host.is_some()),
            ("port", raw.port.is_some()),
            ("dbname", raw.dbname.is_some()),
            ("user", raw.user.is_some()),
            ("password", raw.password.is_some()),
        ];
        if let Some((field, _)) = presence.iter().find(|(_, present)| !present) {
            return Err(ConfigError::missing(context, *field));
        }

        Ok(Endpoint {
            host: required(raw.host, context, "host", "a string")?,
            port: required(raw.port, context, "port", "an integer between 0 and 65535")?,
            dbname: required(raw.dbname, context, "dbname", "a string")?,
            user: required(raw.user, context, "user", "a string")?,
            password: required(raw.password, context, "password", "a string")?,
        })
    }
}

fn quote_conninfo_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\');
    if !needs_quotes {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

/// Per-column rename/type/exclusion policy, keyed by source column name
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnRule {
    pub source_name: String,
    pub target_name: Option<String>,
    pub column_type: Option<String>,
    /// Kept as text: only the exact value `"true"` excludes the column from DDL
    pub exclude: Option<String>,
}

impl ColumnRule {
    /// Column name used on the target side
    pub fn output_name(&self) -> &str {
        self.target_name.as_deref().unwrap_or(&self.source_name)
    }

    /// Declared type used for value conversion (empty when none was declared)
    pub fn declared_type(&self) -> &str {
        self.column_type.as_deref().unwrap_or("")
    }

    /// Declared type used for generated DDL
    pub fn ddl_type(&self) -> &str {
        self.column_type.as_deref().unwrap_or(DEFAULT_COLUMN_TYPE)
    }

    /// Whether the column is left out of generated DDL.
    ///
    /// This does not affect the data pass: every source column still supplies
    /// a positional value to each INSERT.
    pub fn is_excluded(&self) -> bool {
        self.exclude.as_deref() == Some("true")
    }

    fn from_raw(name: &str, value: Value, table_context: &str) -> Result<Self, ConfigError> {
        let context = format!("column '{}' of {}", name, table_context);
        let raw = Checked::<RawColumn>::from_value(value).check(table_context, name, "an object")?;

        let exclude = optional(raw.exclude, &context, "exclude", "a string or boolean")?.map(
            |flag| match flag {
                ExcludeFlag::Text(text) => text,
                ExcludeFlag::Flag(flag) => flag.to_string(),
            },
        );

        let rule = ColumnRule {
            source_name: name.to_string(),
            target_name: optional(raw.target_name, &context, "target_name", "a string")?,
            column_type: optional(raw.column_type, &context, "type", "a string")?,
            exclude,
        };

        validate_name(
            "column name",
            rule.output_name(),
            utils::validate_postgres_identifier,
        )?;
        if let Some(ref column_type) = rule.column_type {
            validate_name("column type", column_type, utils::validate_type_name)?;
        }

        Ok(rule)
    }
}

/// Per-table migration policy
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableRule {
    pub source: String,
    /// Empty when the target table has the same name as the source
    pub target: String,
    pub exclude: bool,
    pub create_if_missing: bool,
    /// Column rules in document order
    pub columns: Vec<ColumnRule>,
}

impl TableRule {
    /// Name of the table written to on the target side
    pub fn target_table(&self) -> &str {
        if self.target.is_empty() {
            &self.source
        } else {
            &self.target
        }
    }

    /// Look up a column rule by source column name
    pub fn column(&self, source_name: &str) -> Option<&ColumnRule> {
        self.columns.iter().find(|c| c.source_name == source_name)
    }

    fn from_raw(raw: Checked<RawTable>, index: usize) -> Result<Self, ConfigError> {
        let raw = raw.check("tables", &index.to_string(), "an object")?;
        let source = required(raw.source, &format!("tables[{}]", index), "source", "a string")?;
        let context = format!("table '{}'", source);

        let target = optional(raw.target, &context, "target", "a string")?.unwrap_or_default();
        let exclude = optional(raw.exclude, &context, "exclude", "a boolean")?.unwrap_or(false);
        let create_if_missing =
            optional(raw.create_if_missing, &context, "create_if_missing", "a boolean")?
                .unwrap_or(false);

        validate_name("table name", &source, utils::validate_table_reference)?;
        if !target.is_empty() {
            validate_name("table name", &target, utils::validate_table_reference)?;
        }

        let columns = optional(raw.columns, &context, "columns", "an object")?
            .unwrap_or_default()
            .into_iter()
            .map(|(name, rule)| ColumnRule::from_raw(&name, rule, &context))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TableRule {
            source,
            target,
            exclude,
            create_if_missing,
            columns,
        })
    }
}

/// Both endpoints plus the ordered table rules of one migration run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    pub source_database: Endpoint,
    pub target_database: Endpoint,
    pub tables: Vec<TableRule>,
}

/// Build a `MigrationConfig` from a parsed JSON document
///
/// # Errors
///
/// - `MissingField` when an endpoint or one of its five fields is absent, or
///   when a table rule has no `source`
/// - `TypeMismatch` when `tables` is not an array, `columns` is not an
///   object, or a recognized field has the wrong JSON type
/// - `InvalidIdentifier` when a table, column, or type name is unsafe for SQL
pub fn parse(document: &Value) -> Result<MigrationConfig, ConfigError> {
    let raw = RawConfig::deserialize(document)
        .map_err(|_| ConfigError::mismatch("configuration", "<root>", "an object"))?;

    let source_database = Endpoint::from_raw(raw.source_database, "source_database")?;
    let target_database = Endpoint::from_raw(raw.target_database, "target_database")?;

    let tables = optional(raw.tables, "configuration", "tables", "an array")?
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, table)| TableRule::from_raw(table, index))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MigrationConfig {
        source_database,
        target_database,
        tables,
    })
}

/// Parse a migration configuration from JSON text
pub fn parse_str(raw: &str, origin: &str) -> Result<MigrationConfig, ConfigError> {
    let document: Value = serde_json::from_str(raw).map_err(|source| ConfigError::Json {
        path: origin.to_string(),
        source,
    })?;
    parse(&document)
}

/// Read and parse a migration configuration file
pub fn load_migration_config(path: impl AsRef<Path>) -> Result<MigrationConfig, ConfigError> {
    let path = path.as_ref();
    let raw = read_file(path)?;
    let config = parse_str(&raw, &path.display().to_string())?;

    tracing::info!(
        "Configuration loaded from {} ({} table rule(s))",
        path.display(),
        config.tables.len()
    );

    Ok(config)
}

/// Explicit table list for backup and restore
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BackupConfig {
    pub tables: Vec<String>,
}

/// Build a `BackupConfig` from a `{"tables": [...]}` document
pub fn parse_backup_config(document: &Value) -> Result<BackupConfig, ConfigError> {
    let context = "backup configuration";
    let raw = RawBackupConfig::deserialize(document)
        .map_err(|_| ConfigError::mismatch(context, "<root>", "an object"))?;

    let entries = required(raw.tables, context, "tables", "an array")?;
    let mut tables = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let name = entry.check(context, &format!("tables[{}]", index), "a string")?;
        validate_name("table name", &name, utils::validate_table_reference)?;
        tables.push(name);
    }

    Ok(BackupConfig { tables })
}

/// Read and parse a backup/restore configuration file
pub fn load_backup_config(path: impl AsRef<Path>) -> Result<BackupConfig, ConfigError> {
    let path = path.as_ref();
    let raw = read_file(path)?;
    let document: Value = serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
        path: path.display().to_string(),
        source,
    })?;
    parse_backup_config(&document)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn validate_name(
    kind: &'static str,
    value: &str,
    check: fn(&str) -> anyhow::Result<()>,
) -> Result<(), ConfigError> {
    check(value).map_err(|e| ConfigError::InvalidIdentifier {
        kind,
        value: utils::sanitize_identifier(value),
        reason: e.to_string(),
    })
}

// Raw document shapes. Absent or null fields deserialize to `None`; a
// present field of the wrong JSON type becomes `Checked::Invalid` so the
// conversion above can name it in a `TypeMismatch`.

#[derive(Debug, Deserialize)]
struct RawConfig {
    source_database: Option<Checked<RawEndpoint>>,
    target_database: Option<Checked<RawEndpoint>>,
    tables: Option<Checked<Vec<Checked<RawTable>>>>,
}

#[derive(Debug, Deserialize)]
struct RawEndpoint {
    host: Option<Checked<String>>,
    port: Option<Checked<u16>>,
    dbname: Option<Checked<String>>,
    user: Option<Checked<String>>,
    password: Option<Checked<String>>,
}

#[derive(Debug, Deserialize)]
struct RawTable {
    source: Option<Checked<String>>,
    target: Option<Checked<String>>,
    exclude: Option<Checked<bool>>,
    create_if_missing: Option<Checked<bool>>,
    /// Kept as a map so column rules stay in document order
    columns: Option<Checked<Map<String, Value>>>,
}

#[derive(Debug, Deserialize)]
struct RawColumn {
    target_name: Option<Checked<String>>,
    #[serde(rename = "type")]
    column_type: Option<Checked<String>>,
    exclude: Option<Checked<ExcludeFlag>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExcludeFlag {
    Text(String),
    Flag(bool),
}

#[derive(Debug, Deserialize)]
struct RawBackupConfig {
    tables: Option<Checked<Vec<Checked<String>>>>,
}

/// A field value that either matched its expected shape or did not
#[derive(Debug)]
enum Checked<T> {
    Valid(T),
    Invalid,
}

impl<T: DeserializeOwned> Checked<T> {
    fn from_value(value: Value) -> Self {
        match serde_json::from_value(value) {
            Ok(value) => Checked::Valid(value),
            Err(_) => Checked::Invalid,
        }
    }
}

impl<T> Checked<T> {
    fn check(self, context: &str, field: &str, expected: &'static str) -> Result<T, ConfigError> {
        match self {
            Checked::Valid(value) => Ok(value),
            Checked::Invalid => Err(ConfigError::mismatch(context, field, expected)),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Checked<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Checked::from_value)
    }
}

fn required<T>(
    field: Option<Checked<T>>,
    context: &str,
    name: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    field
        .ok_or_else(|| ConfigError::missing(context, name))?
        .check(context, name, expected)
}

fn optional<T>(
    field: Option<Checked<T>>,
    context: &str,
    name: &str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    field
        .map(|value| value.check(context, name, expected))
        .transpose()
}
