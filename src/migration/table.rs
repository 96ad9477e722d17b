// ABOUTME: Copies one table from source to target with per-column conversion
// ABOUTME: Optionally creates the target table, then inserts row by row

use crate::config::TableRule;
use crate::convert::convert_value;
use crate::ddl::generate_ddl;
use crate::error::{MigratorError, Result, Side};
use crate::postgres::Session;

/// Outcome of one table copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
    pub source: String,
    pub target: String,
    pub rows_copied: usize,
    pub created: bool,
}

/// Migrate a single table between two open sessions
///
/// Steps, in order:
/// 1. Both sessions must be live
/// 2. When `create_if_missing` is set, the generated DDL runs on the target
/// 3. `SELECT * FROM <source>` is read fully into memory
/// 4. Each non-empty cell is converted with its column's declared type;
///    empty and NULL cells become NULL
/// 5. One INSERT per row into the target table
///
/// No transaction wraps the table: rows inserted before a failure stay
/// committed. Every source column supplies a value, including columns left
/// out of the generated DDL.
///
/// # Errors
///
/// - `Connection` naming the side whose session is not live
/// - `Ddl` when the CREATE TABLE statement is rejected
/// - `Query` when the source SELECT fails
/// - `MissingColumnRule` when a non-empty cell has no column rule
/// - `Insert` with the zero-based row index when an INSERT is rejected
pub async fn migrate_table<S, T>(rule: &TableRule, source: &S, target: &T) -> Result<TableReport>
where
    S: Session + ?Sized,
    T: Session + ?Sized,
{
    match copy_table(rule, source, target).await {
        Ok(report) => {
            tracing::info!(
                "Copied {} row(s) from '{}' to '{}'",
                report.rows_copied,
                report.source,
                report.target
            );
            Ok(report)
        }
        Err(e) => {
            tracing::error!("Error migrating table {}: {}", rule.source, e);
            Err(e)
        }
    }
}

async fn copy_table<S, T>(rule: &TableRule, source: &S, target: &T) -> Result<TableReport>
where
    S: Session + ?Sized,
    T: Session + ?Sized,
{
    if !source.is_live() {
        return Err(MigratorError::Connection {
            side: Side::Source,
            source: anyhow::anyhow!("source connection is not open"),
        });
    }
    if !target.is_live() {
        return Err(MigratorError::Connection {
            side: Side::Target,
            source: anyhow::anyhow!("target connection is not open"),
        });
    }

    let target_table = rule.target_table();

    if rule.create_if_missing {
        tracing::info!("Creating table: {}", target_table);
        let ddl = generate_ddl(rule);
        tracing::debug!("{}", ddl);
        target
            .execute(&ddl)
            .await
            .map_err(|source| MigratorError::Ddl {
                table: target_table.to_string(),
                source,
            })?;
    }

    let result = source
        .select_all(&rule.source)
        .await
        .map_err(|e| MigratorError::Query {
            table: rule.source.clone(),
            source: e,
        })?;

    tracing::debug!(
        "Read {} row(s) with {} column(s) from '{}'",
        result.rows.len(),
        result.columns.len(),
        rule.source
    );

    for (index, row) in result.rows.iter().enumerate() {
        let values = convert_row(rule, &result.columns, row)?;
        target
            .insert_row(target_table, &values)
            .await
            .map_err(|source| MigratorError::Insert {
                table: target_table.to_string(),
                row: index,
                source,
            })?;
    }

    Ok(TableReport {
        source: rule.source.clone(),
        target: target_table.to_string(),
        rows_copied: result.rows.len(),
        created: rule.create_if_missing,
    })
}

/// Convert one source row into positional insert values
///
/// Columns are taken in result order. A present, non-empty cell is converted
/// with the rule found under the result's column name; absent or empty cells
/// become `None` (NULL).
pub fn convert_row(
    rule: &TableRule,
    columns: &[String],
    row: &[Option<String>],
) -> Result<Vec<Option<String>>> {
    columns
        .iter()
        .zip(row)
        .map(|(column, cell)| match cell.as_deref() {
            Some(value) if !value.is_empty() => {
                let column_rule =
                    rule.column(column)
                        .ok_or_else(|| MigratorError::MissingColumnRule {
                            table: rule.source.clone(),
                            column: column.clone(),
                        })?;
                Ok(Some(convert_value(value, column_rule.declared_type())))
            }
            _ => Ok(None),
        })
        .collect()
}
