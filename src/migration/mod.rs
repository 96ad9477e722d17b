// ABOUTME: Table migration module
// ABOUTME: Per-table copy with value conversion plus the run orchestrator

pub mod orchestrator;
pub mod table;

pub use orchestrator::{progress_percent, MigrationSummary, Migrator, ProgressObserver};
pub use table::{convert_row, migrate_table, TableReport};
