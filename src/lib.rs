// ABOUTME: Library module for pg-table-migrator
// ABOUTME: Exports all core functionality for use in binary and tests

pub mod backup;
pub mod commands;
pub mod config;
pub mod convert;
pub mod ddl;
pub mod error;
pub mod interactive;
pub mod logging;
pub mod migration;
pub mod operator;
pub mod postgres;
pub mod utils;

pub use error::{ConfigError, MigratorError, Result};
pub use migration::{MigrationSummary, Migrator, ProgressObserver};
pub use operator::DatabaseOperator;
