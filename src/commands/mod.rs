// ABOUTME: Command implementations behind the CLI subcommands
// ABOUTME: Exports migrate, exec, run_script, backup, and restore commands

pub mod migrate;
pub mod operate;

pub use migrate::migrate;
pub use operate::{backup, exec, restore, run_script};
