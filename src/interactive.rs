// ABOUTME: Interactive SQL shell over a single database connection
// ABOUTME: Reads lines with dialoguer and dispatches SQL or backslash commands

use crate::operator::DatabaseOperator;
use crate::postgres::PgConnector;
use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, Input};
use std::path::PathBuf;

/// One line of shell input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Sql(String),
    Script(PathBuf),
    Backup {
        output: PathBuf,
        config: Option<PathBuf>,
    },
    Restore {
        input: PathBuf,
        config: Option<PathBuf>,
    },
    Quit,
    Empty,
}

/// Parse a shell line
///
/// Lines starting with `\` are commands: `\i <file>`, `\backup <out> [config]`,
/// `\restore <in> [config]` and `\q`. Anything else is sent as SQL.
pub fn parse_line(line: &str) -> Result<ShellCommand> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ShellCommand::Empty);
    }
    if !line.starts_with('\\') {
        return Ok(ShellCommand::Sql(line.to_string()));
    }

    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    match (command, args.as_slice()) {
        ("\\q", []) => Ok(ShellCommand::Quit),
        ("\\i", [file]) => Ok(ShellCommand::Script(PathBuf::from(file))),
        ("\\backup", [output]) => Ok(ShellCommand::Backup {
            output: PathBuf::from(output),
            config: None,
        }),
        ("\\backup", [output, config]) => Ok(ShellCommand::Backup {
            output: PathBuf::from(output),
            config: Some(PathBuf::from(config)),
        }),
        ("\\restore", [input]) => Ok(ShellCommand::Restore {
            input: PathBuf::from(input),
            config: None,
        }),
        ("\\restore", [input, config]) => Ok(ShellCommand::Restore {
            input: PathBuf::from(input),
            config: Some(PathBuf::from(config)),
        }),
        ("\\q", _) | ("\\i", _) | ("\\backup", _) | ("\\restore", _) => {
            anyhow::bail!("Wrong number of arguments for {}", command)
        }
        _ => anyhow::bail!(
            "Unknown command {}. Available: \\i <file>, \\backup <out> [config], \\restore <in> [config], \\q",
            command
        ),
    }
}

/// Run the shell until `\q`
///
/// Failed commands are reported and the shell keeps going.
pub async fn run_shell(url: &str) -> Result<()> {
    let mut operator = DatabaseOperator::new(PgConnector);
    operator
        .connect(url)
        .await
        .context("Failed to connect to database")?;

    println!("Connected. Enter SQL, or \\q to quit.");

    loop {
        let line: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("sql")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read input")?;

        let command = match parse_line(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        let outcome = match command {
            ShellCommand::Empty => Ok(()),
            ShellCommand::Quit => break,
            ShellCommand::Sql(sql) => operator.exec(&sql).await.map(|_| println!("OK")),
            ShellCommand::Script(file) => operator
                .load_and_execute(&file)
                .await
                .map(|_| println!("Executed {}", file.display())),
            ShellCommand::Backup { output, config } => operator
                .backup(config.as_deref(), &output)
                .await
                .map(|report| {
                    println!(
                        "Backed up {} table(s) to {}",
                        report.tables.len(),
                        report.path.display()
                    )
                }),
            ShellCommand::Restore { input, config } => operator
                .restore(config.as_deref(), &input)
                .await
                .map(|report| {
                    println!(
                        "Restored {} table(s) from {}",
                        report.tables.len(),
                        report.path.display()
                    )
                }),
        };

        if let Err(e) = outcome {
            println!("{}", e);
        }
    }

    operator.exit();
    Ok(())
}
