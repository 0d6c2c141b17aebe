// SPDX-License-Identifier: MIT
// Copyright (c) 2026 taskyard contributors

//! taskyard - a local process supervisor CLI

mod color;
mod commands;
mod help;
mod output;
mod table;

use output::OutputFormat;

use anyhow::Result;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{queue, start};

#[derive(Parser)]
#[command(
    name = "taskyard",
    version,
    disable_version_flag = true,
    about = "taskyard - a local process supervisor"
)]
struct Cli {
    /// Output format
    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value_t,
        global = true
    )]
    output: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Admit a task and print its task info record
    Start(start::StartArgs),
    /// Inspect and administer the scheduler's priority queue
    Queue(queue::QueueArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", format_error(&e));
        std::process::exit(1);
    }
}

/// Format an anyhow error, deduplicating the chain.
///
/// If the top-level Display already contains the source error text, skip
/// the "Caused by" chain to avoid noisy duplicate output (common when
/// thiserror variants use `#[error("... {0}")]` with `#[from]`).
fn format_error(err: &anyhow::Error) -> String {
    let top = err.to_string();

    let chain_redundant = err
        .chain()
        .skip(1)
        .all(|cause| top.contains(&cause.to_string()));

    if chain_redundant {
        return top;
    }

    let mut buf = top;
    for (i, cause) in err.chain().skip(1).enumerate() {
        buf.push_str(&format!("\n\nCaused by:\n    {}: {}", i, cause));
    }
    buf
}

fn cli_command() -> clap::Command {
    Cli::command()
        .help_template(help::template())
        .before_help(help::commands())
        .after_help(help::after_help())
        .styles(help::styles())
        .arg(
            clap::Arg::new("version")
                .short('v')
                .short_alias('V')
                .long("version")
                .action(clap::ArgAction::Version)
                .help("Print version"),
        )
}

async fn run() -> Result<()> {
    let matches = match cli_command().try_get_matches() {
        Ok(m) => m,
        Err(e) => {
            if e.kind() == clap::error::ErrorKind::DisplayHelp {
                let args: Vec<String> = std::env::args().collect();
                print_formatted_help(&args);
                return Ok(());
            }
            e.exit();
        }
    };
    let cli = Cli::from_arg_matches(&matches)?;
    let format = cli.output;

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            help::print_help(cli_command());
            return Ok(());
        }
    };

    match command {
        Commands::Start(args) => start::handle(args, format).await?,
        Commands::Queue(args) => queue::handle(args, format).await?,
    }

    Ok(())
}

/// Print help with post-hoc colorization, resolving the correct subcommand from args.
fn print_formatted_help(args: &[String]) {
    let cmd = cli_command();

    let non_flags: Vec<&String> = args
        .iter()
        .skip(1)
        .filter(|arg| !arg.starts_with('-'))
        .collect();

    let subcommand_names: Vec<&str> = if non_flags.first().map(|s| s.as_str()) == Some("help") {
        non_flags.iter().skip(1).map(|s| s.as_str()).collect()
    } else {
        non_flags.iter().map(|s| s.as_str()).collect()
    };

    let target_cmd = find_subcommand(cmd, &subcommand_names);
    help::print_help(target_cmd);
}

/// Recursively find a nested subcommand by name path.
pub(crate) fn find_subcommand(mut cmd: clap::Command, names: &[&str]) -> clap::Command {
    for name in names {
        let mut found_sub = None;
        for sub in cmd.get_subcommands() {
            if sub.get_name() == *name || sub.get_all_aliases().any(|a| a == *name) {
                found_sub = Some(sub.get_name().to_string());
                break;
            }
        }
        if let Some(sub_name) = found_sub {
            if let Some(sub) = cmd.find_subcommand_mut(&sub_name) {
                cmd = sub.clone();
            } else {
                break;
            }
        } else {
            break;
        }
    }
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_command_builds_without_panicking() {
        let cmd = cli_command();
        assert_eq!(cmd.get_name(), "taskyard");
    }

    #[test]
    fn find_subcommand_resolves_queue_priority() {
        let cmd = cli_command();
        let found = find_subcommand(cmd, &["queue"]);
        assert_eq!(found.get_name(), "queue");
    }

    #[test]
    fn format_error_skips_redundant_chain() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(format_error(&err), "boom");
    }
}
