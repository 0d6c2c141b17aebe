// SPDX-License-Identifier: MIT
// Copyright (c) 2026 taskyard contributors

//! `start` — admit a task and print its task info record.

use crate::output::OutputFormat;
use anyhow::Result;
use clap::Args;
use taskyard_core::{SystemClock, TaskConfig, UuidIdGen};
use taskyard_engine::{StartSpec, Supervisor};

#[derive(Args)]
pub struct StartArgs {
    /// Tag the task for later bulk operations (repeatable).
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Directory for the task's log file.
    #[arg(long = "log-dir", value_name = "DIR", default_value = "./logs")]
    pub log_dir: String,

    /// The command to run, and its arguments.
    #[arg(required = true, trailing_var_arg = true)]
    pub cmd: Vec<String>,
}

/// Runs a single task to admission and prints its task info record.
///
/// Each invocation builds a fresh `Supervisor` — this binary has no daemon
/// to hand the task off to, so `start` always admits on the direct path
/// (`immediate`): a task left `queued` here would never be dispatched,
/// since nothing outlives this process to run the scheduler's dispatch
/// loop against it.
pub async fn handle(args: StartArgs, format: OutputFormat) -> Result<()> {
    std::fs::create_dir_all(&args.log_dir)?;

    let supervisor = Supervisor::new(SystemClock, UuidIdGen);

    let mut config = TaskConfig::new(args.cmd, args.log_dir).immediate();
    for tag in args.tags {
        config = config.with_tag(tag);
    }

    let task = supervisor.start_immediate(StartSpec::new(config));

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        OutputFormat::Text => print_task(&task),
    }

    Ok(())
}

fn print_task(task: &taskyard_core::Task) {
    use crate::color;

    println!("{} {}", color::header("id:"), task.id);
    println!("{} {}", color::header("cmd:"), task.cmd.join(" "));
    println!("{} {}", color::header("status:"), color::status(&task.status.to_string()));
    println!("{} {}", color::header("pid:"), task.pid);
    println!("{} {}", color::header("log:"), task.log_path.display());
    if !task.tags.is_empty() {
        let tags: Vec<&str> = task.tags.iter().map(|s| s.as_str()).collect();
        println!("{} {}", color::header("tags:"), tags.join(", "));
    }
    if let Some(err) = &task.start_error {
        println!("{} {}", color::header("error:"), err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: StartArgs,
    }

    #[test]
    fn parses_repeated_tags_and_trailing_command() {
        let w = Wrapper::parse_from([
            "taskyard",
            "--tag",
            "build",
            "--tag",
            "ci",
            "--",
            "echo",
            "hi",
        ]);
        assert_eq!(w.args.tags, vec!["build".to_string(), "ci".to_string()]);
        assert_eq!(w.args.cmd, vec!["echo".to_string(), "hi".to_string()]);
    }

    #[test]
    fn defaults_log_dir_to_logs() {
        let w = Wrapper::parse_from(["taskyard", "--", "true"]);
        assert_eq!(w.args.log_dir, "./logs");
    }
}
