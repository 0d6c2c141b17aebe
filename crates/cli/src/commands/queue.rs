// SPDX-License-Identifier: MIT
// Copyright (c) 2026 taskyard contributors

//! `queue` — inspect and administer the scheduler's priority queue.
//!
//! Every invocation constructs a fresh `Supervisor`, so these subcommands
//! only ever observe state created earlier in the *same* process — there is
//! no daemon for `queue status` to reach across to. That is a deliberate
//! consequence of this crate having no cross-process transport, not a bug:
//! a long-lived embedder (not this CLI) is where `queue` becomes useful.

use anyhow::{bail, Result};
use clap::{Args, Subcommand, ValueEnum};
use taskyard_core::{Priority, SystemClock, TaskId, UuidIdGen};
use taskyard_engine::{ShutdownOptions, Supervisor};

use crate::color;
use crate::output::OutputFormat;
use crate::table::{Column, Table};

#[derive(Args)]
pub struct QueueArgs {
    #[command(subcommand)]
    pub command: QueueCommand,
}

#[derive(Subcommand)]
pub enum QueueCommand {
    /// Show queue statistics (size, throughput, averages).
    #[command(alias = "stats")]
    Status,
    /// Show derived health status.
    Health,
    /// Halt dispatch without killing running tasks.
    Pause,
    /// Re-enable dispatch.
    Resume,
    /// Drop every waiting entry, marking each task start-failed.
    Clear,
    /// List tasks by lifecycle bucket.
    List {
        #[arg(value_enum)]
        which: ListWhich,
    },
    /// Cancel tasks matching a selector: `tag:<t>`, `cmd:<substr>`, or `all`.
    Cancel { selector: String },
    /// Set the concurrency limit (non-negative; 0 admits nothing until raised).
    Concurrency { n: i64 },
    /// Set a sliding-window rate limit: at most `cap` starts per `interval_ms`.
    #[command(name = "rate-limit")]
    RateLimit { interval_ms: u64, cap: usize },
    /// Inspect or change queued-task priorities.
    Priority {
        #[command(subcommand)]
        command: PriorityCommand,
    },
    /// Stop accepting new tasks, wait for running ones, then report.
    Shutdown {
        timeout_ms: Option<u64>,
        /// SIGKILL anything still running once the timeout elapses.
        #[arg(long)]
        force: bool,
        /// Leave queued tasks paused in the queue instead of cancelling them.
        #[arg(long = "no-cancel")]
        no_cancel: bool,
    },
    /// Print the queue subcommand summary.
    Help,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ListWhich {
    Queued,
    Running,
}

#[derive(Subcommand)]
pub enum PriorityCommand {
    /// Summarize queued-task priorities by named bucket.
    Stats,
    /// List queued tasks with their effective priority.
    List,
    /// Reprioritize a still-queued task.
    Set { id: String, priority: String },
}

enum Selector {
    Tag(String),
    Cmd(String),
    All,
}

fn parse_selector(s: &str) -> Result<Selector> {
    if s == "all" {
        return Ok(Selector::All);
    }
    if let Some(rest) = s.strip_prefix("tag:") {
        return Ok(Selector::Tag(rest.to_string()));
    }
    if let Some(rest) = s.strip_prefix("cmd:") {
        return Ok(Selector::Cmd(rest.to_string()));
    }
    bail!("invalid selector {s:?}: expected tag:<t>, cmd:<substr>, or all")
}

pub async fn handle(args: QueueArgs, format: OutputFormat) -> Result<()> {
    // A freshly constructed, empty Supervisor — see module doc.
    let supervisor = Supervisor::new(SystemClock, UuidIdGen);

    match args.command {
        QueueCommand::Status => print_stats(&supervisor, format),
        QueueCommand::Health => print_health(&supervisor, format),
        QueueCommand::Pause => {
            supervisor.pause_queue();
            println!("{}", color::status("queue paused"));
        }
        QueueCommand::Resume => {
            supervisor.resume_queue();
            println!("{}", color::status("queue resumed"));
        }
        QueueCommand::Clear => {
            let dropped = supervisor.clear_queue();
            println!("cleared {} queued task(s)", dropped.len());
        }
        QueueCommand::List { which } => print_list(&supervisor, which, format),
        QueueCommand::Cancel { selector } => {
            let selector = parse_selector(&selector)?;
            let ids = match selector {
                Selector::All => supervisor.cancel_tasks(|_| true),
                Selector::Tag(tag) => supervisor.cancel_tasks(|t| t.has_tag(&tag)),
                Selector::Cmd(sub) => supervisor.cancel_tasks(|t| t.cmd.join(" ").contains(&sub)),
            };
            println!("cancelled {} task(s)", ids.len());
        }
        QueueCommand::Concurrency { n } => {
            supervisor.set_concurrency(n)?;
            println!("concurrency set to {n}");
        }
        QueueCommand::RateLimit { interval_ms, cap } => {
            supervisor.set_rate_limit(Some((interval_ms, cap)))?;
            println!("rate limit set to {cap} start(s) per {interval_ms}ms");
        }
        QueueCommand::Priority { command } => handle_priority(&supervisor, command, format)?,
        QueueCommand::Shutdown {
            timeout_ms,
            force,
            no_cancel,
        } => {
            let report = supervisor
                .shutdown(ShutdownOptions {
                    timeout_ms,
                    force,
                    cancel_pending: !no_cancel,
                })
                .await;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Text => {
                    println!("waited {}ms", report.waited_ms);
                    println!("cancelled {} queued task(s)", report.cancelled.len());
                    println!("force-killed {} running task(s)", report.force_killed.len());
                }
            }
        }
        QueueCommand::Help => print_help(),
    }

    Ok(())
}

fn print_stats(supervisor: &Supervisor, format: OutputFormat) {
    let stats = supervisor.get_queue_stats();
    match format {
        OutputFormat::Json => {
            if let Ok(s) = serde_json::to_string_pretty(&stats) {
                println!("{s}");
            }
        }
        OutputFormat::Text => {
            println!("{} {}", color::header("size:"), stats.size);
            println!("{} {}", color::header("paused:"), stats.paused);
            println!("{} {}", color::header("total added:"), stats.total_added);
            println!("{} {}", color::header("total completed:"), stats.total_completed);
            println!("{} {}", color::header("total failed:"), stats.total_failed);
            println!("{} {}", color::header("total cancelled:"), stats.total_cancelled);
            println!(
                "{} {:.1}ms",
                color::header("avg wait:"),
                stats.avg_wait_time_ms
            );
            println!(
                "{} {:.1}ms",
                color::header("avg run:"),
                stats.avg_run_time_ms
            );
            println!(
                "{} {:.2}/s",
                color::header("throughput:"),
                stats.throughput_per_sec
            );
            println!(
                "{} {:.1}%",
                color::header("utilization:"),
                stats.utilization_pct
            );
        }
    }
}

fn print_health(supervisor: &Supervisor, format: OutputFormat) {
    let health = supervisor.get_health();
    match format {
        OutputFormat::Json => {
            if let Ok(s) = serde_json::to_string_pretty(&health) {
                println!("{s}");
            }
        }
        OutputFormat::Text => {
            println!("{} {}", color::header("status:"), color::status(&health.status.to_string()));
            println!("{} {:.1}%", color::header("utilization:"), health.utilization_pct);
            println!("{} {:.1}ms", color::header("avg wait:"), health.avg_wait_time_ms);
            println!("{} {}", color::header("rss:"), health.rss_bytes);
            println!("{} {:.2}", color::header("failure ratio:"), health.failure_ratio);
            println!("{} {}", color::header("queue backlog:"), health.queue_backlog);
            for reason in &health.reasons {
                println!("  - {}", color::muted(reason));
            }
        }
    }
}

fn print_list(supervisor: &Supervisor, which: ListWhich, format: OutputFormat) {
    let tasks = match which {
        ListWhich::Queued => supervisor.queued_tasks(),
        ListWhich::Running => supervisor.list_running(),
    };

    match format {
        OutputFormat::Json => {
            if let Ok(s) = serde_json::to_string_pretty(&tasks) {
                println!("{s}");
            }
        }
        OutputFormat::Text => {
            let mut table = Table::new(vec![
                Column::left("ID"),
                Column::status("STATUS"),
                Column::right("PID"),
                Column::left("CMD").with_max(60),
            ]);
            for task in &tasks {
                table.row(vec![
                    task.id.short(12).to_string(),
                    task.status.to_string(),
                    task.pid.to_string(),
                    task.cmd.join(" "),
                ]);
            }
            if tasks.is_empty() {
                println!("(no tasks)");
            } else {
                table.render(&mut std::io::stdout());
            }
        }
    }
}

fn handle_priority(
    supervisor: &Supervisor,
    command: PriorityCommand,
    format: OutputFormat,
) -> Result<()> {
    match command {
        PriorityCommand::Stats => {
            let queued = supervisor.queued_tasks();
            let mut buckets = [0usize; 5];
            for task in &queued {
                let p = task
                    .queue
                    .as_ref()
                    .map(|q| q.priority)
                    .unwrap_or(Priority::NORMAL);
                match Priority::from(p) {
                    Priority::Critical => buckets[0] += 1,
                    Priority::High => buckets[1] += 1,
                    Priority::Normal => buckets[2] += 1,
                    Priority::Low => buckets[3] += 1,
                    Priority::Batch | Priority::Custom(_) => buckets[4] += 1,
                }
            }
            match format {
                OutputFormat::Json => {
                    let obj = serde_json::json!({
                        "critical": buckets[0],
                        "high": buckets[1],
                        "normal": buckets[2],
                        "low": buckets[3],
                        "other": buckets[4],
                    });
                    println!("{}", serde_json::to_string_pretty(&obj)?);
                }
                OutputFormat::Text => {
                    println!("{} {}", color::header("critical:"), buckets[0]);
                    println!("{} {}", color::header("high:"), buckets[1]);
                    println!("{} {}", color::header("normal:"), buckets[2]);
                    println!("{} {}", color::header("low:"), buckets[3]);
                    println!("{} {}", color::header("other:"), buckets[4]);
                }
            }
        }
        PriorityCommand::List => {
            let queued = supervisor.queued_tasks();
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&queued)?);
                }
                OutputFormat::Text => {
                    let mut table = Table::new(vec![
                        Column::left("ID"),
                        Column::right("PRIORITY"),
                        Column::left("CMD").with_max(60),
                    ]);
                    for task in &queued {
                        let priority = task.queue.as_ref().map(|q| q.priority).unwrap_or(0);
                        table.row(vec![
                            task.id.short(12).to_string(),
                            priority.to_string(),
                            task.cmd.join(" "),
                        ]);
                    }
                    if queued.is_empty() {
                        println!("(no queued tasks)");
                    } else {
                        table.render(&mut std::io::stdout());
                    }
                }
            }
        }
        PriorityCommand::Set { id, priority } => {
            let priority: Priority = priority
                .parse()
                .map_err(|e: taskyard_core::ParsePriorityError| anyhow::anyhow!(e))?;
            let task_id = TaskId::new(id);
            let ok = supervisor.reprioritize_task(&task_id, priority.value());
            if !ok {
                bail!("task {task_id} is unknown or no longer queued");
            }
            println!("priority for {task_id} set to {priority}");
        }
    }
    Ok(())
}

fn print_help() {
    println!(
        "\
queue subcommands:
  status | stats                  Queue statistics
  health                          Derived health status
  pause                           Halt dispatch
  resume                          Resume dispatch
  clear                           Drop all waiting entries
  list <queued|running>           List tasks
  cancel <tag:T|cmd:S|all>        Cancel matching tasks
  concurrency <n>                 Set concurrency limit
  rate-limit <ms> <cap>           Set sliding-window rate limit
  priority <stats|list|set>       Inspect or change priorities
  shutdown [ms] [--force] [--no-cancel]  Drain and stop
  help                            This summary"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_selectors() {
        assert!(matches!(parse_selector("all").unwrap(), Selector::All));
        assert!(matches!(parse_selector("tag:ci").unwrap(), Selector::Tag(t) if t == "ci"));
        assert!(matches!(parse_selector("cmd:build").unwrap(), Selector::Cmd(s) if s == "build"));
    }

    #[test]
    fn rejects_unknown_selector_shape() {
        assert!(parse_selector("bogus").is_err());
    }
}
