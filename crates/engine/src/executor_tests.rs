// SPDX-License-Identifier: MIT
// Copyright (c) 2026 taskyard contributors

use super::*;
use crate::log_sink::LogSink;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use taskyard_core::SystemClock;

fn events_collector() -> (EventSink, Arc<Mutex<Vec<ExecutorEvent>>>) {
    let collected = Arc::new(Mutex::new(Vec::new()));
    let collected2 = collected.clone();
    let sink: EventSink = Arc::new(move |ev| collected2.lock().unwrap().push(ev));
    (sink, collected)
}

#[tokio::test]
async fn spawning_an_empty_command_fails_synchronously() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(LogSink::create(dir.path().join("t.log"), 0).unwrap());
    let executor = ProcessExecutor::new(SystemClock);
    let (events, _) = events_collector();
    let result = executor.spawn(TaskId::new("t1"), &[], sink, None, events);
    assert!(matches!(result, Err(SpawnError::EmptyCommand)));
}

#[tokio::test]
async fn successful_spawn_pipes_stdout_into_the_log_and_reports_exit() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(LogSink::create(dir.path().join("t.log"), 0).unwrap());
    let executor = ProcessExecutor::new(SystemClock);
    let (events, collected) = events_collector();

    let cmd = vec!["echo".to_string(), "hello-from-executor".to_string()];
    let handle = executor
        .spawn(TaskId::new("t1"), &cmd, sink.clone(), None, events)
        .expect("echo should spawn");
    assert!(handle.pid > 0);

    for _ in 0..50 {
        if !collected.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let events = collected.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ExecutorEvent::Exited { code: Some(0), .. }));

    let contents = std::fs::read_to_string(sink.path()).unwrap();
    assert!(contents.contains("hello-from-executor"));
}

#[tokio::test]
async fn idle_watchdog_kills_a_quiet_process() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(LogSink::create(dir.path().join("t.log"), 0).unwrap());
    let executor = ProcessExecutor::new(SystemClock);
    let (events, collected) = events_collector();

    let cmd = vec!["sleep".to_string(), "30".to_string()];
    let _handle = executor
        .spawn(
            TaskId::new("t1"),
            &cmd,
            sink,
            Some(Duration::from_millis(300)),
            events,
        )
        .expect("sleep should spawn");

    for _ in 0..50 {
        if !collected.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let events = collected.lock().unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, ExecutorEvent::IdleTimeout { .. })));
}

#[test]
fn idle_counter_is_thread_safe_across_many_writers() {
    // Sanity check on the atomics the watchdog and pipe readers share;
    // not a behavioral test of the executor itself.
    let counter = Arc::new(AtomicUsize::new(0));
    std::thread::scope(|scope| {
        for _ in 0..8 {
            let counter = counter.clone();
            scope.spawn(move || {
                for _ in 0..1000 {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });
    assert_eq!(counter.load(Ordering::SeqCst), 8000);
}
