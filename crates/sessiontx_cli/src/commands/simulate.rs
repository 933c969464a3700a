//! Simulate command implementation.

use parking_lot::Mutex;
use serde::Serialize;
use sessiontx_core::{SessionConfig, SessionLock, SessionMutex, Transaction};
use sessiontx_scheduler::{Priority, SchedulerError, TaskRunner};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

/// One lock transition observed during the run.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    /// Milliseconds since the start of the run.
    pub at_ms: u128,
    /// Whether the session was locked or unlocked.
    pub locked: bool,
    /// Transaction name.
    pub actor: String,
}

/// Simulation result.
#[derive(Debug, Serialize)]
pub struct SimulateResult {
    /// Chains that completed.
    pub completed: usize,
    /// Chains that failed.
    pub failed: usize,
    /// Highest number of chains inside the session at once.
    pub max_concurrent: usize,
    /// Total duration in milliseconds.
    pub elapsed_ms: u128,
    /// Lock transitions, in order.
    pub timeline: Vec<TimelineEntry>,
}

/// Runs the simulate command.
pub fn run(
    workers: usize,
    chains: usize,
    depth: usize,
    hold_ms: u64,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mutex = SessionMutex::new();
    let timeline = Arc::new(Mutex::new(Vec::new()));
    {
        let timeline = Arc::clone(&timeline);
        mutex.on_state_change(move |locked, actor| {
            timeline.lock().push(TimelineEntry {
                at_ms: start.elapsed().as_millis(),
                locked,
                actor: actor.to_string(),
            });
        });
    }

    let session = Arc::new(SessionLock::with_primitive(
        Arc::new(mutex),
        SessionConfig::default(),
    ));
    let runner = Arc::new(TaskRunner::new(session));
    let inside = Arc::new(AtomicUsize::new(0));
    let max_concurrent = Arc::new(AtomicUsize::new(0));
    let hold = Duration::from_millis(hold_ms);

    info!(workers, chains, depth, "starting simulation");

    let handles: Vec<_> = (0..workers)
        .map(|worker| {
            let runner = Arc::clone(&runner);
            let inside = Arc::clone(&inside);
            let max_concurrent = Arc::clone(&max_concurrent);
            let priority = Priority::ALL[worker % Priority::ALL.len()];
            thread::spawn(move || {
                let mut completed = 0usize;
                for chain in 0..chains {
                    let result = runner.with_priority(priority).and_then(|scheduled| {
                        // Hold the session across the whole chain, sub-calls nest inside.
                        scheduled
                            .set_initiator(format!("worker-{worker}"))
                            .begin_named(&format!("Chain{chain}"))?;
                        let outcome = scheduled.tx(|tx| {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_concurrent.fetch_max(now, Ordering::SeqCst);
                            let nested = nest(tx, depth, hold);
                            inside.fetch_sub(1, Ordering::SeqCst);
                            nested
                        });
                        scheduled.done()?;
                        outcome
                    });
                    match result {
                        Ok(()) => completed += 1,
                        Err(err) => tracing::warn!(worker, chain, error = %err, "chain failed"),
                    }
                }
                completed
            })
        })
        .collect();

    let mut completed = 0;
    for handle in handles {
        completed += handle.join().map_err(|_| "worker thread panicked")?;
    }

    let timeline = timeline.lock().clone();
    let result = SimulateResult {
        completed,
        failed: workers * chains - completed,
        max_concurrent: max_concurrent.load(Ordering::SeqCst),
        elapsed_ms: start.elapsed().as_millis(),
        timeline,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text(&result),
    }

    Ok(())
}

fn nest(tx: &Transaction, levels: usize, hold: Duration) -> Result<(), SchedulerError> {
    if levels == 0 {
        thread::sleep(hold);
        return Ok(());
    }
    tx.tx(|tx| nest(tx, levels - 1, hold))
}

fn print_text(result: &SimulateResult) {
    println!("Session Simulation");
    println!("==================");
    println!();
    for entry in &result.timeline {
        let action = if entry.locked { "lock  " } else { "unlock" };
        println!("{:>8} ms  {}  {}", entry.at_ms, action, entry.actor);
    }
    println!();
    println!("Completed chains: {}", result.completed);
    println!("Failed chains:    {}", result.failed);
    println!("Max concurrent:   {}", result.max_concurrent);
    println!("Elapsed:          {} ms", result.elapsed_ms);
}
