//! Backoff command implementation.

use sessiontx_core::{BackoffConfig, CancellationToken, ExponentialBackoff, WaitOutcome};
use std::time::{Duration, Instant};
use tracing::debug;

/// Runs the backoff command.
///
/// Waits for real, so the printed elapsed times show the actual schedule.
pub fn run(
    attempts: usize,
    unit_ms: u64,
    max_units: u32,
    reset_after: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = BackoffConfig::from_max_units(Duration::from_millis(unit_ms), max_units);
    let backoff = ExponentialBackoff::new(CancellationToken::new(), config);

    println!("Backoff Schedule");
    println!("================");
    println!("Unit: {} ms", unit_ms);
    if config.is_unbounded() {
        println!("Ceiling: unbounded");
    } else {
        println!("Ceiling: {} ms", config.max_delay.as_millis());
    }
    println!();

    for attempt in 0..attempts {
        if reset_after == Some(attempt) {
            println!("  -- reset --");
            backoff.reset();
        }

        let start = Instant::now();
        let outcome = backoff.wait();
        let elapsed = start.elapsed();
        debug!(attempt, ?outcome, "wait finished");

        let requested = match outcome {
            WaitOutcome::Immediate => "immediate".to_string(),
            WaitOutcome::Slept(delay) => format!("{} ms", delay.as_millis()),
            WaitOutcome::Cancelled => "cancelled".to_string(),
        };
        println!(
            "  wait #{:<3} requested {:>10}  elapsed {:>6} ms  next {:>6} ms",
            attempt + 1,
            requested,
            elapsed.as_millis(),
            backoff.current_delay().as_millis()
        );
    }

    Ok(())
}
