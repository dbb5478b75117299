// src/core/progress.rs

use colored::*;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Counters {
    current: usize,
    total: usize,
}

/// The `[current/total]` counter pair of one top-level invocation.
#[derive(Debug, Default)]
pub struct Progress {
    counters: Mutex<Counters>,
    quiet: bool,
}

impl Progress {
    pub fn new(quiet: bool) -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            quiet,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn begin(&self, total: usize) {
        *self.lock() = Counters { current: 0, total };
    }

    /// Grows the total, e.g. when a stale dependency has to run.
    pub fn add(&self, count: usize) {
        let mut counters = self.lock();
        counters.total = counters.total.saturating_add(count);
    }

    pub fn reset(&self) {
        *self.lock() = Counters::default();
    }

    /// Returns `(current, total)`.
    pub fn snapshot(&self) -> (usize, usize) {
        let counters = self.lock();
        (counters.current, counters.total)
    }

    /// Marks the start of `name` and returns its start time.
    pub fn start(&self, name: &str) -> Instant {
        let (current, total) = {
            let mut counters = self.lock();
            counters.current = counters.current.saturating_add(1);
            if counters.total < counters.current {
                counters.total = counters.current;
            }
            (counters.current, counters.total)
        };
        if !self.quiet {
            println!(
                "{} {} {}",
                format!("[{}/{}]", current, total).dimmed(),
                "executing".blue(),
                name.cyan()
            );
        }
        Instant::now()
    }

    pub fn finish(&self, name: &str, started: Instant) {
        if self.quiet {
            return;
        }
        let (current, total) = self.snapshot();
        println!(
            "{} {} {} in {}",
            format!("[{}/{}]", current, total).dimmed(),
            "finished".green(),
            name.cyan(),
            format_duration(started.elapsed())
        );
    }
}

/// Formats a run time for humans: `850ms`, `4.21s`, `2m 03s`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else if secs >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
