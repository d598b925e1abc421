use std::{
    sync::Barrier,
    thread::scope,
    time::{Duration, Instant},
};

use anyhow::Context;
use hilo::{Allocator, InMemoryBackend, SystemClock};

use crate::config::StressConfig;

/// What one key handed out during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyReport {
    pub key: String,
    pub issued: usize,
    pub last: Option<i64>,
    pub duplicates: usize,
    pub gaps: usize,
}

/// The outcome of a stress run.
#[derive(Debug, Clone)]
pub struct Report {
    pub keys: Vec<KeyReport>,
    pub elapsed: Duration,
    pub reservations: u64,
    pub registry_capacity: usize,
}

impl Report {
    pub fn duplicates(&self) -> usize {
        self.keys.iter().map(|k| k.duplicates).sum()
    }

    pub fn gaps(&self) -> usize {
        self.keys.iter().map(|k| k.gaps).sum()
    }

    pub fn issued(&self) -> usize {
        self.keys.iter().map(|k| k.issued).sum()
    }

    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return f64::INFINITY;
        }
        self.issued() as f64 / secs
    }
}

pub fn key_name(idx: usize) -> String {
    format!("sequence-{idx}")
}

/// Runs the configured workload against a fresh allocator backed by an
/// [`InMemoryBackend`].
///
/// Thread `t` starts at key `t % keys` and walks the keys round-robin, so
/// every key sees contention and first-touch registration races.
pub fn run(config: &StressConfig) -> anyhow::Result<Report> {
    let allocator = Allocator::with_config(InMemoryBackend::new(), SystemClock, config.allocator)?;
    let keys: Vec<String> = (0..config.keys).map(key_name).collect();
    let barrier = Barrier::new(config.threads + 1);

    let (per_thread, elapsed) = scope(|s| {
        let handles: Vec<_> = (0..config.threads)
            .map(|thread| {
                let allocator = &allocator;
                let keys = &keys;
                let barrier = &barrier;
                s.spawn(move || -> hilo::Result<Vec<Vec<i64>>> {
                    let mut issued = vec![Vec::new(); keys.len()];
                    barrier.wait();
                    for i in 0..config.increments {
                        let idx = (thread + i) % keys.len();
                        issued[idx].push(allocator.increment_seeded(&keys[idx], 1, config.seed)?);
                    }
                    Ok(issued)
                })
            })
            .collect();

        barrier.wait();
        let start = Instant::now();
        let results: Vec<_> = handles.into_iter().map(|h| h.join()).collect();
        (results, start.elapsed())
    });

    let mut merged: Vec<Vec<i64>> = vec![Vec::new(); keys.len()];
    for result in per_thread {
        let issued = result
            .map_err(|_| anyhow::anyhow!("worker thread panicked"))?
            .context("increment failed")?;
        for (idx, values) in issued.into_iter().enumerate() {
            merged[idx].extend(values);
        }
    }

    let reports = keys
        .into_iter()
        .zip(merged)
        .map(|(key, values)| summarize(key, values))
        .collect();

    Ok(Report {
        keys: reports,
        elapsed,
        reservations: allocator.backend().reservations(),
        registry_capacity: allocator.capacity(),
    })
}

/// Checks one key's values: a single process with increments of one must
/// produce exactly `1..=n`.
fn summarize(key: String, mut values: Vec<i64>) -> KeyReport {
    values.sort_unstable();
    let issued = values.len();
    let before = values.len();
    values.dedup();
    let duplicates = before - values.len();

    let last = values.last().copied();
    let expected = i64::try_from(values.len()).unwrap_or(i64::MAX);
    let gaps = usize::try_from(last.unwrap_or(0).saturating_sub(expected)).unwrap_or(0);

    KeyReport {
        key,
        issued,
        last,
        duplicates,
        gaps,
    }
}
