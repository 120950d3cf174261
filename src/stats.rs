use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::RunStats;

/// Outcome of a single issued request.
///
/// `status_code` is 0 when the request never produced a response.
#[derive(Debug, Clone)]
pub struct RequestResult {
    pub status_code: u16,
    pub latency: Duration,
    pub bytes_read: u64,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Error descriptions kept per run; further ones are dropped.
const ERROR_LOG_CAP: usize = 10_000;

/// Concurrent aggregate of request results for one run.
///
/// Counters are plain atomics so the ingest path stays lock-free; the
/// latency samples, status-code histogram and error log sit behind
/// short-held locks. Sorting happens only on read.
#[derive(Debug, Default)]
pub struct Stats {
    total: AtomicU64,
    success: AtomicU64,
    failed: AtomicU64,
    bytes_read: AtomicU64,
    status_codes: RwLock<HashMap<u16, Arc<AtomicU64>>>,
    latencies: Mutex<Vec<Duration>>,
    total_latency: Mutex<Duration>,
    errors: RwLock<Vec<String>>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one result into the aggregate. Safe to call from many
    /// producers concurrently. Errored results count as failed and skip
    /// byte, status-code and latency accounting.
    pub fn record(&self, r: &RequestResult) {
        self.total.fetch_add(1, Ordering::Relaxed);

        if let Some(err) = &r.error {
            self.failed.fetch_add(1, Ordering::Relaxed);
            let mut errors = self.errors.write().unwrap();
            if errors.len() < ERROR_LOG_CAP {
                errors.push(err.clone());
            }
            return;
        }

        self.bytes_read.fetch_add(r.bytes_read, Ordering::Relaxed);

        let counter = {
            let codes = self.status_codes.read().unwrap();
            codes.get(&r.status_code).cloned()
        };
        let counter = counter.unwrap_or_else(|| {
            let mut codes = self.status_codes.write().unwrap();
            Arc::clone(codes.entry(r.status_code).or_default())
        });
        counter.fetch_add(1, Ordering::Relaxed);

        if (200..400).contains(&r.status_code) {
            self.success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }

        self.latencies.lock().unwrap().push(r.latency);
        *self.total_latency.lock().unwrap() += r.latency;
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn success(&self) -> u64 {
        self.success.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Mean latency in milliseconds, 0 when nothing was recorded.
    pub fn avg_latency_ms(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let sum = *self.total_latency.lock().unwrap();
        millis(sum) / total as f64
    }

    pub fn min_latency_ms(&self) -> f64 {
        let latencies = self.latencies.lock().unwrap();
        latencies.iter().min().map(|d| millis(*d)).unwrap_or(0.0)
    }

    pub fn max_latency_ms(&self) -> f64 {
        let latencies = self.latencies.lock().unwrap();
        latencies.iter().max().map(|d| millis(*d)).unwrap_or(0.0)
    }

    /// Latency percentile in milliseconds for `p` in [0, 1].
    ///
    /// Sorts a snapshot of the samples and indexes `floor(p * len)`,
    /// clamped to the last sample. Returns 0 when no samples exist.
    pub fn percentile_ms(&self, p: f64) -> f64 {
        let mut sorted = self.latencies.lock().unwrap().clone();
        if sorted.is_empty() {
            return 0.0;
        }
        sorted.sort_unstable();
        let index = ((sorted.len() as f64 * p) as usize).min(sorted.len() - 1);
        millis(sorted[index])
    }

    pub fn status_code_distribution(&self) -> HashMap<u16, u64> {
        let codes = self.status_codes.read().unwrap();
        codes
            .iter()
            .map(|(code, count)| (*code, count.load(Ordering::Relaxed)))
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.read().unwrap().clone()
    }

    /// Measured request rate over the given span, 0 for a zero span.
    pub fn rps(&self, elapsed: Duration) -> f64 {
        if elapsed.is_zero() {
            return 0.0;
        }
        self.total() as f64 / elapsed.as_secs_f64()
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.success() as f64 / total as f64
    }

    /// Assembles the wire-facing snapshot over the given measured span.
    pub fn snapshot(&self, elapsed: Duration) -> RunStats {
        RunStats {
            total: self.total(),
            success: self.success(),
            failed: self.failed(),
            avg_latency: self.avg_latency_ms(),
            min_latency: self.min_latency_ms(),
            max_latency: self.max_latency_ms(),
            p50_latency: self.percentile_ms(0.50),
            p90_latency: self.percentile_ms(0.90),
            p95_latency: self.percentile_ms(0.95),
            p99_latency: self.percentile_ms(0.99),
            success_rate: self.success_rate(),
            rps: self.rps(elapsed),
            bytes_read: self.bytes_read(),
            status_codes: self.status_code_distribution(),
            errors: self.errors(),
        }
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
