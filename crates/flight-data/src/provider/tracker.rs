//! Per-adapter call accounting.
//!
//! Every adapter owns one [`CallTracker`]. Counters are lock-free; the
//! sample window sits behind its own mutex so one adapter never contends
//! with another. Health reports read their success rate from the window,
//! so a provider that recovers stops looking degraded once old failures
//! roll out of it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::traits::ProviderReply;
use crate::errors::Result;
use crate::models::{ProviderHealth, ProviderMetrics};

/// Number of call samples kept for the rolling latency and success rate.
pub const LATENCY_WINDOW: usize = 100;

#[derive(Debug)]
struct LatencyWindow {
    /// `(latency_ms, success)` per call, oldest first.
    samples: VecDeque<(u64, bool)>,
    capacity: usize,
    last_used: Option<DateTime<Utc>>,
}

impl LatencyWindow {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            last_used: None,
        }
    }

    fn push(&mut self, latency_ms: u64, success: bool) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back((latency_ms, success));
        self.last_used = Some(Utc::now());
    }

    fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|(ms, _)| ms).sum::<u64>() as f64 / self.samples.len() as f64
    }

    fn success_rate(&self) -> f64 {
        if self.samples.is_empty() {
            return 1.0;
        }
        let successes = self.samples.iter().filter(|(_, ok)| *ok).count();
        successes as f64 / self.samples.len() as f64
    }
}

/// Call counters and rolling latency for one adapter.
#[derive(Debug)]
pub struct CallTracker {
    provider: &'static str,
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    window: Mutex<LatencyWindow>,
}

impl CallTracker {
    pub fn new(provider: &'static str) -> Self {
        Self::with_window(provider, LATENCY_WINDOW)
    }

    pub fn with_window(provider: &'static str, capacity: usize) -> Self {
        Self {
            provider,
            total: AtomicU64::new(0),
            successful: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            window: Mutex::new(LatencyWindow::new(capacity.max(1))),
        }
    }

    /// Lock the latency window, recovering from poison if necessary.
    fn lock_window(&self) -> MutexGuard<'_, LatencyWindow> {
        self.window.lock().unwrap_or_else(|poisoned| {
            warn!("Latency window mutex for '{}' was poisoned, recovering", self.provider);
            poisoned.into_inner()
        })
    }

    /// Record one finished call.
    pub fn record(&self, latency: Duration, success: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        let latency_ms = latency.as_millis().min(u128::from(u64::MAX)) as u64;
        self.lock_window().push(latency_ms, success);
    }

    /// Record the result of an operation and turn it into a fail-soft reply.
    pub fn complete<T>(
        &self,
        operation: &str,
        started: Instant,
        result: Result<Vec<T>>,
    ) -> ProviderReply<T> {
        let latency = started.elapsed();
        match result {
            Ok(items) => {
                self.record(latency, true);
                debug!(
                    "{} {} returned {} item(s) in {:?}",
                    self.provider,
                    operation,
                    items.len(),
                    latency
                );
                ProviderReply::success(items)
            }
            Err(e) => {
                self.record(latency, false);
                warn!(
                    "{} {} failed after {:?}: {}",
                    self.provider, operation, latency, e
                );
                ProviderReply::failed(e.failure_kind())
            }
        }
    }

    /// Record a health probe and build the health snapshot from it.
    pub fn probe(&self, started: Instant, result: Result<()>) -> ProviderHealth {
        let latency = started.elapsed();
        let healthy = result.is_ok();
        self.record(latency, healthy);

        let metrics = self.snapshot();
        let success_rate = self.lock_window().success_rate();
        let message = match result {
            Ok(()) => "OK".to_string(),
            Err(e) => e.to_string(),
        };

        ProviderHealth {
            healthy,
            latency_ms: latency.as_millis().min(u128::from(u64::MAX)) as u64,
            error_count: metrics.failed_requests,
            success_rate,
            last_checked: Utc::now(),
            message,
        }
    }

    pub fn snapshot(&self) -> ProviderMetrics {
        let window = self.lock_window();
        ProviderMetrics {
            total_requests: self.total.load(Ordering::Relaxed),
            successful_requests: self.successful.load(Ordering::Relaxed),
            failed_requests: self.failed.load(Ordering::Relaxed),
            average_latency_ms: window.average(),
            last_used: window.last_used,
        }
    }
}
