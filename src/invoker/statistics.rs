//! Invocation statistics.
//!
//! Atomic counters keyed by route (`"GET /users/{id}"`). Values are
//! eventually consistent; a snapshot taken during traffic may be slightly stale.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

/// Counters for a single route.
#[derive(Debug, Default)]
pub struct PathStatistics {
    successes: AtomicU64,
    errors: AtomicU64,
    /// Invocations whose duration was recorded.
    timed: AtomicU64,
    total_micros: AtomicU64,
    max_micros: AtomicU64,
}

impl PathStatistics {
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn timed(&self) -> u64 {
        self.timed.load(Ordering::Relaxed)
    }

    fn record_timing(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.timed.fetch_add(1, Ordering::Relaxed);
        self.total_micros.fetch_add(micros, Ordering::Relaxed);
        self.max_micros.fetch_max(micros, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PathSnapshot {
        let timed = self.timed();
        let total_micros = self.total_micros.load(Ordering::Relaxed);
        let average_ms = if timed == 0 {
            0.0
        } else {
            total_micros as f64 / timed as f64 / 1000.0
        };
        PathSnapshot {
            successes: self.successes(),
            errors: self.errors(),
            invocations: timed,
            total_ms: total_micros as f64 / 1000.0,
            average_ms,
            max_ms: self.max_micros.load(Ordering::Relaxed) as f64 / 1000.0,
        }
    }
}

/// Point-in-time copy of one route's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathSnapshot {
    pub successes: u64,
    pub errors: u64,
    pub invocations: u64,
    pub total_ms: f64,
    pub average_ms: f64,
    pub max_ms: f64,
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsSnapshot {
    pub invocations: u64,
    pub paths: BTreeMap<String, PathSnapshot>,
}

/// Process-wide invocation counters.
#[derive(Debug, Default)]
pub struct InvocationStatistics {
    invocations: AtomicU64,
    paths: DashMap<String, Arc<PathStatistics>>,
}

impl InvocationStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an invocation entering the pipeline.
    #[inline]
    pub fn record_invocation(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, route: &str) {
        self.path(route).successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, route: &str) {
        self.path(route).errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timing(&self, route: &str, elapsed: Duration) {
        self.path(route).record_timing(elapsed);
    }

    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Counters for one route, if it was ever invoked.
    pub fn for_route(&self, route: &str) -> Option<Arc<PathStatistics>> {
        self.paths.get(route).map(|entry| entry.value().clone())
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        let paths = self
            .paths
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect();
        StatisticsSnapshot {
            invocations: self.invocations(),
            paths,
        }
    }

    fn path(&self, route: &str) -> Arc<PathStatistics> {
        if let Some(existing) = self.paths.get(route) {
            return existing.value().clone();
        }
        self.paths.entry(route.to_string()).or_default().value().clone()
    }
}
