//! Request counters for the stats endpoint

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug)]
pub struct ServiceStats {
    started_at: DateTime<Utc>,
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
    api_answers: AtomicU64,
    renders: AtomicU64,
    render_errors: AtomicU64,
    load_failures: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestCounters {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub api_answers: u64,
    pub renders: u64,
    pub render_errors: u64,
    pub load_failures: u64,
    pub cache_hit_rate_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_entries: usize,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GateStats {
    pub capacity: usize,
    pub in_use: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: i64,
    pub stats: RequestCounters,
    pub cache: CacheStats,
    pub gate: GateStats,
}

impl Default for ServiceStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            total_requests: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            api_answers: AtomicU64::new(0),
            renders: AtomicU64::new(0),
            render_errors: AtomicU64::new(0),
            load_failures: AtomicU64::new(0),
        }
    }
}

impl ServiceStats {
    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_api_answer(&self) {
        self.api_answers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_render(&self) {
        self.renders.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_render_error(&self) {
        self.render_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn counters(&self) -> RequestCounters {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let rate = cache_hits as f64 / total_requests.max(1) as f64 * 100.0;

        RequestCounters {
            total_requests,
            cache_hits,
            api_answers: self.api_answers.load(Ordering::Relaxed),
            renders: self.renders.load(Ordering::Relaxed),
            render_errors: self.render_errors.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            cache_hit_rate_percent: (rate * 100.0).round() / 100.0,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_rounds_to_two_places() {
        let stats = ServiceStats::default();
        for _ in 0..3 {
            stats.record_request();
        }
        stats.record_cache_hit();
        let counters = stats.counters();
        assert_eq!(counters.total_requests, 3);
        assert_eq!(counters.cache_hit_rate_percent, 33.33);
    }

    #[test]
    fn empty_stats_have_zero_rate() {
        assert_eq!(ServiceStats::default().counters().cache_hit_rate_percent, 0.0);
    }
}
