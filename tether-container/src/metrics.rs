//! Resolution timing and cache statistics.
//!
//! Samples are recorded synchronously under a short lock; the report is
//! computed on demand.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::mem::size_of;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tether_support::rendering::{format_millis, format_percent};

use crate::config::ContainerConfig;
use crate::key::TypeKey;

#[derive(Debug, Default, Clone)]
struct KeyRecord {
    resolutions: u64,
    total: Duration,
    slowest: Duration,
    hits: u64,
    misses: u64,
}

#[derive(Debug, Default)]
struct MetricsState {
    records: HashMap<TypeKey, KeyRecord>,
    recent: VecDeque<Duration>,
}

/// Per-key resolution counters.
#[derive(Debug)]
pub struct ContainerMetrics {
    state: Mutex<MetricsState>,
    registrations: AtomicU64,
    slowest_limit: usize,
    window: usize,
}

impl ContainerMetrics {
    pub fn new(config: &ContainerConfig) -> Self {
        Self {
            state: Mutex::new(MetricsState::default()),
            registrations: AtomicU64::new(0),
            slowest_limit: config.slowest_resolutions_limit,
            window: config.percentile_window.max(1),
        }
    }

    /// Records one resolution of `key`, successful or not.
    pub fn record_resolution(&self, key: &TypeKey, elapsed: Duration) {
        let mut state = self.state.lock();
        let record = state.records.entry(key.clone()).or_default();
        record.resolutions += 1;
        record.total += elapsed;
        record.slowest = record.slowest.max(elapsed);

        state.recent.push_back(elapsed);
        while state.recent.len() > self.window {
            state.recent.pop_front();
        }
    }

    pub fn record_cache_hit(&self, key: &TypeKey) {
        self.state.lock().records.entry(key.clone()).or_default().hits += 1;
    }

    pub fn record_cache_miss(&self, key: &TypeKey) {
        self.state.lock().records.entry(key.clone()).or_default().misses += 1;
    }

    pub fn record_registration(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    /// Builds a report from the samples recorded so far.
    pub fn report(&self) -> MetricsReport {
        let state = self.state.lock();

        let mut total_resolutions = 0u64;
        let mut total_time = Duration::ZERO;
        let mut hits = 0u64;
        let mut misses = 0u64;
        for record in state.records.values() {
            total_resolutions += record.resolutions;
            total_time += record.total;
            hits += record.hits;
            misses += record.misses;
        }

        let average_resolution_time = if total_resolutions == 0 {
            0.0
        } else {
            millis(total_time) / total_resolutions as f64
        };
        let cache_hit_rate = if hits + misses == 0 {
            0.0
        } else {
            hits as f64 / (hits + misses) as f64
        };

        let mut slowest_resolutions: Vec<SlowResolution> = state
            .records
            .iter()
            .filter(|(_, record)| record.resolutions > 0)
            .map(|(key, record)| SlowResolution {
                key: key.clone(),
                resolutions: record.resolutions,
                average_ms: millis(record.total) / record.resolutions as f64,
                max_ms: millis(record.slowest),
            })
            .collect();
        slowest_resolutions.sort_by(|a, b| {
            b.max_ms
                .total_cmp(&a.max_ms)
                .then_with(|| a.key.short_name().cmp(&b.key.short_name()))
        });
        slowest_resolutions.truncate(self.slowest_limit);

        let mut recent: Vec<Duration> = state.recent.iter().copied().collect();
        recent.sort_unstable();

        let memory_usage_estimate = size_of::<Self>()
            + state
                .records
                .keys()
                .map(|key| size_of::<TypeKey>() + size_of::<KeyRecord>() + key.name().map_or(0, str::len))
                .sum::<usize>()
            + state.recent.len() * size_of::<Duration>();

        MetricsReport {
            total_resolutions,
            total_registrations: self.registrations.load(Ordering::Relaxed),
            average_resolution_time,
            cache_hit_rate,
            slowest_resolutions,
            p50: percentile(&recent, 0.50),
            p95: percentile(&recent, 0.95),
            p99: percentile(&recent, 0.99),
            memory_usage_estimate,
        }
    }

    /// Forgets every sample. The registration count is kept.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.records.clear();
        state.recent.clear();
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Nearest-rank percentile over sorted samples, in milliseconds.
fn percentile(sorted: &[Duration], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    millis(sorted[rank.clamp(1, sorted.len()) - 1])
}

// ═══════════════════════════════════════════
// Report
// ═══════════════════════════════════════════

/// One entry of [`MetricsReport::slowest_resolutions`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlowResolution {
    pub key: TypeKey,
    pub resolutions: u64,
    pub average_ms: f64,
    pub max_ms: f64,
}

/// Aggregate view over recorded resolutions. Times are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub total_resolutions: u64,
    pub total_registrations: u64,
    pub average_resolution_time: f64,
    /// Hits over hits plus misses, in `[0, 1]`.
    pub cache_hit_rate: f64,
    /// Sorted by slowest single resolution, descending.
    pub slowest_resolutions: Vec<SlowResolution>,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    /// Rough size of the metrics bookkeeping, in bytes.
    pub memory_usage_estimate: usize,
}

fn ms(value: f64) -> String {
    format_millis(Duration::from_secs_f64(value.max(0.0) / 1000.0))
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Container Performance Metrics")?;
        writeln!(f, "=============================")?;
        writeln!(f, "Total Resolutions: {}", self.total_resolutions)?;
        writeln!(f, "Total Registrations: {}", self.total_registrations)?;
        writeln!(f, "Average Resolution Time: {}", ms(self.average_resolution_time))?;
        writeln!(f, "Cache Hit Rate: {}", format_percent(self.cache_hit_rate))?;
        writeln!(
            f,
            "Percentiles: p50 {} / p95 {} / p99 {}",
            ms(self.p50),
            ms(self.p95),
            ms(self.p99)
        )?;
        writeln!(f, "Memory Usage: {} bytes", self.memory_usage_estimate)?;
        if !self.slowest_resolutions.is_empty() {
            writeln!(f, "Slowest Resolutions:")?;
            for slow in &self.slowest_resolutions {
                writeln!(
                    f,
                    "  {}: max {}, avg {} over {}",
                    slow.key,
                    ms(slow.max_ms),
                    ms(slow.average_ms),
                    slow.resolutions
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> ContainerMetrics {
        ContainerMetrics::new(&ContainerConfig::default())
    }

    #[test]
    fn empty_report_is_zeroed() {
        let report = metrics().report();
        assert_eq!(report.total_resolutions, 0);
        assert_eq!(report.average_resolution_time, 0.0);
        assert_eq!(report.cache_hit_rate, 0.0);
        assert_eq!(report.p99, 0.0);
        assert!(report.slowest_resolutions.is_empty());
        assert!(report.memory_usage_estimate > 0);
    }

    #[test]
    fn averages_and_hit_rate() {
        let metrics = metrics();
        let key = TypeKey::of::<u32>();
        for ms in [1, 2, 3] {
            metrics.record_resolution(&key, Duration::from_millis(ms));
        }
        metrics.record_cache_hit(&key);
        metrics.record_cache_hit(&key);
        metrics.record_cache_miss(&key);

        let report = metrics.report();
        assert_eq!(report.total_resolutions, 3);
        assert!((report.average_resolution_time - 2.0).abs() < 1e-9);
        assert!(report.cache_hit_rate > 0.6 && report.cache_hit_rate < 0.7);
        assert!((report.p50 - 2.0).abs() < 1e-9);
        assert!((report.p99 - 3.0).abs() < 1e-9);
    }

    #[test]
    fn slowest_is_sorted_and_limited() {
        let config = ContainerConfig {
            slowest_resolutions_limit: 2,
            ..ContainerConfig::default()
        };
        let metrics = ContainerMetrics::new(&config);
        metrics.record_resolution(&TypeKey::of::<u8>(), Duration::from_millis(5));
        metrics.record_resolution(&TypeKey::of::<u16>(), Duration::from_millis(9));
        metrics.record_resolution(&TypeKey::of::<u32>(), Duration::from_millis(1));

        let slowest = metrics.report().slowest_resolutions;
        assert_eq!(slowest.len(), 2);
        assert!(slowest[0].key.represents::<u16>());
        assert!(slowest[1].key.represents::<u8>());
    }

    #[test]
    fn percentile_window_drops_old_samples() {
        let config = ContainerConfig {
            percentile_window: 2,
            ..ContainerConfig::default()
        };
        let metrics = ContainerMetrics::new(&config);
        let key = TypeKey::of::<u8>();
        metrics.record_resolution(&key, Duration::from_millis(100));
        metrics.record_resolution(&key, Duration::from_millis(1));
        metrics.record_resolution(&key, Duration::from_millis(2));

        let report = metrics.report();
        assert!((report.p99 - 2.0).abs() < 1e-9);
        assert_eq!(report.total_resolutions, 3);
    }

    #[test]
    fn reset_keeps_registration_count() {
        let metrics = metrics();
        metrics.record_registration();
        metrics.record_resolution(&TypeKey::of::<u8>(), Duration::from_millis(1));
        metrics.reset();

        let report = metrics.report();
        assert_eq!(report.total_resolutions, 0);
        assert_eq!(report.total_registrations, 1);
    }

    #[test]
    fn display_has_headline_fields() {
        let metrics = metrics();
        metrics.record_resolution(&TypeKey::named::<u8>("retries"), Duration::from_micros(1500));
        let text = metrics.report().to_string();
        assert!(text.starts_with("Container Performance Metrics"));
        assert!(text.contains("Total Resolutions: 1"));
        assert!(text.contains("Average Resolution Time: 1.500ms"));
        assert!(text.contains("Cache Hit Rate: 0.0%"));
        assert!(text.contains("u8[retries]"));
    }

    #[test]
    fn report_serializes() {
        let metrics = metrics();
        metrics.record_resolution(&TypeKey::of::<u8>(), Duration::from_millis(1));
        let json = serde_json::to_value(metrics.report()).unwrap();
        assert_eq!(json["total_resolutions"], 1);
        assert_eq!(json["slowest_resolutions"][0]["key"], "u8");
    }
}
