//! Request metrics recorded by virtual users, and the statistics derived from them.
//!
//! Every page load attempt is recorded exactly once as a [`Metric`] through a shared
//! [`MetricsCollector`]. Once the load test completes, a [`MetricsAggregate`] snapshot is
//! summarized into response time [`Stats`].

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

/// The outcome of one page load attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    /// Milliseconds from issuing the request until the page was ready.
    pub response_time_ms: u64,
    /// Whether the page loaded successfully.
    pub success: bool,
    /// Why the page failed to load.
    pub error: Option<String>,
}
impl Metric {
    /// A successful page load.
    pub fn success(response_time_ms: u64) -> Self {
        Metric {
            response_time_ms,
            success: true,
            error: None,
        }
    }

    /// A failed page load.
    pub fn failure(response_time_ms: u64, error: impl Into<String>) -> Self {
        Metric {
            response_time_ms,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// All metrics recorded during one load test.
///
/// `total_requests` always equals `successful_requests + failed_requests`, and
/// `response_times` holds exactly one sample per successful request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsAggregate {
    /// Every page load attempt.
    pub total_requests: usize,
    /// Page loads that succeeded.
    pub successful_requests: usize,
    /// Page loads that failed.
    pub failed_requests: usize,
    /// Response times of successful page loads in milliseconds, in recording order.
    pub response_times: Vec<u64>,
    /// Errors of failed page loads, in recording order.
    pub errors: Vec<String>,
}
impl MetricsAggregate {
    fn record(&mut self, metric: Metric) {
        self.total_requests += 1;
        if metric.success {
            self.successful_requests += 1;
            self.response_times.push(metric.response_time_ms);
        } else {
            self.failed_requests += 1;
            if let Some(error) = metric.error {
                self.errors.push(error);
            }
        }
    }

    /// The share of successful requests as a percentage, `None` if nothing was requested.
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_requests == 0 {
            None
        } else {
            Some(self.successful_requests as f64 / self.total_requests as f64 * 100.0)
        }
    }

    /// Distinct errors, in the order they were first recorded.
    pub fn unique_errors(&self) -> Vec<&str> {
        self.errors.iter().map(String::as_str).unique().collect()
    }
}

/// Shared, append-only sink for [`Metric`]s.
///
/// Cloning is cheap, all clones record into the same [`MetricsAggregate`].
#[derive(Clone, Debug, Default)]
pub struct MetricsCollector {
    aggregate: Arc<Mutex<MetricsAggregate>>,
}
impl MetricsCollector {
    /// Create a collector with no metrics.
    pub fn new() -> Self {
        MetricsCollector::default()
    }

    /// Record one page load attempt, updating counters and samples together.
    pub fn record(&self, metric: Metric) {
        trace!("recording {:?}", metric);
        self.aggregate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(metric);
    }

    /// A consistent copy of everything recorded so far.
    pub fn snapshot(&self) -> MetricsAggregate {
        self.aggregate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Response time statistics, in milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub min: u64,
    pub max: u64,
    pub avg: f64,
    pub median: u64,
    pub p90: u64,
    pub p95: u64,
}

/// Summarize response times, returning `None` if there are none.
///
/// Percentiles use the nearest rank without interpolation: the value at zero-based index
/// `floor(len * p)` of the sorted samples.
///
/// # Example
/// ```rust
/// use gosling::metrics::summarize;
///
/// let stats = summarize(&[300, 100, 200]).unwrap();
/// assert_eq!(stats.min, 100);
/// assert_eq!(stats.median, 200);
/// assert_eq!(stats.max, 300);
///
/// assert!(summarize(&[]).is_none());
/// ```
pub fn summarize(response_times: &[u64]) -> Option<Stats> {
    if response_times.is_empty() {
        return None;
    }
    let sorted: Vec<u64> = response_times.iter().copied().sorted_unstable().collect();
    let len = sorted.len();
    let sum: u64 = sorted.iter().sum();

    Some(Stats {
        min: sorted[0],
        max: sorted[len - 1],
        avg: sum as f64 / len as f64,
        median: sorted[len / 2],
        p90: percentile(&sorted, 0.90),
        p95: percentile(&sorted, 0.95),
    })
}

// The nearest-rank value of sorted, non-empty samples.
fn percentile(sorted: &[u64], p: f64) -> u64 {
    let index = (sorted.len() as f64 * p).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn summarize_hundreds() {
        let response_times: Vec<u64> = (1..=10).map(|i| i * 100).collect();
        let stats = summarize(&response_times).unwrap();
        assert_eq!(stats.min, 100);
        assert_eq!(stats.max, 1000);
        assert_eq!(stats.avg, 550.0);
        assert_eq!(stats.median, 600);
        assert_eq!(stats.p90, 1000);
        assert_eq!(stats.p95, 1000);
    }

    #[test]
    fn summarize_unsorted() {
        let stats = summarize(&[50, 10, 40, 20, 30]).unwrap();
        assert_eq!(stats.min, 10);
        assert_eq!(stats.max, 50);
        assert_eq!(stats.avg, 30.0);
        assert_eq!(stats.median, 30);
        assert_eq!(stats.p90, 50);
        assert_eq!(stats.p95, 50);
    }

    #[test]
    fn summarize_single() {
        let stats = summarize(&[42]).unwrap();
        assert_eq!(stats.min, 42);
        assert_eq!(stats.max, 42);
        assert_eq!(stats.median, 42);
        assert_eq!(stats.p90, 42);
        assert_eq!(stats.p95, 42);
    }

    #[test]
    fn summarize_many() {
        // 1..=100: floor(100 * 0.9) = 90, the 91st value.
        let response_times: Vec<u64> = (1..=100).rev().collect();
        let stats = summarize(&response_times).unwrap();
        assert_eq!(stats.median, 51);
        assert_eq!(stats.p90, 91);
        assert_eq!(stats.p95, 96);
    }

    #[test]
    fn summarize_empty() {
        assert_eq!(summarize(&[]), None);
    }

    #[test]
    fn record() {
        let collector = MetricsCollector::new();
        collector.record(Metric::success(120));
        collector.record(Metric::failure(30_000, "timeout"));
        collector.record(Metric::success(80));
        collector.record(Metric::failure(5, "500 Internal Server Error: http://localhost/"));
        collector.record(Metric::failure(30_000, "timeout"));

        let aggregate = collector.snapshot();
        assert_eq!(aggregate.total_requests, 5);
        assert_eq!(aggregate.successful_requests, 2);
        assert_eq!(aggregate.failed_requests, 3);
        assert_eq!(aggregate.response_times, vec![120, 80]);
        assert_eq!(aggregate.errors.len(), 3);
        assert_eq!(
            aggregate.unique_errors(),
            vec!["timeout", "500 Internal Server Error: http://localhost/"]
        );
        assert_eq!(aggregate.success_rate(), Some(40.0));
    }

    #[test]
    fn snapshot_is_a_copy() {
        let collector = MetricsCollector::new();
        collector.record(Metric::success(1));
        let snapshot = collector.snapshot();
        collector.record(Metric::success(2));
        assert_eq!(snapshot.total_requests, 1);
        assert_eq!(collector.snapshot().total_requests, 2);
    }

    #[test]
    fn no_requests() {
        let aggregate = MetricsCollector::new().snapshot();
        assert_eq!(aggregate, MetricsAggregate::default());
        assert_eq!(aggregate.success_rate(), None);
    }

    #[test]
    fn concurrent_record() {
        let collector = MetricsCollector::new();
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let collector = collector.clone();
                std::thread::spawn(move || {
                    for j in 0..250 {
                        if (i + j) % 5 == 0 {
                            collector.record(Metric::failure(1, "failed"));
                        } else {
                            collector.record(Metric::success(j));
                        }
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let aggregate = collector.snapshot();
        assert_eq!(aggregate.total_requests, 2_000);
        assert_eq!(
            aggregate.total_requests,
            aggregate.successful_requests + aggregate.failed_requests
        );
        assert_eq!(aggregate.response_times.len(), aggregate.successful_requests);
        assert_eq!(aggregate.errors.len(), aggregate.failed_requests);
    }
}
