//! The performance report printed and saved after a load test.

use chrono::{DateTime, SecondsFormat, Utc};
use num_format::{Locale, ToFormattedString};
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Configuration;
use crate::metrics::{self, MetricsAggregate, Stats};
use crate::GoslingError;

/// How many distinct errors are listed in the report.
const SAMPLE_ERRORS: usize = 5;

const RULE: &str = "==================================================";

/// Displays the value, or `N/A` if there is none.
pub struct OrNa<T>(pub Option<T>);

impl<T: Display> Display for OrNa<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => value.fmt(f),
            None => f.write_str("N/A"),
        }
    }
}

// Milliseconds with a unit, or N/A.
struct Ms<T>(Option<T>);

impl<T: Display> Display for Ms<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => {
                value.fmt(f)?;
                f.write_str("ms")
            }
            None => f.write_str("N/A"),
        }
    }
}

/// Everything needed to render a report.
pub struct PerformanceReport<'a> {
    pub metrics: &'a MetricsAggregate,
    pub stats: Option<Stats>,
    pub configuration: &'a Configuration,
    pub elapsed: Duration,
}
impl<'a> PerformanceReport<'a> {
    pub fn new(
        metrics: &'a MetricsAggregate,
        configuration: &'a Configuration,
        elapsed: Duration,
    ) -> Self {
        PerformanceReport {
            metrics,
            stats: metrics::summarize(&metrics.response_times),
            configuration,
            elapsed,
        }
    }

    /// Whether the 95th percentile response time is within the target, `None` if no
    /// request succeeded.
    pub fn within_target(&self) -> Option<bool> {
        let target = self.configuration.target_response_time.as_millis();
        self.stats
            .as_ref()
            .map(|stats| u128::from(stats.p95) <= target)
    }

    fn fmt_header(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", RULE)?;
        writeln!(f, "WEBSITE PERFORMANCE TEST REPORT")?;
        writeln!(f, "{}", RULE)?;
        writeln!(f)?;
        writeln!(f, "Test Duration: {} seconds", self.elapsed.as_secs_f64().round())?;
        writeln!(f, "Maximum Concurrent Users: {}", self.configuration.users)?;
        writeln!(f)
    }

    fn fmt_requests(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "REQUEST METRICS:")?;
        writeln!(f, "----------------")?;
        writeln!(
            f,
            "Total Requests: {}",
            self.metrics.total_requests.to_formatted_string(&Locale::en)
        )?;
        writeln!(
            f,
            "Successful Requests: {}",
            self.metrics.successful_requests.to_formatted_string(&Locale::en)
        )?;
        writeln!(
            f,
            "Failed Requests: {}",
            self.metrics.failed_requests.to_formatted_string(&Locale::en)
        )?;
        match self.metrics.success_rate() {
            Some(rate) => writeln!(f, "Success Rate: {:.2}%", rate)?,
            None => writeln!(f, "Success Rate: N/A")?,
        }
        writeln!(f)
    }

    fn fmt_response_times(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let stats = self.stats.as_ref();
        writeln!(f, "RESPONSE TIME METRICS:")?;
        writeln!(f, "----------------------")?;
        writeln!(f, "Min: {}", Ms(stats.map(|s| s.min)))?;
        writeln!(f, "Max: {}", Ms(stats.map(|s| s.max)))?;
        writeln!(f, "Average: {:.2}", Ms(stats.map(|s| s.avg)))?;
        writeln!(f, "Median: {}", Ms(stats.map(|s| s.median)))?;
        writeln!(f, "90th Percentile: {}", Ms(stats.map(|s| s.p90)))?;
        writeln!(f, "95th Percentile: {}", Ms(stats.map(|s| s.p95)))?;
        writeln!(f)
    }

    fn fmt_goal(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let stats = self.stats.as_ref();
        let target = self.configuration.target_response_time.as_millis();
        writeln!(f, "PERFORMANCE GOAL COMPLIANCE:")?;
        writeln!(f, "----------------------------")?;
        writeln!(f, "Target Response Time: {}ms", target)?;
        writeln!(f, "Average Response Time: {:.2}", Ms(stats.map(|s| s.avg)))?;
        writeln!(f, "95th Percentile Response Time: {}", Ms(stats.map(|s| s.p95)))?;
        writeln!(
            f,
            "Within Target (95% under {}ms): {}",
            target,
            OrNa(self.within_target().map(|ok| if ok { "YES" } else { "NO" }))
        )?;
        writeln!(f)
    }

    fn fmt_errors(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let unique = self.metrics.unique_errors();
        writeln!(f, "ERROR SUMMARY:")?;
        writeln!(f, "--------------")?;
        writeln!(f, "Total Errors: {}", self.metrics.errors.len())?;
        writeln!(f, "Unique Errors: {}", unique.len())?;
        writeln!(f)?;
        if unique.is_empty() {
            writeln!(f, "No errors recorded.")?;
        } else {
            writeln!(f, "Sample Errors:")?;
            for error in unique.iter().take(SAMPLE_ERRORS) {
                writeln!(f, "  - {}", error)?;
            }
        }
        writeln!(f)?;
        writeln!(f, "{}", RULE)
    }
}

impl Display for PerformanceReport<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.fmt_header(f)?;
        self.fmt_requests(f)?;
        self.fmt_response_times(f)?;
        self.fmt_goal(f)?;
        self.fmt_errors(f)
    }
}

/// Render the report of a finished load test.
pub fn generate(
    metrics: &MetricsAggregate,
    configuration: &Configuration,
    elapsed: Duration,
) -> String {
    PerformanceReport::new(metrics, configuration, elapsed).to_string()
}

/// The file a report generated at `timestamp` is saved to, for example
/// `performance-report-2024-05-01T12-30-05-123Z.txt`.
pub fn report_file_name(timestamp: DateTime<Utc>) -> String {
    let timestamp = timestamp
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("performance-report-{}.txt", timestamp)
}

/// Save `report` in `report_dir`, returning the path written.
pub async fn write_report(
    report_dir: &Path,
    report: &str,
    timestamp: DateTime<Utc>,
) -> Result<PathBuf, GoslingError> {
    tokio::fs::create_dir_all(report_dir).await?;
    let path = report_dir.join(report_file_name(timestamp));
    tokio::fs::write(&path, report).await?;
    Ok(path)
}
