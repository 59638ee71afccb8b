//! Functions and structures related to configuring a Gosling load test.
//!
//! Gosling can be configured at run time by passing in the options and flags defined by
//! the [`LoadTestConfiguration`] structure, or programmatically with
//! [`LoadTestDefaultType::set_default`]. Once every option has been resolved, the
//! [`LoadTestConfiguration`] is validated into an immutable [`Configuration`] which is
//! handed by value to the load test.

use gumdrop::Options;
use serde::{Deserialize, Serialize};
use simplelog::*;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::browser::{Browser, HttpBrowser};
use crate::util;
use crate::{GoslingError, LoadTest};

/// The host used when neither `--host` nor a default host is configured.
pub const DEFAULT_HOST: &str = "http://localhost:3000";

/// The pages loaded when no `--page` is configured.
pub const DEFAULT_PAGES: [&str; 3] = ["/", "/admin.html", "/api-documentation.html"];

/// Runtime options available when launching a Gosling load test.
///
/// Durations accept integers (seconds) or any combination of `h`, `m`, `s` and `ms`,
/// for example `500ms`, `30s` or `1h30m`.
#[derive(Options, Debug, Clone, Default, Serialize, Deserialize)]
#[options(
    help = r#"Gosling simulates concurrent virtual users browsing a website, ramping them
up gradually, holding the load, then reporting response time percentiles.

The following runtime options are available:"#
)]
pub struct LoadTestConfiguration {
    /// Displays this help
    #[options(short = "h")]
    pub help: bool,
    /// Prints version information
    #[options(short = "V", help = "Prints version information\n")]
    pub version: bool,

    /// Defines host to load test (ie http://10.21.32.33)
    #[options(short = "H")]
    pub host: String,
    /// Adds a page to load, absolute or relative to host (repeatable)
    #[options(short = "p", meta = "PAGE")]
    pub page: Vec<String>,
    /// Sets maximum concurrent virtual users (default: 10)
    #[options(short = "u")]
    pub users: Option<usize>,
    /// Starts users evenly over (default: 60s)
    #[options(short = "s", meta = "TIME")]
    pub ramp_up_time: String,
    /// Holds full load after ramp-up for (default: 2m)
    #[options(short = "t", meta = "TIME")]
    pub run_time: String,
    /// Sets minimum pause between page loads (default: 3s)
    #[options(no_short, meta = "TIME")]
    pub think_time_min: String,
    /// Sets maximum pause between page loads (default: 6s)
    #[options(no_short, meta = "TIME")]
    pub think_time_max: String,
    /// Sets 95th percentile response time goal (default: 2s)
    #[options(no_short, meta = "TIME")]
    pub target_response_time: String,
    /// Shortens durations and users for a quick local run
    #[options(no_short, help = "Shortens durations and users for a quick local run\n\nBrowser:")]
    pub quick: bool,

    /// Selects how pages are loaded: http or chrome (default: http)
    #[options(no_short, meta = "BROWSER")]
    pub browser: String,
    /// Sets per page load timeout (default: 30s)
    #[options(no_short, meta = "TIME")]
    pub timeout: String,
    /// Waits after a page is ready, counted in its response time
    #[options(no_short, meta = "TIME")]
    pub settle_time: String,
    /// Verifies the first page responds before starting
    #[options(no_short, help = "Verifies the first page responds before starting\n\nReport:")]
    pub check_connection: bool,

    /// Sets directory report is saved in (default: .)
    #[options(no_short, meta = "DIR")]
    pub report_dir: String,
    /// Doesn't save the report to a file
    #[options(no_short, help = "Doesn't save the report to a file\n\nLogging:")]
    pub no_report_file: bool,

    /// Enables log file and sets name
    #[options(short = "G", meta = "NAME")]
    pub log_file: String,
    /// Increases log file level (-g, -gg, etc)
    #[options(short = "g", count)]
    pub log_level: u8,
    /// Decreases verbosity (-q, -qq, etc)
    #[options(count, short = "q")]
    pub quiet: u8,
    /// Increases verbosity (-v, -vv, etc)
    #[options(count, short = "v")]
    pub verbose: u8,
}

/// How virtual users load pages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrowserKind {
    /// A plain HTTP client per virtual user; a page is ready once its body is read.
    Http,
    /// A headless Chrome per virtual user; a page is ready once navigation completes.
    Chrome,
}
impl FromStr for BrowserKind {
    type Err = GoslingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(BrowserKind::Http),
            "chrome" => Ok(BrowserKind::Chrome),
            _ => Err(GoslingError::InvalidOption {
                option: "--browser".to_string(),
                value: s.to_string(),
                detail: "`--browser` must be set to `http` or `chrome`.".to_string(),
            }),
        }
    }
}
impl BrowserKind {
    /// Build the [`Browser`] used by every virtual user of a load test.
    pub fn build(&self, configuration: &Configuration) -> Result<Arc<dyn Browser>, GoslingError> {
        match self {
            BrowserKind::Http => Ok(Arc::new(HttpBrowser::new(
                configuration.timeout,
                configuration.settle_time,
            ))),
            #[cfg(feature = "chrome")]
            BrowserKind::Chrome => Ok(Arc::new(crate::browser::ChromeBrowser::new(
                configuration.timeout,
                configuration.settle_time,
            ))),
            #[cfg(not(feature = "chrome"))]
            BrowserKind::Chrome => Err(GoslingError::FeatureNotEnabled {
                feature: "chrome".to_string(),
                detail: "Load test must be recompiled with `--features chrome` to use `--browser chrome`.".to_string(),
            }),
        }
    }
}

/// The validated configuration of one load test.
///
/// Built once per run and never changed after the load test starts.
#[derive(Clone, Debug, PartialEq)]
pub struct Configuration {
    /// Maximum number of concurrent virtual users, at least 1.
    pub users: usize,
    /// Time over which virtual users are started.
    pub ramp_up_time: Duration,
    /// Time the full load is held after ramp-up.
    pub run_time: Duration,
    /// Shortest pause between two page loads.
    pub think_time_min: Duration,
    /// Longest pause between two page loads, never less than `think_time_min`.
    pub think_time_max: Duration,
    /// The 95th percentile response time goal.
    pub target_response_time: Duration,
    /// Pages virtual users pick from, never empty.
    pub pages: Vec<Url>,
    /// How virtual users load pages.
    pub browser: BrowserKind,
    /// Per page load timeout, enforced by the browser.
    pub timeout: Duration,
    /// Pause after a page is ready, included in the measured response time.
    pub settle_time: Duration,
    /// Verify the first page responds before starting.
    pub check_connection: bool,
    /// Where to save the report, `None` to not save it.
    pub report_dir: Option<PathBuf>,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            users: 10,
            ramp_up_time: Duration::from_secs(60),
            run_time: Duration::from_secs(120),
            think_time_min: Duration::from_millis(3_000),
            think_time_max: Duration::from_millis(6_000),
            target_response_time: Duration::from_millis(2_000),
            pages: DEFAULT_PAGES
                .iter()
                .filter_map(|page| Url::parse(DEFAULT_HOST).and_then(|host| host.join(page)).ok())
                .collect(),
            browser: BrowserKind::Http,
            timeout: Duration::from_secs(30),
            settle_time: Duration::ZERO,
            check_connection: false,
            report_dir: Some(PathBuf::from(".")),
        }
    }
}

impl Configuration {
    /// When ramp-up ends and when the load test completes, for a load test started at
    /// `started`. Fails if either is too far in the future to be scheduled.
    pub(crate) fn phase_deadlines(&self, started: Instant) -> Result<(Instant, Instant), GoslingError> {
        let too_long = |option: &str, value: Duration| GoslingError::InvalidOption {
            option: format!("`configuration.{}`", option),
            value: format!("{:?}", value),
            detail: format!("`configuration.{}` is too long to be scheduled.", option),
        };
        let sustained = started
            .checked_add(self.ramp_up_time)
            .ok_or_else(|| too_long("ramp_up_time", self.ramp_up_time))?;
        let completed = sustained
            .checked_add(self.run_time)
            .ok_or_else(|| too_long("run_time", self.run_time))?;
        Ok((sustained, completed))
    }

    /// A shorter variant for quick local runs: 2 users, 10 seconds of ramp-up, 20 seconds
    /// of sustained load, and half to one second of think time.
    pub fn quick() -> Self {
        Configuration {
            users: 2,
            ramp_up_time: Duration::from_secs(10),
            run_time: Duration::from_secs(20),
            think_time_min: Duration::from_millis(500),
            think_time_max: Duration::from_millis(1_000),
            ..Configuration::default()
        }
    }
}

/// Optional default values for run-time options.
///
/// These custom defaults can be configured using [`LoadTestDefaultType::set_default()`].
#[derive(Clone, Debug, Default)]
pub(crate) struct LoadTestDefaults {
    /// An optional default host to run this load test against.
    pub host: Option<String>,
    /// Optional default pages, appended in order.
    pub pages: Vec<String>,
    /// An optional default number of users to simulate.
    pub users: Option<usize>,
    /// An optional default ramp-up time.
    pub ramp_up_time: Option<String>,
    /// An optional default sustained run time.
    pub run_time: Option<String>,
    /// An optional default minimum think time.
    pub think_time_min: Option<String>,
    /// An optional default maximum think time.
    pub think_time_max: Option<String>,
    /// An optional default response time goal.
    pub target_response_time: Option<String>,
    /// An optional default for the quick preset.
    pub quick: Option<bool>,
    /// An optional default browser.
    pub browser: Option<String>,
    /// An optional default page load timeout.
    pub timeout: Option<String>,
    /// An optional default settle time.
    pub settle_time: Option<String>,
    /// An optional default for checking the connection before starting.
    pub check_connection: Option<bool>,
    /// An optional default report directory.
    pub report_dir: Option<String>,
    /// An optional default for not saving the report.
    pub no_report_file: Option<bool>,
    /// An optional default for the log file name.
    pub log_file: Option<String>,
    /// An optional default log level.
    pub log_level: Option<u8>,
    /// An optional default value for quiet level.
    pub quiet: Option<u8>,
    /// An optional default value for verbosity level.
    pub verbose: Option<u8>,
}

/// Defines all [`LoadTestConfiguration`] options that can be programmatically
/// configured with a custom default.
#[derive(Debug)]
pub enum LoadTestDefault {
    /// An optional default host to run this load test against.
    Host,
    /// Adds a default page, may be set multiple times.
    Page,
    /// An optional default number of users to simulate.
    Users,
    /// An optional default ramp-up time.
    RampUpTime,
    /// An optional default sustained run time.
    RunTime,
    /// An optional default minimum think time.
    ThinkTimeMin,
    /// An optional default maximum think time.
    ThinkTimeMax,
    /// An optional default response time goal.
    TargetResponseTime,
    /// An optional default for the quick preset.
    Quick,
    /// An optional default browser.
    Browser,
    /// An optional default page load timeout.
    Timeout,
    /// An optional default settle time.
    SettleTime,
    /// An optional default for checking the connection before starting.
    CheckConnection,
    /// An optional default report directory.
    ReportDir,
    /// An optional default for not saving the report.
    NoReportFile,
    /// An optional default for the log file name.
    LogFile,
    /// An optional default log level.
    LogLevel,
    /// An optional default value for quiet level.
    Quiet,
    /// An optional default value for verbosity level.
    Verbose,
}

/// Most run-time options can be programmatically configured with custom defaults.
///
/// Durations and names are set with a [`&str`], counts and levels with a [`usize`],
/// and flags with a [`bool`]. Setting a default with the wrong type returns
/// [`GoslingError::InvalidOption`].
///
/// # Example
/// ```rust
/// use gosling::prelude::*;
///
/// fn main() -> Result<(), GoslingError> {
///     LoadTest::initialize_with_config(LoadTestConfiguration::default())?
///         .set_default(LoadTestDefault::Host, "http://local.dev")?
///         .set_default(LoadTestDefault::Users, 20)?
///         .set_default(LoadTestDefault::NoReportFile, true)?;
///
///     Ok(())
/// }
/// ```
pub trait LoadTestDefaultType<T> {
    /// Sets a custom default for the given option.
    fn set_default(self, key: LoadTestDefault, value: T) -> Result<Box<Self>, GoslingError>;
}
impl LoadTestDefaultType<&str> for LoadTest {
    /// Sets [`LoadTestDefault`] to a [`&str`] value.
    fn set_default(mut self, key: LoadTestDefault, value: &str) -> Result<Box<Self>, GoslingError> {
        match key {
            LoadTestDefault::Host => {
                self.defaults.host = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            LoadTestDefault::Page => self.defaults.pages.push(value.to_string()),
            LoadTestDefault::RampUpTime => self.defaults.ramp_up_time = Some(value.to_string()),
            LoadTestDefault::RunTime => self.defaults.run_time = Some(value.to_string()),
            LoadTestDefault::ThinkTimeMin => {
                self.defaults.think_time_min = Some(value.to_string())
            }
            LoadTestDefault::ThinkTimeMax => {
                self.defaults.think_time_max = Some(value.to_string())
            }
            LoadTestDefault::TargetResponseTime => {
                self.defaults.target_response_time = Some(value.to_string())
            }
            LoadTestDefault::Browser => self.defaults.browser = Some(value.to_string()),
            LoadTestDefault::Timeout => self.defaults.timeout = Some(value.to_string()),
            LoadTestDefault::SettleTime => self.defaults.settle_time = Some(value.to_string()),
            LoadTestDefault::ReportDir => self.defaults.report_dir = Some(value.to_string()),
            LoadTestDefault::LogFile => self.defaults.log_file = Some(value.to_string()),
            // Otherwise display a helpful and explicit error.
            LoadTestDefault::Users
            | LoadTestDefault::LogLevel
            | LoadTestDefault::Quiet
            | LoadTestDefault::Verbose => {
                return Err(wrong_default_type(key, value, "usize", "&str"))
            }
            LoadTestDefault::Quick
            | LoadTestDefault::CheckConnection
            | LoadTestDefault::NoReportFile => {
                return Err(wrong_default_type(key, value, "bool", "&str"))
            }
        }
        Ok(Box::new(self))
    }
}
impl LoadTestDefaultType<usize> for LoadTest {
    /// Sets [`LoadTestDefault`] to a [`usize`] value.
    fn set_default(mut self, key: LoadTestDefault, value: usize) -> Result<Box<Self>, GoslingError> {
        let level = u8::try_from(value).unwrap_or(u8::MAX);
        match key {
            LoadTestDefault::Users => self.defaults.users = Some(value),
            LoadTestDefault::LogLevel => self.defaults.log_level = Some(level),
            LoadTestDefault::Quiet => self.defaults.quiet = Some(level),
            LoadTestDefault::Verbose => self.defaults.verbose = Some(level),
            // Otherwise display a helpful and explicit error.
            LoadTestDefault::Host
            | LoadTestDefault::Page
            | LoadTestDefault::RampUpTime
            | LoadTestDefault::RunTime
            | LoadTestDefault::ThinkTimeMin
            | LoadTestDefault::ThinkTimeMax
            | LoadTestDefault::TargetResponseTime
            | LoadTestDefault::Browser
            | LoadTestDefault::Timeout
            | LoadTestDefault::SettleTime
            | LoadTestDefault::ReportDir
            | LoadTestDefault::LogFile => {
                return Err(wrong_default_type(key, value, "&str", "usize"))
            }
            LoadTestDefault::Quick
            | LoadTestDefault::CheckConnection
            | LoadTestDefault::NoReportFile => {
                return Err(wrong_default_type(key, value, "bool", "usize"))
            }
        }
        Ok(Box::new(self))
    }
}
impl LoadTestDefaultType<bool> for LoadTest {
    /// Sets [`LoadTestDefault`] to a [`bool`] value.
    fn set_default(mut self, key: LoadTestDefault, value: bool) -> Result<Box<Self>, GoslingError> {
        match key {
            LoadTestDefault::Quick => self.defaults.quick = Some(value),
            LoadTestDefault::CheckConnection => self.defaults.check_connection = Some(value),
            LoadTestDefault::NoReportFile => self.defaults.no_report_file = Some(value),
            // Otherwise display a helpful and explicit error.
            LoadTestDefault::Users
            | LoadTestDefault::LogLevel
            | LoadTestDefault::Quiet
            | LoadTestDefault::Verbose => {
                return Err(wrong_default_type(key, value, "usize", "bool"))
            }
            LoadTestDefault::Host
            | LoadTestDefault::Page
            | LoadTestDefault::RampUpTime
            | LoadTestDefault::RunTime
            | LoadTestDefault::ThinkTimeMin
            | LoadTestDefault::ThinkTimeMax
            | LoadTestDefault::TargetResponseTime
            | LoadTestDefault::Browser
            | LoadTestDefault::Timeout
            | LoadTestDefault::SettleTime
            | LoadTestDefault::ReportDir
            | LoadTestDefault::LogFile => {
                return Err(wrong_default_type(key, value, "&str", "bool"))
            }
        }
        Ok(Box::new(self))
    }
}

fn wrong_default_type<T: std::fmt::Display>(
    key: LoadTestDefault,
    value: T,
    expected: &str,
    received: &str,
) -> GoslingError {
    GoslingError::InvalidOption {
        option: format!("LoadTestDefault::{:?}", key),
        value: value.to_string(),
        detail: format!(
            "set_default(LoadTestDefault::{:?}, {}) expected {} value, received {}",
            key, value, expected, received
        ),
    }
}

/// Used internally to configure [`LoadTestConfiguration`] values based on precedence rules.
#[derive(Debug, Clone)]
struct ConfigValue<'a, T> {
    /// The optional value to set.
    value: Option<T>,
    /// Skip this value if true.
    filter: bool,
    /// An optional INFO level log message.
    message: &'a str,
}

/// Returns the first value that is set and not filtered.
fn first_value<T: std::fmt::Debug>(values: Vec<ConfigValue<T>>) -> Option<T> {
    for value in values {
        if let Some(v) = value.value {
            if value.filter {
                continue;
            }
            if !value.message.is_empty() {
                info!("{} = {:?}", value.message, v)
            }
            return Some(v);
        }
    }
    None
}

// Resolve a string option: command line first, then custom default.
fn string_value(option: &str, default: &Option<String>, message: &str) -> String {
    first_value(vec![
        ConfigValue {
            value: Some(option.to_string()),
            filter: option.is_empty(),
            message,
        },
        ConfigValue {
            value: default.clone(),
            filter: default.is_none(),
            message,
        },
    ])
    .unwrap_or_default()
}

// Resolve a count option: command line first, then custom default.
fn count_value(option: u8, default: Option<u8>) -> u8 {
    first_value(vec![
        ConfigValue {
            value: Some(option),
            filter: option == 0,
            message: "",
        },
        ConfigValue {
            value: default,
            filter: default.is_none(),
            message: "",
        },
    ])
    .unwrap_or(0)
}

// Resolve a flag: set on the command line, or by custom default.
fn flag_value(option: bool, default: Option<bool>, message: &str) -> bool {
    first_value(vec![
        ConfigValue {
            value: Some(true),
            filter: !option,
            message,
        },
        ConfigValue {
            value: default,
            filter: default.is_none(),
            message,
        },
    ])
    .unwrap_or(false)
}

impl LoadTestConfiguration {
    /// Implement precedence rules for all [`LoadTestConfiguration`] values: an option set
    /// on the command line wins over a custom default. Built-in defaults and the quick
    /// preset are applied later, by [`LoadTestConfiguration::validate`].
    pub(crate) fn configure(&mut self, defaults: &LoadTestDefaults) {
        self.quiet = count_value(self.quiet, defaults.quiet);
        self.verbose = count_value(self.verbose, defaults.verbose);
        self.log_level = count_value(self.log_level, defaults.log_level);
        self.log_file = string_value(&self.log_file, &defaults.log_file, "");

        self.quick = flag_value(self.quick, defaults.quick, "quick");
        self.host = string_value(&self.host, &defaults.host, "host");
        if self.page.is_empty() {
            self.page = defaults.pages.clone();
        }
        self.users = first_value(vec![
            ConfigValue {
                value: self.users,
                filter: self.users.is_none(),
                message: "users",
            },
            ConfigValue {
                value: defaults.users,
                filter: defaults.users.is_none(),
                message: "users",
            },
        ]);
        self.ramp_up_time = string_value(&self.ramp_up_time, &defaults.ramp_up_time, "ramp_up_time");
        self.run_time = string_value(&self.run_time, &defaults.run_time, "run_time");
        self.think_time_min =
            string_value(&self.think_time_min, &defaults.think_time_min, "think_time_min");
        self.think_time_max =
            string_value(&self.think_time_max, &defaults.think_time_max, "think_time_max");
        self.target_response_time = string_value(
            &self.target_response_time,
            &defaults.target_response_time,
            "target_response_time",
        );
        self.browser = string_value(&self.browser, &defaults.browser, "browser");
        self.timeout = string_value(&self.timeout, &defaults.timeout, "timeout");
        self.settle_time = string_value(&self.settle_time, &defaults.settle_time, "settle_time");
        self.check_connection =
            flag_value(self.check_connection, defaults.check_connection, "check_connection");
        self.report_dir = string_value(&self.report_dir, &defaults.report_dir, "report_dir");
        self.no_report_file =
            flag_value(self.no_report_file, defaults.no_report_file, "no_report_file");
    }

    /// Validate configured [`LoadTestConfiguration`] values, filling in anything not set
    /// from the quick preset (with `--quick`) or the built-in defaults.
    pub(crate) fn validate(&self) -> Result<Configuration, GoslingError> {
        // Can't set both --verbose and --quiet.
        if self.verbose > 0 && self.quiet > 0 {
            return Err(GoslingError::InvalidOption {
                option: "`configuration.verbose`".to_string(),
                value: self.verbose.to_string(),
                detail: "`configuration.verbose` can not be set with `configuration.quiet`."
                    .to_string(),
            });
        }

        let base = if self.quick {
            Configuration::quick()
        } else {
            Configuration::default()
        };

        let users = self.users.unwrap_or(base.users);
        if users == 0 {
            return Err(GoslingError::InvalidOption {
                option: "`configuration.users`".to_string(),
                value: users.to_string(),
                detail: "`configuration.users` must be set to at least 1.".to_string(),
            });
        }

        let ramp_up_time = duration_option("ramp_up_time", &self.ramp_up_time, base.ramp_up_time)?;
        let run_time = duration_option("run_time", &self.run_time, base.run_time)?;
        let think_time_min =
            duration_option("think_time_min", &self.think_time_min, base.think_time_min)?;
        let think_time_max =
            duration_option("think_time_max", &self.think_time_max, base.think_time_max)?;
        if think_time_min > think_time_max {
            return Err(GoslingError::InvalidThinkTime {
                min: think_time_min,
                max: think_time_max,
                detail: "`configuration.think_time_min` can not be greater than `configuration.think_time_max`.".to_string(),
            });
        }
        let target_response_time = duration_option(
            "target_response_time",
            &self.target_response_time,
            base.target_response_time,
        )?;

        let timeout = duration_option("timeout", &self.timeout, base.timeout)?;
        if timeout.is_zero() {
            return Err(GoslingError::InvalidOption {
                option: "`configuration.timeout`".to_string(),
                value: self.timeout.to_string(),
                detail: "`configuration.timeout` must be greater than 0.".to_string(),
            });
        }
        let settle_time = duration_option("settle_time", &self.settle_time, base.settle_time)?;

        let browser = if self.browser.is_empty() {
            base.browser
        } else {
            self.browser.parse::<BrowserKind>()?
        };

        let pages = if self.page.is_empty() && self.host.is_empty() {
            base.pages
        } else {
            let host = if self.host.is_empty() {
                DEFAULT_HOST
            } else {
                self.host.as_str()
            };
            let host = util::parse_host(host)?;
            let mut pages = Vec::new();
            if self.page.is_empty() {
                for page in DEFAULT_PAGES {
                    pages.push(util::parse_page(&host, page)?);
                }
            } else {
                for page in &self.page {
                    pages.push(util::parse_page(&host, page)?);
                }
            }
            pages
        };
        if pages.is_empty() {
            return Err(GoslingError::NoPages {
                detail: "At least one page must be defined.".to_string(),
            });
        }

        let report_dir = if self.no_report_file {
            None
        } else if self.report_dir.is_empty() {
            base.report_dir
        } else {
            Some(PathBuf::from(&self.report_dir))
        };

        let configuration = Configuration {
            users,
            ramp_up_time,
            run_time,
            think_time_min,
            think_time_max,
            target_response_time,
            pages,
            browser,
            timeout,
            settle_time,
            check_connection: self.check_connection,
            report_dir,
        };
        configuration.phase_deadlines(Instant::now())?;
        Ok(configuration)
    }

    /// Optionally initialize the logger which writes to standard out and/or to a
    /// configurable log file.
    pub(crate) fn initialize_logger(&self) {
        // Configure debug output level.
        let debug_level = match self.verbose {
            0 => match self.quiet {
                0 => LevelFilter::Info,
                _ => LevelFilter::Warn,
            },
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Configure log file level.
        let log_level = match self.log_level {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        let mut loggers: Vec<Box<dyn SharedLogger>> =
            vec![SimpleLogger::new(debug_level, Config::default())];

        // Open the log file if configured.
        if !self.log_file.is_empty() {
            match std::fs::File::create(&self.log_file) {
                Ok(file) => loggers.push(WriteLogger::new(log_level, Config::default(), file)),
                Err(e) => eprintln!("failed to create log file {}: {}", self.log_file, e),
            }
        }

        match CombinedLogger::init(loggers) {
            Ok(_) => (),
            Err(e) => {
                info!("failed to initialize CombinedLogger: {}", e);
            }
        }
        if !self.log_file.is_empty() {
            info!("Writing to log file: {}", self.log_file);
        }

        info!("Output verbosity level: {}", debug_level);
        info!("Logfile verbosity level: {}", log_level);
    }
}

// Parse a duration option, falling back to `default` if it isn't set.
fn duration_option(option: &str, value: &str, default: Duration) -> Result<Duration, GoslingError> {
    if value.is_empty() {
        return Ok(default);
    }
    util::parse_duration(value).ok_or_else(|| GoslingError::InvalidOption {
        option: format!("`configuration.{}`", option),
        value: value.to_string(),
        detail: format!(
            "`configuration.{}` must be a duration such as 500ms, 30s, 2m or 1h30m.",
            option
        ),
    })
}
