//! # Gosling
//!
//! Gosling simulates many concurrent virtual users browsing a website, and reports how
//! quickly the site answered them.
//!
//! A load test moves through three phases:
//!
//! - **ramp-up**: virtual users are started one at a time, evenly spread over the
//!   configured ramp-up time;
//! - **sustained**: all virtual users keep browsing for the configured run time;
//! - **completed**: virtual users finish their current page load and think time, then
//!   exit. Once the last one has stopped a report is printed and saved to disk.
//!
//! Each virtual user repeatedly picks one of the configured pages at random, loads it,
//! records how long the page took to become ready, then "thinks" for a random time
//! before loading the next page.
//!
//! ## Running a load test
//!
//! The bundled binary exposes every option on the command line:
//!
//! ```bash
//! $ gosling --host http://localhost:3000 -p / -p /admin.html -u 10 -s 1m -t 2m
//! ```
//!
//! Pass `--quick` for a short run with 2 users, 10 seconds of ramp-up and 20 seconds
//! of sustained load.
//!
//! ## Embedding
//!
//! Load tests can also be configured programmatically. Custom defaults are applied
//! unless overridden on the command line:
//!
//! ```rust,no_run
//! use gosling::prelude::*;
//!
//! fn main() -> Result<(), GoslingError> {
//!     let _result = LoadTest::initialize()?
//!         .set_default(LoadTestDefault::Host, "http://localhost:3000")?
//!         .set_default(LoadTestDefault::Page, "/")?
//!         .set_default(LoadTestDefault::Page, "/about.html")?
//!         .set_default(LoadTestDefault::Users, 4)?
//!         .set_default(LoadTestDefault::RampUpTime, "4s")?
//!         .set_default(LoadTestDefault::RunTime, "30s")?
//!         .execute()?;
//!
//!     Ok(())
//! }
//! ```
//!
//! Pages are loaded through a [`Browser`](./browser/trait.Browser.html). By default
//! every virtual user gets its own HTTP client with its own cookie jar. Compile with
//! `--features chrome` and pass `--browser chrome` to drive a real headless Chrome per
//! virtual user instead, or provide your own implementation with
//! [`LoadTest::set_browser`].

#[macro_use]
extern crate log;

pub mod browser;
pub mod config;
pub mod metrics;
pub mod phase;
pub mod prelude;
pub mod report;
pub mod schedule;
mod user;
pub mod util;

use std::path::PathBuf;
use std::sync::Arc;
use std::{fmt, io, time};

use gumdrop::Options;
use tokio::runtime::Runtime;
use tokio::sync::Notify;

use crate::browser::Browser;
use crate::config::{Configuration, LoadTestConfiguration, LoadTestDefaults};
use crate::metrics::{MetricsAggregate, Stats};
use crate::phase::PhaseController;

/// An enumeration of all errors a [`LoadTest`] can return.
#[derive(Debug)]
pub enum GoslingError {
    /// Wraps a [`std::io::Error`](https://doc.rust-lang.org/std/io/struct.Error.html).
    Io(io::Error),
    /// Wraps a [`reqwest::Error`](https://docs.rs/reqwest/*/reqwest/struct.Error.html).
    Reqwest(reqwest::Error),
    /// Wraps a ['tokio::task::JoinError'](https://docs.rs/tokio/*/tokio/task/struct.JoinError.html).
    TokioJoin(tokio::task::JoinError),
    /// Failed attempt to use code that requires a compile-time feature be enabled.
    FeatureNotEnabled {
        /// The missing compile-time feature.
        feature: String,
        /// An optional explanation of the error.
        detail: String,
    },
    /// Invalid option or value specified, may only be invalid in context.
    InvalidOption {
        /// The invalid option that caused this error, may be only invalid in context.
        option: String,
        /// The invalid value that caused this error, may be only invalid in context.
        value: String,
        /// An optional explanation of the error.
        detail: String,
    },
    /// Invalid think time specified.
    InvalidThinkTime {
        /// The specified minimum think time.
        min: time::Duration,
        /// The specified maximum think time.
        max: time::Duration,
        /// An optional explanation of the error.
        detail: String,
    },
    /// Failed to turn a configured page into an absolute URL.
    InvalidPage {
        /// The page that couldn't be parsed.
        page: String,
        /// An optional explanation of the error.
        detail: String,
        /// Wraps a [`url::ParseError`](https://docs.rs/url/*/url/enum.ParseError.html).
        parse_error: Option<url::ParseError>,
    },
    /// No pages were configured for the virtual users to load.
    NoPages {
        /// An optional explanation of the error.
        detail: String,
    },
    /// A virtual user could not open its browsing session.
    SessionFailed {
        /// The virtual user that failed to start.
        user: usize,
        /// The reason the session couldn't be opened.
        detail: String,
    },
}

/// Implement a helper to provide a text description of all possible types of errors.
impl GoslingError {
    fn describe(&self) -> &str {
        match *self {
            GoslingError::Io(_) => "io::Error",
            GoslingError::Reqwest(_) => "reqwest::Error",
            GoslingError::TokioJoin(_) => "tokio::task::JoinError",
            GoslingError::FeatureNotEnabled { .. } => "required compile-time feature not enabled",
            GoslingError::InvalidOption { .. } => "invalid option or value specified",
            GoslingError::InvalidThinkTime { .. } => "invalid think time specified",
            GoslingError::InvalidPage { .. } => "invalid page specified",
            GoslingError::NoPages { .. } => "no pages defined",
            GoslingError::SessionFailed { .. } => "failed to start virtual user",
        }
    }
}

impl fmt::Display for GoslingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            GoslingError::Io(ref source) => {
                write!(f, "GoslingError: {} ({})", self.describe(), source)
            }
            GoslingError::Reqwest(ref source) => {
                write!(f, "GoslingError: {} ({})", self.describe(), source)
            }
            GoslingError::TokioJoin(ref source) => {
                write!(f, "GoslingError: {} ({})", self.describe(), source)
            }
            GoslingError::FeatureNotEnabled {
                ref feature,
                ref detail,
            } => write!(
                f,
                "GoslingError: {} ({}): {}",
                self.describe(),
                feature,
                detail
            ),
            GoslingError::InvalidOption {
                ref option,
                ref value,
                ref detail,
            } => write!(
                f,
                "GoslingError: {} ({} = {:?}): {}",
                self.describe(),
                option,
                value,
                detail
            ),
            GoslingError::InvalidPage {
                ref page,
                ref detail,
                ..
            } => write!(f, "GoslingError: {} ({}): {}", self.describe(), page, detail),
            GoslingError::SessionFailed {
                user, ref detail, ..
            } => write!(
                f,
                "GoslingError: {} (user {}): {}",
                self.describe(),
                user,
                detail
            ),
            GoslingError::InvalidThinkTime { ref detail, .. }
            | GoslingError::NoPages { ref detail } => {
                write!(f, "GoslingError: {}: {}", self.describe(), detail)
            }
        }
    }
}

// Define the lower level source of this error, if any.
impl std::error::Error for GoslingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            GoslingError::Io(ref source) => Some(source),
            GoslingError::Reqwest(ref source) => Some(source),
            GoslingError::TokioJoin(ref source) => Some(source),
            GoslingError::InvalidPage {
                parse_error: Some(ref parse_error),
                ..
            } => Some(parse_error),
            _ => None,
        }
    }
}

/// Auto-convert Reqwest errors.
impl From<reqwest::Error> for GoslingError {
    fn from(err: reqwest::Error) -> GoslingError {
        GoslingError::Reqwest(err)
    }
}

/// Auto-convert IO errors.
impl From<io::Error> for GoslingError {
    fn from(err: io::Error) -> GoslingError {
        GoslingError::Io(err)
    }
}

/// Auto-convert TokioJoin errors.
impl From<tokio::task::JoinError> for GoslingError {
    fn from(err: tokio::task::JoinError) -> GoslingError {
        GoslingError::TokioJoin(err)
    }
}

/// Everything known about a finished load test.
#[derive(Debug, Clone)]
pub struct LoadTestResult {
    /// Every request recorded by every virtual user.
    pub metrics: MetricsAggregate,
    /// Response time statistics, `None` if no request succeeded.
    pub stats: Option<Stats>,
    /// How long the load test ran, from the first user launch until the last user stopped.
    pub elapsed: time::Duration,
    /// The formatted report, as printed.
    pub report: String,
    /// Where the report was saved, if it was saved.
    pub report_path: Option<PathBuf>,
}

/// A single load test: options, custom defaults, and the browser used to load pages.
pub struct LoadTest {
    /// Options set when launching the load test.
    configuration: LoadTestConfiguration,
    /// Optional default values for run-time options.
    defaults: LoadTestDefaults,
    /// Replaces the browser selected with `--browser` if set.
    browser: Option<Arc<dyn Browser>>,
}
impl LoadTest {
    /// Load configuration from the command line and initialize a [`LoadTest`].
    ///
    /// # Example
    /// ```rust,no_run
    /// use gosling::prelude::*;
    ///
    /// let mut load_test = LoadTest::initialize();
    /// ```
    pub fn initialize() -> Result<LoadTest, GoslingError> {
        Ok(LoadTest {
            configuration: LoadTestConfiguration::parse_args_default_or_exit(),
            defaults: LoadTestDefaults::default(),
            browser: None,
        })
    }

    /// Initialize a [`LoadTest`] with an already loaded configuration.
    ///
    /// This is generally used by tests, or by programs that parse their own options.
    ///
    /// # Example
    /// ```rust
    /// use gosling::prelude::*;
    /// use gumdrop::Options;
    ///
    /// let configuration = LoadTestConfiguration::parse_args_default(&["--quick"]).unwrap();
    /// let load_test = LoadTest::initialize_with_config(configuration);
    /// ```
    pub fn initialize_with_config(
        configuration: LoadTestConfiguration,
    ) -> Result<LoadTest, GoslingError> {
        Ok(LoadTest {
            configuration,
            defaults: LoadTestDefaults::default(),
            browser: None,
        })
    }

    /// Load pages with a custom [`Browser`] instead of the one selected by `--browser`.
    pub fn set_browser(mut self, browser: Arc<dyn Browser>) -> Self {
        self.browser = Some(browser);
        self
    }

    /// Apply precedence rules and validate all options, returning the [`Configuration`]
    /// this load test will run with.
    pub fn configuration(&mut self) -> Result<Configuration, GoslingError> {
        self.configuration.configure(&self.defaults);
        self.configuration.validate()
    }

    /// Execute the [`LoadTest`], blocking until it completes.
    ///
    /// Logging is initialized, a multi-threaded tokio runtime is started, the load test
    /// runs through all of its phases, and the final report is printed and saved.
    pub fn execute(mut self) -> Result<LoadTestResult, GoslingError> {
        // If version flag is set, display package name and version and exit.
        if self.configuration.version {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            std::process::exit(0);
        }

        let configuration = self.configuration()?;
        self.configuration.initialize_logger();

        let rt = Runtime::new()?;
        rt.block_on(self.start(configuration))
    }

    // Run the load test on an existing runtime, then report.
    async fn start(self, configuration: Configuration) -> Result<LoadTestResult, GoslingError> {
        info!(
            "configuration: up to {} virtual users, ramp-up {:?}, sustained load {:?}",
            configuration.users, configuration.ramp_up_time, configuration.run_time
        );

        let browser = match self.browser {
            Some(browser) => browser,
            None => configuration.browser.build(&configuration)?,
        };

        if configuration.check_connection {
            util::check_connection(&configuration.pages[0], configuration.timeout).await?;
        }

        // The first ctrl-c completes the load test early, still producing a report.
        let canceled = Arc::new(Notify::new());
        let ctrlc_handler = util::setup_ctrlc_handler(&canceled);

        let started = time::Instant::now();
        let mut controller =
            PhaseController::new(configuration.clone(), browser).with_cancel(canceled);
        let metrics = controller.run().await;
        let elapsed = started.elapsed();
        ctrlc_handler.abort();
        let metrics = metrics?;

        let stats = metrics::summarize(&metrics.response_times);
        let report = report::generate(&metrics, &configuration, elapsed);
        println!("{}", report);

        let report_path = match configuration.report_dir.as_ref() {
            Some(report_dir) => {
                let path = report::write_report(report_dir, &report, chrono::Utc::now()).await?;
                info!("performance report saved to: {}", path.display());
                Some(path)
            }
            None => None,
        };

        Ok(LoadTestResult {
            metrics,
            stats,
            elapsed,
            report,
            report_path,
        })
    }

    /// Run one load test with an already validated [`Configuration`], returning all
    /// recorded metrics once every virtual user has stopped.
    ///
    /// Unlike [`LoadTest::execute`] this neither initializes logging nor writes a report,
    /// and it runs on the caller's tokio runtime.
    pub async fn run(
        configuration: Configuration,
        browser: Arc<dyn Browser>,
    ) -> Result<MetricsAggregate, GoslingError> {
        PhaseController::new(configuration, browser).run().await
    }
}
