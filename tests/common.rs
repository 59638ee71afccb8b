use async_trait::async_trait;
use gumdrop::Options;
use httpmock::MockServer;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use gosling::browser::{Browser, BrowserSession};
use gosling::config::{Configuration, LoadTestConfiguration};
use gosling::phase::{PhaseRef, TestPhase};
use gosling::GoslingError;

/// Not all functions are used by all tests, so we enable allow(dead_code) to avoid
/// compiler warnings during testing.

/// The following options are configured by default, if not set to a custom value:
///  --host <mock-server>
///  --users 1
///  --ramp-up-time 0
///  --run-time 1
///  --think-time-min 0
///  --think-time-max 0
///  --no-report-file
#[allow(dead_code)]
pub fn build_configuration(server: &MockServer, custom: Vec<&str>) -> LoadTestConfiguration {
    // Start with an empty configuration.
    let mut configuration: Vec<&str> = vec![];
    // Declare server_url here no matter what, so its lifetime is sufficient when needed.
    let server_url = server.base_url();

    // Merge in all custom options first.
    configuration.extend_from_slice(&custom);

    for (option, default) in [
        ("--host", server_url.as_str()),
        ("--users", "1"),
        ("--ramp-up-time", "0"),
        ("--run-time", "1"),
        ("--think-time-min", "0"),
        ("--think-time-max", "0"),
    ] {
        if !configuration.contains(&option) {
            configuration.extend_from_slice(&[option, default]);
        }
    }
    if !configuration.contains(&"--report-dir") {
        configuration.push("--no-report-file");
    }

    // Parse these options to generate a LoadTestConfiguration.
    LoadTestConfiguration::parse_args_default(&configuration)
        .expect("failed to parse options and generate a configuration")
}

/// A validated configuration for tests driving the phase controller directly.
#[allow(dead_code)]
pub fn configuration(
    users: usize,
    ramp_up_time: Duration,
    run_time: Duration,
    think_time: Duration,
) -> Configuration {
    Configuration {
        users,
        ramp_up_time,
        run_time,
        think_time_min: think_time,
        think_time_max: think_time,
        pages: vec![
            Url::parse("http://scripted.test/").unwrap(),
            Url::parse("http://scripted.test/about.html").unwrap(),
        ],
        report_dir: None,
        ..Configuration::default()
    }
}

/// One page load seen by the scripted browser.
#[derive(Clone, Debug)]
pub struct Fetch {
    pub user: usize,
    pub url: Url,
    /// When the page load started, relative to when the browser was created.
    pub at: Duration,
    /// The phase when the page load started, if the browser observes one.
    pub phase: Option<TestPhase>,
    pub success: bool,
}

/// Everything the scripted browser did.
#[derive(Debug, Default)]
pub struct BrowserLog {
    /// Users that opened a session, and when.
    pub opened: Vec<(usize, Duration)>,
    /// Users that closed their session, and when.
    pub closed: Vec<(usize, Duration)>,
    pub fetches: Vec<Fetch>,
}

#[allow(dead_code)]
impl BrowserLog {
    pub fn fetches_by(&self, user: usize) -> Vec<&Fetch> {
        self.fetches.iter().filter(|f| f.user == user).collect()
    }
}

/// An in-memory browser: every page load takes `delay`, and succeeds unless the user
/// was told to fail.
#[derive(Clone)]
pub struct ScriptedBrowser {
    started: Instant,
    delay: Duration,
    failing_users: HashSet<usize>,
    session_failure: Option<usize>,
    phase: Arc<Mutex<Option<PhaseRef>>>,
    log: Arc<Mutex<BrowserLog>>,
}

#[allow(dead_code)]
impl ScriptedBrowser {
    pub fn new(delay: Duration) -> Self {
        ScriptedBrowser {
            started: Instant::now(),
            delay,
            failing_users: HashSet::new(),
            session_failure: None,
            phase: Arc::new(Mutex::new(None)),
            log: Arc::new(Mutex::new(BrowserLog::default())),
        }
    }

    /// Every page load by `user` fails.
    pub fn fail_user(mut self, user: usize) -> Self {
        self.failing_users.insert(user);
        self
    }

    /// `user` can't open a session.
    pub fn fail_session(mut self, user: usize) -> Self {
        self.session_failure = Some(user);
        self
    }

    /// Record the phase at the start of every page load.
    pub fn observe(&self, phase: PhaseRef) {
        *self.phase.lock().unwrap() = Some(phase);
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, BrowserLog> {
        self.log.lock().unwrap()
    }
}

#[async_trait]
impl Browser for ScriptedBrowser {
    async fn open_session(&self, user: usize) -> Result<Box<dyn BrowserSession>, GoslingError> {
        if self.session_failure == Some(user) {
            return Err(GoslingError::SessionFailed {
                user,
                detail: "scripted session failure".to_string(),
            });
        }
        self.log
            .lock()
            .unwrap()
            .opened
            .push((user, self.started.elapsed()));
        Ok(Box::new(ScriptedSession {
            user,
            browser: self.clone(),
        }))
    }
}

struct ScriptedSession {
    user: usize,
    browser: ScriptedBrowser,
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn navigate(&mut self, url: &Url) -> Result<(), String> {
        let success = !self.browser.failing_users.contains(&self.user);
        let phase = self
            .browser
            .phase
            .lock()
            .unwrap()
            .as_ref()
            .map(|phase| phase.current());
        self.browser.log.lock().unwrap().fetches.push(Fetch {
            user: self.user,
            url: url.clone(),
            at: self.browser.started.elapsed(),
            phase,
            success,
        });

        tokio::time::sleep(self.browser.delay).await;
        if success {
            Ok(())
        } else {
            Err(format!("scripted failure for user {}", self.user))
        }
    }

    async fn close(&mut self) {
        self.browser
            .log
            .lock()
            .unwrap()
            .closed
            .push((self.user, self.browser.started.elapsed()));
    }
}

/// Assert `actual` is `expected`, give or take timer resolution.
#[allow(dead_code)]
pub fn assert_about(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(10),
        "expected about {:?}, got {:?}",
        expected,
        actual
    );
}
