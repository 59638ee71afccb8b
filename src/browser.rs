//! Loading pages on behalf of virtual users.
//!
//! A [`Browser`] opens one [`BrowserSession`] per virtual user. The session is held for
//! as long as the virtual user runs and is closed when it stops, whether it completed
//! normally or not.
//!
//! Two browsers are provided: [`HttpBrowser`], where every session is its own HTTP client
//! with its own cookies, and `ChromeBrowser` (requires the `chrome` feature), where every
//! session is a real headless Chrome.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::metrics::Metric;
use crate::GoslingError;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// The outcome of loading one page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageLoad {
    /// Whether the page became ready.
    pub success: bool,
    /// Milliseconds from issuing the request until the page was ready, or until it failed.
    pub elapsed_ms: u64,
    /// Why the page failed to load.
    pub error: Option<String>,
}
impl PageLoad {
    pub fn success(elapsed_ms: u64) -> Self {
        PageLoad {
            success: true,
            elapsed_ms,
            error: None,
        }
    }

    pub fn failure(elapsed_ms: u64, error: impl Into<String>) -> Self {
        PageLoad {
            success: false,
            elapsed_ms,
            error: Some(error.into()),
        }
    }
}

impl From<PageLoad> for Metric {
    fn from(load: PageLoad) -> Self {
        Metric {
            response_time_ms: load.elapsed_ms,
            success: load.success,
            error: load.error,
        }
    }
}

/// Opens browsing sessions for virtual users.
///
/// # Example
/// ```rust
/// use async_trait::async_trait;
/// use gosling::browser::{Browser, BrowserSession};
/// use gosling::GoslingError;
/// use url::Url;
///
/// // Every page loads instantly.
/// struct Instantly;
/// struct InstantSession;
///
/// #[async_trait]
/// impl Browser for Instantly {
///     async fn open_session(&self, _user: usize) -> Result<Box<dyn BrowserSession>, GoslingError> {
///         Ok(Box::new(InstantSession))
///     }
/// }
///
/// #[async_trait]
/// impl BrowserSession for InstantSession {
///     async fn navigate(&mut self, _url: &Url) -> Result<(), String> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Browser: Send + Sync {
    /// Open the session used by virtual user `user`.
    ///
    /// Failing to open a session aborts the load test.
    async fn open_session(&self, user: usize) -> Result<Box<dyn BrowserSession>, GoslingError>;
}

/// One virtual user's browsing session.
#[async_trait]
pub trait BrowserSession: Send {
    /// Load `url`, returning once the page is ready or has failed.
    async fn navigate(&mut self, url: &Url) -> Result<(), String>;

    /// Load `url` and time it.
    async fn fetch(&mut self, url: &Url) -> PageLoad {
        let started = Instant::now();
        let result = self.navigate(url).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(()) => PageLoad::success(elapsed_ms),
            Err(error) => PageLoad::failure(elapsed_ms, error),
        }
    }

    /// Release everything held by this session.
    async fn close(&mut self) {}
}

/// Loads pages with a plain HTTP client.
///
/// A page is ready once its whole body has been received. Any status other than 2xx is
/// a failure.
#[derive(Clone, Debug)]
pub struct HttpBrowser {
    timeout: Duration,
    settle_time: Duration,
}
impl HttpBrowser {
    pub fn new(timeout: Duration, settle_time: Duration) -> Self {
        HttpBrowser {
            timeout,
            settle_time,
        }
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn open_session(&self, user: usize) -> Result<Box<dyn BrowserSession>, GoslingError> {
        let builder = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(self.timeout);
        // Each virtual user keeps its own cookies.
        #[cfg(feature = "cookies")]
        let builder = builder.cookie_store(true);

        let client = builder
            .build()
            .map_err(|e| GoslingError::SessionFailed {
                user,
                detail: format!("failed to build client: {}", e),
            })?;
        debug!("user {}: opened http session", user);
        Ok(Box::new(HttpSession {
            client,
            settle_time: self.settle_time,
        }))
    }
}

struct HttpSession {
    client: reqwest::Client,
    settle_time: Duration,
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn navigate(&mut self, url: &Url) -> Result<(), String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status();
        // The page isn't ready until the body has arrived.
        response.bytes().await.map_err(|e| e.to_string())?;
        if !status.is_success() {
            return Err(format!("{}: {}", status, url));
        }
        if !self.settle_time.is_zero() {
            tokio::time::sleep(self.settle_time).await;
        }
        Ok(())
    }
}

#[cfg(feature = "chrome")]
pub use self::chrome::ChromeBrowser;

#[cfg(feature = "chrome")]
mod chrome {
    use async_trait::async_trait;
    use headless_chrome::{Browser as Chrome, LaunchOptions, Tab};
    use std::ffi::OsStr;
    use std::sync::Arc;
    use std::time::Duration;
    use url::Url;

    use super::{Browser, BrowserSession};
    use crate::GoslingError;

    /// Loads pages with one headless Chrome per virtual user.
    ///
    /// A page is ready once Chrome reports navigation has completed.
    #[derive(Clone, Debug)]
    pub struct ChromeBrowser {
        timeout: Duration,
        settle_time: Duration,
    }
    impl ChromeBrowser {
        pub fn new(timeout: Duration, settle_time: Duration) -> Self {
            ChromeBrowser {
                timeout,
                settle_time,
            }
        }
    }

    // Launch Chrome and open a tab, blocking.
    fn launch(timeout: Duration) -> Result<(Chrome, Arc<Tab>), String> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-logging"),
                OsStr::new("--log-level=3"),
                OsStr::new("--silent"),
            ])
            .build()
            .map_err(|e| format!("failed to configure Chrome: {}", e))?;
        let chrome = Chrome::new(launch_options).map_err(|e| format!("failed to launch Chrome: {}", e))?;
        let tab = chrome
            .new_tab()
            .map_err(|e| format!("failed to create browser tab: {}", e))?;
        tab.set_default_timeout(timeout);
        Ok((chrome, tab))
    }

    #[async_trait]
    impl Browser for ChromeBrowser {
        async fn open_session(
            &self,
            user: usize,
        ) -> Result<Box<dyn BrowserSession>, GoslingError> {
            let timeout = self.timeout;
            let (chrome, tab) = tokio::task::spawn_blocking(move || launch(timeout))
                .await?
                .map_err(|detail| GoslingError::SessionFailed { user, detail })?;
            debug!("user {}: launched headless Chrome", user);
            Ok(Box::new(ChromeSession {
                chrome: Some(chrome),
                tab,
                settle_time: self.settle_time,
            }))
        }
    }

    struct ChromeSession {
        chrome: Option<Chrome>,
        tab: Arc<Tab>,
        settle_time: Duration,
    }

    #[async_trait]
    impl BrowserSession for ChromeSession {
        async fn navigate(&mut self, url: &Url) -> Result<(), String> {
            let tab = Arc::clone(&self.tab);
            let page = url.to_string();
            tokio::task::spawn_blocking(move || {
                tab.navigate_to(&page)
                    .and_then(|tab| tab.wait_until_navigated())
                    .map(|_| ())
                    .map_err(|e| format!("{}: {}", e, page))
            })
            .await
            .map_err(|e| e.to_string())??;
            if !self.settle_time.is_zero() {
                tokio::time::sleep(self.settle_time).await;
            }
            Ok(())
        }

        async fn close(&mut self) {
            let tab = Arc::clone(&self.tab);
            if let Some(chrome) = self.chrome.take() {
                // Dropping the browser terminates Chrome.
                let _ = tokio::task::spawn_blocking(move || {
                    let _ = tab.close(true);
                    drop(chrome);
                })
                .await;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Scripted(Vec<Result<(), String>>);

    #[async_trait]
    impl BrowserSession for Scripted {
        async fn navigate(&mut self, _url: &Url) -> Result<(), String> {
            tokio::time::sleep(Duration::from_millis(250)).await;
            self.0.remove(0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_times_navigation() {
        let url = Url::parse("http://localhost/").unwrap();
        let mut session = Scripted(vec![Ok(()), Err("404 Not Found: http://localhost/".to_string())]);

        let load = session.fetch(&url).await;
        assert!(load.success);
        assert!(load.elapsed_ms >= 250 && load.elapsed_ms < 260);
        assert_eq!(load.error, None);

        let metric = Metric::from(session.fetch(&url).await);
        assert!(!metric.success);
        assert_eq!(metric.error.as_deref(), Some("404 Not Found: http://localhost/"));
    }

    #[test]
    fn user_agent() {
        assert!(APP_USER_AGENT.starts_with("gosling/"));
    }
}
