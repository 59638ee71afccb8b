//! Utility functions used by Gosling, and available when writing load tests.

use lazy_static::lazy_static;
use regex::Regex;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use url::Url;

use crate::GoslingError;

lazy_static! {
    static ref DURATION: Option<Regex> = Regex::new(
        r"^(?:(?P<hours>\d+)h)?(?:(?P<minutes>\d+)m)?(?:(?P<seconds>\d+)s)?(?:(?P<millis>\d+)ms)?$",
    )
    .ok();
}

/// Parse a string representing a duration.
///
/// Can be specified as an integer, indicating seconds. Or can use integers together
/// with one or more of "h", "m", "s" and "ms", in that order, indicating "hours",
/// "minutes", "seconds" and "milliseconds". Returns `None` for anything else, including
/// durations too long to represent.
///
/// # Example
/// ```rust
/// use gosling::util;
/// use std::time::Duration;
///
/// // 1 hour 2 minutes and 3 seconds.
/// assert_eq!(util::parse_duration("1h2m3s"), Some(Duration::from_secs(3_723)));
///
/// // A bare integer is seconds.
/// assert_eq!(util::parse_duration("45"), Some(Duration::from_secs(45)));
///
/// // Milliseconds.
/// assert_eq!(util::parse_duration("500ms"), Some(Duration::from_millis(500)));
///
/// // Invalid values are rejected.
/// assert_eq!(util::parse_duration("soon"), None);
/// ```
pub fn parse_duration(duration: &str) -> Option<Duration> {
    let duration = duration.trim();
    if let Ok(seconds) = u64::from_str(duration) {
        trace!("{} is integer: {} seconds", duration, seconds);
        return Some(Duration::from_secs(seconds));
    }

    let captures = DURATION.as_ref()?.captures(duration)?;
    let mut matched = false;
    let mut unit = |name: &str| -> Option<u64> {
        match captures.name(name) {
            Some(value) => {
                matched = true;
                u64::from_str(value.as_str()).ok()
            }
            None => Some(0),
        }
    };
    let hours = unit("hours")?;
    let minutes = unit("minutes")?;
    let seconds = unit("seconds")?;
    let millis = unit("millis")?;
    // An empty string matches the pattern but isn't a duration.
    if !matched {
        return None;
    }

    let seconds = hours
        .checked_mul(60 * 60)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)?;
    let total = Duration::from_secs(seconds).checked_add(Duration::from_millis(millis))?;
    trace!("{} is {:?}", duration, total);
    Some(total)
}

/// Parse and validate the host that relative pages are joined to.
///
/// # Example
/// ```rust
/// use gosling::util;
///
/// // Hostname is a valid host.
/// assert!(util::parse_host("http://localhost:3000").is_ok());
///
/// // Protocol is required.
/// assert!(util::parse_host("example.com/").is_err());
///
/// // Only http and https are supported.
/// assert!(util::parse_host("ftp://example.com/").is_err());
/// ```
pub fn parse_host(host: &str) -> Result<Url, GoslingError> {
    let url = Url::parse(host).map_err(|parse_error| GoslingError::InvalidOption {
        option: "--host".to_string(),
        value: host.to_string(),
        detail: format!("Invalid host: {}", parse_error),
    })?;
    if !is_http(&url) {
        return Err(GoslingError::InvalidOption {
            option: "--host".to_string(),
            value: host.to_string(),
            detail: "Host must use the http or https scheme.".to_string(),
        });
    }
    Ok(url)
}

/// Turn a configured page into an absolute http(s) URL.
///
/// Absolute URLs are used as is, anything else is joined to `host`.
///
/// # Example
/// ```rust
/// use gosling::util;
///
/// let host = util::parse_host("http://localhost:3000").unwrap();
/// let page = util::parse_page(&host, "/admin.html").unwrap();
/// assert_eq!(page.as_str(), "http://localhost:3000/admin.html");
///
/// let page = util::parse_page(&host, "https://example.com/").unwrap();
/// assert_eq!(page.as_str(), "https://example.com/");
/// ```
pub fn parse_page(host: &Url, page: &str) -> Result<Url, GoslingError> {
    let url = match Url::parse(page) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            host.join(page)
                .map_err(|parse_error| GoslingError::InvalidPage {
                    page: page.to_string(),
                    detail: format!("Failed to join page to host {}.", host),
                    parse_error: Some(parse_error),
                })?
        }
        Err(parse_error) => {
            return Err(GoslingError::InvalidPage {
                page: page.to_string(),
                detail: "Invalid page.".to_string(),
                parse_error: Some(parse_error),
            })
        }
    };
    if !is_http(&url) {
        return Err(GoslingError::InvalidPage {
            page: page.to_string(),
            detail: "Pages must use the http or https scheme.".to_string(),
            parse_error: None,
        });
    }
    Ok(url)
}

fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Verify `url` answers with a successful status before starting a load test.
pub async fn check_connection(url: &Url, timeout: Duration) -> Result<(), GoslingError> {
    info!("checking connection to {}...", url);
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let response = client.get(url.clone()).send().await?.error_for_status()?;
    info!("connected to {}: {}", url, response.status());
    Ok(())
}

// Internal helper to configure the control-c handler. Complete the load test on the
// first ctrl-c. Exit abruptly on the second ctrl-c.
pub(crate) fn setup_ctrlc_handler(canceled: &Arc<Notify>) -> JoinHandle<()> {
    let canceled = Arc::clone(canceled);
    tokio::spawn(async move {
        let mut caught = false;
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                info!("unable to listen for ctrl-c: {}", e);
                return;
            }
            if caught {
                warn!("caught another ctrl-c, exiting immediately...");
                std::process::exit(1);
            }
            warn!("caught ctrl-c, stopping...");
            caught = true;
            canceled.notify_one();
        }
    })
}
