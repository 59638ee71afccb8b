use rand::seq::IndexedRandom;
use std::sync::Arc;
use url::Url;

use crate::browser::{Browser, BrowserSession};
use crate::config::Configuration;
use crate::metrics::{Metric, MetricsCollector};
use crate::phase::{PhaseRef, UserEvent};
use crate::schedule;

// Reports the user as started when created, and as stopped when dropped. Dropping also
// happens if the user panics, so the controller is never left waiting.
struct ActiveUser {
    id: usize,
    events: flume::Sender<UserEvent>,
}
impl ActiveUser {
    fn start(id: usize, events: &flume::Sender<UserEvent>) -> Self {
        let _ = events.send(UserEvent::Started(id));
        ActiveUser {
            id,
            events: events.clone(),
        }
    }
}
impl Drop for ActiveUser {
    fn drop(&mut self) {
        let _ = self.events.send(UserEvent::Stopped(self.id));
    }
}

fn choose_page(pages: &[Url]) -> Option<Url> {
    pages.choose(&mut rand::rng()).cloned()
}

pub(crate) async fn user_main(
    id: usize,
    configuration: Arc<Configuration>,
    phase: PhaseRef,
    metrics: MetricsCollector,
    browser: Arc<dyn Browser>,
    events: flume::Sender<UserEvent>,
) {
    let _active = ActiveUser::start(id, &events);
    info!("launching user {}...", id);

    let mut session: Option<Box<dyn BrowserSession>> = None;
    while !phase.is_completed() {
        let Some(url) = choose_page(&configuration.pages) else {
            break;
        };

        if session.is_none() {
            match browser.open_session(id).await {
                Ok(opened) => session = Some(opened),
                Err(e) => {
                    let _ = events.send(UserEvent::SessionFailed {
                        user: id,
                        detail: e.to_string(),
                    });
                    break;
                }
            }
            // Opening a session can be slow, don't start a page load after completion.
            if phase.is_completed() {
                break;
            }
        }
        let Some(current) = session.as_mut() else {
            break;
        };

        let load = current.fetch(&url).await;
        match &load.error {
            Some(error) => warn!("user {}: failed to load {}: {}", id, url, error),
            None => debug!("user {}: loaded {} in {}ms", id, url, load.elapsed_ms),
        }
        metrics.record(Metric::from(load));

        let think_time =
            schedule::think_time(configuration.think_time_min, configuration.think_time_max);
        trace!("user {}: thinking for {:?}", id, think_time);
        tokio::time::sleep(think_time).await;
    }

    if let Some(mut session) = session {
        session.close().await;
    }
    info!("exiting user {}...", id);
}
