//! The lifecycle of a load test.
//!
//! A [`PhaseController`] starts virtual users on a stagger during [`TestPhase::RampUp`],
//! holds the load during [`TestPhase::Sustained`], then sets [`TestPhase::Completed`] and
//! waits for every virtual user to stop.
//!
//! Virtual users check the phase between page loads: completing never interrupts a page
//! load or a think time already under way.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum_macros::Display;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;

use crate::browser::Browser;
use crate::config::Configuration;
use crate::metrics::{MetricsAggregate, MetricsCollector};
use crate::schedule::{self, RampUpSchedule};
use crate::user;
use crate::GoslingError;

/// The phases of a load test, in order. The phase only ever moves forward.
#[derive(
    Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TestPhase {
    /// Virtual users are being started.
    #[strum(serialize = "ramp-up")]
    RampUp,
    /// All virtual users are running.
    #[strum(serialize = "sustained")]
    Sustained,
    /// Virtual users are stopping, or have stopped.
    #[strum(serialize = "completed")]
    Completed,
}

/// Where a virtual user is in its life.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserState {
    /// Launched, but not yet running.
    Pending,
    /// Loading pages.
    Active,
    /// Finished, its session released.
    Stopped,
}

/// A launched virtual user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualUserHandle {
    /// Unique, increasing in launch order, starting at 1.
    pub id: usize,
    pub state: UserState,
}

/// Read-only view of the current [`TestPhase`].
#[derive(Clone, Debug)]
pub struct PhaseRef(watch::Receiver<TestPhase>);
impl PhaseRef {
    pub fn current(&self) -> TestPhase {
        *self.0.borrow()
    }

    pub fn is_completed(&self) -> bool {
        self.current() == TestPhase::Completed
    }
}

/// Messages from virtual users to the [`PhaseController`].
#[derive(Debug)]
pub(crate) enum UserEvent {
    Started(usize),
    SessionFailed { user: usize, detail: String },
    Stopped(usize),
}

/// Owns the lifecycle of one load test.
pub struct PhaseController {
    configuration: Arc<Configuration>,
    browser: Arc<dyn Browser>,
    phase_tx: watch::Sender<TestPhase>,
    metrics: MetricsCollector,
    handles: Vec<VirtualUserHandle>,
    active_users: usize,
    cancel: Option<Arc<Notify>>,
}
impl PhaseController {
    /// Prepare a load test. Nothing runs until [`PhaseController::run`].
    pub fn new(configuration: Configuration, browser: Arc<dyn Browser>) -> Self {
        let (phase_tx, _) = watch::channel(TestPhase::RampUp);
        PhaseController {
            configuration: Arc::new(configuration),
            browser,
            phase_tx,
            metrics: MetricsCollector::new(),
            handles: Vec::new(),
            active_users: 0,
            cancel: None,
        }
    }

    /// Complete the load test early when `cancel` is notified.
    pub fn with_cancel(mut self, cancel: Arc<Notify>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn phase(&self) -> TestPhase {
        *self.phase_tx.borrow()
    }

    /// A view of the phase for observers, updated as the load test advances.
    pub fn subscribe(&self) -> PhaseRef {
        PhaseRef(self.phase_tx.subscribe())
    }

    /// Every virtual user launched so far.
    pub fn handles(&self) -> &[VirtualUserHandle] {
        &self.handles
    }

    /// Virtual users currently running.
    pub fn active_users(&self) -> usize {
        self.active_users
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    // Advance the phase, never backwards. Returns true if the phase changed.
    fn set_phase(&self, phase: TestPhase) -> bool {
        let changed = self.phase_tx.send_if_modified(|current| {
            if phase > *current {
                *current = phase;
                true
            } else {
                false
            }
        });
        if changed {
            debug!("phase: {}", phase);
        }
        changed
    }

    fn launch_user(&mut self, event_tx: &flume::Sender<UserEvent>) -> tokio::task::JoinHandle<()> {
        let id = self.handles.len() + 1;
        self.handles.push(VirtualUserHandle {
            id,
            state: UserState::Pending,
        });
        debug!("launching user {} of {}", id, self.configuration.users);
        tokio::spawn(user::user_main(
            id,
            Arc::clone(&self.configuration),
            self.subscribe(),
            self.metrics.clone(),
            Arc::clone(&self.browser),
            event_tx.clone(),
        ))
    }

    fn handle_event(&mut self, event: UserEvent, failure: &mut Option<GoslingError>) {
        match event {
            UserEvent::Started(id) => {
                self.set_user_state(id, UserState::Active);
                self.active_users += 1;
                debug!("user {} started, {} active", id, self.active_users);
            }
            UserEvent::Stopped(id) => {
                self.set_user_state(id, UserState::Stopped);
                self.active_users = self.active_users.saturating_sub(1);
                debug!("user {} stopped, {} active", id, self.active_users);
            }
            UserEvent::SessionFailed { user, detail } => {
                error!("user {} failed to start: {}", user, detail);
                // Only the first failure is reported.
                if failure.is_none() {
                    *failure = Some(GoslingError::SessionFailed { user, detail });
                }
                if self.set_phase(TestPhase::Completed) {
                    info!("completing test: aborting remaining user launches...");
                }
            }
        }
    }

    fn set_user_state(&mut self, id: usize, state: UserState) {
        if let Some(handle) = id.checked_sub(1).and_then(|index| self.handles.get_mut(index)) {
            handle.state = state;
        }
    }

    /// Run the load test through all of its phases, returning once every launched
    /// virtual user has stopped.
    ///
    /// Failing to open a virtual user's browser session stops further launches,
    /// completes the load test, and is returned once every virtual user has stopped.
    /// Failed page loads are only recorded.
    pub async fn run(&mut self) -> Result<MetricsAggregate, GoslingError> {
        let schedule = RampUpSchedule::new(self.configuration.users, self.configuration.ramp_up_time);
        let cancel = self.cancel.clone().unwrap_or_default();
        let (event_tx, event_rx) = flume::unbounded();
        let mut tasks = Vec::new();
        let mut failure = None;

        let started = Instant::now();
        let (sustained_at, completed_at) = self.configuration.phase_deadlines(started)?;
        let mut phase_deadline = sustained_at;
        info!(
            "starting ramp-up phase: launching {} users over {:?}...",
            schedule.users(),
            self.configuration.ramp_up_time
        );

        while self.phase() != TestPhase::Completed {
            let next_launch = schedule.deadline(started, self.handles.len());
            tokio::select! {
                biased;

                event = event_rx.recv_async() => {
                    if let Ok(event) = event {
                        self.handle_event(event, &mut failure);
                    }
                }
                _ = cancel.notified() => {
                    if self.set_phase(TestPhase::Completed) {
                        info!("completing test: canceled...");
                    }
                }
                _ = schedule::sleep_until(next_launch) => {
                    tasks.push(self.launch_user(&event_tx));
                }
                _ = tokio::time::sleep_until(phase_deadline) => {
                    if self.set_phase(TestPhase::Sustained) {
                        info!(
                            "starting sustained load phase: maintaining {} users for {:?}...",
                            schedule.users(),
                            self.configuration.run_time
                        );
                        phase_deadline = completed_at;
                    } else if self.set_phase(TestPhase::Completed) {
                        info!("completing test...");
                    }
                }
            }
        }

        // Virtual users hold the only remaining senders, the channel closes once the
        // last one has stopped.
        drop(event_tx);
        info!(
            "waiting for {} of {} users to stop...",
            self.handles.iter().filter(|h| h.state != UserState::Stopped).count(),
            self.handles.len()
        );
        while let Ok(event) = event_rx.recv_async().await {
            self.handle_event(event, &mut failure);
        }
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                warn!("user task failed: {}", e);
            }
        }
        info!(
            "all {} users stopped after {:?}",
            self.handles.len(),
            started.elapsed()
        );

        match failure {
            Some(e) => Err(e),
            None => Ok(self.metrics.snapshot()),
        }
    }
}
