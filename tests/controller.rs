use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

mod common;

use common::ScriptedBrowser;
use gosling::phase::{PhaseController, TestPhase, UserState};
use gosling::GoslingError;

#[tokio::test(start_paused = true)]
// Four users over four seconds start one second apart.
async fn test_ramp_up_stagger() {
    let configuration = common::configuration(
        4,
        Duration::from_millis(4_000),
        Duration::from_secs(2),
        Duration::from_millis(500),
    );
    let browser = ScriptedBrowser::new(Duration::from_millis(50));
    let mut controller = PhaseController::new(configuration, Arc::new(browser.clone()));
    controller.run().await.unwrap();

    let log = browser.log();
    let users: Vec<usize> = log.opened.iter().map(|(user, _)| *user).collect();
    assert_eq!(users, vec![1, 2, 3, 4]);
    for (index, (_, at)) in log.opened.iter().enumerate() {
        common::assert_about(*at, Duration::from_millis(1_000 * index as u64));
    }
    // Every user loaded its first page as soon as it started.
    for (user, at) in &log.opened {
        common::assert_about(log.fetches_by(*user)[0].at, *at);
    }
}

#[tokio::test(start_paused = true)]
// The phase only moves forward, and no page load starts once the test has completed.
async fn test_phases() {
    let configuration = common::configuration(
        3,
        Duration::from_secs(3),
        Duration::from_secs(5),
        Duration::from_millis(650),
    );
    let browser = ScriptedBrowser::new(Duration::from_millis(300));
    let mut controller = PhaseController::new(configuration, Arc::new(browser.clone()));
    browser.observe(controller.subscribe());
    assert_eq!(controller.phase(), TestPhase::RampUp);

    controller.run().await.unwrap();
    assert_eq!(controller.phase(), TestPhase::Completed);

    let log = browser.log();
    let phases: Vec<TestPhase> = log.fetches.iter().filter_map(|f| f.phase).collect();
    assert_eq!(phases.len(), log.fetches.len());
    assert!(phases.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(phases.contains(&TestPhase::RampUp));
    assert!(phases.contains(&TestPhase::Sustained));
    assert!(!phases.contains(&TestPhase::Completed));

    // Page loads started during ramp-up happen in the first three seconds.
    for fetch in &log.fetches {
        match fetch.phase {
            Some(TestPhase::RampUp) => assert!(fetch.at < Duration::from_secs(3)),
            Some(TestPhase::Sustained) => {
                assert!(fetch.at >= Duration::from_secs(3));
                assert!(fetch.at < Duration::from_secs(8));
            }
            _ => unreachable!(),
        }
    }
}

#[tokio::test(start_paused = true)]
// The run doesn't return before every user has stopped, and completing never interrupts
// a think time.
async fn test_completion_barrier() {
    let configuration = common::configuration(
        2,
        Duration::from_secs(1),
        Duration::from_secs(1),
        Duration::from_secs(10),
    );
    let browser = ScriptedBrowser::new(Duration::from_millis(100));
    let mut controller = PhaseController::new(configuration, Arc::new(browser.clone()));

    let started = Instant::now();
    let metrics = controller.run().await.unwrap();
    let elapsed = started.elapsed();

    // User 2 starts at 500ms, loads a page for 100ms, then thinks for 10 seconds.
    assert!(elapsed >= Duration::from_millis(10_600));
    assert_eq!(controller.active_users(), 0);
    assert_eq!(controller.handles().len(), 2);
    assert!(controller
        .handles()
        .iter()
        .all(|handle| handle.state == UserState::Stopped));
    assert_eq!(
        controller.handles().iter().map(|h| h.id).collect::<Vec<_>>(),
        vec![1, 2]
    );

    // Each user loaded exactly one page before completion, and released its session.
    assert_eq!(metrics.total_requests, 2);
    let log = browser.log();
    assert_eq!(log.closed.len(), 2);
    for (_, closed) in &log.closed {
        assert!(*closed >= Duration::from_secs(10));
    }
}

#[tokio::test(start_paused = true)]
// A failing user doesn't affect anyone else's accounting.
async fn test_failure_isolation() {
    let configuration = common::configuration(
        2,
        Duration::from_millis(200),
        Duration::from_secs(5),
        Duration::from_millis(250),
    );
    let browser = ScriptedBrowser::new(Duration::from_millis(20)).fail_user(2);
    let mut controller = PhaseController::new(configuration, Arc::new(browser.clone()));
    let metrics = controller.run().await.unwrap();

    let log = browser.log();
    let succeeded = log.fetches_by(1).len();
    let failed = log.fetches_by(2).len();
    assert!(succeeded > 10);
    assert!(failed > 10);

    assert_eq!(metrics.total_requests, succeeded + failed);
    assert_eq!(metrics.successful_requests, succeeded);
    assert_eq!(metrics.failed_requests, failed);
    assert_eq!(
        metrics.total_requests,
        metrics.successful_requests + metrics.failed_requests
    );
    assert_eq!(metrics.response_times.len(), metrics.successful_requests);
    assert!(metrics.response_times.iter().all(|ms| *ms >= 20));
    assert_eq!(metrics.unique_errors(), vec!["scripted failure for user 2"]);
}

#[tokio::test(start_paused = true)]
// Failing to open a session aborts the remaining launches and fails the run.
async fn test_session_failure() {
    let configuration = common::configuration(
        3,
        Duration::from_secs(3),
        Duration::from_secs(60),
        Duration::from_millis(100),
    );
    let browser = ScriptedBrowser::new(Duration::from_millis(10)).fail_session(2);
    let mut controller = PhaseController::new(configuration, Arc::new(browser.clone()));

    let started = Instant::now();
    let result = controller.run().await;
    assert!(matches!(
        result,
        Err(GoslingError::SessionFailed { user: 2, .. })
    ));
    assert!(started.elapsed() < Duration::from_secs(2));

    // User 3 was never launched.
    assert_eq!(controller.handles().len(), 2);
    assert!(controller
        .handles()
        .iter()
        .all(|handle| handle.state == UserState::Stopped));
    assert_eq!(controller.phase(), TestPhase::Completed);

    let log = browser.log();
    assert_eq!(log.opened.len(), 1);
    assert_eq!(log.closed.len(), 1);
}

#[tokio::test(start_paused = true)]
// Canceling completes the test early, still returning what was recorded.
async fn test_cancel() {
    let configuration = common::configuration(
        4,
        Duration::from_secs(4),
        Duration::from_secs(60),
        Duration::from_millis(100),
    );
    let browser = ScriptedBrowser::new(Duration::from_millis(10));
    let cancel = Arc::new(Notify::new());
    let mut controller =
        PhaseController::new(configuration, Arc::new(browser.clone())).with_cancel(cancel.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        cancel.notify_one();
    });

    let started = Instant::now();
    let metrics = controller.run().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(controller.handles().len(), 3);
    assert!(metrics.total_requests > 0);
    assert_eq!(metrics.failed_requests, 0);
}

#[tokio::test(start_paused = true)]
// A single user with no ramp-up starts immediately.
async fn test_single_user() {
    let configuration = common::configuration(
        1,
        Duration::ZERO,
        Duration::from_secs(1),
        Duration::from_millis(100),
    );
    let browser = ScriptedBrowser::new(Duration::from_millis(100));
    let metrics = gosling::LoadTest::run(configuration, Arc::new(browser.clone()))
        .await
        .unwrap();

    let log = browser.log();
    common::assert_about(log.opened[0].1, Duration::ZERO);
    // One page load every 200ms for a second.
    assert!(metrics.total_requests >= 4 && metrics.total_requests <= 6);
    assert_eq!(metrics.successful_requests, metrics.total_requests);
    let stats = gosling::metrics::summarize(&metrics.response_times).unwrap();
    assert!(stats.min >= 100 && stats.max < 110);
}

#[tokio::test(start_paused = true)]
// A load test too long to be scheduled fails before any user starts.
async fn test_unschedulable_run_time() {
    let configuration = common::configuration(
        2,
        Duration::from_secs(1),
        Duration::MAX,
        Duration::from_millis(100),
    );
    let browser = ScriptedBrowser::new(Duration::from_millis(10));
    let mut controller = PhaseController::new(configuration, Arc::new(browser.clone()));

    let result = controller.run().await;
    assert!(matches!(result, Err(GoslingError::InvalidOption { .. })));
    assert!(controller.handles().is_empty());
    assert!(browser.log().opened.is_empty());
}

#[tokio::test(start_paused = true)]
// A huge user count only costs the users actually launched.
async fn test_huge_user_count() {
    let configuration = common::configuration(
        u32::MAX as usize,
        Duration::from_secs(3_600),
        Duration::from_secs(60),
        Duration::from_millis(100),
    );
    let browser = ScriptedBrowser::new(Duration::from_millis(10));
    let cancel = Arc::new(Notify::new());
    let mut controller =
        PhaseController::new(configuration, Arc::new(browser.clone())).with_cancel(cancel.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1)).await;
        cancel.notify_one();
    });

    controller.run().await.unwrap();
    let launched = controller.handles().len();
    assert!(launched > 0 && launched < 2_000, "launched {}", launched);
    assert_eq!(controller.active_users(), 0);
}
