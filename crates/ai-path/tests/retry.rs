mod common;

use std::time::Duration;

use ai_path::{
    PathError, PathOptions, PathState, PathStatus, RetryConfig, RetryingPathController,
    TickSignal, Vec3,
};
use common::{line_route, settle, Event, Recorder, ScriptedSearch, ScriptedService, TestMover};
use tokio::time::{sleep, sleep_until, Instant};

const REACHED: f32 = 0.5;
const FINISH: Vec3 = Vec3::new(20.0, 0.0, 0.0);

fn retrying(
    service: &ScriptedService,
    recorder: &std::sync::Arc<Recorder>,
    ticks: &TickSignal,
    max_retries: u32,
) -> RetryingPathController<ScriptedSearch> {
    let config = RetryConfig {
        max_retries,
        ..RetryConfig::default()
    };
    RetryingPathController::new(
        service,
        PathOptions::default(),
        recorder.callbacks(),
        config,
        ticks.clone(),
    )
}

#[tokio::test(start_paused = true)]
async fn failure_retries_stop_at_budget() {
    let service = ScriptedService::new();
    service.set_fallback(PathStatus::ClosestNoPath, Vec::new());
    let recorder = Recorder::new();
    let ticks = TickSignal::new();
    let rc = retrying(&service, &recorder, &ticks, 2);

    let status = rc.compute(Vec3::ZERO, FINISH).await.expect("compute");
    assert_eq!(status, PathStatus::ClosestNoPath);

    sleep(Duration::from_secs(30)).await;

    assert_eq!(service.compute_calls(), 3);
    assert_eq!(rc.retry_attempts(), 2);
    assert!(rc.are_retries_exhausted());
    assert_eq!(rc.state(), PathState::Failed);
    assert_eq!(recorder.count(&Event::Failed(PathStatus::ClosestNoPath)), 3);
}

#[tokio::test(start_paused = true)]
async fn blocked_path_recomputes_once_then_fails() {
    let service = ScriptedService::new().succeed_with(line_route());
    service.push(PathStatus::FailFinishNotEmpty, Vec::new());
    let recorder = Recorder::new();
    let ticks = TickSignal::new();
    let rc = retrying(&service, &recorder, &ticks, 1);

    rc.compute(Vec3::ZERO, FINISH).await.expect("compute");
    rc.start_following(TestMover::manual(), REACHED);
    settle().await;

    service.fire_blocked(1);
    settle().await;
    assert_eq!(rc.state(), PathState::Blocked);

    sleep(Duration::from_secs(30)).await;

    assert_eq!(service.compute_calls(), 2);
    assert_eq!(rc.retry_attempts(), 1);
    assert_eq!(rc.state(), PathState::Failed);
    assert_eq!(recorder.count(&Event::Blocked), 1);
}

#[tokio::test(start_paused = true)]
async fn blocked_recovery_resumes_following() {
    let service = ScriptedService::new()
        .succeed_with(line_route())
        .succeed_with(line_route());
    let recorder = Recorder::new();
    let ticks = TickSignal::new();
    let rc = retrying(&service, &recorder, &ticks, 3);
    let mover = TestMover::teleporting();

    rc.compute(Vec3::ZERO, FINISH).await.expect("compute");
    rc.start_following(mover.clone(), REACHED);
    settle().await;
    service.fire_blocked(0);
    settle().await;

    sleep(Duration::from_secs(2)).await;
    assert_eq!(service.compute_calls(), 2);
    assert_eq!(rc.state(), PathState::Following);

    for _ in 0..3 {
        ticks.emit(1.0 / 60.0);
        settle().await;
    }
    assert_eq!(rc.state(), PathState::Completed);
    assert_eq!(recorder.count(&Event::Completed), 1);
}

#[tokio::test(start_paused = true)]
async fn blocks_after_budget_trigger_no_recompute() {
    let service = ScriptedService::new();
    service.set_fallback(PathStatus::Success, line_route());
    let recorder = Recorder::new();
    let ticks = TickSignal::new();
    let rc = retrying(&service, &recorder, &ticks, 2);

    rc.compute(Vec3::ZERO, FINISH).await.expect("compute");
    rc.start_following(TestMover::manual(), REACHED);
    settle().await;

    // Each recovery succeeds and resumes following.
    for expected_calls in [2, 3] {
        service.fire_blocked(1);
        settle().await;
        sleep(Duration::from_secs(10)).await;
        assert_eq!(service.compute_calls(), expected_calls);
        assert_eq!(rc.state(), PathState::Following);
    }
    assert!(rc.are_retries_exhausted());

    service.fire_blocked(1);
    settle().await;
    sleep(Duration::from_secs(30)).await;

    assert_eq!(service.compute_calls(), 3);
    assert_eq!(rc.retry_attempts(), 2);
    assert_eq!(rc.state(), PathState::Blocked);
    assert_eq!(recorder.count(&Event::Blocked), 3);
}

#[tokio::test(start_paused = true)]
async fn busy_compute_keeps_retry_context() {
    let service = ScriptedService::new();
    service.push(PathStatus::ClosestNoPath, Vec::new());
    service.set_fallback(PathStatus::Success, line_route());
    let recorder = Recorder::new();
    let ticks = TickSignal::new();
    let rc = retrying(&service, &recorder, &ticks, 2);

    rc.compute(Vec3::ZERO, FINISH).await.expect("compute");
    sleep(Duration::from_secs(5)).await;
    assert_eq!(rc.state(), PathState::Computing);
    assert_eq!(rc.retry_attempts(), 1);

    let elsewhere = Vec3::new(-8.0, 0.0, 3.0);
    let err = rc
        .compute(elsewhere, elsewhere)
        .await
        .expect_err("compute while computing is rejected");
    assert_eq!(
        err,
        PathError::Busy {
            state: PathState::Computing
        }
    );
    assert_eq!(rc.retry_attempts(), 1);
    assert_eq!(service.compute_calls(), 2);

    // Recovery still targets the accepted endpoints.
    rc.start_following(TestMover::manual(), REACHED);
    settle().await;
    service.fire_blocked(1);
    settle().await;
    sleep(Duration::from_secs(10)).await;

    assert_eq!(service.compute_calls(), 3);
    assert_eq!(service.last_request(), Some((Vec3::ZERO, FINISH)));
    assert!(rc.are_retries_exhausted());
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_between_attempts() {
    let service = ScriptedService::new();
    service.set_fallback(PathStatus::ClosestNoPath, Vec::new());
    let recorder = Recorder::new();
    let ticks = TickSignal::new();
    let rc = retrying(&service, &recorder, &ticks, 3);
    let t0 = Instant::now();

    rc.compute(Vec3::ZERO, FINISH).await.expect("compute");

    // Attempts land at 1s, 1+2=3s and 3+4=7s.
    for (at_ms, expected_calls) in [(900, 1), (1100, 2), (2900, 2), (3100, 3), (6900, 3), (7100, 4)] {
        sleep_until(t0 + Duration::from_millis(at_ms)).await;
        assert_eq!(service.compute_calls(), expected_calls, "at {at_ms}ms");
    }
    sleep(Duration::from_secs(60)).await;
    assert_eq!(service.compute_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn failure_recovery_recomputes_without_following() {
    let service = ScriptedService::new().succeed_with(line_route());
    service.push(PathStatus::ClosestNoPath, Vec::new());
    service.push(PathStatus::Success, line_route());
    let recorder = Recorder::new();
    let ticks = TickSignal::new();
    let rc = retrying(&service, &recorder, &ticks, 3);

    rc.compute(Vec3::ZERO, FINISH).await.expect("compute");
    rc.start_following(TestMover::manual(), REACHED);
    settle().await;

    let status = rc.compute(Vec3::ZERO, FINISH).await.expect("recompute");
    assert_eq!(status, PathStatus::ClosestNoPath);

    sleep(Duration::from_secs(5)).await;

    assert_eq!(service.compute_calls(), 3);
    assert_eq!(rc.state(), PathState::Computing);
    assert_eq!(ticks.subscriber_count(), 0);
    assert!(rc.waypoints().is_some());
}

#[tokio::test(start_paused = true)]
async fn unreachable_destination_is_not_retried() {
    let service = ScriptedService::new();
    let recorder = Recorder::new();
    let ticks = TickSignal::new();
    let rc = retrying(&service, &recorder, &ticks, 3);

    let status = rc.compute(Vec3::ZERO, FINISH).await.expect("compute");
    sleep(Duration::from_secs(30)).await;

    assert_eq!(status, PathStatus::NoPath);
    assert_eq!(service.compute_calls(), 1);
    assert_eq!(rc.retry_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn custom_predicate_controls_failure_retries() {
    let service = ScriptedService::new();
    service.set_fallback(PathStatus::NoPath, Vec::new());
    let recorder = Recorder::new();
    let ticks = TickSignal::new();
    let config = RetryConfig {
        max_retries: 2,
        retry_delay: Duration::from_millis(100),
        use_exponential_backoff: false,
        ..RetryConfig::default()
    }
    .with_should_retry(|_, attempt, config| attempt < config.max_retries);
    let rc = RetryingPathController::new(
        &service,
        PathOptions::default(),
        recorder.callbacks(),
        config,
        ticks.clone(),
    );

    rc.compute(Vec3::ZERO, FINISH).await.expect("compute");
    sleep(Duration::from_secs(1)).await;

    assert_eq!(service.compute_calls(), 3);
    assert!(rc.are_retries_exhausted());

    rc.reset_retries();
    assert_eq!(rc.retry_attempts(), 0);
    assert!(!rc.are_retries_exhausted());
}

#[tokio::test(start_paused = true)]
async fn new_compute_resets_budget() {
    let service = ScriptedService::new();
    service.set_fallback(PathStatus::ClosestNoPath, Vec::new());
    let recorder = Recorder::new();
    let ticks = TickSignal::new();
    let rc = retrying(&service, &recorder, &ticks, 1);

    rc.compute(Vec3::ZERO, FINISH).await.expect("compute");
    sleep(Duration::from_secs(5)).await;
    assert!(rc.are_retries_exhausted());

    rc.compute(Vec3::ZERO, FINISH).await.expect("compute again");
    assert_eq!(rc.retry_attempts(), 0);
    sleep(Duration::from_secs(5)).await;
    assert_eq!(service.compute_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn destroy_during_backoff_is_harmless() {
    let service = ScriptedService::new();
    service.set_fallback(PathStatus::ClosestNoPath, Vec::new());
    let recorder = Recorder::new();
    let ticks = TickSignal::new();
    let rc = retrying(&service, &recorder, &ticks, 3);

    rc.compute(Vec3::ZERO, FINISH).await.expect("compute");
    settle().await;
    rc.destroy();

    sleep(Duration::from_secs(30)).await;
    assert_eq!(service.compute_calls(), 1);
    assert_eq!(service.blocked_subscribers(), 0);
}
