//! Automatic recomputation on top of a [`PathController`].

use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::{
    lock, Mover, PathCallbacks, PathController, PathError, PathFollower, PathOptions, PathSearch,
    PathService, PathState, PathStatus, TickSignal, Vec3, Waypoint,
};

/// Decides whether a failed computation is retried, given the failure reason, the
/// attempts already made, and the active configuration.
pub type ShouldRetry = Arc<dyn Fn(PathStatus, u32, &RetryConfig) -> bool + Send + Sync>;

/// Never retries unreachable destinations; otherwise retries while budget remains.
pub fn default_should_retry(reason: PathStatus, attempt: u32, config: &RetryConfig) -> bool {
    match reason {
        PathStatus::NoPath | PathStatus::ClosestOutOfRange => false,
        _ => attempt < config.max_retries,
    }
}

#[derive(Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub use_exponential_backoff: bool,
    pub should_retry: ShouldRetry,
}

impl RetryConfig {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

    pub fn with_should_retry(
        mut self,
        f: impl Fn(PathStatus, u32, &RetryConfig) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_retry = Arc::new(f);
        self
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if !self.use_exponential_backoff {
            return self.retry_delay;
        }
        let exponent = attempt.saturating_sub(1).min(31);
        self.retry_delay.saturating_mul(1u32 << exponent)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: Self::DEFAULT_MAX_RETRIES,
            retry_delay: Self::DEFAULT_RETRY_DELAY,
            use_exponential_backoff: true,
            should_retry: Arc::new(default_should_retry),
        }
    }
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("use_exponential_backoff", &self.use_exponential_backoff)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct RecoveryContext {
    attempts: u32,
    last_start: Option<Vec3>,
    last_finish: Option<Vec3>,
    last_mover: Option<Arc<dyn Mover>>,
    last_reached_distance: f32,
}

struct RetryShared<S: PathSearch> {
    controller: PathController<S>,
    config: RetryConfig,
    context: Mutex<RecoveryContext>,
}

impl<S: PathSearch> RetryShared<S> {
    /// Consume one attempt if the budget allows and endpoints are known.
    fn begin_attempt(&self, reason: Option<PathStatus>) -> Option<(u32, Vec3, Vec3)> {
        let mut ctx = lock(&self.context);
        let (start, finish) = ctx.last_start.zip(ctx.last_finish)?;
        if let Some(reason) = reason {
            if !(self.config.should_retry)(reason, ctx.attempts, &self.config) {
                debug!(%reason, attempts = ctx.attempts, "retry declined");
                return None;
            }
        }
        if ctx.attempts >= self.config.max_retries {
            debug!(attempts = ctx.attempts, "retry budget exhausted");
            return None;
        }
        ctx.attempts += 1;
        Some((ctx.attempts, start, finish))
    }

    fn follow_context(&self) -> Option<(Arc<dyn Mover>, f32)> {
        let ctx = lock(&self.context);
        ctx.last_mover
            .clone()
            .map(|mover| (mover, ctx.last_reached_distance))
    }

    async fn recover_blocked(self: Arc<Self>) {
        let Some((attempt, start, finish)) = self.begin_attempt(None) else {
            return;
        };
        let delay = self.config.backoff_delay(attempt);
        debug!(attempt, ?delay, "recomputing blocked path");
        tokio::time::sleep(delay).await;

        match self.controller.compute(start, finish).await {
            Ok(PathStatus::Success) => {
                if let Some((mover, reached_distance)) = self.follow_context() {
                    self.controller.start_following(mover, reached_distance);
                }
            }
            Ok(status) => debug!(attempt, %status, "recompute after block did not find a path"),
            Err(err) => warn!(attempt, error = %err, "path recovery after block failed"),
        }
    }

    async fn recover_failed(self: Arc<Self>, reason: PathStatus) {
        let Some((attempt, start, finish)) = self.begin_attempt(Some(reason)) else {
            return;
        };
        let delay = self.config.backoff_delay(attempt);
        debug!(attempt, %reason, ?delay, "recomputing failed path");
        tokio::time::sleep(delay).await;

        if let Err(err) = self.controller.compute(start, finish).await {
            warn!(attempt, error = %err, "path recovery after failure failed");
        }
    }
}

/// Wrap caller callbacks so recovery runs after them on a background task.
fn intercept<S: PathSearch>(
    callbacks: PathCallbacks,
    shared: Weak<RetryShared<S>>,
    runtime: Handle,
) -> PathCallbacks {
    let user_blocked = callbacks.on_path_blocked.clone();
    let user_failed = callbacks.on_path_failed.clone();

    let blocked_shared = shared.clone();
    let blocked_runtime = runtime.clone();
    let on_blocked = move || {
        if let Some(f) = &user_blocked {
            f();
        }
        if let Some(shared) = blocked_shared.upgrade() {
            blocked_runtime.spawn(shared.recover_blocked());
        }
    };

    let on_failed = move |reason: PathStatus| {
        if let Some(f) = &user_failed {
            f(reason);
        }
        if let Some(shared) = shared.upgrade() {
            runtime.spawn(shared.recover_failed(reason));
        }
    };

    PathCallbacks {
        on_path_blocked: Some(Arc::new(on_blocked)),
        on_path_failed: Some(Arc::new(on_failed)),
        ..callbacks
    }
}

/// A [`PathController`] that recomputes on its own when the path is blocked or a
/// computation fails, within a retry budget and with backoff between attempts.
///
/// Recovery runs on background tasks; their errors are logged, never returned.
pub struct RetryingPathController<S: PathSearch> {
    shared: Arc<RetryShared<S>>,
}

impl<S: PathSearch> RetryingPathController<S> {
    /// Must be called inside a Tokio runtime.
    pub fn new<P>(
        service: &P,
        options: PathOptions,
        callbacks: PathCallbacks,
        config: RetryConfig,
        ticks: TickSignal,
    ) -> Self
    where
        P: PathService<Search = S> + ?Sized,
    {
        let runtime = Handle::current();
        let shared = Arc::new_cyclic(|weak: &Weak<RetryShared<S>>| {
            let callbacks = intercept(callbacks, weak.clone(), runtime);
            RetryShared {
                controller: PathController::new(service, options, callbacks, ticks),
                config,
                context: Mutex::new(RecoveryContext::default()),
            }
        });
        Self { shared }
    }

    pub fn controller(&self) -> &PathController<S> {
        &self.shared.controller
    }

    pub fn config(&self) -> &RetryConfig {
        &self.shared.config
    }

    pub fn state(&self) -> PathState {
        self.shared.controller.state()
    }

    /// Compute a fresh path; resets the retry budget and remembers the endpoints.
    ///
    /// A rejected call leaves the budget and the remembered endpoints untouched.
    pub async fn compute(&self, start: Vec3, finish: Vec3) -> Result<PathStatus, PathError> {
        let controller = &self.shared.controller;
        if !controller.fsm().can_transition_to(PathState::Computing) {
            return controller.compute(start, finish).await;
        }
        {
            let mut ctx = lock(&self.shared.context);
            ctx.attempts = 0;
            ctx.last_start = Some(start);
            ctx.last_finish = Some(finish);
        }
        controller.compute(start, finish).await
    }

    pub fn start_following(&self, mover: Arc<dyn Mover>, reached_distance: f32) {
        self.remember_mover(&mover, reached_distance);
        self.shared.controller.start_following(mover, reached_distance);
    }

    pub fn pause(&self) -> bool {
        self.shared.controller.pause()
    }

    pub fn resume(&self, mover: Arc<dyn Mover>, reached_distance: f32) -> bool {
        self.remember_mover(&mover, reached_distance);
        self.shared.controller.resume(mover, reached_distance)
    }

    pub fn stop(&self) {
        self.shared.controller.stop()
    }

    pub fn waypoints(&self) -> Option<Vec<Waypoint>> {
        self.shared.controller.waypoints()
    }

    pub fn distance(&self) -> f32 {
        self.shared.controller.distance()
    }

    pub fn retry_attempts(&self) -> u32 {
        lock(&self.shared.context).attempts
    }

    pub fn max_retries(&self) -> u32 {
        self.shared.config.max_retries
    }

    pub fn are_retries_exhausted(&self) -> bool {
        self.retry_attempts() >= self.max_retries()
    }

    pub fn reset_retries(&self) {
        lock(&self.shared.context).attempts = 0;
    }

    /// Forget recovery context, then tear down the inner controller.
    ///
    /// A recovery task still sleeping on its backoff wakes to a released
    /// controller and logs the failure.
    pub fn destroy(self) {
        *lock(&self.shared.context) = RecoveryContext::default();
        self.shared.controller.shutdown();
    }

    fn remember_mover(&self, mover: &Arc<dyn Mover>, reached_distance: f32) {
        let mut ctx = lock(&self.shared.context);
        ctx.last_mover = Some(Arc::clone(mover));
        ctx.last_reached_distance = reached_distance;
    }
}

#[async_trait]
impl<S: PathSearch> PathFollower for RetryingPathController<S> {
    fn state(&self) -> PathState {
        RetryingPathController::state(self)
    }

    async fn compute(&self, start: Vec3, finish: Vec3) -> Result<PathStatus, PathError> {
        RetryingPathController::compute(self, start, finish).await
    }

    fn start_following(&self, mover: Arc<dyn Mover>, reached_distance: f32) {
        RetryingPathController::start_following(self, mover, reached_distance)
    }

    fn pause(&self) -> bool {
        RetryingPathController::pause(self)
    }

    fn resume(&self, mover: Arc<dyn Mover>, reached_distance: f32) -> bool {
        RetryingPathController::resume(self, mover, reached_distance)
    }

    fn stop(&self) {
        RetryingPathController::stop(self)
    }

    fn waypoints(&self) -> Option<Vec<Waypoint>> {
        RetryingPathController::waypoints(self)
    }

    fn distance(&self) -> f32 {
        RetryingPathController::distance(self)
    }
}
