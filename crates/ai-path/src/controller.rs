//! Path controller: search bridge, waypoint cache, and the follow loop.

use std::sync::{Arc, Mutex, Weak};

use ai_nav::geometry;
use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::{
    lock, BlockedEvent, Mover, PathCallbacks, PathError, PathFsm, PathOptions, PathSearch,
    PathService, PathState, PathStatus, TickContext, TickSignal, Vec3, Waypoint, WaypointAction,
};

/// Distance at which a waypoint counts as reached unless the caller says otherwise.
pub const DEFAULT_REACHED_DISTANCE: f32 = 5.0;

/// Operations shared by [`PathController`] and [`crate::RetryingPathController`].
#[async_trait]
pub trait PathFollower: Send + Sync {
    fn state(&self) -> PathState;

    /// Compute a path. Fails only if a computation is already running or the
    /// controller was destroyed; search failures come back as a status.
    async fn compute(&self, start: Vec3, finish: Vec3) -> Result<PathStatus, PathError>;

    fn start_following(&self, mover: Arc<dyn Mover>, reached_distance: f32);

    fn pause(&self) -> bool;

    fn resume(&self, mover: Arc<dyn Mover>, reached_distance: f32) -> bool;

    fn stop(&self);

    fn waypoints(&self) -> Option<Vec<Waypoint>>;

    fn distance(&self) -> f32;
}

#[derive(Debug, Default)]
struct Route {
    waypoints: Vec<Waypoint>,
    index: usize,
    status: Option<PathStatus>,
}

struct Shared<S> {
    fsm: PathFsm,
    options: PathOptions,
    ticks: TickSignal,
    runtime: Handle,
    search: Mutex<Option<S>>,
    route: Mutex<Route>,
    follow_task: Mutex<Option<JoinHandle<()>>>,
    blocked_task: Mutex<Option<JoinHandle<()>>>,
}

impl<S> Shared<S> {
    fn cancel_follow(&self) {
        if let Some(task) = lock(&self.follow_task).take() {
            task.abort();
        }
    }

    fn cancel_blocked(&self) {
        if let Some(task) = lock(&self.blocked_task).take() {
            task.abort();
        }
    }

    fn active_waypoint(&self) -> Option<(usize, Waypoint)> {
        let route = lock(&self.route);
        route.waypoints.get(route.index).map(|wp| (route.index, *wp))
    }
}

/// Drives one agent along paths produced by a host search service.
///
/// Construct inside a Tokio runtime: the controller subscribes to the search
/// handle's blocked signal immediately and spawns its follow loop on that runtime.
pub struct PathController<S: PathSearch> {
    shared: Arc<Shared<S>>,
}

impl<S: PathSearch> PathController<S> {
    pub fn new<P>(
        service: &P,
        options: PathOptions,
        callbacks: PathCallbacks,
        ticks: TickSignal,
    ) -> Self
    where
        P: PathService<Search = S> + ?Sized,
    {
        let search = service.create_path(&options);
        Self::from_search(search, options, callbacks, ticks)
    }

    /// Wrap an existing search handle created with `options`.
    pub fn from_search(
        search: S,
        options: PathOptions,
        callbacks: PathCallbacks,
        ticks: TickSignal,
    ) -> Self {
        let blocked = search.blocked();
        let runtime = Handle::current();
        let shared = Arc::new(Shared {
            fsm: PathFsm::new(callbacks),
            options,
            ticks,
            runtime: runtime.clone(),
            search: Mutex::new(Some(search)),
            route: Mutex::new(Route::default()),
            follow_task: Mutex::new(None),
            blocked_task: Mutex::new(None),
        });

        let listener = runtime.spawn(listen_blocked(Arc::downgrade(&shared), blocked));
        *lock(&shared.blocked_task) = Some(listener);

        Self { shared }
    }

    pub fn state(&self) -> PathState {
        self.shared.fsm.state()
    }

    pub fn fsm(&self) -> &PathFsm {
        &self.shared.fsm
    }

    pub fn options(&self) -> &PathOptions {
        &self.shared.options
    }

    pub fn last_status(&self) -> Option<PathStatus> {
        lock(&self.shared.route).status
    }

    pub fn current_waypoint_index(&self) -> usize {
        lock(&self.shared.route).index
    }

    pub async fn compute(&self, start: Vec3, finish: Vec3) -> Result<PathStatus, PathError> {
        let shared = &self.shared;
        if lock(&shared.search).is_none() {
            return Err(PathError::Destroyed);
        }
        if !shared.fsm.transition_to(PathState::Computing) {
            return Err(PathError::Busy {
                state: shared.fsm.state(),
            });
        }

        // A new computation replaces the route the old loop was walking.
        shared.cancel_follow();
        tokio::task::yield_now().await;

        let outcome = lock(&shared.search).as_mut().map(|search| {
            let status = search.compute(start, finish);
            let waypoints = if status.is_success() {
                search.waypoints()
            } else {
                Vec::new()
            };
            (status, waypoints)
        });
        let Some((status, waypoints)) = outcome else {
            return Err(PathError::Destroyed);
        };

        debug!(%status, waypoints = waypoints.len(), "path computed");
        {
            let mut route = lock(&shared.route);
            route.status = Some(status);
            route.index = 0;
            route.waypoints = waypoints;
        }

        if !status.is_success() {
            shared.fsm.trigger_path_failed(status);
        }
        Ok(status)
    }

    pub fn start_following(&self, mover: Arc<dyn Mover>, reached_distance: f32) {
        if lock(&self.shared.route).waypoints.is_empty() {
            self.shared.fsm.trigger_path_failed(PathStatus::NoPath);
            return;
        }
        if !self.shared.fsm.transition_to(PathState::Following) {
            return;
        }

        lock(&self.shared.route).index = 0;
        self.spawn_follow(mover, reached_distance);
    }

    /// Stop issuing move commands but keep the current waypoint index.
    pub fn pause(&self) -> bool {
        if !self.shared.fsm.transition_to(PathState::Paused) {
            return false;
        }
        self.shared.cancel_follow();
        true
    }

    /// Continue from the waypoint that was active when paused.
    pub fn resume(&self, mover: Arc<dyn Mover>, reached_distance: f32) -> bool {
        if !self.shared.fsm.transition_to(PathState::Following) {
            return false;
        }
        self.spawn_follow(mover, reached_distance);
        true
    }

    /// Cancel following, force `Idle`, and forget follow progress.
    pub fn stop(&self) {
        self.shared.cancel_follow();
        self.shared.fsm.force_transition(PathState::Idle);
        lock(&self.shared.route).index = 0;
    }

    pub fn waypoints(&self) -> Option<Vec<Waypoint>> {
        let route = lock(&self.shared.route);
        match route.status {
            Some(PathStatus::Success) => Some(route.waypoints.clone()),
            _ => None,
        }
    }

    pub fn distance(&self) -> f32 {
        let route = lock(&self.shared.route);
        match route.status {
            Some(PathStatus::Success) => geometry::path_length(&route.waypoints),
            _ => 0.0,
        }
    }

    /// Stop, drop the blocked subscription, and release the search handle.
    pub fn destroy(self) {
        self.shutdown();
    }

    pub(crate) fn shutdown(&self) {
        self.stop();
        self.shared.cancel_blocked();
        lock(&self.shared.search).take();
    }

    fn spawn_follow(&self, mover: Arc<dyn Mover>, reached_distance: f32) {
        self.shared.cancel_follow();
        // Subscribe before spawning so a tick emitted right after this call is seen.
        let ticks = self.shared.ticks.subscribe();
        let task = self.shared.runtime.spawn(follow(
            Arc::clone(&self.shared),
            mover,
            reached_distance,
            ticks,
        ));
        *lock(&self.shared.follow_task) = Some(task);
    }
}

impl<S: PathSearch> Drop for PathController<S> {
    fn drop(&mut self) {
        self.shared.cancel_follow();
        self.shared.cancel_blocked();
    }
}

#[async_trait]
impl<S: PathSearch> PathFollower for PathController<S> {
    fn state(&self) -> PathState {
        PathController::state(self)
    }

    async fn compute(&self, start: Vec3, finish: Vec3) -> Result<PathStatus, PathError> {
        PathController::compute(self, start, finish).await
    }

    fn start_following(&self, mover: Arc<dyn Mover>, reached_distance: f32) {
        PathController::start_following(self, mover, reached_distance)
    }

    fn pause(&self) -> bool {
        PathController::pause(self)
    }

    fn resume(&self, mover: Arc<dyn Mover>, reached_distance: f32) -> bool {
        PathController::resume(self, mover, reached_distance)
    }

    fn stop(&self) {
        PathController::stop(self)
    }

    fn waypoints(&self) -> Option<Vec<Waypoint>> {
        PathController::waypoints(self)
    }

    fn distance(&self) -> f32 {
        PathController::distance(self)
    }
}

async fn follow<S>(
    shared: Arc<Shared<S>>,
    mover: Arc<dyn Mover>,
    reached_distance: f32,
    mut ticks: broadcast::Receiver<TickContext>,
) {
    loop {
        let Some((index, waypoint)) = shared.active_waypoint() else {
            shared.fsm.trigger_path_completed();
            return;
        };

        if waypoint.action == WaypointAction::Jump {
            mover.jump();
        }
        mover.move_to(waypoint.position);

        loop {
            match ticks.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => {
                    debug!("tick signal closed; follow loop exits");
                    return;
                }
            }
            if mover.position().distance(waypoint.position) <= reached_distance {
                break;
            }
        }

        debug!(index, "waypoint reached");
        shared.fsm.trigger_waypoint_reached(&waypoint, index);

        let finished = {
            let mut route = lock(&shared.route);
            route.index = index + 1;
            route.index >= route.waypoints.len()
        };
        if finished {
            shared.fsm.trigger_path_completed();
            return;
        }

        // Paused, stopped or blocked while we were waiting on ticks.
        if shared.fsm.state() != PathState::Following {
            return;
        }
    }
}

async fn listen_blocked<S>(shared: Weak<Shared<S>>, mut blocked: broadcast::Receiver<BlockedEvent>) {
    loop {
        let waypoint_index = match blocked.recv().await {
            Ok(event) => Some(event.waypoint_index),
            Err(RecvError::Lagged(_)) => None,
            Err(RecvError::Closed) => return,
        };
        let Some(strong) = shared.upgrade() else {
            return;
        };
        if strong.fsm.state() == PathState::Following {
            debug!(?waypoint_index, "path blocked while following");
            strong.fsm.trigger_path_blocked();
        }
    }
}
