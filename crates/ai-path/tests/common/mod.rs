#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ai_path::{
    BlockedEvent, Mover, PathCallbacks, PathOptions, PathSearch, PathService, PathState,
    PathStatus, Vec3, Waypoint,
};
use tokio::sync::broadcast;

type Outcome = (PathStatus, Vec<Waypoint>);

struct Script {
    queued: Mutex<VecDeque<Outcome>>,
    fallback: Mutex<Outcome>,
    compute_calls: AtomicUsize,
    requests: Mutex<Vec<(Vec3, Vec3)>>,
    blocked: broadcast::Sender<BlockedEvent>,
}

/// Search service that replays queued outcomes, then repeats a fallback.
#[derive(Clone)]
pub struct ScriptedService {
    script: Arc<Script>,
}

impl ScriptedService {
    pub fn new() -> Self {
        let (blocked, _) = broadcast::channel(8);
        Self {
            script: Arc::new(Script {
                queued: Mutex::new(VecDeque::new()),
                fallback: Mutex::new((PathStatus::NoPath, Vec::new())),
                compute_calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
                blocked,
            }),
        }
    }

    pub fn succeed_with(self, waypoints: Vec<Waypoint>) -> Self {
        self.push(PathStatus::Success, waypoints);
        self
    }

    pub fn push(&self, status: PathStatus, waypoints: Vec<Waypoint>) {
        self.script
            .queued
            .lock()
            .unwrap()
            .push_back((status, waypoints));
    }

    pub fn set_fallback(&self, status: PathStatus, waypoints: Vec<Waypoint>) {
        *self.script.fallback.lock().unwrap() = (status, waypoints);
    }

    pub fn compute_calls(&self) -> usize {
        self.script.compute_calls.load(Ordering::SeqCst)
    }

    /// Endpoints of the most recent search.
    pub fn last_request(&self) -> Option<(Vec3, Vec3)> {
        self.script.requests.lock().unwrap().last().copied()
    }

    pub fn fire_blocked(&self, waypoint_index: usize) {
        let _ = self.script.blocked.send(BlockedEvent { waypoint_index });
    }

    pub fn blocked_subscribers(&self) -> usize {
        self.script.blocked.receiver_count()
    }
}

pub struct ScriptedSearch {
    script: Arc<Script>,
    waypoints: Vec<Waypoint>,
}

impl PathSearch for ScriptedSearch {
    fn compute(&mut self, start: Vec3, finish: Vec3) -> PathStatus {
        self.script.compute_calls.fetch_add(1, Ordering::SeqCst);
        self.script.requests.lock().unwrap().push((start, finish));
        let next = self.script.queued.lock().unwrap().pop_front();
        let (status, waypoints) =
            next.unwrap_or_else(|| self.script.fallback.lock().unwrap().clone());
        self.waypoints = if status.is_success() {
            waypoints
        } else {
            Vec::new()
        };
        status
    }

    fn waypoints(&self) -> Vec<Waypoint> {
        self.waypoints.clone()
    }

    fn blocked(&self) -> broadcast::Receiver<BlockedEvent> {
        self.script.blocked.subscribe()
    }
}

impl PathService for ScriptedService {
    type Search = ScriptedSearch;

    fn create_path(&self, _options: &PathOptions) -> ScriptedSearch {
        ScriptedSearch {
            script: Arc::clone(&self.script),
            waypoints: Vec::new(),
        }
    }
}

/// Mover that records commands; a teleporting mover arrives instantly.
pub struct TestMover {
    teleport: bool,
    position: Mutex<Vec3>,
    targets: Mutex<Vec<Vec3>>,
    jumps: AtomicUsize,
}

impl TestMover {
    pub fn teleporting() -> Arc<Self> {
        Arc::new(Self::with_teleport(true))
    }

    pub fn manual() -> Arc<Self> {
        Arc::new(Self::with_teleport(false))
    }

    fn with_teleport(teleport: bool) -> Self {
        Self {
            teleport,
            position: Mutex::new(Vec3::ZERO),
            targets: Mutex::new(Vec::new()),
            jumps: AtomicUsize::new(0),
        }
    }

    pub fn set_position(&self, position: Vec3) {
        *self.position.lock().unwrap() = position;
    }

    pub fn targets(&self) -> Vec<Vec3> {
        self.targets.lock().unwrap().clone()
    }

    pub fn jumps(&self) -> usize {
        self.jumps.load(Ordering::SeqCst)
    }
}

impl Mover for TestMover {
    fn move_to(&self, target: Vec3) {
        self.targets.lock().unwrap().push(target);
        if self.teleport {
            self.set_position(target);
        }
    }

    fn jump(&self) {
        self.jumps.fetch_add(1, Ordering::SeqCst);
    }

    fn position(&self) -> Vec3 {
        *self.position.lock().unwrap()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    State(PathState, PathState),
    Reached(usize),
    Completed,
    Failed(PathStatus),
    Blocked,
}

/// Collects every callback invocation in order.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn callbacks(self: &Arc<Self>) -> PathCallbacks {
        let states = Arc::clone(self);
        let reached = Arc::clone(self);
        let completed = Arc::clone(self);
        let failed = Arc::clone(self);
        let blocked = Arc::clone(self);
        PathCallbacks::new()
            .on_state_changed(move |from, to| states.push(Event::State(from, to)))
            .on_waypoint_reached(move |_, index| reached.push(Event::Reached(index)))
            .on_path_completed(move || completed.push(Event::Completed))
            .on_path_failed(move |reason| failed.push(Event::Failed(reason)))
            .on_path_blocked(move || blocked.push(Event::Blocked))
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }
}

pub fn walk(x: f32, z: f32) -> Waypoint {
    Waypoint::walk(Vec3::new(x, 0.0, z))
}

pub fn line_route() -> Vec<Waypoint> {
    vec![walk(0.0, 0.0), walk(10.0, 0.0), walk(20.0, 0.0)]
}

/// Let spawned tasks run until they block. Under a paused clock this also
/// advances virtual time by one millisecond.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
