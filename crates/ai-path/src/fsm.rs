//! Path lifecycle state machine.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::{lock, PathStatus, Waypoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathState {
    Idle,
    Computing,
    Following,
    Blocked,
    Completed,
    Failed,
    Paused,
}

impl PathState {
    pub const ALL: [PathState; 7] = [
        PathState::Idle,
        PathState::Computing,
        PathState::Following,
        PathState::Blocked,
        PathState::Completed,
        PathState::Failed,
        PathState::Paused,
    ];

    /// States reachable from `self` through a validated transition.
    pub const fn valid_targets(self) -> &'static [PathState] {
        use PathState::*;
        match self {
            Idle => &[Computing],
            Computing => &[Following, Failed],
            Following => &[Blocked, Completed, Failed, Paused, Computing],
            Blocked => &[Computing, Failed, Following],
            Paused => &[Following, Computing, Failed],
            Completed => &[Idle, Computing],
            Failed => &[Idle, Computing],
        }
    }

    pub fn can_transition_to(self, target: PathState) -> bool {
        self.valid_targets().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PathState::Completed | PathState::Failed)
    }

    pub fn is_active(self) -> bool {
        matches!(self, PathState::Computing | PathState::Following)
    }
}

pub type StateChangedFn = Arc<dyn Fn(PathState, PathState) + Send + Sync>;
pub type WaypointReachedFn = Arc<dyn Fn(&Waypoint, usize) + Send + Sync>;
pub type PathCompletedFn = Arc<dyn Fn() + Send + Sync>;
pub type PathFailedFn = Arc<dyn Fn(PathStatus) + Send + Sync>;
pub type PathBlockedFn = Arc<dyn Fn() + Send + Sync>;

/// Lifecycle notifications. Every callback is optional.
#[derive(Clone, Default)]
pub struct PathCallbacks {
    pub(crate) on_state_changed: Option<StateChangedFn>,
    pub(crate) on_waypoint_reached: Option<WaypointReachedFn>,
    pub(crate) on_path_completed: Option<PathCompletedFn>,
    pub(crate) on_path_failed: Option<PathFailedFn>,
    pub(crate) on_path_blocked: Option<PathBlockedFn>,
}

impl PathCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with `(old, new)` after every state change.
    pub fn on_state_changed(
        mut self,
        f: impl Fn(PathState, PathState) + Send + Sync + 'static,
    ) -> Self {
        self.on_state_changed = Some(Arc::new(f));
        self
    }

    pub fn on_waypoint_reached(mut self, f: impl Fn(&Waypoint, usize) + Send + Sync + 'static) -> Self {
        self.on_waypoint_reached = Some(Arc::new(f));
        self
    }

    pub fn on_path_completed(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_path_completed = Some(Arc::new(f));
        self
    }

    pub fn on_path_failed(mut self, f: impl Fn(PathStatus) + Send + Sync + 'static) -> Self {
        self.on_path_failed = Some(Arc::new(f));
        self
    }

    pub fn on_path_blocked(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_path_blocked = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for PathCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathCallbacks")
            .field("on_state_changed", &self.on_state_changed.is_some())
            .field("on_waypoint_reached", &self.on_waypoint_reached.is_some())
            .field("on_path_completed", &self.on_path_completed.is_some())
            .field("on_path_failed", &self.on_path_failed.is_some())
            .field("on_path_blocked", &self.on_path_blocked.is_some())
            .finish()
    }
}

/// Owns the current [`PathState`] and fans out lifecycle callbacks.
///
/// The state lock is released before any callback runs, so callbacks may query
/// or drive the machine re-entrantly. Check-and-set in [`PathFsm::transition_to`]
/// is atomic; the machine is otherwise meant for cooperative use from one task at
/// a time.
#[derive(Debug)]
pub struct PathFsm {
    state: Mutex<PathState>,
    callbacks: PathCallbacks,
}

impl PathFsm {
    pub fn new(callbacks: PathCallbacks) -> Self {
        Self {
            state: Mutex::new(PathState::Idle),
            callbacks,
        }
    }

    pub fn state(&self) -> PathState {
        *lock(&self.state)
    }

    pub fn can_transition_to(&self, target: PathState) -> bool {
        self.state().can_transition_to(target)
    }

    /// Validated transition. Rejections are logged and leave the state untouched.
    pub fn transition_to(&self, target: PathState) -> bool {
        let previous = {
            let mut state = lock(&self.state);
            let current = *state;
            if !current.can_transition_to(target) {
                drop(state);
                warn!(from = ?current, to = ?target, "rejected path state transition");
                return false;
            }
            *state = target;
            current
        };

        debug!(from = ?previous, to = ?target, "path state transition");
        self.notify_state_changed(previous, target);
        true
    }

    /// Privileged transition that skips the table.
    ///
    /// Always lands in `target`; `on_state_changed` fires only if the state actually changed.
    pub fn force_transition(&self, target: PathState) {
        let previous = std::mem::replace(&mut *lock(&self.state), target);
        if previous != target {
            debug!(from = ?previous, to = ?target, "forced path state transition");
            self.notify_state_changed(previous, target);
        }
    }

    pub fn trigger_waypoint_reached(&self, waypoint: &Waypoint, index: usize) {
        if let Some(f) = &self.callbacks.on_waypoint_reached {
            f(waypoint, index);
        }
    }

    pub fn trigger_path_completed(&self) {
        self.force_transition(PathState::Completed);
        if let Some(f) = &self.callbacks.on_path_completed {
            f();
        }
    }

    pub fn trigger_path_failed(&self, reason: PathStatus) {
        self.force_transition(PathState::Failed);
        if let Some(f) = &self.callbacks.on_path_failed {
            f(reason);
        }
    }

    pub fn trigger_path_blocked(&self) {
        self.force_transition(PathState::Blocked);
        if let Some(f) = &self.callbacks.on_path_blocked {
            f();
        }
    }

    /// Back to `Idle` without validation or notification.
    pub fn reset(&self) {
        *lock(&self.state) = PathState::Idle;
    }

    pub fn valid_transitions(&self) -> &'static [PathState] {
        self.state().valid_targets()
    }

    pub fn is_terminal_state(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn is_active_state(&self) -> bool {
        self.state().is_active()
    }

    fn notify_state_changed(&self, previous: PathState, next: PathState) {
        if let Some(f) = &self.callbacks.on_state_changed {
            f(previous, next);
        }
    }
}

impl Default for PathFsm {
    fn default() -> Self {
        Self::new(PathCallbacks::default())
    }
}
