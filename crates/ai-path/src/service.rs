//! Capabilities a host supplies: the search service and the mover.

use ai_nav::{PathOptions, PathStatus, Vec3, Waypoint};
use tokio::sync::broadcast;

/// A previously computed path became obstructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockedEvent {
    /// Index of the first waypoint whose approach is obstructed.
    pub waypoint_index: usize,
}

/// A search handle bound to one set of [`PathOptions`].
pub trait PathSearch: Send + 'static {
    /// Run a search and keep its result until the next call.
    fn compute(&mut self, start: Vec3, finish: Vec3) -> PathStatus;

    /// Waypoints of the last computation. Empty unless it succeeded.
    fn waypoints(&self) -> Vec<Waypoint>;

    /// Subscribe to obstruction notifications for the last computed path.
    fn blocked(&self) -> broadcast::Receiver<BlockedEvent>;
}

/// Factory for search handles; the handle is recreated, never mutated, when options change.
pub trait PathService: Send + Sync {
    type Search: PathSearch;

    fn create_path(&self, options: &PathOptions) -> Self::Search;

    /// First obstruction along the segment `from..to`, if any.
    ///
    /// Services without an occlusion query report a clear line.
    fn raycast(&self, _from: Vec3, _to: Vec3) -> Option<Vec3> {
        None
    }
}

/// Agent movement, executed by the host.
pub trait Mover: Send + Sync {
    fn move_to(&self, target: Vec3);
    fn jump(&self);
    fn position(&self) -> Vec3;
}
