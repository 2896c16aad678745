//! [`PathService`] backed by a shared [`NavGrid`].

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, Weak};

use ai_nav::{NavGrid, Navigator};
use tokio::sync::broadcast;
use tracing::debug;

use crate::{
    lock, BlockedEvent, PathOptions, PathSearch, PathService, PathStatus, Vec3, Waypoint,
};

const BLOCKED_CHANNEL_CAPACITY: usize = 16;

struct GridShared {
    grid: RwLock<NavGrid>,
    searches: Mutex<Vec<Weak<SearchState>>>,
}

impl GridShared {
    fn read(&self) -> RwLockReadGuard<'_, NavGrid> {
        self.grid.read().unwrap_or_else(PoisonError::into_inner)
    }
}

struct SearchState {
    waypoints: Mutex<Vec<Waypoint>>,
    blocked: broadcast::Sender<BlockedEvent>,
}

/// Grid-backed search service.
///
/// Clones share the grid. Blocking a cell with [`GridPathService::set_blocked`]
/// notifies every live search whose last successful path crosses that cell.
#[derive(Clone)]
pub struct GridPathService {
    shared: Arc<GridShared>,
}

impl GridPathService {
    pub fn new(grid: NavGrid) -> Self {
        Self {
            shared: Arc::new(GridShared {
                grid: RwLock::new(grid),
                searches: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Searches currently registered for blocked notifications.
    pub fn tracked_searches(&self) -> usize {
        lock(&self.shared.searches).len()
    }

    pub fn with_grid<R>(&self, f: impl FnOnce(&NavGrid) -> R) -> R {
        f(&self.shared.read())
    }

    /// Change a cell's blocked flag; returns how many searches were notified.
    pub fn set_blocked(&self, x: i32, y: i32, blocked: bool) -> usize {
        self.shared
            .grid
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set_blocked(x, y, blocked);
        if !blocked {
            return 0;
        }

        let grid = self.shared.read();

        let mut notified = 0;
        let mut searches = lock(&self.shared.searches);
        searches.retain(|weak| {
            let Some(state) = weak.upgrade() else {
                return false;
            };
            let waypoints = lock(&state.waypoints);
            if let Some(waypoint_index) = first_blocked_waypoint(&grid, &waypoints, x, y) {
                debug!(x, y, waypoint_index, "grid change blocks a computed path");
                // A search without subscribers is not being followed.
                if state.blocked.send(BlockedEvent { waypoint_index }).is_ok() {
                    notified += 1;
                }
            }
            true
        });
        notified
    }
}

fn first_blocked_waypoint(
    grid: &NavGrid,
    waypoints: &[Waypoint],
    x: i32,
    y: i32,
) -> Option<usize> {
    match waypoints {
        [] => None,
        [only] => grid.path_crosses_cell(&[*only], x, y).then_some(0),
        _ => (0..waypoints.len() - 1)
            .find(|&i| grid.path_crosses_cell(&waypoints[i..=i + 1], x, y))
            .map(|i| i + 1),
    }
}

impl PathService for GridPathService {
    type Search = GridSearch;

    fn create_path(&self, options: &PathOptions) -> GridSearch {
        let (blocked, _) = broadcast::channel(BLOCKED_CHANNEL_CAPACITY);
        let state = Arc::new(SearchState {
            waypoints: Mutex::new(Vec::new()),
            blocked,
        });
        {
            let mut searches = lock(&self.shared.searches);
            searches.retain(|weak| weak.strong_count() > 0);
            searches.push(Arc::downgrade(&state));
        }

        GridSearch {
            shared: Arc::clone(&self.shared),
            options: options.clone().sanitized(),
            state,
        }
    }

    fn raycast(&self, from: Vec3, to: Vec3) -> Option<Vec3> {
        self.shared.read().raycast(from, to).map(|hit| hit.point)
    }
}

/// One search handle created by [`GridPathService`].
pub struct GridSearch {
    shared: Arc<GridShared>,
    options: PathOptions,
    state: Arc<SearchState>,
}

impl GridSearch {
    pub fn options(&self) -> &PathOptions {
        &self.options
    }
}

impl PathSearch for GridSearch {
    fn compute(&mut self, start: Vec3, finish: Vec3) -> PathStatus {
        let path = self.shared.read().find_path(start, finish, &self.options);
        let mut waypoints = lock(&self.state.waypoints);
        if path.status.is_success() {
            *waypoints = path.waypoints;
        } else {
            waypoints.clear();
        }
        path.status
    }

    fn waypoints(&self) -> Vec<Waypoint> {
        lock(&self.state.waypoints).clone()
    }

    fn blocked(&self) -> broadcast::Receiver<BlockedEvent> {
        self.state.blocked.subscribe()
    }
}
