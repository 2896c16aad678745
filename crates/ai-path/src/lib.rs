//! Path following over a host-supplied search service.
//!
//! A [`PathController`] owns one [`PathFsm`], the waypoints of its last successful
//! computation, and the follow loop that walks a [`Mover`] through them on each
//! [`TickSignal`] tick. [`RetryingPathController`] wraps a controller and recomputes
//! automatically when the path is blocked or a computation fails.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod config;
pub mod controller;
pub mod error;
pub mod fsm;
pub mod grid;
pub mod query;
pub mod retry;
pub mod service;
pub mod tick;

pub use ai_nav::{PathOptions, PathStatus, Vec3, Waypoint, WaypointAction};
pub use config::{PathConfig, RetrySettings};
pub use controller::{PathController, PathFollower, DEFAULT_REACHED_DISTANCE};
pub use error::PathError;
pub use fsm::{PathCallbacks, PathFsm, PathState};
pub use grid::{GridPathService, GridSearch};
pub use query::PerformanceImpact;
pub use retry::{default_should_retry, RetryConfig, RetryingPathController, ShouldRetry};
pub use service::{BlockedEvent, Mover, PathSearch, PathService};
pub use tick::{TickContext, TickSignal};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a panicking callback poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
