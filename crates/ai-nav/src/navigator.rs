use crate::{PathOptions, PathStatus, Vec3, Waypoint};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Result of a single search.
///
/// `waypoints` is non-empty for `Success`, may hold a partial route for
/// `ClosestNoPath`, and is empty otherwise.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NavPath {
    pub status: PathStatus,
    pub waypoints: Vec<Waypoint>,
}

impl NavPath {
    pub fn new(status: PathStatus, waypoints: Vec<Waypoint>) -> Self {
        Self { status, waypoints }
    }

    pub fn failed(status: PathStatus) -> Self {
        Self::new(status, Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NavRaycastHit {
    pub point: Vec3,
}

pub trait Navigator {
    fn find_path(&self, start: Vec3, goal: Vec3, options: &PathOptions) -> NavPath;

    /// Raycast inside the nav representation.
    ///
    /// Returns the first point where the segment from `start` to `end` leaves navigable space.
    /// Backends that don't support raycasts may return `None`.
    fn raycast(&self, _start: Vec3, _end: Vec3) -> Option<NavRaycastHit> {
        None
    }
}
