use crate::Vec3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Movement the agent must perform to reach a waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WaypointAction {
    #[default]
    Walk,
    Jump,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Waypoint {
    pub position: Vec3,
    pub action: WaypointAction,
}

impl Waypoint {
    pub fn new(position: Vec3, action: WaypointAction) -> Self {
        Self { position, action }
    }

    pub fn walk(position: Vec3) -> Self {
        Self::new(position, WaypointAction::Walk)
    }

    pub fn jump(position: Vec3) -> Self {
        Self::new(position, WaypointAction::Jump)
    }
}

/// Outcome code of a single path computation.
///
/// Only `Success` carries a followable path. The `Closest*` codes mean the
/// backend could not reach the requested finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PathStatus {
    Success,
    /// No full path; the backend found a partial route to the closest reachable point.
    ClosestNoPath,
    /// The finish lies beyond the configured maximum distance.
    ClosestOutOfRange,
    FailStartNotEmpty,
    FailFinishNotEmpty,
    NoPath,
}

impl PathStatus {
    pub fn is_success(self) -> bool {
        self == PathStatus::Success
    }

    pub fn name(self) -> &'static str {
        match self {
            PathStatus::Success => "success",
            PathStatus::ClosestNoPath => "closest_no_path",
            PathStatus::ClosestOutOfRange => "closest_out_of_range",
            PathStatus::FailStartNotEmpty => "fail_start_not_empty",
            PathStatus::FailFinishNotEmpty => "fail_finish_not_empty",
            PathStatus::NoPath => "no_path",
        }
    }
}

impl core::fmt::Display for PathStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
