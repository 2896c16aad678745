//! Navigation primitives (3D waypoints, path options, geometry, and a reference grid backend).

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod geometry;
pub mod grid;
pub mod math;
pub mod navigator;
pub mod options;
pub mod waypoint;

pub use grid::NavGrid;
pub use math::Vec3;
pub use navigator::{NavPath, NavRaycastHit, Navigator};
pub use options::PathOptions;
pub use waypoint::{PathStatus, Waypoint, WaypointAction};
