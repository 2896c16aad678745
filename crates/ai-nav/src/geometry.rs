//! Pure geometric helpers over points and waypoint sequences.

use crate::{Vec3, Waypoint, WaypointAction};

pub fn distance(a: Vec3, b: Vec3) -> f32 {
    a.distance(b)
}

pub fn midpoint(a: Vec3, b: Vec3) -> Vec3 {
    (a + b) * 0.5
}

/// Linear interpolation; `t` is clamped to `[0, 1]`.
pub fn lerp(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    a.lerp(b, t.clamp(0.0, 1.0))
}

/// Unit direction from `from` to `to` (zero when the points coincide).
pub fn direction(from: Vec3, to: Vec3) -> Vec3 {
    (to - from).normalize_or_zero()
}

/// Sum of consecutive segment lengths.
pub fn path_length(waypoints: &[Waypoint]) -> f32 {
    waypoints
        .windows(2)
        .map(|w| w[0].position.distance(w[1].position))
        .sum()
}

/// Index of the waypoint closest to `point`. Ties resolve to the lowest index.
pub fn nearest_waypoint(waypoints: &[Waypoint], point: Vec3) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, wp) in waypoints.iter().enumerate() {
        let d = wp.position.distance_squared(point);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}

/// Closest point to `point` on segment `a..b`.
pub fn closest_point_on_segment(a: Vec3, b: Vec3, point: Vec3) -> Vec3 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return a;
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Closest point to `point` anywhere along the polyline.
pub fn nearest_point_on_path(waypoints: &[Waypoint], point: Vec3) -> Option<Vec3> {
    match waypoints {
        [] => None,
        [only] => Some(only.position),
        _ => waypoints
            .windows(2)
            .map(|w| closest_point_on_segment(w[0].position, w[1].position, point))
            .min_by(|a, b| {
                a.distance_squared(point)
                    .total_cmp(&b.distance_squared(point))
            }),
    }
}

/// Drop walk waypoints that sit closer than `min_spacing` to the previously kept waypoint.
///
/// The first and last waypoints and every jump waypoint are always kept.
pub fn filter_waypoints(waypoints: &[Waypoint], min_spacing: f32) -> Vec<Waypoint> {
    let Some((last, body)) = waypoints.split_last() else {
        return Vec::new();
    };

    let mut out: Vec<Waypoint> = Vec::with_capacity(waypoints.len());
    for wp in body {
        let keep = match out.last() {
            None => true,
            Some(prev) => {
                wp.action == WaypointAction::Jump
                    || prev.position.distance(wp.position) >= min_spacing
            }
        };
        if keep {
            out.push(*wp);
        }
    }
    out.push(*last);
    out
}

/// Remove interior walk waypoints that deviate less than `tolerance` from the line
/// between their kept neighbours.
///
/// Jump waypoints are never removed: the mover has to act at them.
pub fn simplify_waypoints(waypoints: &[Waypoint], tolerance: f32) -> Vec<Waypoint> {
    if waypoints.len() <= 2 {
        return waypoints.to_vec();
    }

    let mut out = Vec::with_capacity(waypoints.len());
    out.push(waypoints[0]);

    for i in 1..waypoints.len() - 1 {
        let wp = waypoints[i];
        if wp.action == WaypointAction::Jump {
            out.push(wp);
            continue;
        }

        let anchor = out.last().map(|w: &Waypoint| w.position).unwrap_or(wp.position);
        let next = waypoints[i + 1].position;
        let on_line = closest_point_on_segment(anchor, next, wp.position);
        if on_line.distance(wp.position) > tolerance {
            out.push(wp);
        }
    }

    out.push(waypoints[waypoints.len() - 1]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(x: f32, y: f32, z: f32) -> Waypoint {
        Waypoint::walk(Vec3::new(x, y, z))
    }

    #[test]
    fn path_length_sums_segments() {
        let path = [walk(0.0, 0.0, 0.0), walk(3.0, 0.0, 0.0), walk(3.0, 4.0, 0.0)];
        assert_eq!(path_length(&path), 7.0);
        assert_eq!(path_length(&path[..1]), 0.0);
        assert_eq!(path_length(&[]), 0.0);
    }

    #[test]
    fn simplify_drops_collinear_walk_points() {
        let path = [
            walk(0.0, 0.0, 0.0),
            walk(1.0, 0.0, 0.0),
            walk(2.0, 0.0, 0.0),
            walk(2.0, 0.0, 2.0),
        ];
        let simplified = simplify_waypoints(&path, 0.01);
        assert_eq!(
            simplified,
            vec![walk(0.0, 0.0, 0.0), walk(2.0, 0.0, 0.0), walk(2.0, 0.0, 2.0)]
        );
    }

    #[test]
    fn simplify_keeps_jumps() {
        let path = [
            walk(0.0, 0.0, 0.0),
            Waypoint::jump(Vec3::new(1.0, 0.0, 0.0)),
            walk(2.0, 0.0, 0.0),
        ];
        assert_eq!(simplify_waypoints(&path, 0.5).len(), 3);
    }

    #[test]
    fn filter_keeps_endpoints() {
        let path = [
            walk(0.0, 0.0, 0.0),
            walk(0.1, 0.0, 0.0),
            walk(0.2, 0.0, 0.0),
            walk(5.0, 0.0, 0.0),
        ];
        let filtered = filter_waypoints(&path, 1.0);
        assert_eq!(filtered, vec![walk(0.0, 0.0, 0.0), walk(5.0, 0.0, 0.0)]);
    }

    #[test]
    fn nearest_point_projects_onto_segments() {
        let path = [walk(0.0, 0.0, 0.0), walk(10.0, 0.0, 0.0)];
        let p = nearest_point_on_path(&path, Vec3::new(4.0, 0.0, 3.0)).expect("point");
        assert_eq!(p, Vec3::new(4.0, 0.0, 0.0));
        assert_eq!(nearest_waypoint(&path, Vec3::new(7.0, 0.0, 0.0)), Some(1));
        assert_eq!(midpoint(path[0].position, path[1].position), Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(direction(path[0].position, path[1].position), Vec3::new(1.0, 0.0, 0.0));
    }
}
