//! One-shot path queries and small helpers built on the controller.

use ai_nav::geometry;

use crate::{PathCallbacks, PathController, PathOptions, PathService, TickSignal, Vec3, Waypoint};

pub use ai_nav::geometry::{filter_waypoints, simplify_waypoints};

/// Compute a path once and keep the controller only long enough to read it back.
async fn compute_once<P: PathService + ?Sized>(
    service: &P,
    start: Vec3,
    finish: Vec3,
    options: &PathOptions,
) -> Option<Vec<Waypoint>> {
    let controller = PathController::new(
        service,
        options.clone(),
        PathCallbacks::default(),
        TickSignal::new(),
    );
    // A fresh controller is idle, so compute cannot be busy.
    let waypoints = match controller.compute(start, finish).await {
        Ok(status) if status.is_success() => controller.waypoints(),
        _ => None,
    };
    controller.destroy();
    waypoints
}

pub async fn path_exists<P: PathService + ?Sized>(
    service: &P,
    start: Vec3,
    finish: Vec3,
    options: &PathOptions,
) -> bool {
    compute_once(service, start, finish, options).await.is_some()
}

/// Length of the computed path, `None` if there is no path.
pub async fn path_distance<P: PathService + ?Sized>(
    service: &P,
    start: Vec3,
    finish: Vec3,
    options: &PathOptions,
) -> Option<f32> {
    compute_once(service, start, finish, options)
        .await
        .map(|waypoints| geometry::path_length(&waypoints))
}

pub async fn path_waypoints<P: PathService + ?Sized>(
    service: &P,
    start: Vec3,
    finish: Vec3,
    options: &PathOptions,
) -> Option<Vec<Waypoint>> {
    compute_once(service, start, finish, options).await
}

pub fn straight_line_distance(a: Vec3, b: Vec3) -> f32 {
    geometry::distance(a, b)
}

pub fn has_line_of_sight<P: PathService + ?Sized>(service: &P, from: Vec3, to: Vec3) -> bool {
    service.raycast(from, to).is_none()
}

/// Fill in defaults for missing or out-of-range options.
pub fn validate_options(options: Option<PathOptions>) -> PathOptions {
    options.unwrap_or_default().sanitized()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PerformanceImpact {
    Low,
    Medium,
    High,
}

/// Rough cost class of a query, from its straight-line distance and how many
/// option features the search has to honour.
pub fn estimate_performance_impact(distance: f32, options: &PathOptions) -> PerformanceImpact {
    if !distance.is_finite() {
        return PerformanceImpact::High;
    }

    let complexity = options.modifiers.len()
        + usize::from(options.agent_can_climb)
        + usize::from(options.agent_radius > PathOptions::DEFAULT_AGENT_RADIUS);

    if distance <= 100.0 && complexity <= 1 {
        PerformanceImpact::Low
    } else if distance <= 500.0 && complexity <= 3 {
        PerformanceImpact::Medium
    } else {
        PerformanceImpact::High
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impact_grows_with_distance_and_complexity() {
        let simple = PathOptions::default();
        assert_eq!(estimate_performance_impact(50.0, &simple), PerformanceImpact::Low);
        assert_eq!(estimate_performance_impact(300.0, &simple), PerformanceImpact::Medium);
        assert_eq!(estimate_performance_impact(900.0, &simple), PerformanceImpact::High);

        let mut complex = PathOptions {
            agent_can_climb: true,
            ..PathOptions::default()
        };
        complex.modifiers.insert("water".into(), 4.0);
        assert_eq!(estimate_performance_impact(50.0, &complex), PerformanceImpact::Medium);

        complex.modifiers.insert("lava".into(), f32::INFINITY);
        complex.modifiers.insert("mud".into(), 2.0);
        assert_eq!(estimate_performance_impact(50.0, &complex), PerformanceImpact::High);
        assert_eq!(
            estimate_performance_impact(f32::NAN, &simple),
            PerformanceImpact::High
        );
    }

    #[test]
    fn validate_options_fills_defaults() {
        assert_eq!(validate_options(None), PathOptions::default());
        let fixed = validate_options(Some(PathOptions {
            agent_height: 0.0,
            ..PathOptions::default()
        }));
        assert_eq!(fixed.agent_height, 5.0);
    }
}
