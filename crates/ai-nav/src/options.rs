use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Agent constraints handed to a search backend when a path handle is created.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PathOptions {
    pub agent_radius: f32,
    pub agent_height: f32,
    pub agent_can_jump: bool,
    pub agent_can_climb: bool,
    /// Straight-line limit between start and finish. Infinite by default.
    #[cfg_attr(feature = "serde", serde(with = "max_distance_serde"))]
    pub max_distance: f32,
    /// Per-material cost multipliers. A non-finite or negative cost makes the material impassable.
    pub modifiers: BTreeMap<String, f32>,
}

impl PathOptions {
    pub const DEFAULT_AGENT_RADIUS: f32 = 2.0;
    pub const DEFAULT_AGENT_HEIGHT: f32 = 5.0;

    /// Replace out-of-range values with their defaults.
    ///
    /// Radius and height must be finite and positive; `max_distance` must be positive
    /// (NaN or non-positive becomes infinite). Modifiers with NaN costs are dropped.
    pub fn sanitized(mut self) -> Self {
        if !(self.agent_radius.is_finite() && self.agent_radius > 0.0) {
            self.agent_radius = Self::DEFAULT_AGENT_RADIUS;
        }
        if !(self.agent_height.is_finite() && self.agent_height > 0.0) {
            self.agent_height = Self::DEFAULT_AGENT_HEIGHT;
        }
        if self.max_distance.is_nan() || self.max_distance <= 0.0 {
            self.max_distance = f32::INFINITY;
        }
        self.modifiers.retain(|_, cost| !cost.is_nan());
        self
    }

    /// Cost multiplier for a material, `None` when the material is impassable.
    pub fn material_cost(&self, material: &str) -> Option<f32> {
        match self.modifiers.get(material) {
            None => Some(1.0),
            Some(&cost) if cost.is_finite() && cost >= 0.0 => Some(cost),
            Some(_) => None,
        }
    }

    /// Smallest multiplier in effect; used to keep grid heuristics admissible.
    pub fn min_cost(&self) -> f32 {
        self.modifiers
            .values()
            .copied()
            .filter(|c| c.is_finite() && *c >= 0.0)
            .fold(1.0, f32::min)
    }
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            agent_radius: Self::DEFAULT_AGENT_RADIUS,
            agent_height: Self::DEFAULT_AGENT_HEIGHT,
            agent_can_jump: true,
            agent_can_climb: false,
            max_distance: f32::INFINITY,
            modifiers: BTreeMap::new(),
        }
    }
}

// JSON and YAML have no infinity literal; an absent or null limit means "unbounded".
#[cfg(feature = "serde")]
mod max_distance_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
        Ok(Option::<f32>::deserialize(deserializer)?.unwrap_or(f32::INFINITY))
    }
}
