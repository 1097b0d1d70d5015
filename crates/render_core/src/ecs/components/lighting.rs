//! Lighting component for ECS
//!
//! Position and direction are not stored here: they come from the entity's
//! resolved world transform (translation and forward axis).

use std::sync::atomic::{AtomicU64, Ordering};

use crate::ecs::Component;
use crate::foundation::math::Vec3;

static NEXT_LIGHT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable light identity, unique for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(u64);

impl LightId {
    /// Allocate a fresh identity
    pub fn next() -> Self {
        Self(NEXT_LIGHT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw identity value
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Types of lights supported by the lighting system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightType {
    /// Directional light (like sunlight) with parallel rays
    Directional,
    /// Point light that radiates in all directions from a position
    Point,
    /// Spot light that creates a cone of light from a position
    Spot,
}

impl LightType {
    /// Tag written into the shader light record (0 marks an empty slot)
    pub const fn shader_tag(self) -> f32 {
        match self {
            Self::Directional => 1.0,
            Self::Point => 2.0,
            Self::Spot => 3.0,
        }
    }
}

/// Light data attached to an entity
#[derive(Debug, Clone, PartialEq)]
pub struct LightComponent {
    /// The type of light
    pub light_type: LightType,
    /// Linear RGB color
    pub color: Vec3,
    /// Intensity multiplier
    pub intensity: f32,
    /// Reach of point and spot lights
    pub range: f32,
    /// Cosine of the spot cone's inner angle
    pub inner_cutoff: f32,
    /// Cosine of the spot cone's outer angle
    pub outer_cutoff: f32,
    /// Whether the light contributes at all
    pub enabled: bool,
    /// Stable identity used by the light index
    pub id: LightId,
}

impl Component for LightComponent {}

/// Factory functions for creating light components
pub struct LightFactory;

impl LightFactory {
    /// Sun-style light; its direction is the entity's forward axis
    pub fn directional(color: Vec3, intensity: f32) -> LightComponent {
        LightComponent {
            light_type: LightType::Directional,
            color,
            intensity,
            range: 0.0,
            inner_cutoff: 0.0,
            outer_cutoff: 0.0,
            enabled: true,
            id: LightId::next(),
        }
    }

    /// Point light with the given reach
    pub fn point(color: Vec3, intensity: f32, range: f32) -> LightComponent {
        LightComponent {
            light_type: LightType::Point,
            color,
            intensity,
            range,
            inner_cutoff: 0.0,
            outer_cutoff: 0.0,
            enabled: true,
            id: LightId::next(),
        }
    }

    /// Spot light; cone angles are given in radians and stored as cosines
    pub fn spot(color: Vec3, intensity: f32, range: f32, inner_angle: f32, outer_angle: f32) -> LightComponent {
        LightComponent {
            light_type: LightType::Spot,
            color,
            intensity,
            range,
            inner_cutoff: inner_angle.cos(),
            outer_cutoff: outer_angle.cos(),
            enabled: true,
            id: LightId::next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_factory_assigns_distinct_ids() {
        let a = LightFactory::point(Vec3::new(1.0, 1.0, 1.0), 1.0, 5.0);
        let b = LightFactory::point(Vec3::new(1.0, 1.0, 1.0), 1.0, 5.0);
        assert_ne!(a.id, b.id);
        assert_eq!(a.light_type, LightType::Point);
    }

    #[test]
    fn test_spot_cutoffs_are_cosines() {
        let spot = LightFactory::spot(Vec3::new(1.0, 0.9, 0.8), 2.0, 10.0, 0.0, std::f32::consts::FRAC_PI_3);
        assert_relative_eq!(spot.inner_cutoff, 1.0);
        assert_relative_eq!(spot.outer_cutoff, 0.5, epsilon = 1e-6);
    }
}
