//! Bounding volumes and frustum tests

use crate::foundation::math::{Mat4, Vec3, Vec4};

/// Axis-Aligned Bounding Box for spatial queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl AABB {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Cube of the given half-extent around a point
    pub fn cube(center: Vec3, half_extent: f32) -> Self {
        Self::from_center_extents(center, Vec3::repeat(half_extent))
    }

    /// Smallest box enclosing every point; `None` for an empty input
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |bounds, point| Self {
            min: bounds.min.inf(&point),
            max: bounds.max.sup(&point),
        }))
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// The eight corners, bit 0/1/2 selecting max on x/y/z
    pub fn corners(&self) -> [Vec3; 8] {
        std::array::from_fn(|i| {
            Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            )
        })
    }

    /// World-space box of this local box under an affine transform
    ///
    /// Transforms all eight corners, so rotated boxes stay conservative.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let corners = self.corners().map(|corner| {
            matrix
                .transform_point(&nalgebra::Point3::from(corner))
                .coords
        });
        Self::from_points(corners).unwrap_or(*self)
    }

    /// Grow every side by `amount`
    pub fn expanded(&self, amount: f32) -> Self {
        let grow = Vec3::repeat(amount);
        Self::new(self.min - grow, self.max + grow)
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Check if this AABB intersects another AABB
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }
}

/// Plane defined by normal and distance from origin
///
/// Points with a non-negative signed distance are on the inner side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Normal vector (normalized unless degenerate)
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Plane from `ax + by + cz + d` coefficients, normalized
    pub fn from_coefficients(coefficients: Vec4) -> Self {
        let normal = Vec3::new(coefficients.x, coefficients.y, coefficients.z);
        let length = normal.norm();
        if length > f32::EPSILON {
            Self {
                normal: normal / length,
                distance: coefficients.w / length,
            }
        } else {
            Self {
                normal,
                distance: coefficients.w,
            }
        }
    }

    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }
}

/// Result of testing a box against a frustum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    /// Entirely outside at least one plane
    Disjoint,
    /// Straddles one or more planes
    Intersecting,
    /// Inside every plane
    Contains,
}

/// Six-plane view volume
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    /// Planes in the order left, right, bottom, top, near, far
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Left plane index
    pub const LEFT: usize = 0;
    /// Right plane index
    pub const RIGHT: usize = 1;
    /// Bottom plane index
    pub const BOTTOM: usize = 2;
    /// Top plane index
    pub const TOP: usize = 3;
    /// Near plane index
    pub const NEAR: usize = 4;
    /// Far plane index
    pub const FAR: usize = 5;

    /// Extract frustum planes from a view-projection matrix
    ///
    /// Gribb-Hartmann extraction for clip space with `-w <= x, y <= w` and
    /// `0 <= z <= w`.
    #[must_use]
    pub fn from_matrix(view_projection: &Mat4) -> Self {
        let row = |i: usize| {
            Vec4::new(
                view_projection[(i, 0)],
                view_projection[(i, 1)],
                view_projection[(i, 2)],
                view_projection[(i, 3)],
            )
        };
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        Self {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r2),
                Plane::from_coefficients(r3 - r2),
            ],
        }
    }

    /// Classify a box against all six planes
    #[must_use]
    pub fn classify(&self, aabb: &AABB) -> Containment {
        let mut result = Containment::Contains;
        for plane in &self.planes {
            // Corner furthest along the normal, and the one furthest against it
            let mut positive = aabb.min;
            let mut negative = aabb.max;
            if plane.normal.x >= 0.0 {
                positive.x = aabb.max.x;
                negative.x = aabb.min.x;
            }
            if plane.normal.y >= 0.0 {
                positive.y = aabb.max.y;
                negative.y = aabb.min.y;
            }
            if plane.normal.z >= 0.0 {
                positive.z = aabb.max.z;
                negative.z = aabb.min.z;
            }

            if plane.distance_to_point(positive) < 0.0 {
                return Containment::Disjoint;
            }
            if plane.distance_to_point(negative) < 0.0 {
                result = Containment::Intersecting;
            }
        }
        result
    }

    /// Check if an AABB is inside or intersects the frustum
    pub fn intersects_aabb(&self, aabb: &AABB) -> bool {
        self.classify(aabb) != Containment::Disjoint
    }

    /// Whether a point lies inside every plane
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(point) >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{utils, Mat4Ext};
    use approx::assert_relative_eq;

    fn camera_frustum() -> Frustum {
        // Camera at z = 5 looking at the origin
        let view = Mat4::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros(), Vec3::y());
        let projection = Mat4::perspective(utils::deg_to_rad(60.0), 1.0, 0.1, 100.0)
            * Mat4::vulkan_coordinate_transform();
        Frustum::from_matrix(&(projection * view))
    }

    #[test]
    fn test_aabb_contains_point() {
        let aabb = AABB::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));

        assert!(aabb.contains_point(Vec3::zeros()));
        assert!(aabb.contains_point(Vec3::new(0.5, 0.5, 0.5)));
        assert!(!aabb.contains_point(Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_aabb_intersects() {
        let aabb1 = AABB::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 2.0, 2.0));
        let aabb2 = AABB::new(Vec3::new(1.0, 1.0, 1.0), Vec3::new(3.0, 3.0, 3.0));
        let aabb3 = AABB::new(Vec3::new(5.0, 5.0, 5.0), Vec3::new(7.0, 7.0, 7.0));

        assert!(aabb1.intersects(&aabb2));
        assert!(!aabb1.intersects(&aabb3));
    }

    #[test]
    fn test_transformed_rotated_box_is_conservative() {
        let unit = AABB::cube(Vec3::zeros(), 1.0);
        let rotation = Mat4::from_axis_angle(&Vec3::y_axis(), std::f32::consts::FRAC_PI_4);
        let moved = Mat4::new_translation(&Vec3::new(10.0, 0.0, 0.0)) * rotation;

        let bounds = unit.transformed(&moved);
        let half_diagonal = std::f32::consts::SQRT_2;
        assert_relative_eq!(bounds.center(), Vec3::new(10.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(bounds.extents().x, half_diagonal, epsilon = 1e-5);
        assert_relative_eq!(bounds.extents().y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_planes_are_normalized() {
        let frustum = camera_frustum();
        for plane in &frustum.planes {
            assert_relative_eq!(plane.normal.norm(), 1.0, epsilon = 1e-5);
        }
        // Near plane faces away from the camera, 0.1 in front of it
        let near = frustum.planes[Frustum::NEAR];
        assert_relative_eq!(near.normal, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-5);
        assert_relative_eq!(near.distance_to_point(Vec3::new(0.0, 0.0, 4.9)), 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_classify_three_cases() {
        let frustum = camera_frustum();

        let inside = AABB::cube(Vec3::zeros(), 0.5);
        let straddling = AABB::cube(Vec3::new(0.0, 0.0, 5.0), 1.0);
        let outside = AABB::cube(Vec3::new(100.0, 0.0, 0.0), 1.0);
        let behind = AABB::cube(Vec3::new(0.0, 0.0, 20.0), 1.0);

        assert_eq!(frustum.classify(&inside), Containment::Contains);
        assert_eq!(frustum.classify(&straddling), Containment::Intersecting);
        assert_eq!(frustum.classify(&outside), Containment::Disjoint);
        assert_eq!(frustum.classify(&behind), Containment::Disjoint);
        assert!(frustum.contains_point(Vec3::zeros()));
    }
}
