//! Common types and traits for 3D geometry.
//!
//! `Vec3` carries canonical (centimeter) extents and offsets, `BoundingBox`
//! is used to check realized placements against each other.

use std::ops::{Add, Sub};

/// Global numerical tolerance for floating-point comparisons.
///
/// Used for dimension, weight and unit-conversion comparisons.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// Represents a 3D vector or point in space.
///
/// `x` runs along the length, `y` along the width and `z` along the height.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    fn components(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Length × width × height.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.components().iter().product()
    }

    /// All three components finite and strictly positive.
    #[inline]
    pub fn is_valid_dimension(&self) -> bool {
        self.components().iter().all(|v| v.is_finite() && *v > 0.0)
    }

    /// Component-wise `<=` against `container`, without swapping axes.
    #[inline]
    pub fn fits_within(&self, container: &Self, tolerance: f64) -> bool {
        self.components()
            .iter()
            .zip(container.components())
            .all(|(v, limit)| *v <= limit + tolerance)
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Trait for objects with a canonical 3D extent.
///
/// Implementors always report centimeters, whatever unit they were
/// described in.
pub trait Dimensional {
    /// Returns the normalized dimensions (length, width, height) in cm.
    fn dimensions(&self) -> Vec3;

    /// Calculates the volume in cm³.
    fn volume(&self) -> f64 {
        self.dimensions().volume()
    }

    /// Checks if this object fits, axis by axis, in the given extent.
    fn fits_in(&self, container_dims: &Vec3, tolerance: f64) -> bool {
        self.dimensions().fits_within(container_dims, tolerance)
    }
}

/// Axis-aligned box spanned by a placement, in cells or cm.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    #[inline]
    pub fn from_position_and_dims(position: Vec3, dims: Vec3) -> Self {
        Self {
            min: position,
            max: position + dims,
        }
    }

    /// (min, max) per axis: length, width, height.
    #[inline]
    fn spans(&self) -> [(f64, f64); 3] {
        [
            (self.min.x, self.max.x),
            (self.min.y, self.max.y),
            (self.min.z, self.max.z),
        ]
    }

    /// `true` when both boxes share interior volume; shared faces don't count.
    pub fn intersects(&self, other: &Self) -> bool {
        self.spans()
            .iter()
            .zip(other.spans())
            .all(|(&(lo, hi), (other_lo, other_hi))| lo < other_hi && other_lo < hi)
    }

    /// `true` when this box lies completely inside `outer`.
    pub fn contained_in(&self, outer: &Self) -> bool {
        self.spans()
            .iter()
            .zip(outer.spans())
            .all(|(&(lo, hi), (outer_lo, outer_hi))| lo >= outer_lo && hi <= outer_hi)
    }

    #[inline]
    pub fn dimensions(&self) -> Vec3 {
        self.max - self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(at: (f64, f64, f64), side: f64) -> BoundingBox {
        BoundingBox::from_position_and_dims(Vec3::new(at.0, at.1, at.2), Vec3::new(side, side, side))
    }

    #[test]
    fn vec3_arithmetic_and_volume() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(b - a, Vec3::new(3.0, 3.0, 3.0));
        assert!((Vec3::new(50.0, 40.0, 30.0).volume() - 60_000.0).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn dimension_validity() {
        assert!(Vec3::new(10.0, 20.0, 30.0).is_valid_dimension());
        assert!(!Vec3::new(0.0, 1.0, 1.0).is_valid_dimension());
        assert!(!Vec3::new(1.0, -1.0, 1.0).is_valid_dimension());
        assert!(!Vec3::new(f64::NAN, 1.0, 1.0).is_valid_dimension());
        assert!(!Vec3::new(1.0, 1.0, f64::INFINITY).is_valid_dimension());
    }

    #[test]
    fn fits_within_is_axis_wise() {
        let container = Vec3::new(1200.0, 240.0, 240.0);
        assert!(Vec3::new(240.0, 240.0, 240.0).fits_within(&container, EPSILON_GENERAL));
        assert!(Vec3::new(240.000_000_1, 10.0, 10.0).fits_within(&container, EPSILON_GENERAL));
        // Would fit turned, but no axis swapping happens.
        assert!(!Vec3::new(10.0, 300.0, 10.0).fits_within(&container, EPSILON_GENERAL));
    }

    #[test]
    fn touching_boxes_do_not_intersect() {
        let a = cube((0.0, 0.0, 0.0), 10.0);
        assert!(a.intersects(&cube((5.0, 5.0, 5.0), 10.0)));
        assert!(!a.intersects(&cube((10.0, 0.0, 0.0), 10.0)));
        assert!(!a.intersects(&cube((0.0, 0.0, 10.0), 10.0)));
        assert!(!a.intersects(&cube((0.0, 20.0, 0.0), 10.0)));
    }

    #[test]
    fn containment_and_dimensions() {
        let outer = cube((0.0, 0.0, 0.0), 10.0);
        let inner = cube((2.0, 2.0, 2.0), 8.0);
        assert!(inner.contained_in(&outer));
        assert!(outer.contained_in(&outer));
        assert!(!cube((5.0, 5.0, 5.0), 8.0).contained_in(&outer));
        assert_eq!(inner.dimensions(), Vec3::new(8.0, 8.0, 8.0));
    }
}
