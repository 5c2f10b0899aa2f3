//! # Geometry primitives
//!
//! Planar vectors are plain `nalgebra::Vector2<f64>`, which already provide the arithmetic
//! operators, `dot`, `norm` and friends. This module adds the pose type and the handful of 2D
//! operations nalgebra doesn't have a direct name for.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A 2D vector in the path frame.
pub type Vector2D = Vector2<f64>;

/// A position and heading in the path frame.
///
/// Used both for the robot's current pose and for the drive command, in which case the position
/// holds the commanded drive vector.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose2D {
    /// Position in meters
    pub position_m: Vector2D,

    /// Heading (angle to the +ve x axis) in radians
    pub heading_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose2D {
    /// Create a new pose from its components.
    pub fn new(x: f64, y: f64, heading_rad: f64) -> Self {
        Self {
            position_m: Vector2::new(x, y),
            heading_rad,
        }
    }

    pub fn x(&self) -> f64 {
        self.position_m.x
    }

    pub fn y(&self) -> f64 {
        self.position_m.y
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// The z component of the cross product of two planar vectors.
///
/// Positive if `b` is anticlockwise of `a`.
pub fn cross2(a: &Vector2D, b: &Vector2D) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Rotate a vector anticlockwise by 90 degrees.
pub fn perp(v: &Vector2D) -> Vector2D {
    Vector2::new(-v.y, v.x)
}

/// Normalise a vector, returning the zero vector if it has no length (or isn't finite).
pub fn normalize_or_zero(v: &Vector2D) -> Vector2D {
    let n = v.norm();
    if n > 0.0 && n.is_finite() {
        v / n
    } else {
        Vector2::zeros()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cross2_sign() {
        let x = Vector2::new(1.0, 0.0);
        let y = Vector2::new(0.0, 1.0);
        assert_eq!(cross2(&x, &y), 1.0);
        assert_eq!(cross2(&y, &x), -1.0);
        assert_eq!(cross2(&x, &x), 0.0);
    }

    #[test]
    fn test_perp_is_left_normal() {
        let v = Vector2::new(3.0, -2.0);
        let p = perp(&v);
        assert_eq!(p, Vector2::new(2.0, 3.0));
        assert_eq!(p.dot(&v), 0.0);
        assert!(cross2(&v, &p) > 0.0);
    }

    #[test]
    fn test_normalize_or_zero() {
        assert_eq!(normalize_or_zero(&Vector2::zeros()), Vector2::zeros());
        let n = normalize_or_zero(&Vector2::new(0.0, -4.0));
        assert_eq!(n, Vector2::new(0.0, -1.0));
        assert_eq!(
            normalize_or_zero(&Vector2::new(f64::INFINITY, 0.0)),
            Vector2::zeros()
        );
    }

    #[test]
    fn test_pose_components() {
        let p = Pose2D::new(1.0, 2.0, 0.5);
        assert_eq!(p.x(), 1.0);
        assert_eq!(p.y(), 2.0);
        assert_eq!(p.position_m, Vector2::new(1.0, 2.0));
    }
}
