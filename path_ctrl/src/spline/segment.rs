//! # Catmull-Rom segment
//!
//! A single cubic piece of the spline, defined by four consecutive control points. The curve
//! passes from the second point (`t = 0`) to the third (`t = 1`), the outer two only shape the
//! tangents at the ends.
//!
//! The basis is the uniform Catmull-Rom spline with a tension of 0.5:
//!
//! ```text
//! C(t) = 0.5 * (2 p1 + (-p0 + p2) t + (2 p0 - 5 p1 + 4 p2 - p3) t^2 + (-p0 + 3 p1 - 3 p2 + p3) t^3)
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::{Deserialize, Serialize};

// Internal
use super::SplineError;
use crate::geom::{cross2, Vector2D};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// First derivative magnitude below which the tangent is considered degenerate.
pub const ZERO_TANGENT_THRESHOLD: f64 = 1e-9;

/// Default step used by the finite difference derivatives.
pub const DEFAULT_FD_STEP: f64 = 1e-4;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One cubic Catmull-Rom piece.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Segment {
    /// The four control points shaping this segment
    pub points_m: [Vector2D; 4],
}

/// The local geometry of a segment at a single parameter value.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Geometry {
    /// The parameter the geometry was evaluated at
    pub t: f64,

    /// Position on the curve
    pub point_m: Vector2D,

    /// First derivative with respect to `t`, the (unnormalised) tangent
    pub d1: Vector2D,

    /// Second derivative with respect to `t`
    pub d2: Vector2D,

    /// Signed curvature, positive when the curve turns anticlockwise.
    ///
    /// `None` if the tangent is degenerate at this point.
    pub curvature_per_m: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How derivatives of the curve are obtained.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DerivativeMethod {
    /// Differentiate the cubic polynomial directly
    Analytic,

    /// Central finite differences of the curve position
    FiniteDifference,
}

impl Default for DerivativeMethod {
    fn default() -> Self {
        DerivativeMethod::Analytic
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Segment {
    pub fn new(p0: Vector2D, p1: Vector2D, p2: Vector2D, p3: Vector2D) -> Self {
        Self {
            points_m: [p0, p1, p2, p3],
        }
    }

    /// Polynomial coefficients `[a, b, c, d]` such that `C(t) = a + b t + c t^2 + d t^3`.
    fn coeffs(&self) -> [Vector2D; 4] {
        let [p0, p1, p2, p3] = self.points_m;

        [
            p1,
            0.5 * (p2 - p0),
            0.5 * (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3),
            0.5 * (-p0 + 3.0 * p1 - 3.0 * p2 + p3),
        ]
    }

    /// Position on the curve at `t`.
    ///
    /// No clamping is performed, values outside [0, 1] extrapolate the cubic.
    pub fn point(&self, t: f64) -> Vector2D {
        let [a, b, c, d] = self.coeffs();
        a + t * (b + t * (c + t * d))
    }

    /// First derivative of the curve at `t`.
    pub fn first_derivative(&self, t: f64) -> Vector2D {
        let [_, b, c, d] = self.coeffs();
        b + t * (2.0 * c + 3.0 * t * d)
    }

    /// Second derivative of the curve at `t`.
    pub fn second_derivative(&self, t: f64) -> Vector2D {
        let [_, _, c, d] = self.coeffs();
        2.0 * c + 6.0 * t * d
    }

    /// First derivative by central difference with the given step.
    pub fn first_derivative_fd(&self, t: f64, step: f64) -> Vector2D {
        (self.point(t + step) - self.point(t - step)) / (2.0 * step)
    }

    /// Second derivative by central difference with the given step.
    pub fn second_derivative_fd(&self, t: f64, step: f64) -> Vector2D {
        (self.point(t + step) - 2.0 * self.point(t) + self.point(t - step)) / (step * step)
    }

    /// Signed curvature at `t`, `(d1 x d2) / |d1|^3`.
    pub fn curvature(&self, t: f64) -> Result<f64, SplineError> {
        signed_curvature(&self.first_derivative(t), &self.second_derivative(t))
            .ok_or(SplineError::ZeroTangent { t })
    }

    /// Evaluate all local quantities at `t` using the given derivative method.
    ///
    /// `fd_step` is only used by [`DerivativeMethod::FiniteDifference`].
    pub fn geometry(&self, t: f64, method: DerivativeMethod, fd_step: f64) -> Geometry {
        let (d1, d2) = match method {
            DerivativeMethod::Analytic => (self.first_derivative(t), self.second_derivative(t)),
            DerivativeMethod::FiniteDifference => (
                self.first_derivative_fd(t, fd_step),
                self.second_derivative_fd(t, fd_step),
            ),
        };

        let curvature_per_m = signed_curvature(&d1, &d2);
        if curvature_per_m.is_none() {
            trace!("Degenerate tangent at t = {}", t);
        }

        Geometry {
            t,
            point_m: self.point(t),
            d1,
            d2,
            curvature_per_m,
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Signed curvature from the first and second derivatives, or `None` if the first derivative is
/// (numerically) zero.
pub fn signed_curvature(d1: &Vector2D, d2: &Vector2D) -> Option<f64> {
    let speed = d1.norm();

    if !(speed > ZERO_TANGENT_THRESHOLD) {
        return None;
    }

    let k = cross2(d1, d2) / speed.powi(3);

    if k.is_finite() {
        Some(k)
    } else {
        None
    }
}
