//! # Closest point solver
//!
//! Finds the parameter on a single Catmull-Rom segment which is closest to a given position, by
//! Newton-Raphson minimisation of the squared distance `f(t) = |C(t) - pos|^2`.
//!
//! Each iteration takes the Newton step `t - f'(t)/f''(t)`, clamped to [0, 1]. The solver also
//! keeps a bracket around the minimum from the sign of `f'`, and whenever the Newton step is
//! unusable (`f''` near zero or negative, a non-finite step, or a step leaving the bracket) it
//! bisects the bracket instead. A stationary point is only accepted if it is a minimum, otherwise
//! the search continues in the half of the bracket with the closer end, and the ends of the
//! segment are compared against the result before returning. The solver never fails: if the iteration cap is reached the last
//! parameter is returned and the solution is marked as not converged.
//!
//! When the minimum lies beyond one of the ends of the segment the solution reports which end,
//! so that the spline can move on to the neighbouring segment and search again.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{trace, warn};
use serde::{Deserialize, Serialize};

// Internal
use crate::{
    geom::Vector2D,
    spline::{DerivativeMethod, Segment, DEFAULT_FD_STEP},
};
use util::maths::clamp;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Distance in `t` from an end of the segment within which the solution is considered to be at
/// that end.
const END_THRESHOLD: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the closest point search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    /// Parameter value the iteration starts from
    pub initial_t: f64,

    /// The search has converged once `|f'(t)|` is below this value
    pub tolerance: f64,

    /// Maximum number of iterations on a single segment
    pub max_iterations: usize,

    /// How the derivative of `f'` is computed
    pub derivative_method: DerivativeMethod,

    /// Step used for finite differences
    pub fd_step: f64,

    /// `f''` must be larger than this for a Newton step to be taken
    pub min_denominator: f64,

    /// Maximum number of times the search may move to a neighbouring segment in one call
    pub max_segment_hops: usize,
}

/// Result of a closest point search.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Solution {
    /// The parameter of the closest point, in [0, 1]
    pub t: f64,

    /// Distance between the position and the curve at `t`
    pub distance_m: f64,

    /// Number of iterations performed
    pub iterations: usize,

    /// True if the tolerance was met (or the minimum was pinned at an end of the segment) before
    /// the iteration cap
    pub converged: bool,

    /// Number of iterations in which the Newton step was degenerate and a bisection step was
    /// taken instead
    pub degenerate_steps: usize,

    /// If the true minimum lies outside this segment, the end it lies beyond
    pub beyond: Option<SegmentEnd>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// One of the ends of a segment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum SegmentEnd {
    /// `t = 0`
    Start,

    /// `t = 1`
    End,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            initial_t: 0.5,
            tolerance: 1e-6,
            max_iterations: 1000,
            derivative_method: DerivativeMethod::Analytic,
            fd_step: DEFAULT_FD_STEP,
            min_denominator: 1e-12,
            max_segment_hops: 16,
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Find the parameter on `segment` closest to `pos_m`.
pub fn closest_point_on_segment(
    segment: &Segment,
    pos_m: &Vector2D,
    params: &SolverParams,
) -> Solution {
    let mut t = clamp(&params.initial_t, &0.0, &1.0);
    if !t.is_finite() {
        t = 0.5;
    }

    // Bracket containing the minimum
    let mut lo = 0f64;
    let mut hi = 1f64;

    let mut iterations = 0;
    let mut degenerate_steps = 0;
    let mut converged = false;

    while iterations < params.max_iterations {
        iterations += 1;

        let diff = segment.point(t) - pos_m;

        // Exactly on the curve
        if diff.x == 0.0 && diff.y == 0.0 {
            converged = true;
            break;
        }

        let d1 = first_derivative(segment, t, params);
        let df = 2.0 * diff.dot(&d1);

        let ddf = match params.derivative_method {
            DerivativeMethod::Analytic => {
                let d2 = segment.second_derivative(t);
                2.0 * (d1.dot(&d1) + diff.dot(&d2))
            }
            DerivativeMethod::FiniteDifference => {
                let h = params.fd_step;
                (dist_sq_derivative(segment, pos_m, t + h, params)
                    - dist_sq_derivative(segment, pos_m, t - h, params))
                    / (2.0 * h)
            }
        };

        let next_t = if df.abs() < params.tolerance {
            if ddf > params.min_denominator {
                converged = true;
                break;
            }

            // Stationary but not a minimum, keep the half of the bracket with the closer end
            degenerate_steps += 1;
            trace!(
                "Stationary point at t = {} is not a minimum (ddf = {}), searching [{}, {}]",
                t, ddf, lo, hi
            );
            if dist_sq(segment, pos_m, lo) <= dist_sq(segment, pos_m, hi) {
                hi = t;
            } else {
                lo = t;
            }
            0.5 * (lo + hi)
        } else {
            // The distance is increasing at t so the minimum is below it, and vice versa
            if df > 0.0 {
                hi = t;
            } else {
                lo = t;
            }

            let newton_t = t - df / ddf;

            if ddf > params.min_denominator && newton_t.is_finite() {
                let n = clamp(&newton_t, &0.0, &1.0);
                if n < lo || n > hi {
                    0.5 * (lo + hi)
                } else {
                    n
                }
            } else {
                degenerate_steps += 1;
                trace!(
                    "Degenerate Newton step at t = {} (df = {}, ddf = {}), bisecting [{}, {}]",
                    t, df, ddf, lo, hi
                );
                0.5 * (lo + hi)
            }
        };

        // No further progress possible, either pinned to an end or the bracket has collapsed
        if next_t == t || hi - lo <= f64::EPSILON {
            t = next_t;
            converged = true;
            break;
        }

        t = next_t;
    }

    // The ends of the segment always bound the answer
    for &end_t in [0.0, 1.0].iter() {
        if dist_sq(segment, pos_m, end_t) < dist_sq(segment, pos_m, t) {
            t = end_t;
            converged = converged || is_end_minimum(segment, pos_m, end_t, params);
        }
    }

    // Final state at the returned parameter
    let diff = segment.point(t) - pos_m;
    let df = 2.0 * diff.dot(&first_derivative(segment, t, params));

    let beyond = if t <= END_THRESHOLD && df > params.tolerance {
        Some(SegmentEnd::Start)
    } else if t >= 1.0 - END_THRESHOLD && df < -params.tolerance {
        Some(SegmentEnd::End)
    } else {
        None
    };

    if !converged {
        warn!(
            "Closest point search did not converge in {} iterations (t = {:.6}, |df| = {:.3e})",
            iterations,
            t,
            df.abs()
        );
    }

    Solution {
        t,
        distance_m: diff.norm(),
        iterations,
        converged,
        degenerate_steps,
        beyond,
    }
}

/// First derivative of the curve using the configured method.
fn first_derivative(segment: &Segment, t: f64, params: &SolverParams) -> Vector2D {
    match params.derivative_method {
        DerivativeMethod::Analytic => segment.first_derivative(t),
        DerivativeMethod::FiniteDifference => segment.first_derivative_fd(t, params.fd_step),
    }
}

/// Squared distance between the curve at `t` and the position.
fn dist_sq(segment: &Segment, pos_m: &Vector2D, t: f64) -> f64 {
    (segment.point(t) - pos_m).norm_squared()
}

/// True if the distance does not decrease moving into the segment from the end at `end_t`.
fn is_end_minimum(segment: &Segment, pos_m: &Vector2D, end_t: f64, params: &SolverParams) -> bool {
    let df = dist_sq_derivative(segment, pos_m, end_t, params);
    if end_t < 0.5 {
        df > -params.tolerance
    } else {
        df < params.tolerance
    }
}

/// Derivative of the squared distance, `2 (C(t) - pos) . C'(t)`.
fn dist_sq_derivative(segment: &Segment, pos_m: &Vector2D, t: f64, params: &SolverParams) -> f64 {
    2.0 * (segment.point(t) - pos_m).dot(&first_derivative(segment, t, params))
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Vector2;

    fn straight() -> Segment {
        Segment::new(
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(2.0, 0.0),
            Vector2::new(3.0, 0.0),
        )
    }

    fn arc() -> Segment {
        // Quarter turn anticlockwise, no inflection
        Segment::new(
            Vector2::new(0.0, -1.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(-1.0, 0.0),
        )
    }

    #[test]
    fn test_straight_line_offset() {
        let sol =
            closest_point_on_segment(&straight(), &Vector2::new(1.5, 1.0), &SolverParams::default());

        assert!(sol.converged);
        assert!((sol.t - 0.5).abs() < 1e-6);
        assert!((sol.distance_m - 1.0).abs() < 1e-9);
        assert_eq!(sol.beyond, None);
    }

    #[test]
    fn test_on_curve_points_recovered() {
        for method in [DerivativeMethod::Analytic, DerivativeMethod::FiniteDifference].iter() {
            let params = SolverParams {
                derivative_method: *method,
                ..Default::default()
            };
            let seg = arc();

            for i in 0..=20 {
                let t0 = i as f64 / 20.0;
                let sol = closest_point_on_segment(&seg, &seg.point(t0), &params);

                assert!(sol.converged, "{:?} did not converge at t0 = {}", method, t0);
                assert!(
                    (sol.t - t0).abs() < 1e-4,
                    "{:?}: expected {}, got {}",
                    method,
                    t0,
                    sol.t
                );
                assert!(sol.distance_m < 1e-6);
            }
        }
    }

    #[test]
    fn test_off_curve_point_is_local_minimum() {
        let seg = arc();
        let params = SolverParams::default();
        let pos = Vector2::new(0.2, 0.3);

        let sol = closest_point_on_segment(&seg, &pos, &params);
        assert!(sol.converged);

        // Nearby parameters must be no closer
        for dt in [-1e-3, 1e-3].iter() {
            let t = clamp(&(sol.t + dt), &0.0, &1.0);
            assert!((seg.point(t) - pos).norm() >= sol.distance_m - 1e-12);
        }
    }

    #[test]
    fn test_beyond_ends_reported() {
        let seg = straight();
        let params = SolverParams::default();

        let before = closest_point_on_segment(&seg, &Vector2::new(0.2, 0.5), &params);
        assert_eq!(before.t, 0.0);
        assert_eq!(before.beyond, Some(SegmentEnd::Start));
        assert!(before.converged);

        let after = closest_point_on_segment(&seg, &Vector2::new(2.7, -0.5), &params);
        assert_eq!(after.t, 1.0);
        assert_eq!(after.beyond, Some(SegmentEnd::End));
        assert!(after.converged);
    }

    #[test]
    fn test_degenerate_segment_never_nan() {
        // A segment collapsed to a point has f'' = 0 everywhere
        let p = Vector2::new(2.0, 2.0);
        let seg = Segment::new(p, p, p, p);
        let sol =
            closest_point_on_segment(&seg, &Vector2::new(0.0, 0.0), &SolverParams::default());

        assert!(sol.t.is_finite());
        assert!(sol.t >= 0.0 && sol.t <= 1.0);
        assert!((sol.distance_m - p.norm()).abs() < 1e-12);
    }

    #[test]
    fn test_iteration_cap_respected() {
        let params = SolverParams {
            max_iterations: 1,
            tolerance: 0.0,
            ..Default::default()
        };
        let sol = closest_point_on_segment(&arc(), &Vector2::new(0.2, 0.3), &params);

        assert_eq!(sol.iterations, 1);
        assert!(!sol.converged);
        assert!(sol.t.is_finite());
    }

    #[test]
    fn test_negative_curvature_of_distance_bisects() {
        // From the centre of the arc every point is roughly equidistant and f'' is small or
        // negative, the solver must still return a bounded answer
        let sol = closest_point_on_segment(&arc(), &Vector2::new(0.0, 0.0), &SolverParams::default());
        assert!(sol.t >= 0.0 && sol.t <= 1.0);
        assert!(sol.distance_m.is_finite());
    }

    #[test]
    fn test_distance_maximum_rejected() {
        // Arc bending away from a position well beyond its centre of curvature, the middle of
        // the segment is the furthest point from it
        let seg = Segment::new(
            Vector2::new(1.0, 1.0),
            Vector2::new(2.0, 2.0),
            Vector2::new(3.0, 2.0),
            Vector2::new(4.0, 1.0),
        );
        let pos = Vector2::new(2.5, -0.4);
        let sol = closest_point_on_segment(&seg, &pos, &SolverParams::default());

        assert!(sol.converged);
        assert!(sol.degenerate_steps > 0);
        assert!(sol.t < 1e-9);
        assert_eq!(sol.beyond, Some(SegmentEnd::Start));
        assert!((sol.distance_m - 6.01f64.sqrt()).abs() < 1e-9);
        assert!(sol.distance_m < (seg.point(0.5) - pos).norm());
    }

    #[test]
    fn test_never_worse_than_segment_ends() {
        let seg = Segment::new(
            Vector2::new(1.0, 1.0),
            Vector2::new(2.0, 2.0),
            Vector2::new(3.0, 2.0),
            Vector2::new(4.0, 1.0),
        );
        let params = SolverParams::default();

        for &y in [-2.0, -1.0, -0.4, 0.0, 0.5, 2.5, 3.0, 4.0].iter() {
            for i in 0..=8 {
                let pos = Vector2::new(1.5 + 0.25 * i as f64, y);
                let sol = closest_point_on_segment(&seg, &pos, &params);

                assert!(sol.converged, "no convergence at {:?}", pos);
                assert!(sol.distance_m <= (seg.point(0.0) - pos).norm() + 1e-12);
                assert!(sol.distance_m <= (seg.point(1.0) - pos).norm() + 1e-12);

                // And a local minimum
                for dt in [-1e-3, 1e-3].iter() {
                    let t = clamp(&(sol.t + dt), &0.0, &1.0);
                    assert!(
                        (seg.point(t) - pos).norm() >= sol.distance_m - 1e-7,
                        "t = {} is not a minimum for {:?}",
                        sol.t,
                        pos
                    );
                }
            }
        }
    }
}
