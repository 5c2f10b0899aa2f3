//! # Spline
//!
//! A path defined by a piecewise Catmull-Rom spline. Every window of four consecutive control
//! points forms one [`Segment`], so a spline of `n` points has `n - 3` segments, overlapping by
//! three points each.
//!
//! The spline keeps an active segment index. All evaluation functions (`point`, `tangent`,
//! `curvature`, ...) work on the active segment with a local parameter `t` in [0, 1]. Values of
//! `t` outside that range are clamped, to move along the path the active segment must be changed
//! either explicitly or by [`Spline::closest_point`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod segment;

pub use segment::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

// Internal
use crate::{
    closest_point::{closest_point_on_segment, SegmentEnd, Solution, SolverParams},
    geom::Vector2D,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Minimum number of control points in a spline, enough for one segment.
pub const MIN_CONTROL_POINTS: usize = 4;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A Catmull-Rom spline path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SplineDef", into = "SplineDef")]
pub struct Spline {
    /// The control points of the spline, in order along the path
    control_points_m: Vec<Vector2D>,

    /// Index of the active segment
    segment: usize,
}

/// Serialised form of a spline, only the control points are stored.
#[derive(Serialize, Deserialize)]
struct SplineDef {
    control_points_m: Vec<Vector2D>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with the spline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SplineError {
    /// Attempted to build a spline with too few control points.
    #[error("A spline needs at least 4 control points, got {0}")]
    NotEnoughPoints(usize),

    /// A control point edit referenced an invalid index, or would have left the spline with fewer
    /// than 4 points.
    #[error("Cannot edit control point {index} of a spline with {num_points} points")]
    OutOfRange { index: usize, num_points: usize },

    /// The first derivative is zero so the tangent direction and curvature are undefined.
    #[error("The tangent at t = {t} is zero, curvature is undefined")]
    ZeroTangent { t: f64 },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Spline {
    /// Create a new spline from the given control points.
    ///
    /// The first segment is active.
    pub fn new(control_points_m: Vec<Vector2D>) -> Result<Self, SplineError> {
        if control_points_m.len() < MIN_CONTROL_POINTS {
            return Err(SplineError::NotEnoughPoints(control_points_m.len()));
        }

        Ok(Self {
            control_points_m,
            segment: 0,
        })
    }

    // ---- CONTROL POINTS ----

    pub fn control_points(&self) -> &[Vector2D] {
        &self.control_points_m
    }

    pub fn num_points(&self) -> usize {
        self.control_points_m.len()
    }

    /// Add a control point.
    ///
    /// If `index` is `None` the point is appended to the end of the spline, otherwise it is
    /// inserted before the point currently at `index` (`index == num_points()` appends).
    pub fn add_control_point(
        &mut self,
        point_m: Vector2D,
        index: Option<usize>,
    ) -> Result<(), SplineError> {
        match index {
            None => self.control_points_m.push(point_m),
            Some(i) if i <= self.num_points() => self.control_points_m.insert(i, point_m),
            Some(i) => return Err(self.out_of_range(i)),
        }

        Ok(())
    }

    /// Remove the control point at `index`, returning it.
    ///
    /// Fails if the index is invalid or if the spline only has the minimum number of points. The
    /// active segment is clamped if it no longer exists.
    pub fn remove_control_point(&mut self, index: usize) -> Result<Vector2D, SplineError> {
        if index >= self.num_points() || self.num_points() <= MIN_CONTROL_POINTS {
            return Err(self.out_of_range(index));
        }

        let removed = self.control_points_m.remove(index);
        self.set_segment(self.segment);

        Ok(removed)
    }

    /// Replace the control point at `index`, returning the previous value.
    pub fn set_control_point(
        &mut self,
        index: usize,
        point_m: Vector2D,
    ) -> Result<Vector2D, SplineError> {
        if index >= self.num_points() {
            return Err(self.out_of_range(index));
        }

        Ok(std::mem::replace(&mut self.control_points_m[index], point_m))
    }

    fn out_of_range(&self, index: usize) -> SplineError {
        SplineError::OutOfRange {
            index,
            num_points: self.num_points(),
        }
    }

    // ---- SEGMENTS ----

    /// The number of segments in the spline.
    pub fn segment_count(&self) -> usize {
        self.num_points() - (MIN_CONTROL_POINTS - 1)
    }

    /// Index of the active segment.
    pub fn get_segment(&self) -> usize {
        self.segment
    }

    /// Move to the next segment if there is one, returning the new active index.
    pub fn inc_segment(&mut self) -> usize {
        self.set_segment(self.segment.saturating_add(1))
    }

    /// Move to the previous segment if there is one, returning the new active index.
    pub fn dec_segment(&mut self) -> usize {
        self.set_segment(self.segment.saturating_sub(1))
    }

    /// Set the active segment, clamped to the valid range, returning the new active index.
    pub fn set_segment(&mut self, segment: usize) -> usize {
        let clamped = segment.min(self.segment_count() - 1);

        if clamped != self.segment {
            debug!(
                "Active segment {} -> {} (of {})",
                self.segment,
                clamped,
                self.segment_count()
            );
        }

        self.segment = clamped;
        self.segment
    }

    /// Get the segment at the given index, or `None` if there isn't one.
    pub fn segment(&self, index: usize) -> Option<Segment> {
        if index >= self.segment_count() {
            return None;
        }

        let p = &self.control_points_m[index..index + MIN_CONTROL_POINTS];
        Some(Segment::new(p[0], p[1], p[2], p[3]))
    }

    /// The active segment.
    pub fn active_segment(&self) -> Segment {
        let p = &self.control_points_m[self.segment..self.segment + MIN_CONTROL_POINTS];
        Segment::new(p[0], p[1], p[2], p[3])
    }

    /// True if the active segment is the last one in the spline.
    pub fn on_last_segment(&self) -> bool {
        self.segment + 1 == self.segment_count()
    }

    // ---- EVALUATION ----

    /// Position on the active segment.
    pub fn point(&self, t: f64) -> Vector2D {
        self.active_segment().point(clamp_t(t))
    }

    /// Tangent (first derivative) of the active segment.
    pub fn tangent(&self, t: f64) -> Vector2D {
        self.active_segment().first_derivative(clamp_t(t))
    }

    /// Signed curvature of the active segment.
    pub fn curvature(&self, t: f64) -> Result<f64, SplineError> {
        self.active_segment().curvature(clamp_t(t))
    }

    /// All local quantities of the active segment.
    pub fn geometry(&self, t: f64, method: DerivativeMethod, fd_step: f64) -> Geometry {
        self.active_segment().geometry(clamp_t(t), method, fd_step)
    }

    /// Approximate length of the whole spline by summing chords between samples.
    pub fn approx_length(&self, samples_per_segment: usize) -> f64 {
        let samples = samples_per_segment.max(1);
        let mut length_m = 0f64;

        for i in 0..self.segment_count() {
            // Safe since i is within the segment count
            let seg = match self.segment(i) {
                Some(s) => s,
                None => continue,
            };

            let mut prev = seg.point(0.0);
            for j in 1..=samples {
                let next = seg.point(j as f64 / samples as f64);
                length_m += (next - prev).norm();
                prev = next;
            }
        }

        length_m
    }

    // ---- CLOSEST POINT ----

    /// Find the closest point on the path to `pos_m`, starting from the active segment.
    ///
    /// If the closest point lies beyond the start or end of the active segment the search moves
    /// to the neighbouring segment and repeats, until the minimum is inside a segment, an end of
    /// the path is reached, or `max_segment_hops` moves have been made. The search stops if it
    /// would move back to the segment it just came from, in which case the closest point is the
    /// join between them.
    ///
    /// The active segment is left on the segment the returned solution belongs to.
    pub fn closest_point(&mut self, pos_m: &Vector2D, params: &SolverParams) -> Solution {
        let mut sol = closest_point_on_segment(&self.active_segment(), pos_m, params);
        let mut prev_move: Option<SegmentEnd> = None;

        for _ in 0..params.max_segment_hops {
            match (sol.beyond, prev_move) {
                (Some(SegmentEnd::Start), Some(SegmentEnd::End))
                | (Some(SegmentEnd::End), Some(SegmentEnd::Start)) => break,
                (Some(SegmentEnd::Start), _) if self.segment > 0 => {
                    self.dec_segment();
                }
                (Some(SegmentEnd::End), _) if !self.on_last_segment() => {
                    self.inc_segment();
                }
                _ => break,
            }

            prev_move = sol.beyond;
            sol = closest_point_on_segment(&self.active_segment(), pos_m, params);
        }

        sol
    }
}

impl TryFrom<SplineDef> for Spline {
    type Error = SplineError;

    fn try_from(def: SplineDef) -> Result<Self, Self::Error> {
        Spline::new(def.control_points_m)
    }
}

impl From<Spline> for SplineDef {
    fn from(spline: Spline) -> Self {
        SplineDef {
            control_points_m: spline.control_points_m,
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn clamp_t(t: f64) -> f64 {
    util::maths::clamp(&t, &0.0, &1.0)
}
