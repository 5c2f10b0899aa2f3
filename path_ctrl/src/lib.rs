//! # Path control library.
//!
//! Follows a Catmull-Rom spline path by producing a drive command every control cycle. The
//! library is purely computational, the pose comes from an external localisation source and the
//! drive command is consumed by an external locomotion layer.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Geometry primitives - planar vectors and poses
pub mod geom;

/// Spline - the Catmull-Rom path and its segments
pub mod spline;

/// Closest point solver - projects a position onto a spline segment
pub mod closest_point;

/// PIDF controller - feedback on the cross-track error
pub mod pidf;

/// Drive control module - builds the drive command that keeps the robot on the path
pub mod drive_ctrl;
