//! # Drive control module
//!
//! Drive control is responsible for keeping the robot on the target spline. Each cycle it finds
//! the point on the spline closest to the robot and produces a drive command made of three
//! separate vectors:
//!
//! - The tangent of the spline at the closest point, which moves the robot along the path.
//! - A correction pointing from the robot towards the closest point, scaled by a PIDF controller
//!   acting on the cross-track error (the distance between the two).
//! - A centripetal feedforward perpendicular to the tangent and proportional to the curvature,
//!   so that the robot starts turning into a bend instead of lagging behind it.
//!
//! The command is the sum of the three, with the heading of the command set to the direction of
//! the path. Converting it into wheel demands is left to the locomotion layer.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod compose;
pub mod params;
pub mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use compose::*;
pub use params::Params;
pub use state::*;
