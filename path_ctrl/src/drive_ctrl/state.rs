//! Drive control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use nalgebra::Vector2;
use serde::Serialize;

// Internal
use super::*;
use crate::{
    geom::{Pose2D, Vector2D},
    pidf::{PidfController, PidfTerms},
    spline::Spline,
};
use util::params;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drive control for a single tracking session.
///
/// Owns the spline being followed and the cross-track controller, so independent trackers
/// never share state.
pub struct DriveCtrl {
    params: Params,

    /// Executing mode
    mode: DriveCtrlMode,

    /// The spline being followed
    spline: Option<Spline>,

    /// Cross-track error controller
    pidf: PidfController,

    output_cmd: Option<Pose2D>,
    report: StatusReport,
}

/// The status report containing the quantities used to build the drive command, and error
/// flags.
#[derive(Debug, Default, Copy, Clone, Serialize)]
pub struct StatusReport {
    /// Active segment of the spline
    pub segment: usize,

    /// Parameter of the closest point on the active segment
    pub path_t: f64,

    /// The closest point on the path
    pub target_m: Vector2D,

    /// Distance between the robot and the closest point
    pub cross_track_error_m: f64,

    /// Cross-track error signed positive when the robot is to the left of the path
    pub lateral_error_m: f64,

    /// Signed curvature of the path at the closest point
    pub curvature_per_m: f64,

    /// True if the tangent was zero at the closest point and zero curvature was assumed
    pub zero_tangent: bool,

    /// Number of iterations the closest point search took on its final segment
    pub solver_iterations: usize,

    /// True if the closest point search converged
    pub solver_converged: bool,

    /// Number of Newton steps replaced by bisection
    pub solver_degenerate_steps: usize,

    /// Output of the cross-track controller
    pub feedback: f64,

    /// Individual terms of the cross-track controller
    pub pidf_terms: PidfTerms,

    /// Tangent term of the drive command
    pub tangent: Vector2D,

    /// Correction term of the drive command
    pub correction: Vector2D,

    /// Centripetal feedforward term of the drive command
    pub centripetal: Vector2D,

    /// If true the limit on cross-track error has been exceeded
    pub cross_track_limit_exceeded: bool,

    /// If true the end of the path was reached this cycle
    pub path_finished: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Potential errors that can occur during processing of the module.
#[derive(Debug, thiserror::Error)]
pub enum DriveCtrlError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(params::LoadError),

    /// A path is already loaded. This error occurs when attempting to start a new path before
    /// the current one has finished.
    #[error("Attempted to load a path while one is already loaded")]
    PathAlreadyLoaded,

    /// Attempted to follow a path when none is loaded.
    #[error("No path has been set")]
    NoPath,
}

/// The possible modes of execution of DriveCtrl. Each mode is handled by a `mode_xyz` function.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum DriveCtrlMode {
    Off,
    FollowPath,
    PathFinished,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveCtrl {
    /// Intiailise the DriveCtrl module.
    ///
    /// Expected init data is a path to the parameter file, relative to the params directory.
    pub fn init(params_path: &str) -> Result<Self, DriveCtrlError> {
        // Load the parameters
        let params = match params::load(params_path) {
            Ok(p) => p,
            Err(e) => return Err(DriveCtrlError::ParamLoadError(e)),
        };

        Ok(Self::new(params))
    }

    /// Create the module from already loaded parameters.
    pub fn new(params: Params) -> Self {
        let pidf = PidfController::new(params.pidf);

        Self {
            params,
            mode: DriveCtrlMode::Off,
            spline: None,
            pidf,
            output_cmd: None,
            report: StatusReport::default(),
        }
    }

    /// Process drive control.
    ///
    /// Returns the drive command for this cycle, if there is one, and the status report. When
    /// the path finishes (or is aborted) a single zero drive command is issued to stop the
    /// robot.
    pub fn proc(
        &mut self,
        pose: &Pose2D,
        time_s: f64,
    ) -> Result<(Option<Pose2D>, StatusReport), DriveCtrlError> {
        // Setup cycle data
        self.output_cmd = None;
        self.report = StatusReport::default();

        match self.mode {
            DriveCtrlMode::Off => self.mode_off(),
            DriveCtrlMode::FollowPath => self.mode_follow_path(pose, time_s),
            DriveCtrlMode::PathFinished => self.mode_path_finished(pose),
        }?;

        Ok((self.output_cmd, self.report))
    }

    /// Begin following a new path.
    ///
    /// Following begins on the next call to `proc`, from the first segment and with a fresh
    /// controller. Loading a new path before the current one has finished is an error, call
    /// `abort_path` first to stop the current one.
    pub fn begin_path(&mut self, mut spline: Spline) -> Result<(), DriveCtrlError> {
        if self.spline.is_some() {
            return Err(DriveCtrlError::PathAlreadyLoaded);
        }

        spline.set_segment(0);
        self.pidf.reset();

        info!(
            "Following new path of {} segments ({:.2} m)",
            spline.segment_count(),
            spline.approx_length(20)
        );

        self.spline = Some(spline);
        self.mode = DriveCtrlMode::FollowPath;

        Ok(())
    }

    /// Abort the current path.
    ///
    /// On the next call to `proc` a stop command is issued and the path cleared.
    pub fn abort_path(&mut self) {
        if self.spline.is_some() {
            self.mode = DriveCtrlMode::PathFinished;
        }
    }

    pub fn mode(&self) -> DriveCtrlMode {
        self.mode
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The spline being followed.
    pub fn spline(&self) -> Option<&Spline> {
        self.spline.as_ref()
    }

    /// Mutable access to the spline being followed, for editing the path while it runs.
    pub fn spline_mut(&mut self) -> Option<&mut Spline> {
        self.spline.as_mut()
    }

    /// Mutable access to the cross-track controller, for live tuning.
    pub fn pidf_mut(&mut self) -> &mut PidfController {
        &mut self.pidf
    }

    /// Mode not executing.
    fn mode_off(&mut self) -> Result<(), DriveCtrlError> {
        Ok(())
    }

    /// Mode following path.
    fn mode_follow_path(&mut self, pose: &Pose2D, time_s: f64) -> Result<(), DriveCtrlError> {
        let spline = match self.spline {
            Some(ref mut s) => s,
            None => return Err(DriveCtrlError::NoPath),
        };

        let cmd = compute_drive_command(
            spline,
            pose,
            &mut self.pidf,
            time_s,
            &self.params,
            &mut self.report,
        );

        let at_end = spline.on_last_segment() && self.report.path_t >= self.params.end_threshold;

        if self.report.cross_track_limit_exceeded {
            warn!(
                "Cross-track error of {:.3} m exceeds the limit, aborting path",
                self.report.cross_track_error_m
            );
            self.mode = DriveCtrlMode::PathFinished;
            self.mode_path_finished(pose)?;
        } else if at_end {
            info!("End of path reached");
            self.report.path_finished = true;
            self.mode = DriveCtrlMode::PathFinished;
            self.mode_path_finished(pose)?;
        } else {
            self.output_cmd = Some(cmd);
        }

        Ok(())
    }

    /// Mode path finished.
    ///
    /// Issues a zero drive command holding the current heading, clears the path and switches
    /// off.
    fn mode_path_finished(&mut self, pose: &Pose2D) -> Result<(), DriveCtrlError> {
        self.output_cmd = Some(Pose2D {
            position_m: Vector2::zeros(),
            heading_rad: util::maths::wrap_2pi(pose.heading_rad),
        });

        self.spline = None;
        self.pidf.reset();
        self.mode = DriveCtrlMode::Off;

        Ok(())
    }
}
