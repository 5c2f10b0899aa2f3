//! # Drive command composition
//!
//! Builds the drive command from the spline, the robot pose and the cross-track controller.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use nalgebra::Vector2;

// Internal
use super::{Params, StatusReport};
use crate::{
    geom::{cross2, normalize_or_zero, perp, Pose2D},
    pidf::PidfController,
    spline::Spline,
};
use util::maths::{clamp, wrap_2pi};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the drive command for the given pose at the given time.
///
/// The returned pose holds the drive vector in its position and the path heading, in
/// [0, 2pi), in its heading. The spline's active segment follows the closest point, and the
/// quantities used to build the command are written into `report`.
///
/// Numerical edge cases never fail the cycle:
/// - A zero tangent is treated as zero curvature and the robot's own heading is used as the path
///   heading.
/// - A robot exactly on the path gets no correction.
/// - Should the command still not be finite it is replaced by a zero drive vector.
pub fn compute_drive_command(
    spline: &mut Spline,
    pose: &Pose2D,
    pidf: &mut PidfController,
    time_s: f64,
    params: &Params,
    report: &mut StatusReport,
) -> Pose2D {
    // ---- PROJECTION ONTO THE PATH ----

    let sol = spline.closest_point(&pose.position_m, &params.solver);
    let geom = spline.geometry(
        sol.t,
        params.solver.derivative_method,
        params.solver.fd_step,
    );
    let tangent = geom.d1;

    report.segment = spline.get_segment();
    report.path_t = sol.t;
    report.solver_iterations = sol.iterations;
    report.solver_converged = sol.converged;
    report.solver_degenerate_steps = sol.degenerate_steps;
    report.target_m = geom.point_m;

    // Heading of the path, if the tangent has vanished hold the current heading
    let path_heading_rad = match geom.curvature_per_m {
        Some(_) => wrap_2pi(tangent.y.atan2(tangent.x)),
        None => wrap_2pi(pose.heading_rad),
    };

    // ---- FEEDBACK ----

    let cross_track_m = geom.point_m - pose.position_m;
    let cross_track_err_m = cross_track_m.norm();

    // Positive when the robot is to the left of the path
    let side = cross2(&tangent, &(pose.position_m - geom.point_m));
    report.cross_track_error_m = cross_track_err_m;
    report.lateral_error_m = if side < 0.0 {
        -cross_track_err_m
    } else {
        cross_track_err_m
    };

    if let Some(limit) = params.cross_track_limit_m {
        if cross_track_err_m > limit {
            report.cross_track_limit_exceeded = true;
        }
    }

    let feedback = pidf.update(cross_track_err_m, time_s);
    let correction = normalize_or_zero(&cross_track_m) * feedback;

    report.feedback = feedback;
    report.pidf_terms = pidf.terms();

    // ---- CENTRIPETAL FEEDFORWARD ----

    let curvature_per_m = match geom.curvature_per_m {
        Some(k) => k,
        None => {
            debug!("Zero tangent at t = {:.4} on segment {}", sol.t, report.segment);
            report.zero_tangent = true;
            0.0
        }
    };
    report.curvature_per_m = curvature_per_m;

    let centripetal_mag = clamp(
        &(tangent.norm_squared() * curvature_per_m),
        &-params.centripetal_cap.abs(),
        &params.centripetal_cap.abs(),
    );
    let centripetal = normalize_or_zero(&perp(&tangent)) * centripetal_mag;

    // ---- COMPOSITION ----

    report.tangent = tangent;
    report.correction = correction;
    report.centripetal = centripetal;

    let mut drive = tangent + correction + centripetal;

    if !(drive.x.is_finite() && drive.y.is_finite()) {
        warn!(
            "Non-finite drive command (tangent {:?}, correction {:?}, centripetal {:?}), \
            commanding zero drive",
            tangent, correction, centripetal
        );
        drive = Vector2::zeros();
    }

    Pose2D {
        position_m: drive,
        heading_rad: path_heading_rad,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pidf::PidfParams;
    use std::f64::consts::PI;

    fn straight_spline() -> Spline {
        Spline::new(vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(2.0, 0.0),
            Vector2::new(3.0, 0.0),
        ])
        .unwrap()
    }

    fn p_only(k_p: f64) -> PidfController {
        PidfController::new(PidfParams {
            k_p,
            ..Default::default()
        })
    }

    #[test]
    fn test_straight_line_offset() {
        let mut spline = straight_spline();
        let mut pidf = p_only(1.0);
        let mut report = StatusReport::default();

        let cmd = compute_drive_command(
            &mut spline,
            &Pose2D::new(1.5, 1.0, 0.0),
            &mut pidf,
            0.0,
            &Params::default(),
            &mut report,
        );

        assert!((report.path_t - 0.5).abs() < 1e-6);
        assert!((spline.point(report.path_t).x - 1.5).abs() < 1e-6);
        assert!((report.cross_track_error_m - 1.0).abs() < 1e-9);
        assert!((report.lateral_error_m - 1.0).abs() < 1e-9);
        assert!(report.curvature_per_m.abs() < 1e-12);
        assert!(report.centripetal.norm() < 1e-12);
        assert!(report.solver_converged);

        // Forward along x and down towards the path
        assert!((cmd.x() - 1.0).abs() < 1e-9);
        assert!((cmd.y() + 1.0).abs() < 1e-9);
        assert!(cmd.heading_rad.abs() < 1e-12);
    }

    #[test]
    fn test_on_path_has_no_correction() {
        let mut spline = straight_spline();
        let mut pidf = p_only(5.0);
        let mut report = StatusReport::default();

        let cmd = compute_drive_command(
            &mut spline,
            &Pose2D::new(1.25, 0.0, 0.0),
            &mut pidf,
            0.0,
            &Params::default(),
            &mut report,
        );

        assert_eq!(report.correction, Vector2::zeros());
        assert!((cmd.position_m - Vector2::new(1.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn test_terms_sum_to_command() {
        // Left hand bend
        let mut spline = Spline::new(vec![
            Vector2::new(0.0, -1.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(-1.0, 0.0),
        ])
        .unwrap();
        let mut pidf = p_only(0.5);
        let mut report = StatusReport::default();

        let cmd = compute_drive_command(
            &mut spline,
            &Pose2D::new(1.2, 0.4, 0.0),
            &mut pidf,
            0.0,
            &Params::default(),
            &mut report,
        );

        let sum = report.tangent + report.correction + report.centripetal;
        assert!((cmd.position_m - sum).norm() < 1e-12);

        // Curving left, the feedforward points to the left of the tangent
        assert!(report.curvature_per_m > 0.0);
        assert!(cross2(&report.tangent, &report.centripetal) > 0.0);

        // Robot is outside the bend, to the right of the path
        assert!(report.lateral_error_m < 0.0);

        // Heading is wrapped
        assert!(cmd.heading_rad >= 0.0 && cmd.heading_rad < 2.0 * PI);
    }

    #[test]
    fn test_centripetal_is_capped() {
        let mut spline = Spline::new(vec![
            Vector2::new(0.0, -1.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(-1.0, 0.0),
        ])
        .unwrap();
        let mut pidf = p_only(0.0);
        let mut report = StatusReport::default();
        let params = Params {
            centripetal_cap: 0.1,
            ..Default::default()
        };

        compute_drive_command(
            &mut spline,
            &Pose2D::new(0.7, 0.7, 0.0),
            &mut pidf,
            0.0,
            &params,
            &mut report,
        );

        assert!((report.centripetal.norm() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_zero_tangent_falls_back() {
        let p = Vector2::new(1.0, 1.0);
        let mut spline = Spline::new(vec![p, p, p, p]).unwrap();
        let mut pidf = p_only(1.0);
        let mut report = StatusReport::default();

        let cmd = compute_drive_command(
            &mut spline,
            &Pose2D::new(0.0, 1.0, -PI / 2.0),
            &mut pidf,
            0.0,
            &Params::default(),
            &mut report,
        );

        assert!(report.zero_tangent);
        assert_eq!(report.curvature_per_m, 0.0);
        assert_eq!(report.centripetal, Vector2::zeros());
        assert!((cmd.heading_rad - 1.5 * PI).abs() < 1e-12);

        // Only the correction remains, straight towards the point
        assert!((cmd.position_m - Vector2::new(1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_cross_track_limit_flag() {
        let mut spline = straight_spline();
        let mut pidf = p_only(1.0);
        let mut report = StatusReport::default();
        let params = Params {
            cross_track_limit_m: Some(0.5),
            ..Default::default()
        };

        compute_drive_command(
            &mut spline,
            &Pose2D::new(1.5, 1.0, 0.0),
            &mut pidf,
            0.0,
            &params,
            &mut report,
        );

        assert!(report.cross_track_limit_exceeded);
    }
}
