//! # Follow Simulation
//!
//! This binary runs drive control against a simple kinematic robot, without requiring a
//! localisation source or any locomotion hardware. It is designed to allow quick tuning of the
//! drive control parameters on a path file.
//!
//! The robot moves along the commanded drive vector, limited to a maximum speed, and turns
//! towards the commanded heading at a limited rate. Every cycle is archived to
//! `arch/follow_sim.csv` in the session directory.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::env;

use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use path_lib::{
    drive_ctrl::{DriveCtrl, DriveCtrlMode, StatusReport},
    geom::Pose2D,
    spline::Spline,
};
use util::{
    archive::Archiver,
    logger::{logger_init, LevelFilter},
    maths::{get_ang_dist_2pi, wrap_2pi},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Parameters of the simulation
#[derive(Debug, Deserialize)]
struct SimParams {
    /// Path file to follow, relative to the params directory
    path_file: String,

    /// Drive control parameter file, relative to the params directory
    drive_ctrl_params_file: String,

    /// Starting pose of the robot
    start_pose: Pose2D,

    /// Simulated time step
    cycle_period_s: f64,

    /// Maximum number of cycles to run for
    max_cycles: usize,

    /// Maximum speed of the robot
    max_speed_ms: f64,

    /// Maximum turn rate of the robot
    max_turn_rate_rads: f64,
}

/// One row of the archive
#[derive(Serialize)]
struct CycleRecord {
    time_s: f64,
    x_m: f64,
    y_m: f64,
    heading_rad: f64,
    segment: usize,
    path_t: f64,
    cross_track_error_m: f64,
    lateral_error_m: f64,
    curvature_per_m: f64,
    solver_iterations: usize,
    solver_converged: bool,
    drive_x: f64,
    drive_y: f64,
    drive_heading_rad: f64,
}

/// Summary written at the end of the run
#[derive(Serialize)]
struct Summary {
    cycles: usize,
    finished: bool,
    max_cross_track_error_m: f64,
    mean_cross_track_error_m: f64,
    final_pose: Pose2D,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("follow_sim", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Follow Simulation\n");
    info!("Session directory: {:?}\n", session.root());

    // ---- LOAD PARAMETERS ----

    // Collect all arguments, a single argument overrides the simulation parameter file
    let args: Vec<String> = env::args().collect();
    debug!("CLI arguments: {:?}", args);

    let sim_params_file = match args.len() {
        1 => "follow_sim.toml",
        2 => args[1].as_str(),
        _ => return Err(eyre!("Expected at most one argument, the simulation parameter file")),
    };

    let sim_params: SimParams =
        util::params::load(sim_params_file).wrap_err("Could not load simulation params")?;

    let spline: Spline =
        util::params::load(&sim_params.path_file).wrap_err("Could not load the path file")?;

    info!(
        "Loaded path \"{}\" with {} control points",
        sim_params.path_file,
        spline.num_points()
    );

    // ---- MODULE INIT ----

    let mut drive_ctrl = DriveCtrl::init(&sim_params.drive_ctrl_params_file)
        .wrap_err("Failed to initialise DriveCtrl")?;
    info!("DriveCtrl init complete");

    drive_ctrl
        .begin_path(spline)
        .wrap_err("Failed to begin following the path")?;

    let mut archiver = Archiver::from_path(&session, "follow_sim.csv")
        .wrap_err("Failed to create the archive")?;

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let mut pose = sim_params.start_pose;
    let mut time_s = 0f64;
    let mut max_cross_track_m = 0f64;
    let mut sum_cross_track_m = 0f64;
    let mut cycles = 0;
    let mut finished = false;

    while cycles < sim_params.max_cycles {
        let (cmd, report) = drive_ctrl
            .proc(&pose, time_s)
            .wrap_err("Error processing DriveCtrl")?;

        cycles += 1;
        max_cross_track_m = max_cross_track_m.max(report.cross_track_error_m);
        sum_cross_track_m += report.cross_track_error_m;

        if !report.solver_converged {
            warn!("Closest point search did not converge at t = {:.2} s", time_s);
        }

        let cmd = match cmd {
            Some(c) => c,
            None => Pose2D::new(0.0, 0.0, pose.heading_rad),
        };

        archiver
            .serialise(record(time_s, &pose, &report, &cmd))
            .wrap_err("Failed to archive cycle")?;

        if report.path_finished || drive_ctrl.mode() == DriveCtrlMode::Off {
            finished = report.path_finished;
            break;
        }

        pose = step_robot(&pose, &cmd, &sim_params);
        time_s += sim_params.cycle_period_s;
    }

    // ---- SUMMARY ----

    let summary = Summary {
        cycles,
        finished,
        max_cross_track_error_m: max_cross_track_m,
        mean_cross_track_error_m: if cycles > 0 {
            sum_cross_track_m / cycles as f64
        } else {
            0.0
        },
        final_pose: pose,
    };

    info!(
        "Run complete after {} cycles ({:.1} s), path finished: {}",
        summary.cycles, time_s, summary.finished
    );
    info!(
        "Cross-track error: max {:.3} m, mean {:.3} m",
        summary.max_cross_track_error_m, summary.mean_cross_track_error_m
    );

    let summary_path = session.root().join("summary.json");
    std::fs::write(
        &summary_path,
        serde_json::to_string_pretty(&summary).wrap_err("Failed to serialise the summary")?,
    )
    .wrap_err_with(|| format!("Failed to write {:?}", summary_path))?;

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Move the robot for one cycle under the given command.
fn step_robot(pose: &Pose2D, cmd: &Pose2D, params: &SimParams) -> Pose2D {
    let dt = params.cycle_period_s;

    // Limit speed
    let mut vel_ms = cmd.position_m;
    let speed_ms = vel_ms.norm();
    if speed_ms > params.max_speed_ms {
        vel_ms *= params.max_speed_ms / speed_ms;
    }

    // Limit turn rate towards the commanded heading
    let max_turn_rad = params.max_turn_rate_rads * dt;
    let turn_rad = get_ang_dist_2pi(wrap_2pi(pose.heading_rad), cmd.heading_rad)
        .max(-max_turn_rad)
        .min(max_turn_rad);

    Pose2D {
        position_m: pose.position_m + vel_ms * dt,
        heading_rad: wrap_2pi(pose.heading_rad + turn_rad),
    }
}

fn record(time_s: f64, pose: &Pose2D, report: &StatusReport, cmd: &Pose2D) -> CycleRecord {
    CycleRecord {
        time_s,
        x_m: pose.x(),
        y_m: pose.y(),
        heading_rad: pose.heading_rad,
        segment: report.segment,
        path_t: report.path_t,
        cross_track_error_m: report.cross_track_error_m,
        lateral_error_m: report.lateral_error_m,
        curvature_per_m: report.curvature_per_m,
        solver_iterations: report.solver_iterations,
        solver_converged: report.solver_converged,
        drive_x: cmd.x(),
        drive_y: cmd.y(),
        drive_heading_rad: cmd.heading_rad,
    }
}
