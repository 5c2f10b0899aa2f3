//! # Logger
//!
//! Sets up the `log` facade for an executable, writing every record to stdout and to the
//! session's log file. Lines are stamped with the seconds since the session started:
//!
//! ```text
//! [  1.250000 INF] Following new path of 5 segments (6.81 m)
//! [  1.270000 DBG] path_lib::spline: Active segment 0 -> 1 (of 5)
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use log::{info, Level};
use thiserror::Error;

// Internal imports
use crate::session::{self, Session, SessionError};

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target of the closest point solver, which logs every degenerate Newton step at trace level.
const SOLVER_TARGET: &str = "path_lib::closest_point";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("The minimum log level must include info messages, found `{0}`")]
    InvalidMinLogLevel(LevelFilter),

    #[error("The session is not usable for logging: {0}")]
    SessionError(#[from] SessionError),

    #[error("Cannot open the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("A logger has already been set: {0}")]
    FernInitError(log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise logging for this execution.
///
/// `min_level` must be `Info` or more verbose. The solver target never goes below `Debug`, a
/// `Trace` run would otherwise be dominated by degenerate step messages.
///
/// Only one logger can be set per process, a second call fails with `FernInitError`.
pub fn logger_init(min_level: LevelFilter, session: &Session) -> Result<(), LoggerInitError> {
    if min_level < Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level));
    }

    // Elapsed times are measured from the process epoch, which must exist
    session::get_epoch()?;

    let log_file =
        fern::log_file(session.log_file_path()).map_err(LoggerInitError::LogFileInitError)?;

    fern::Dispatch::new()
        .format(|out, message, record| {
            let tag = level_tag(record.level());
            let elapsed_s = session::get_elapsed_seconds();

            if record.level() > Level::Info {
                out.finish(format_args!(
                    "[{:10.6} {}] {}: {}",
                    elapsed_s,
                    tag,
                    record.target(),
                    message
                ))
            } else {
                out.finish(format_args!("[{:10.6} {}] {}", elapsed_s, tag, message))
            }
        })
        .level(min_level)
        .level_for(SOLVER_TARGET, solver_level(min_level))
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    info!("    Session epoch: {}", session.epoch());
    info!("    Log level: {:?}", min_level);
    info!("    Log file path: {:?}", session.log_file_path());

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Level for the solver target, at most `Debug`.
fn solver_level(min_level: LevelFilter) -> LevelFilter {
    min_level.min(LevelFilter::Debug)
}

fn level_tag(level: Level) -> ColoredString {
    match level {
        Level::Trace => "TRC".dimmed().italic(),
        Level::Debug => "DBG".dimmed(),
        Level::Info => "INF".normal(),
        Level::Warn => "WRN".yellow(),
        Level::Error => "ERR".red().bold(),
    }
}
