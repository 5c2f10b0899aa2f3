//! # Session
//!
//! A session is one run of an executable. It owns a directory under the software root,
//! `<root>/<sessions_dir>/<exec_name>_<timestamp>/`, holding the run's log file and an `arch/`
//! directory for CSV archives.
//!
//! The session epoch is process wide so that log lines can be stamped with the time since the
//! start of the run. Only one session may be started per process.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Internal imports
use crate::time;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Format of the timestamp in session directory names, see `chrono::format::strftime`.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Name of the archive directory within a session.
const ARCH_DIR_NAME: &str = "arch";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A started session.
///
/// Sessions can only be built by [`Session::new`] or [`Session::in_root`], so holding one
/// guarantees the directories exist and the epoch is set.
#[derive(Clone, Debug)]
pub struct Session {
    root: PathBuf,
    arch_root: PathBuf,
    log_file_path: PathBuf,
    epoch: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with sessions.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Cannot find the software root directory: {0}")]
    SwRootNotFound(std::io::Error),

    #[error("Cannot create session directory {0:?}: {1}")]
    CannotCreateDir(PathBuf, std::io::Error),

    #[error("A session has already been started in this process ({0})")]
    CannotInitEpoch(conquer_once::TryInitError),

    #[error("No session has been started in this process")]
    CannotGetEpoch,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start the session for `exec_name` in `sessions_dir` under the software root.
    pub fn new(exec_name: &str, sessions_dir: &str) -> Result<Self, SessionError> {
        let root = crate::host::get_sw_root().map_err(SessionError::SwRootNotFound)?;

        Self::in_root(exec_name, root.join(sessions_dir))
    }

    /// Start the session for `exec_name` inside the given sessions directory.
    pub fn in_root<P: AsRef<Path>>(exec_name: &str, sessions_dir: P) -> Result<Self, SessionError> {
        SESSION_EPOCH
            .try_init_once(Utc::now)
            .map_err(SessionError::CannotInitEpoch)?;
        let epoch = *get_epoch()?;

        let root = sessions_dir
            .as_ref()
            .join(format!("{}_{}", exec_name, epoch.format(TIMESTAMP_FORMAT)));
        let arch_root = root.join(ARCH_DIR_NAME);

        // Creating the archive dir creates the session root too
        fs::create_dir_all(&arch_root)
            .map_err(|e| SessionError::CannotCreateDir(arch_root.clone(), e))?;

        Ok(Session {
            log_file_path: root.join(format!("{}.log", exec_name)),
            root,
            arch_root,
            epoch,
        })
    }

    /// Directory of this session.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory archives are written to.
    pub fn arch_root(&self) -> &Path {
        &self.arch_root
    }

    /// Path of an archive file within the archive directory.
    pub fn arch_path<P: AsRef<Path>>(&self, name: P) -> PathBuf {
        self.arch_root.join(name)
    }

    pub fn log_file_path(&self) -> &Path {
        &self.log_file_path
    }

    /// Time the session was started.
    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Seconds elapsed since the session was started.
///
/// `NAN` before a session has been started, so that early log lines are still written.
pub fn get_elapsed_seconds() -> f64 {
    SESSION_EPOCH
        .get()
        .and_then(|e| time::duration_to_seconds(Utc::now() - *e))
        .unwrap_or(std::f64::NAN)
}

/// The epoch of the session started in this process.
pub fn get_epoch() -> Result<&'static DateTime<Utc>, SessionError> {
    SESSION_EPOCH.get().ok_or(SessionError::CannotGetEpoch)
}
