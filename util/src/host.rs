//! Host platform utility functions

use std::{env, path::PathBuf};

/// Name of the environment variable pointing at the software root directory.
pub const SW_ROOT_ENV_VAR: &str = "PATH_CTRL_ROOT";

/// Get the software root directory.
///
/// This is the value of `PATH_CTRL_ROOT` if it is set, otherwise the current working directory.
pub fn get_sw_root() -> std::io::Result<PathBuf> {
    match env::var_os(SW_ROOT_ENV_VAR) {
        Some(root) => Ok(PathBuf::from(root)),
        None => env::current_dir()
    }
}
