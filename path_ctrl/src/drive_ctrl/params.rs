//! Drive control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use crate::{closest_point::SolverParams, pidf::PidfParams};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for drive control
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Params {
    /// Gains of the cross-track error controller
    pub pidf: PidfParams,

    /// Closest point search parameters. The derivative method and step are also used for the
    /// geometry at the closest point.
    #[serde(default)]
    pub solver: SolverParams,

    /// Limit on the magnitude of the centripetal feedforward term.
    ///
    /// Near a cusp the curvature grows without bound, this keeps the term usable.
    pub centripetal_cap: f64,

    /// The limit on cross-track error. Above this limit the path will be aborted. No limit if
    /// not set.
    #[serde(default)]
    pub cross_track_limit_m: Option<f64>,

    /// Parameter on the last segment beyond which the path is considered complete.
    #[serde(default = "default_end_threshold")]
    pub end_threshold: f64,
}

fn default_end_threshold() -> f64 {
    0.999
}

impl Default for Params {
    fn default() -> Self {
        Self {
            pidf: PidfParams {
                k_p: 1.0,
                ..Default::default()
            },
            solver: SolverParams::default(),
            centripetal_cap: 10.0,
            cross_track_limit_m: None,
            end_threshold: default_end_threshold(),
        }
    }
}
