//! # PIDF controller
//!
//! A PID controller with a constant feedforward term and optional integral clamping.
//!
//! The controller doesn't read any clock itself, the caller passes the time of each update so
//! that the controller is deterministic and can be driven by simulated or recorded time.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::{Deserialize, Serialize};

// Internal
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains and limits of a PIDF controller.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PidfParams {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,

    /// Constant feedforward
    pub k_f: f64,

    /// If set the integral accumulator is kept within `[-limit, limit]`
    pub integral_limit: Option<f64>,
}

/// The individual terms of the last controller output.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PidfTerms {
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub f: f64,
}

/// A PIDF controller
#[derive(Debug, Serialize, Clone)]
pub struct PidfController {
    /// Gains and integral limit
    params: PidfParams,

    /// Time of the previous update in seconds
    prev_time_s: Option<f64>,

    /// Previous error
    prev_error: Option<f64>,

    /// The integral accumulation
    integral: f64,

    /// Terms making up the last output
    terms: PidfTerms,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidfTerms {
    pub fn total(&self) -> f64 {
        self.p + self.i + self.d + self.f
    }
}

impl PidfController {
    /// Create a new controller with the given gains.
    pub fn new(params: PidfParams) -> Self {
        Self {
            params,
            prev_time_s: None,
            prev_error: None,
            integral: 0f64,
            terms: PidfTerms::default(),
        }
    }

    /// Get the value of the controller for the given error at the given time.
    ///
    /// The elapsed time is measured from the previous call. On the first call, or if the time
    /// has not advanced, there is no meaningful elapsed time so neither the integral nor the
    /// derivative are updated and the derivative term is zero.
    pub fn update(&mut self, error: f64, time_s: f64) -> f64 {
        // Calculate dt, only positive finite values can be used
        let dt = match self.prev_time_s {
            Some(t0) => Some(time_s - t0).filter(|dt| *dt > 0.0 && dt.is_finite()),
            None => None,
        };

        if dt.is_none() && self.prev_time_s.is_some() {
            trace!(
                "Non-positive time step ({:?} -> {}), skipping integral and derivative",
                self.prev_time_s,
                time_s
            );
        }

        // Accumulate the integral term.
        //
        // While the integral gain is zero the accumulator is frozen, so that turning the gain on
        // later doesn't release a store of old error.
        if let Some(t) = dt {
            if self.params.k_i != 0.0 {
                self.integral += error * t;

                if let Some(limit) = self.params.integral_limit {
                    let limit = limit.abs();
                    self.integral = clamp(&self.integral, &-limit, &limit);
                }
            }
        }

        // Calculate the derivative
        let deriv = match (self.prev_error, dt) {
            (Some(e), Some(t)) => (error - e) / t,
            _ => 0f64,
        };

        self.terms = PidfTerms {
            p: self.params.k_p * error,
            i: self.params.k_i * self.integral,
            d: self.params.k_d * deriv,
            f: self.params.k_f,
        };

        // Remember the previous error and time
        self.prev_error = Some(error);
        self.prev_time_s = Some(time_s);

        self.terms.total()
    }

    /// Zero the integral accumulator, keeping the previous error and time.
    pub fn reset_integral(&mut self) {
        self.integral = 0f64;
    }

    /// Clear all state, the next update behaves like the first one.
    pub fn reset(&mut self) {
        self.integral = 0f64;
        self.prev_error = None;
        self.prev_time_s = None;
        self.terms = PidfTerms::default();
    }

    /// Replace the gains and integral limit.
    ///
    /// The accumulator is kept, but clamped to the new limit.
    pub fn set_params(&mut self, params: PidfParams) {
        self.params = params;

        if let Some(limit) = self.params.integral_limit {
            let limit = limit.abs();
            self.integral = clamp(&self.integral, &-limit, &limit);
        }
    }

    pub fn set_k_p(&mut self, k_p: f64) {
        self.params.k_p = k_p;
    }

    pub fn set_k_i(&mut self, k_i: f64) {
        self.params.k_i = k_i;
    }

    pub fn set_k_d(&mut self, k_d: f64) {
        self.params.k_d = k_d;
    }

    pub fn set_k_f(&mut self, k_f: f64) {
        self.params.k_f = k_f;
    }

    pub fn set_integral_limit(&mut self, limit: Option<f64>) {
        let mut params = self.params;
        params.integral_limit = limit;
        self.set_params(params);
    }

    pub fn params(&self) -> &PidfParams {
        &self.params
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// The terms making up the output of the last update.
    pub fn terms(&self) -> PidfTerms {
        self.terms
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn gains(k_p: f64, k_i: f64, k_d: f64, k_f: f64) -> PidfParams {
        PidfParams {
            k_p,
            k_i,
            k_d,
            k_f,
            integral_limit: None,
        }
    }

    #[test]
    fn test_proportional_only() {
        let mut pidf = PidfController::new(gains(1.0, 0.0, 0.0, 0.0));

        assert_eq!(pidf.update(5.0, 0.0), 5.0);
        assert_eq!(pidf.update(5.0, 1.0), 5.0);
        assert_eq!(pidf.terms().d, 0.0);
    }

    #[test]
    fn test_first_derivative_is_zero() {
        let mut pidf = PidfController::new(gains(0.0, 0.0, 10.0, 0.0));

        assert_eq!(pidf.update(3.0, 12.5), 0.0);
        assert_eq!(pidf.terms().d, 0.0);

        // Error increased by 1 over 0.5 s
        assert_eq!(pidf.update(4.0, 13.0), 20.0);
    }

    #[test]
    fn test_zero_dt_derivative_is_zero() {
        let mut pidf = PidfController::new(gains(0.0, 1.0, 1.0, 0.0));

        pidf.update(1.0, 1.0);
        pidf.update(2.0, 2.0);
        let integral = pidf.integral();

        // Same timestamp, and a timestamp going backwards
        let out = pidf.update(10.0, 2.0);
        assert_eq!(pidf.terms().d, 0.0);
        assert!(out.is_finite());
        pidf.update(10.0, 1.5);
        assert_eq!(pidf.terms().d, 0.0);
        assert_eq!(pidf.integral(), integral);
    }

    #[test]
    fn test_integral_accumulates() {
        let mut pidf = PidfController::new(gains(0.0, 2.0, 0.0, 0.0));

        pidf.update(1.0, 0.0);
        pidf.update(1.0, 0.5);
        let out = pidf.update(3.0, 1.0);

        assert!((pidf.integral() - 2.0).abs() < 1e-12);
        assert!((out - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_integral_gain_freezes_accumulator() {
        let mut pidf = PidfController::new(gains(1.0, 0.0, 0.0, 0.0));

        for i in 0..100 {
            pidf.update((i as f64 * 0.37).sin() * 10.0, i as f64 * 0.1);
            assert_eq!(pidf.integral(), 0.0);
        }
    }

    #[test]
    fn test_anti_windup() {
        let mut pidf = PidfController::new(PidfParams {
            k_i: 1.0,
            integral_limit: Some(0.75),
            ..Default::default()
        });

        for i in 0..1000 {
            pidf.update(5.0, i as f64 * 0.02);
            assert!(pidf.integral() <= 0.75);
        }
        assert_eq!(pidf.integral(), 0.75);

        // Negative side is clamped too
        for i in 1000..3000 {
            pidf.update(-5.0, i as f64 * 0.02);
            assert!(pidf.integral() >= -0.75);
        }
        assert_eq!(pidf.integral(), -0.75);
    }

    #[test]
    fn test_feedforward_constant() {
        let mut pidf = PidfController::new(gains(0.0, 0.0, 0.0, 0.3));

        assert_eq!(pidf.update(100.0, 0.0), 0.3);
        assert_eq!(pidf.update(-100.0, 1.0), 0.3);
    }

    #[test]
    fn test_reset_integral_keeps_history() {
        let mut pidf = PidfController::new(gains(0.0, 1.0, 1.0, 0.0));

        pidf.update(1.0, 0.0);
        pidf.update(1.0, 1.0);
        assert_eq!(pidf.integral(), 1.0);

        pidf.reset_integral();
        assert_eq!(pidf.integral(), 0.0);

        // Derivative still uses the stored error and time
        pidf.update(2.0, 2.0);
        assert_eq!(pidf.terms().d, 1.0);
        assert_eq!(pidf.integral(), 2.0);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut pidf = PidfController::new(gains(0.0, 1.0, 1.0, 0.0));

        pidf.update(1.0, 0.0);
        pidf.update(3.0, 1.0);
        pidf.reset();

        pidf.update(5.0, 2.0);
        assert_eq!(pidf.terms().d, 0.0);
        assert_eq!(pidf.integral(), 0.0);
    }

    #[test]
    fn test_live_tuning() {
        let mut pidf = PidfController::new(gains(1.0, 1.0, 0.0, 0.0));

        pidf.update(2.0, 0.0);
        pidf.update(2.0, 1.0);
        assert_eq!(pidf.integral(), 2.0);

        pidf.set_integral_limit(Some(0.5));
        assert_eq!(pidf.integral(), 0.5);

        pidf.set_k_p(3.0);
        pidf.set_k_i(0.0);
        pidf.set_k_f(1.0);
        assert_eq!(pidf.update(2.0, 2.0), 7.0);
        assert_eq!(pidf.params().k_p, 3.0);
    }
}
