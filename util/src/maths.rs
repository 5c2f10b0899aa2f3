//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::{Float, FloatConst};

/// Clamp a value into `[min, max]`.
///
/// Unlike `f64::clamp` a NaN `value` is returned unchanged and inverted bounds do not panic, the
/// lower bound takes precedence.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T 
where
    T: Float
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Get the signed angular distance between two angles in the range of [0, 2pi].
///
/// This function will return the shortest signed distance between a and b accounting for wrapping
/// between 0 and 2pi.
pub fn get_ang_dist_2pi<T>(a: T, b: T) -> T
where
    T: Float + FloatConst
{
    let tau_t = T::PI() + T::PI();

    let c = rem_euclid(a - b, tau_t);
    let d = rem_euclid(b - a, tau_t);

    if c < d {
        -c
    }
    else {
        d
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
/// 
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
/// This result is not an element of the function's codomain, but it is the
/// closest floating point number in the real numbers and thus fulfills the
/// property `self == self.div_euclid(rhs) * rhs + self.rem_euclid(rhs)`
/// approximatively.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Wrap an angle in radians into the half-open range [0, 2pi).
///
/// Corrects the round-off case of [`rem_euclid`] so that 2pi itself is never returned.
pub fn wrap_2pi<T>(angle: T) -> T
where
    T: Float + FloatConst
{
    let tau_t = T::PI() + T::PI();

    let r = rem_euclid(angle, tau_t);
    if r >= tau_t { T::zero() } else { r }
}

#[cfg(test)]
mod test {
    use super::*;

    const TAU: f64 = std::f64::consts::TAU;
    const PI: f64 = std::f64::consts::PI;

    #[test]
    fn test_get_ang_dist_2pi() {
        assert_eq!(get_ang_dist_2pi(1f64, 2f64), 1f64);
        assert_eq!(get_ang_dist_2pi(2f64, 1f64), -1f64);
        assert_eq!(get_ang_dist_2pi(0f64, TAU), 0f64);
        assert_eq!(get_ang_dist_2pi(TAU, 0f64), 0f64);
        assert_eq!(get_ang_dist_2pi(1f64, TAU), -1f64);
        assert_eq!(get_ang_dist_2pi(0f64, TAU - 1f64), -1f64);
        assert_eq!(get_ang_dist_2pi(TAU - 1f64, 1f64), 2f64);
    }

    #[test]
    fn test_wrap_2pi() {
        assert_eq!(wrap_2pi(0f64), 0f64);
        assert!((wrap_2pi(-PI / 2.0) - 1.5 * PI).abs() < 1e-12);
        assert!((wrap_2pi(TAU + 1.0) - 1.0).abs() < 1e-12);
        assert!(wrap_2pi(-1e-20f64) < TAU);
        assert_eq!(wrap_2pi(TAU), 0f64);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(&5f64, &-1f64, &1f64), 1f64);
        assert_eq!(clamp(&-5f64, &-1f64, &1f64), -1f64);
        assert_eq!(clamp(&0.5f64, &-1f64, &1f64), 0.5f64);
        assert!(clamp(&f64::NAN, &-1f64, &1f64).is_nan());
    }
}
