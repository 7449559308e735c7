//! Guarded floating-point helpers.
//!
//! Every value written into the game state passes through one of these so
//! that NaN or infinity can never leak into a snapshot. Zone masses span
//! 1e2..1e27 kg, far outside fixed-point range, so the simulation runs on
//! `f64` and relies on these guards instead.

/// Replace NaN and infinities with zero.
#[inline]
pub fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// Finite and non-negative.
#[inline]
pub fn non_negative(v: f64) -> f64 {
    finite_or_zero(v).max(0.0)
}

/// Clamp into `[0, 1]`, mapping non-finite input to zero.
#[inline]
pub fn clamp01(v: f64) -> f64 {
    finite_or_zero(v).clamp(0.0, 1.0)
}

/// Divide, returning `fallback` when the denominator is zero or the
/// quotient is not finite.
#[inline]
pub fn safe_div(num: f64, den: f64, fallback: f64) -> f64 {
    if den == 0.0 {
        return fallback;
    }
    let q = num / den;
    if q.is_finite() { q } else { fallback }
}
