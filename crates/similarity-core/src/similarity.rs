//! Cosine similarity scorer.
//!
//! Mismatched lengths and zero-magnitude vectors are reported as errors,
//! never scored as `0.0`.

use crate::error::{Error, Result};

/// Compute `dot(a, b) / (‖a‖ · ‖b‖)`.
///
/// Sums are accumulated in `f64`.
///
/// # Errors
///
/// - [`Error::DimensionMismatch`] if `a.len() != b.len()`.
/// - [`Error::ZeroMagnitude`] if either vector has zero norm (this includes
///   two empty vectors).
pub fn cosine(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let mag_a = norm_a.sqrt();
    let mag_b = norm_b.sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return Err(Error::ZeroMagnitude);
    }

    Ok(dot / (mag_a * mag_b))
}
