//! Double-to-single rounding primitive.
//!
//! Kernels in this crate carry accumulators in `f64` storage but must behave
//! like single-precision hardware: after every elementary operation the
//! result is squeezed through [`to_float32`] so that no double-only low-order
//! mantissa bits survive into the next operation.

/// Rounds a double-precision value to the nearest single-precision
/// representable value (IEEE-754 narrowing, ties to even) and returns it in
/// `f64` storage.
///
/// Finite values that overflow `f32` round to the infinity of matching sign;
/// infinities and NaN pass through unchanged.
#[inline(always)]
pub fn to_float32(x: f64) -> f64 {
    (x as f32) as f64
}
