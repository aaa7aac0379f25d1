//! Starting-index derivation for whole-array strided walks.

/// Returns the starting index for a walk of `n` elements with step `stride`
/// over a conceptual array indexed from 0.
///
/// A non-negative stride starts at index 0. A negative stride starts at
/// `(1 - n) * stride` so that the walk moves backward and lands on index 0 at
/// its final step. `n == 0` yields 0 (no element is visited).
#[inline(always)]
pub fn stride_offset(n: usize, stride: isize) -> usize {
    if stride >= 0 || n == 0 {
        0
    } else {
        ((1 - n as isize) * stride) as usize
    }
}
