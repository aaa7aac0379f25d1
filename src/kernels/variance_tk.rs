//! # One-Pass Textbook Variance (VARIANCE_TK)
//!
//! Computes the variance of a single-precision strided view in one pass from
//! a running sum and sum of squares, with every intermediate re-rounded to
//! `f32` so the result is bit-identical to what a native single-precision
//! accumulator would produce. Two raw entry points share one loop: an
//! explicit starting offset ([`variance_tk_at`]) for sub-windows of a larger
//! buffer, and an offset inferred from the stride sign ([`variance_tk`]) for
//! whole-array, possibly reversed, walks.
//!
//! ## Parameters
//! - **n**: Count of elements read from the view.
//! - **correction**: Degrees-of-freedom adjustment (`1.0` for the sample
//!   variance, `0.0` for the population variance; may be fractional).
//! - **stride**: Signed step between consecutive logical elements; negative
//!   walks backward, zero re-reads one element.
//! - **offset**: Starting index (explicit entry point only).
//!
//! ## Errors
//! The raw kernels signal degenerate inputs through return values, never
//! errors: `NaN` when `n == 0` or `n - correction <= 0`, `0.0` when `n == 1`
//! or `stride == 0`. The checked [`variance`] front door additionally
//! validates bounds and parameters and reports [`VarianceError`].
//!
//! ## Returns
//! An `f32` variance (or the `NaN`/`0.0` sentinels above).

use crate::utilities::float32::to_float32;
use crate::utilities::strided::stride_offset;
use aligned_vec::{AVec, CACHELINE_ALIGN};
use rayon::prelude::*;
use thiserror::Error;

// -- Data Structures --

#[derive(Debug, Clone)]
pub struct VarianceParams {
    pub n: Option<usize>,
    pub correction: Option<f64>,
    pub stride: Option<isize>,
    pub offset: Option<usize>,
}

impl Default for VarianceParams {
    fn default() -> Self {
        Self {
            n: None,
            correction: Some(1.0),
            stride: Some(1),
            offset: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VarianceInput<'a> {
    pub data: &'a [f32],
    pub params: VarianceParams,
}

impl<'a> VarianceInput<'a> {
    #[inline]
    pub fn from_slice(data: &'a [f32], params: VarianceParams) -> Self {
        Self { data, params }
    }
    #[inline]
    pub fn with_defaults(data: &'a [f32]) -> Self {
        Self::from_slice(data, VarianceParams::default())
    }
    #[inline]
    pub fn get_correction(&self) -> f64 {
        self.params.correction.unwrap_or(1.0)
    }
    #[inline]
    pub fn get_stride(&self) -> isize {
        self.params.stride.unwrap_or(1)
    }
}

// -- Builder --

#[derive(Copy, Clone, Debug, Default)]
pub struct VarianceBuilder {
    n: Option<usize>,
    correction: Option<f64>,
    stride: Option<isize>,
    offset: Option<usize>,
}

impl VarianceBuilder {
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }
    #[inline(always)]
    pub fn count(mut self, n: usize) -> Self {
        self.n = Some(n);
        self
    }
    #[inline(always)]
    pub fn correction(mut self, c: f64) -> Self {
        self.correction = Some(c);
        self
    }
    #[inline(always)]
    pub fn stride(mut self, s: isize) -> Self {
        self.stride = Some(s);
        self
    }
    #[inline(always)]
    pub fn offset(mut self, o: usize) -> Self {
        self.offset = Some(o);
        self
    }
    #[inline(always)]
    pub fn apply_slice(self, data: &[f32]) -> Result<f32, VarianceError> {
        let params = VarianceParams {
            n: self.n,
            correction: self.correction,
            stride: self.stride,
            offset: self.offset,
        };
        variance(&VarianceInput::from_slice(data, params))
    }
    #[inline(always)]
    pub fn into_stream(self) -> Result<VarianceStream, VarianceError> {
        VarianceStream::try_new(self.correction.unwrap_or(1.0))
    }
}

// -- Errors --

#[derive(Debug, Error)]
pub enum VarianceError {
    #[error("variance: empty input slice")]
    EmptyData,
    #[error("variance: correction is negative or NaN: {correction}")]
    InvalidCorrection { correction: f64 },
    #[error("variance: view reads index {index} outside slice of length {len}")]
    OutOfBounds { index: isize, len: usize },
    #[error("variance: invalid batch dimensions: rows = {rows}, cols = {cols}")]
    InvalidDimensions { rows: usize, cols: usize },
}

// -- Kernel functions --

/// Shared accumulation loop. `n`, `stride`, `offset` must describe a view
/// whose every index lies within `x`; the public checked surface enforces
/// this, the raw entry points leave it to the caller.
#[inline(always)]
fn variance_tk_core(n: usize, correction: f64, x: &[f32], stride: isize, offset: usize) -> f32 {
    let nc = n as f64 - correction;
    if n == 0 || nc <= 0.0 {
        return f32::NAN;
    }
    if n == 1 || stride == 0 {
        return 0.0;
    }
    let mut ix = offset as isize;
    let mut s2 = 0.0f64;
    let mut s = 0.0f64;
    for _ in 0..n {
        let v = x[ix as usize] as f64;
        s2 = to_float32(s2 + to_float32(v * v));
        s = to_float32(s + v);
        ix += stride;
    }
    let mean_term = to_float32(to_float32(s / n as f64) * s);
    to_float32(to_float32(s2 - mean_term) / nc) as f32
}

/// Variance of `n` elements read from `x` starting at `offset` with step
/// `stride`, using the one-pass textbook formula with f32 rounding after
/// every elementary operation.
///
/// Degenerate inputs return sentinels instead of errors: `NaN` when `n == 0`
/// or `n - correction <= 0`, `0.0` when `n == 1` or `stride == 0`. All
/// visited indices `offset + k*stride`, `k < n`, must lie within `x`; a call
/// violating that panics on the slice index.
#[inline]
pub fn variance_tk_at(n: usize, correction: f64, x: &[f32], stride: isize, offset: usize) -> f32 {
    variance_tk_core(n, correction, x, stride, offset)
}

/// Like [`variance_tk_at`] with the starting index inferred from the stride
/// sign: `0` for `stride >= 0`, `(1 - n) * stride` for `stride < 0` (the walk
/// runs backward and ends at index 0).
#[inline]
pub fn variance_tk(n: usize, correction: f64, x: &[f32], stride: isize) -> f32 {
    variance_tk_core(n, correction, x, stride, stride_offset(n, stride))
}

// -- Checked front door --

struct ResolvedView {
    n: usize,
    correction: f64,
    stride: isize,
    offset: usize,
}

/// Fills in defaulted view parameters against a slice of length `len` and
/// verifies the walk stays in bounds. The widest count the stride/offset pair
/// can visit is used when `n` is absent.
fn resolve_view(len: usize, params: &VarianceParams) -> Result<ResolvedView, VarianceError> {
    if len == 0 {
        return Err(VarianceError::EmptyData);
    }
    let correction = params.correction.unwrap_or(1.0);
    if correction.is_nan() || correction < 0.0 {
        return Err(VarianceError::InvalidCorrection { correction });
    }
    let stride = params.stride.unwrap_or(1);
    let sa = stride.unsigned_abs();

    let (n, offset) = match params.offset {
        Some(offset) => {
            if offset >= len {
                return Err(VarianceError::OutOfBounds {
                    index: offset as isize,
                    len,
                });
            }
            let max_n = if stride > 0 {
                (len - 1 - offset) / sa + 1
            } else if stride < 0 {
                offset / sa + 1
            } else {
                len
            };
            (params.n.unwrap_or(max_n), offset)
        }
        None => {
            let max_n = if stride == 0 { len } else { (len - 1) / sa + 1 };
            let n = params.n.unwrap_or(max_n);
            (n, stride_offset(n, stride))
        }
    };

    if n > 0 {
        let first = offset as isize;
        let last = first + (n as isize - 1) * stride;
        if first >= len as isize {
            return Err(VarianceError::OutOfBounds { index: first, len });
        }
        if last < 0 || last >= len as isize {
            return Err(VarianceError::OutOfBounds { index: last, len });
        }
    }
    Ok(ResolvedView {
        n,
        correction,
        stride,
        offset,
    })
}

/// Bounds-checked variance over a strided view described by
/// [`VarianceParams`]. Degenerate counts/corrections still come back as the
/// `NaN`/`0.0` sentinels; only parameter and bounds violations are errors.
pub fn variance(input: &VarianceInput) -> Result<f32, VarianceError> {
    let view = resolve_view(input.data.len(), &input.params)?;
    Ok(variance_tk_core(
        view.n,
        view.correction,
        input.data,
        view.stride,
        view.offset,
    ))
}

// --- Batch support ---

#[derive(Clone, Debug)]
pub struct VarianceBatchOutput {
    pub values: Vec<f32>,
    pub rows: usize,
}

impl VarianceBatchOutput {
    #[inline]
    pub fn row(&self, r: usize) -> Option<f32> {
        self.values.get(r).copied()
    }
}

#[derive(Clone, Debug, Default)]
pub struct VarianceBatchBuilder {
    rows: Option<usize>,
    cols: Option<usize>,
    params: VarianceParams,
    parallel: bool,
}

impl VarianceBatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    #[inline]
    pub fn rows(mut self, r: usize) -> Self {
        self.rows = Some(r);
        self
    }
    #[inline]
    pub fn cols(mut self, c: usize) -> Self {
        self.cols = Some(c);
        self
    }
    #[inline]
    pub fn count(mut self, n: usize) -> Self {
        self.params.n = Some(n);
        self
    }
    #[inline]
    pub fn correction(mut self, c: f64) -> Self {
        self.params.correction = Some(c);
        self
    }
    #[inline]
    pub fn stride(mut self, s: isize) -> Self {
        self.params.stride = Some(s);
        self
    }
    #[inline]
    pub fn offset(mut self, o: usize) -> Self {
        self.params.offset = Some(o);
        self
    }
    #[inline]
    pub fn parallel(mut self, yes: bool) -> Self {
        self.parallel = yes;
        self
    }
    pub fn apply_slice(self, data: &[f32]) -> Result<VarianceBatchOutput, VarianceError> {
        let cols = self.cols.unwrap_or(0);
        let rows = match self.rows {
            Some(r) => r,
            None if cols > 0 => data.len() / cols,
            None => 0,
        };
        variance_batch_inner(data, rows, cols, &self.params, self.parallel)
    }
}

/// Variance of each row of a row-major `rows x cols` matrix stored in `data`,
/// every row read through the same strided view parameters.
#[inline(always)]
pub fn variance_batch_slice(
    data: &[f32],
    rows: usize,
    cols: usize,
    params: &VarianceParams,
) -> Result<VarianceBatchOutput, VarianceError> {
    variance_batch_inner(data, rows, cols, params, false)
}

/// [`variance_batch_slice`] with the rows distributed over the rayon pool.
#[inline(always)]
pub fn variance_batch_par_slice(
    data: &[f32],
    rows: usize,
    cols: usize,
    params: &VarianceParams,
) -> Result<VarianceBatchOutput, VarianceError> {
    variance_batch_inner(data, rows, cols, params, true)
}

fn variance_batch_inner(
    data: &[f32],
    rows: usize,
    cols: usize,
    params: &VarianceParams,
    parallel: bool,
) -> Result<VarianceBatchOutput, VarianceError> {
    if rows == 0 || cols == 0 || rows * cols > data.len() {
        return Err(VarianceError::InvalidDimensions { rows, cols });
    }
    // One resolution against the row length serves every row.
    let view = resolve_view(cols, params)?;

    let mut values: AVec<f32> = AVec::with_capacity(CACHELINE_ALIGN, rows);
    values.resize(rows, f32::NAN);

    let do_row = |row: usize, out: &mut f32| {
        let base = row * cols;
        *out = variance_tk_core(
            view.n,
            view.correction,
            &data[base..base + cols],
            view.stride,
            view.offset,
        );
    };
    let out: &mut [f32] = &mut values;
    if parallel {
        out.par_iter_mut()
            .enumerate()
            .for_each(|(row, slot)| do_row(row, slot));
    } else {
        for (row, slot) in out.iter_mut().enumerate() {
            do_row(row, slot);
        }
    }
    Ok(VarianceBatchOutput {
        values: values.to_vec(),
        rows,
    })
}

// --- Streaming ---

/// Online form of the kernel: push values one at a time, read the variance of
/// everything seen so far. The accumulators follow the identical
/// round-after-every-op discipline, so a stream fed a view's values in walk
/// order reproduces the batch kernel bit for bit.
#[derive(Debug, Clone)]
pub struct VarianceStream {
    correction: f64,
    count: usize,
    s: f64,
    s2: f64,
}

impl VarianceStream {
    pub fn try_new(correction: f64) -> Result<Self, VarianceError> {
        if correction.is_nan() || correction < 0.0 {
            return Err(VarianceError::InvalidCorrection { correction });
        }
        Ok(Self {
            correction,
            count: 0,
            s: 0.0,
            s2: 0.0,
        })
    }

    #[inline(always)]
    pub fn update(&mut self, value: f32) {
        let v = value as f64;
        self.s2 = to_float32(self.s2 + to_float32(v * v));
        self.s = to_float32(self.s + v);
        self.count += 1;
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Running sum; always an f32-representable value in f64 storage.
    #[inline]
    pub fn sum(&self) -> f64 {
        self.s
    }

    /// Running sum of squares; always an f32-representable value in f64
    /// storage.
    #[inline]
    pub fn sum_sq(&self) -> f64 {
        self.s2
    }

    pub fn variance(&self) -> f32 {
        let n = self.count;
        let nc = n as f64 - self.correction;
        if n == 0 || nc <= 0.0 {
            return f32::NAN;
        }
        if n == 1 {
            return 0.0;
        }
        let mean_term = to_float32(to_float32(self.s / n as f64) * self.s);
        to_float32(to_float32(self.s2 - mean_term) / nc) as f32
    }
}
