//! Single-precision statistics kernels over strided slices.
//!
//! Every kernel in this crate accumulates with the rounding behavior of a
//! native single-precision unit: each elementary arithmetic result is rounded
//! to the nearest representable `f32` before it feeds the next operation,
//! even though intermediates are carried in `f64` storage. Skipping any of
//! those roundings produces doubly-rounded results that diverge from
//! reference single-precision implementations, so the discipline is the
//! contract, not an implementation detail.

pub mod kernels;
pub mod utilities;

pub use kernels::variance_tk::{
    variance, variance_batch_par_slice, variance_batch_slice, variance_tk, variance_tk_at,
    VarianceBatchBuilder, VarianceBatchOutput, VarianceBuilder, VarianceError, VarianceInput,
    VarianceParams, VarianceStream,
};
