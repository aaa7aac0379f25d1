pub mod float32;
pub mod strided;
