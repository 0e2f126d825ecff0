//! `lm-tensor` - Dense tensors with pluggable compute backends for the
//! recurrent language model.
//!
//! This crate provides:
//! - A `Tensor` type backed by contiguous CPU storage
//! - A `ComputeBackend` trait for pluggable compute
//! - A reference `CpuBackend` implementation
//! - Shape utilities and row-major indexing

pub mod backend;
pub mod cpu;
pub mod error;
pub mod shape;
mod storage;
pub mod tensor;

// Re-export primary types at the crate root for convenience.
pub use backend::ComputeBackend;
pub use cpu::CpuBackend;
pub use error::{Result, TensorError};
pub use shape::Shape;
pub use tensor::Tensor;
