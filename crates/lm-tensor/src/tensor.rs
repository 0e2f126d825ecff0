use crate::backend::ComputeBackend;
use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::storage::CpuStorage;

/// A tensor backed by CPU storage.
///
/// Holds contiguous, row-major f32 data with an associated shape.
/// Operations that require computation are dispatched to a `ComputeBackend`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    storage: CpuStorage,
    shape: Shape,
}

impl Tensor {
    /// Create a new tensor from f32 data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn new(data: Vec<f32>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "data length {} does not match shape {:?} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        Tensor {
            storage: CpuStorage::from_f32_vec(data),
            shape,
        }
    }

    /// Create a zero-filled tensor with the given shape.
    pub fn zeros(shape: Shape) -> Self {
        Tensor {
            storage: CpuStorage::zeros(shape.numel()),
            shape,
        }
    }

    /// Returns a reference to the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the underlying data as an f32 slice.
    pub fn data_f32(&self) -> &[f32] {
        self.storage.as_f32_slice()
    }

    /// Returns the underlying data as a mutable f32 slice.
    pub fn data_f32_mut(&mut self) -> &mut [f32] {
        self.storage.as_f32_slice_mut()
    }

    /// Reshape the tensor, returning a new tensor with the same data but
    /// a different shape.
    ///
    /// The total number of elements must remain the same.
    pub fn reshape(&self, new_shape: Shape) -> Result<Tensor> {
        if self.shape.numel() != new_shape.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.dims().to_vec(),
                got: new_shape.dims().to_vec(),
            });
        }
        Ok(Tensor {
            storage: self.storage.clone(),
            shape: new_shape,
        })
    }

    /// Borrow the contiguous block addressed by a leading index prefix.
    ///
    /// For a `[num_layers, batch, hidden]` tensor, `slice_at(&[l, b])` is the
    /// hidden vector of layer `l`, batch element `b`.
    pub fn slice_at(&self, prefix: &[usize]) -> Result<&[f32]> {
        let (offset, len) = self.shape.block_of(prefix)?;
        Ok(&self.data_f32()[offset..offset + len])
    }

    /// Mutable counterpart of [`Tensor::slice_at`].
    pub fn slice_at_mut(&mut self, prefix: &[usize]) -> Result<&mut [f32]> {
        let (offset, len) = self.shape.block_of(prefix)?;
        Ok(&mut self.data_f32_mut()[offset..offset + len])
    }

    /// Transpose of a 2D tensor: [m, n] becomes [n, m].
    pub fn transpose(&self) -> Result<Tensor> {
        if self.shape.ndim() != 2 {
            return Err(TensorError::Other(
                "transpose requires a 2D tensor".to_string(),
            ));
        }
        let m = self.shape.dim(0);
        let n = self.shape.dim(1);
        let src = self.data_f32();
        let mut out = vec![0.0f32; m * n];
        for i in 0..m {
            for j in 0..n {
                out[j * m + i] = src[i * n + j];
            }
        }
        Ok(Tensor::new(out, Shape::new(vec![n, m])))
    }

    /// Matrix multiplication of two 2D tensors using the given backend.
    ///
    /// self is [m, k], other is [k, n], result is [m, n].
    pub fn matmul(&self, other: &Tensor, backend: &dyn ComputeBackend) -> Result<Tensor> {
        if self.shape.ndim() != 2 || other.shape.ndim() != 2 {
            return Err(TensorError::Other(
                "matmul requires 2D tensors".to_string(),
            ));
        }

        let m = self.shape.dim(0);
        let k = self.shape.dim(1);
        let k2 = other.shape.dim(0);
        let n = other.shape.dim(1);

        if k != k2 {
            return Err(TensorError::MatmulMismatch { m, k, k2, n });
        }

        let result_data = backend.matmul(self.data_f32(), other.data_f32(), m, k, n)?;
        Ok(Tensor::new(result_data, Shape::new(vec![m, n])))
    }
}
