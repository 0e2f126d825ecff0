use lm_tensor::{ComputeBackend, Tensor};

use crate::error::{ModelError, Result};
use crate::nn::SharedWeight;

/// Affine projection `y = W x + b` with W stored as [out_dim, in_dim].
///
/// As the vocabulary decoder, row `i` of W is the output embedding of
/// token `i`; with tied weights it is the same storage as the lookup row.
#[derive(Debug)]
pub struct Linear {
    weight: SharedWeight,
    bias: Vec<f32>,
    in_dim: usize,
    out_dim: usize,
}

impl Linear {
    pub fn new(weight: SharedWeight, bias: Vec<f32>) -> Result<Self> {
        let (out_dim, in_dim) = {
            let w = weight.read();
            if w.shape().ndim() != 2 {
                return Err(ModelError::Other(format!(
                    "linear weight must be 2D, got shape {}",
                    w.shape()
                )));
            }
            (w.shape().dim(0), w.shape().dim(1))
        };
        if bias.len() != out_dim {
            return Err(ModelError::ShapeMismatch {
                what: "linear bias",
                expected: out_dim,
                got: bias.len(),
            });
        }
        Ok(Linear {
            weight,
            bias,
            in_dim,
            out_dim,
        })
    }

    pub fn weight(&self) -> &SharedWeight {
        &self.weight
    }

    pub fn bias(&self) -> &[f32] {
        &self.bias
    }

    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    /// Project a single vector of length `in_dim`.
    pub fn forward(&self, x: &[f32], backend: &dyn ComputeBackend) -> Result<Vec<f32>> {
        if x.len() != self.in_dim {
            return Err(ModelError::ShapeMismatch {
                what: "linear input",
                expected: self.in_dim,
                got: x.len(),
            });
        }
        let projected = {
            let w = self.weight.read();
            backend.matmul(w.data_f32(), x, self.out_dim, self.in_dim, 1)?
        };
        Ok(backend.add(&projected, &self.bias)?)
    }

    /// Project every row of a [n, in_dim] tensor, producing [n, out_dim].
    pub fn forward_rows(&self, x: &Tensor, backend: &dyn ComputeBackend) -> Result<Tensor> {
        let w_t = self.weight.read().transpose()?;
        let mut y = x.matmul(&w_t, backend)?;
        for row in y.data_f32_mut().chunks_mut(self.out_dim) {
            for (v, b) in row.iter_mut().zip(&self.bias) {
                *v += b;
            }
        }
        Ok(y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lm_tensor::{CpuBackend, Shape};

    fn layer() -> Linear {
        // W = [[1, 2], [0, 1], [-1, 0]], b = [0.5, 0, 0]
        let w = Tensor::new(vec![1.0, 2.0, 0.0, 1.0, -1.0, 0.0], Shape::new(vec![3, 2]));
        Linear::new(SharedWeight::new(w), vec![0.5, 0.0, 0.0]).unwrap()
    }

    #[test]
    fn test_forward_vector() {
        let backend = CpuBackend::new();
        let y = layer().forward(&[1.0, 1.0], &backend).unwrap();
        assert_eq!(y, vec![3.5, 1.0, -1.0]);
    }

    #[test]
    fn test_forward_rows_matches_vector_path() {
        let backend = CpuBackend::new();
        let lin = layer();
        let x = Tensor::new(vec![1.0, 1.0, 2.0, -1.0], Shape::new(vec![2, 2]));
        let y = lin.forward_rows(&x, &backend).unwrap();
        assert_eq!(y.shape().dims(), &[2, 3]);
        assert_eq!(&y.data_f32()[..3], lin.forward(&[1.0, 1.0], &backend).unwrap().as_slice());
        assert_eq!(&y.data_f32()[3..], lin.forward(&[2.0, -1.0], &backend).unwrap().as_slice());
    }

    #[test]
    fn test_input_length_checked() {
        let backend = CpuBackend::new();
        assert!(matches!(
            layer().forward(&[1.0], &backend),
            Err(ModelError::ShapeMismatch { expected: 2, got: 1, .. })
        ));
    }

    #[test]
    fn test_bias_length_checked() {
        let w = SharedWeight::new(Tensor::zeros(Shape::new(vec![3, 2])));
        assert!(Linear::new(w, vec![0.0; 2]).is_err());
    }
}
