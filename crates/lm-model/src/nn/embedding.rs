use crate::error::{ModelError, Result};
use crate::nn::SharedWeight;

/// Token-to-vector lookup table, shape [vocab_size, dim].
#[derive(Debug)]
pub struct Embedding {
    weight: SharedWeight,
    vocab_size: usize,
    dim: usize,
}

impl Embedding {
    /// Wrap an existing weight of shape [vocab_size, dim].
    pub fn new(weight: SharedWeight) -> Result<Self> {
        let (vocab_size, dim) = {
            let w = weight.read();
            if w.shape().ndim() != 2 {
                return Err(ModelError::Other(format!(
                    "embedding weight must be 2D, got shape {}",
                    w.shape()
                )));
            }
            (w.shape().dim(0), w.shape().dim(1))
        };
        Ok(Embedding {
            weight,
            vocab_size,
            dim,
        })
    }

    pub fn weight(&self) -> &SharedWeight {
        &self.weight
    }

    pub fn num_embeddings(&self) -> usize {
        self.vocab_size
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Copy the row for `token` into `out`.
    pub fn lookup_into(&self, token: u32, out: &mut [f32]) -> Result<()> {
        let id = token as usize;
        if id >= self.vocab_size {
            return Err(ModelError::TokenOutOfRange {
                token,
                vocab_size: self.vocab_size,
            });
        }
        if out.len() != self.dim {
            return Err(ModelError::ShapeMismatch {
                what: "embedding output",
                expected: self.dim,
                got: out.len(),
            });
        }
        let w = self.weight.read();
        out.copy_from_slice(&w.data_f32()[id * self.dim..(id + 1) * self.dim]);
        Ok(())
    }

    /// Embed a row of tokens (one per batch element) into a [batch, dim] block.
    pub fn encode(&self, tokens: &[u32]) -> Result<Vec<f32>> {
        let mut out = vec![0.0f32; tokens.len() * self.dim];
        for (&token, row) in tokens.iter().zip(out.chunks_mut(self.dim)) {
            self.lookup_into(token, row)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lm_tensor::{Shape, Tensor};

    fn table() -> Embedding {
        let w = Tensor::new(
            vec![0.0, 0.1, 1.0, 1.1, 2.0, 2.1],
            Shape::new(vec![3, 2]),
        );
        Embedding::new(SharedWeight::new(w)).unwrap()
    }

    #[test]
    fn test_encode_rows() {
        let emb = table();
        assert_eq!(emb.num_embeddings(), 3);
        assert_eq!(emb.encode(&[2, 0]).unwrap(), vec![2.0, 2.1, 0.0, 0.1]);
    }

    #[test]
    fn test_token_out_of_range() {
        let emb = table();
        assert!(matches!(
            emb.encode(&[3]),
            Err(ModelError::TokenOutOfRange { token: 3, vocab_size: 3 })
        ));
    }

    #[test]
    fn test_rejects_non_matrix_weight() {
        let w = SharedWeight::new(Tensor::zeros(Shape::new(vec![4])));
        assert!(Embedding::new(w).is_err());
    }
}
