use lm_tensor::{Shape, Tensor};

use crate::error::{ModelError, Result};
use crate::rnn::RnnKind;

/// State carried between recurrent steps.
///
/// Every component has shape [num_layers, batch, hidden_dim]. The LSTM
/// carries its cell state next to the output state.
#[derive(Debug, Clone, PartialEq)]
pub enum HiddenState {
    /// GRU and plain RNN cells.
    Single(Tensor),
    /// LSTM output state `h` and cell state `c`.
    Lstm { h: Tensor, c: Tensor },
}

impl HiddenState {
    /// Zero-initialized state for the given cell kind.
    pub fn zeros(kind: RnnKind, num_layers: usize, batch_size: usize, hidden_dim: usize) -> Self {
        let shape = Shape::new(vec![num_layers, batch_size, hidden_dim]);
        match kind {
            RnnKind::Lstm => HiddenState::Lstm {
                h: Tensor::zeros(shape.clone()),
                c: Tensor::zeros(shape),
            },
            RnnKind::Gru | RnnKind::RnnTanh | RnnKind::RnnRelu => {
                HiddenState::Single(Tensor::zeros(shape))
            }
        }
    }

    /// The output state, from which cache features are taken.
    pub fn output(&self) -> &Tensor {
        match self {
            HiddenState::Single(h) => h,
            HiddenState::Lstm { h, .. } => h,
        }
    }

    /// The LSTM cell state, if any.
    pub fn cell(&self) -> Option<&Tensor> {
        match self {
            HiddenState::Single(_) => None,
            HiddenState::Lstm { c, .. } => Some(c),
        }
    }

    pub fn num_layers(&self) -> usize {
        self.output().shape().dim(0)
    }

    pub fn batch_size(&self) -> usize {
        self.output().shape().dim(1)
    }

    pub fn hidden_dim(&self) -> usize {
        self.output().shape().dim(2)
    }

    /// Check that every component is [num_layers, batch, hidden_dim] shaped.
    ///
    /// The dimension accessors above assume this holds.
    pub fn check_rank(&self) -> Result<()> {
        let components = std::iter::once(self.output()).chain(self.cell());
        for component in components {
            let rank = component.shape().ndim();
            if rank != 3 {
                return Err(ModelError::ShapeMismatch {
                    what: "hidden state rank",
                    expected: 3,
                    got: rank,
                });
            }
        }
        Ok(())
    }

    /// Check that this state fits a stack of the given kind and size.
    pub fn validate(
        &self,
        kind: RnnKind,
        num_layers: usize,
        batch_size: usize,
        hidden_dim: usize,
    ) -> Result<()> {
        let is_lstm = matches!(self, HiddenState::Lstm { .. });
        if is_lstm != (kind == RnnKind::Lstm) {
            return Err(ModelError::Other(format!(
                "hidden state layout does not match {} cell",
                kind
            )));
        }
        self.check_rank()?;
        let expected = [num_layers, batch_size, hidden_dim];
        let whats = ["hidden state layers", "hidden state batch", "hidden state width"];
        let components = std::iter::once(self.output()).chain(self.cell());
        for component in components {
            let dims = component.shape().dims();
            for ((&want, &got), what) in expected.iter().zip(dims).zip(whats) {
                if want != got {
                    return Err(ModelError::ShapeMismatch {
                        what,
                        expected: want,
                        got,
                    });
                }
            }
        }
        Ok(())
    }
}
