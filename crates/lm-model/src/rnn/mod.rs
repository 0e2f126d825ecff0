//! Stacked recurrent cells (LSTM, GRU, plain RNN with tanh or relu).

pub mod cell;
pub mod hidden;

pub use cell::RecurrentLayer;
pub use hidden::HiddenState;

use std::fmt;
use std::str::FromStr;

use lm_tensor::{ComputeBackend, Shape, Tensor};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::nn::Dropout;

/// Supported recurrent cell kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RnnKind {
    Lstm,
    Gru,
    RnnTanh,
    RnnRelu,
}

impl RnnKind {
    /// Accepted spellings, in the order they are reported in errors.
    pub const VALID: [&'static str; 4] = ["LSTM", "GRU", "RNN_TANH", "RNN_RELU"];

    pub fn as_str(&self) -> &'static str {
        match self {
            RnnKind::Lstm => "LSTM",
            RnnKind::Gru => "GRU",
            RnnKind::RnnTanh => "RNN_TANH",
            RnnKind::RnnRelu => "RNN_RELU",
        }
    }

    /// Number of stacked gate blocks in the weight matrices.
    pub fn gate_count(&self) -> usize {
        match self {
            RnnKind::Lstm => 4,
            RnnKind::Gru => 3,
            RnnKind::RnnTanh | RnnKind::RnnRelu => 1,
        }
    }
}

impl FromStr for RnnKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "LSTM" => Ok(RnnKind::Lstm),
            "GRU" => Ok(RnnKind::Gru),
            "RNN_TANH" => Ok(RnnKind::RnnTanh),
            "RNN_RELU" => Ok(RnnKind::RnnRelu),
            other => Err(ModelError::InvalidConfiguration(format!(
                "invalid rnn_type {:?}, options are [{}]",
                other,
                RnnKind::VALID.join(", ")
            ))),
        }
    }
}

impl TryFrom<String> for RnnKind {
    type Error = ModelError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<RnnKind> for String {
    fn from(kind: RnnKind) -> String {
        kind.as_str().to_string()
    }
}

impl fmt::Display for RnnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stack of recurrent layers consuming one or many timesteps.
#[derive(Debug)]
pub struct RecurrentStack {
    kind: RnnKind,
    layers: Vec<RecurrentLayer>,
    input_dim: usize,
    hidden_dim: usize,
    dropout: Dropout,
}

impl RecurrentStack {
    /// Build `num_layers` layers; the first reads `input_dim` features, the
    /// rest read the previous layer's `hidden_dim` output.
    pub fn new(
        kind: RnnKind,
        input_dim: usize,
        hidden_dim: usize,
        num_layers: usize,
        dropout: f32,
        rng: &mut StdRng,
    ) -> Result<Self> {
        if num_layers == 0 {
            return Err(ModelError::InvalidConfiguration(
                "recurrent stack needs at least one layer".to_string(),
            ));
        }
        let layers = (0..num_layers)
            .map(|l| {
                let in_dim = if l == 0 { input_dim } else { hidden_dim };
                RecurrentLayer::new(kind, in_dim, hidden_dim, rng)
            })
            .collect();
        Ok(RecurrentStack {
            kind,
            layers,
            input_dim,
            hidden_dim,
            dropout: Dropout::new(dropout),
        })
    }

    pub fn kind(&self) -> RnnKind {
        self.kind
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    pub fn layers(&self) -> &[RecurrentLayer] {
        &self.layers
    }

    /// Zero-initialized carried state for `batch_size` sequences.
    pub fn init_hidden(&self, batch_size: usize) -> HiddenState {
        HiddenState::zeros(self.kind, self.layers.len(), batch_size, self.hidden_dim)
    }

    /// Advance the whole stack by one timestep.
    ///
    /// - `x`: [batch, input_dim] input features
    /// - `hidden`: carried state from the previous step
    /// - `rng`: dropout source between layers; `None` disables dropout
    ///
    /// Returns the top layer output [batch, hidden_dim] and the new state.
    pub fn step(
        &self,
        x: &[f32],
        hidden: &HiddenState,
        mut rng: Option<&mut StdRng>,
        backend: &dyn ComputeBackend,
    ) -> Result<(Vec<f32>, HiddenState)> {
        hidden.check_rank()?;
        let batch = hidden.batch_size();
        if x.len() != batch * self.input_dim {
            return Err(ModelError::ShapeMismatch {
                what: "recurrent input",
                expected: batch * self.input_dim,
                got: x.len(),
            });
        }
        hidden.validate(self.kind, self.layers.len(), batch, self.hidden_dim)?;

        let mut next = hidden.clone();
        let mut layer_input = x.to_vec();
        let last = self.layers.len() - 1;

        for (l, layer) in self.layers.iter().enumerate() {
            let in_dim = layer.input_dim();
            let mut layer_output = vec![0.0f32; batch * self.hidden_dim];

            for b in 0..batch {
                let x_b = &layer_input[b * in_dim..(b + 1) * in_dim];
                let h_b = hidden.output().slice_at(&[l, b])?;
                let c_b = match hidden.cell() {
                    Some(c) => Some(c.slice_at(&[l, b])?),
                    None => None,
                };
                let out = layer.step(x_b, h_b, c_b, backend)?;

                match &mut next {
                    HiddenState::Single(h) => {
                        h.slice_at_mut(&[l, b])?.copy_from_slice(&out.h);
                    }
                    HiddenState::Lstm { h, c } => {
                        h.slice_at_mut(&[l, b])?.copy_from_slice(&out.h);
                        if let Some(c_next) = &out.c {
                            c.slice_at_mut(&[l, b])?.copy_from_slice(c_next);
                        }
                    }
                }
                layer_output[b * self.hidden_dim..(b + 1) * self.hidden_dim]
                    .copy_from_slice(&out.h);
            }

            if l < last {
                if let Some(rng) = rng.as_deref_mut() {
                    self.dropout.apply(&mut layer_output, rng);
                }
            }
            layer_input = layer_output;
        }

        Ok((layer_input, next))
    }

    /// Run a full sequence.
    ///
    /// `input` has shape [seq_len, batch, input_dim]; the result has shape
    /// [seq_len, batch, hidden_dim] plus the final carried state.
    pub fn forward(
        &self,
        input: &Tensor,
        hidden: &HiddenState,
        mut rng: Option<&mut StdRng>,
        backend: &dyn ComputeBackend,
    ) -> Result<(Tensor, HiddenState)> {
        let dims = input.shape().dims();
        if dims.len() != 3 {
            return Err(ModelError::Other(format!(
                "recurrent input must be [seq_len, batch, features], got shape {}",
                input.shape()
            )));
        }
        let (seq_len, batch) = (dims[0], dims[1]);

        let mut output = Tensor::zeros(Shape::new(vec![seq_len, batch, self.hidden_dim]));
        let mut state = hidden.clone();
        for t in 0..seq_len {
            let x_t = input.slice_at(&[t])?;
            let (out_t, next) = self.step(x_t, &state, rng.as_deref_mut(), backend)?;
            output.slice_at_mut(&[t])?.copy_from_slice(&out_t);
            state = next;
        }
        Ok((output, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lm_tensor::CpuBackend;
    use rand::SeedableRng;

    fn stack(kind: RnnKind, layers: usize) -> RecurrentStack {
        RecurrentStack::new(kind, 3, 4, layers, 0.0, &mut StdRng::seed_from_u64(42)).unwrap()
    }

    #[test]
    fn test_parse_kinds() {
        for name in RnnKind::VALID {
            let kind: RnnKind = name.parse().unwrap();
            assert_eq!(kind.as_str(), name);
        }
        assert!(matches!(
            "lstm".parse::<RnnKind>(),
            Err(ModelError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_forward_shapes() {
        let backend = CpuBackend::new();
        for kind in [RnnKind::Lstm, RnnKind::Gru, RnnKind::RnnTanh, RnnKind::RnnRelu] {
            let s = stack(kind, 2);
            let input = Tensor::new(
                (0..5 * 2 * 3).map(|v| v as f32 * 0.01).collect(),
                Shape::new(vec![5, 2, 3]),
            );
            let (out, hidden) = s.forward(&input, &s.init_hidden(2), None, &backend).unwrap();
            assert_eq!(out.shape().dims(), &[5, 2, 4]);
            assert_eq!(hidden.output().shape().dims(), &[2, 2, 4]);
            assert_eq!(hidden.cell().is_some(), kind == RnnKind::Lstm);
        }
    }

    #[test]
    fn test_sequence_matches_repeated_steps() {
        let backend = CpuBackend::new();
        let s = stack(RnnKind::Lstm, 2);
        let input = Tensor::new(
            (0..9).map(|v| (v as f32).sin()).collect(),
            Shape::new(vec![3, 1, 3]),
        );
        let (out, final_state) = s.forward(&input, &s.init_hidden(1), None, &backend).unwrap();

        let mut state = s.init_hidden(1);
        for t in 0..3 {
            let (out_t, next) = s
                .step(input.slice_at(&[t]).unwrap(), &state, None, &backend)
                .unwrap();
            assert_eq!(out.slice_at(&[t]).unwrap(), out_t.as_slice());
            state = next;
        }
        assert_eq!(state, final_state);
    }

    #[test]
    fn test_top_output_equals_top_layer_state() {
        let backend = CpuBackend::new();
        let s = stack(RnnKind::Gru, 3);
        let (out, next) = s
            .step(&[0.1, 0.2, 0.3], &s.init_hidden(1), None, &backend)
            .unwrap();
        assert_eq!(next.output().slice_at(&[2, 0]).unwrap(), out.as_slice());
    }

    #[test]
    fn test_batch_mismatch_rejected() {
        let backend = CpuBackend::new();
        let s = stack(RnnKind::RnnTanh, 1);
        let err = s.step(&[0.0; 6], &s.init_hidden(1), None, &backend);
        assert!(matches!(err, Err(ModelError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_zero_layers_rejected() {
        let err = RecurrentStack::new(RnnKind::Gru, 3, 4, 0, 0.0, &mut StdRng::seed_from_u64(1));
        assert!(matches!(err, Err(ModelError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_step_rejects_non_3d_state() {
        let backend = CpuBackend::new();
        let s = stack(RnnKind::Lstm, 1);
        let bad = HiddenState::Lstm {
            h: Tensor::zeros(Shape::new(vec![4])),
            c: Tensor::zeros(Shape::new(vec![4])),
        };
        assert!(matches!(
            s.step(&[0.0; 3], &bad, None, &backend),
            Err(ModelError::ShapeMismatch { what: "hidden state rank", .. })
        ));
    }
}
