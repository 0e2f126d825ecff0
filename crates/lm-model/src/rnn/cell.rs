use lm_tensor::ComputeBackend;
use rand::rngs::StdRng;

use crate::error::{ModelError, Result};
use crate::nn::init::uniform;
use crate::rnn::RnnKind;

/// Weights of one recurrent layer in stacked-gate layout.
///
/// Gate blocks are stacked along the output axis: LSTM (i, f, g, o),
/// GRU (r, z, n), plain RNN a single block.
#[derive(Debug, Clone)]
pub struct RecurrentLayer {
    kind: RnnKind,
    input_dim: usize,
    hidden_dim: usize,
    /// Input-to-hidden weights, shape [gates * hidden_dim, input_dim].
    pub w_ih: Vec<f32>,
    /// Hidden-to-hidden weights, shape [gates * hidden_dim, hidden_dim].
    pub w_hh: Vec<f32>,
    /// Input-to-hidden bias, length gates * hidden_dim.
    pub b_ih: Vec<f32>,
    /// Hidden-to-hidden bias, length gates * hidden_dim.
    pub b_hh: Vec<f32>,
}

/// Output of a single layer step for one batch element.
pub(crate) struct LayerStep {
    pub h: Vec<f32>,
    pub c: Option<Vec<f32>>,
}

impl RecurrentLayer {
    /// Initialize all weights uniformly in `[-1/sqrt(hidden_dim), 1/sqrt(hidden_dim)]`.
    pub fn new(kind: RnnKind, input_dim: usize, hidden_dim: usize, rng: &mut StdRng) -> Self {
        let rows = kind.gate_count() * hidden_dim;
        let bound = 1.0 / (hidden_dim as f32).sqrt();
        RecurrentLayer {
            kind,
            input_dim,
            hidden_dim,
            w_ih: uniform(rng, rows * input_dim, bound),
            w_hh: uniform(rng, rows * hidden_dim, bound),
            b_ih: uniform(rng, rows, bound),
            b_hh: uniform(rng, rows, bound),
        }
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Advance one batch element by one timestep.
    ///
    /// `c` must be present exactly when the cell is an LSTM.
    pub(crate) fn step(
        &self,
        x: &[f32],
        h: &[f32],
        c: Option<&[f32]>,
        backend: &dyn ComputeBackend,
    ) -> Result<LayerStep> {
        let hd = self.hidden_dim;
        let rows = self.kind.gate_count() * hd;

        let mut gi = backend.matmul(&self.w_ih, x, rows, self.input_dim, 1)?;
        for (g, b) in gi.iter_mut().zip(&self.b_ih) {
            *g += b;
        }
        let mut gh = backend.matmul(&self.w_hh, h, rows, hd, 1)?;
        for (g, b) in gh.iter_mut().zip(&self.b_hh) {
            *g += b;
        }

        match self.kind {
            RnnKind::RnnTanh => {
                let pre = backend.add(&gi, &gh)?;
                Ok(LayerStep {
                    h: backend.tanh(&pre)?,
                    c: None,
                })
            }
            RnnKind::RnnRelu => {
                let pre = backend.add(&gi, &gh)?;
                Ok(LayerStep {
                    h: backend.relu(&pre)?,
                    c: None,
                })
            }
            RnnKind::Lstm => {
                let c = c.ok_or_else(|| {
                    ModelError::Other("LSTM step requires a cell state".to_string())
                })?;
                let gates = backend.add(&gi, &gh)?;
                let i = backend.sigmoid(&gates[0..hd])?;
                let f = backend.sigmoid(&gates[hd..2 * hd])?;
                let g = backend.tanh(&gates[2 * hd..3 * hd])?;
                let o = backend.sigmoid(&gates[3 * hd..4 * hd])?;

                // c' = f * c + i * g
                let c_next = backend.add(&backend.mul(&f, c)?, &backend.mul(&i, &g)?)?;
                // h' = o * tanh(c')
                let h_next = backend.mul(&o, &backend.tanh(&c_next)?)?;
                Ok(LayerStep {
                    h: h_next,
                    c: Some(c_next),
                })
            }
            RnnKind::Gru => {
                let r = backend.sigmoid(&backend.add(&gi[0..hd], &gh[0..hd])?)?;
                let z = backend.sigmoid(&backend.add(&gi[hd..2 * hd], &gh[hd..2 * hd])?)?;
                // n = tanh(W_in x + b_in + r * (W_hn h + b_hn))
                let n_pre = backend.add(&gi[2 * hd..3 * hd], &backend.mul(&r, &gh[2 * hd..3 * hd])?)?;
                let n = backend.tanh(&n_pre)?;
                // h' = (1 - z) * n + z * h
                let h_next = (0..hd)
                    .map(|j| (1.0 - z[j]) * n[j] + z[j] * h[j])
                    .collect();
                Ok(LayerStep { h: h_next, c: None })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lm_tensor::CpuBackend;
    use rand::SeedableRng;

    fn zeroed(kind: RnnKind, input_dim: usize, hidden_dim: usize) -> RecurrentLayer {
        let mut layer = RecurrentLayer::new(kind, input_dim, hidden_dim, &mut StdRng::seed_from_u64(0));
        layer.w_ih.fill(0.0);
        layer.w_hh.fill(0.0);
        layer.b_ih.fill(0.0);
        layer.b_hh.fill(0.0);
        layer
    }

    #[test]
    fn test_weight_shapes() {
        let layer = RecurrentLayer::new(RnnKind::Lstm, 3, 5, &mut StdRng::seed_from_u64(1));
        assert_eq!(layer.w_ih.len(), 4 * 5 * 3);
        assert_eq!(layer.w_hh.len(), 4 * 5 * 5);
        assert_eq!(layer.b_ih.len(), 20);
        let bound = 1.0 / 5f32.sqrt();
        assert!(layer.w_hh.iter().all(|w| w.abs() <= bound));
    }

    #[test]
    fn test_rnn_tanh_step() {
        let backend = CpuBackend::new();
        let mut layer = zeroed(RnnKind::RnnTanh, 1, 1);
        layer.w_ih[0] = 1.0;
        layer.w_hh[0] = 0.5;
        let out = layer.step(&[1.0], &[2.0], None, &backend).unwrap();
        assert_relative_eq!(out.h[0], 2.0f32.tanh());
    }

    #[test]
    fn test_rnn_relu_clamps_negative() {
        let backend = CpuBackend::new();
        let mut layer = zeroed(RnnKind::RnnRelu, 1, 1);
        layer.w_ih[0] = -1.0;
        let out = layer.step(&[3.0], &[0.0], None, &backend).unwrap();
        assert_eq!(out.h[0], 0.0);
    }

    #[test]
    fn test_lstm_zero_weights() {
        // All gates at sigmoid(0) = 0.5, candidate tanh(0) = 0:
        // c' = 0.5 * c, h' = 0.5 * tanh(c').
        let backend = CpuBackend::new();
        let layer = zeroed(RnnKind::Lstm, 2, 2);
        let out = layer
            .step(&[1.0, 1.0], &[0.0, 0.0], Some(&[2.0, -2.0]), &backend)
            .unwrap();
        let c = out.c.unwrap();
        assert_relative_eq!(c[0], 1.0);
        assert_relative_eq!(c[1], -1.0);
        assert_relative_eq!(out.h[0], 0.5 * 1.0f32.tanh());
    }

    #[test]
    fn test_lstm_requires_cell_state() {
        let backend = CpuBackend::new();
        let layer = zeroed(RnnKind::Lstm, 1, 1);
        assert!(layer.step(&[1.0], &[0.0], None, &backend).is_err());
    }

    #[test]
    fn test_gru_zero_weights_interpolates() {
        // z = 0.5, n = tanh(0) = 0, so h' = 0.5 * h.
        let backend = CpuBackend::new();
        let layer = zeroed(RnnKind::Gru, 1, 2);
        let out = layer.step(&[4.0], &[1.0, -0.5], None, &backend).unwrap();
        assert_relative_eq!(out.h[0], 0.5);
        assert_relative_eq!(out.h[1], -0.25);
    }
}
