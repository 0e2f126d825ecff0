use lm_tensor::{ComputeBackend, Shape, Tensor};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::cache::{CacheConfig, CacheState, NeuralCache};
use crate::config::ModelConfig;
use crate::error::{ModelError, Result};
use crate::nn::init::uniform;
use crate::nn::{Dropout, Embedding, Linear, SharedWeight};
use crate::rnn::{HiddenState, RecurrentStack};

/// Half-width of the uniform range for embedding and decoder weights.
const INIT_RANGE: f32 = 0.1;

/// Encoder, recurrent stack and decoder of a word-level language model.
///
/// Forward passes take `&self`; per-session state (carried hidden state and
/// the neural cache) is passed in by the caller.
#[derive(Debug)]
pub struct RnnModel {
    config: ModelConfig,
    encoder: Embedding,
    rnn: RecurrentStack,
    decoder: Linear,
    drop: Dropout,
    training: bool,
    /// Dropout mask source, only drawn from in training mode.
    rng: Mutex<StdRng>,
}

impl RnnModel {
    /// Build and initialize a model.
    ///
    /// The configuration is validated before any weight is allocated. With
    /// `tie_weights` the decoder reuses the embedding storage.
    pub fn new(config: ModelConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let embedding = SharedWeight::new(Tensor::new(
            uniform(&mut rng, config.vocab_size * config.embed_dim, INIT_RANGE),
            Shape::new(vec![config.vocab_size, config.embed_dim]),
        ));
        let rnn = RecurrentStack::new(
            config.rnn_type,
            config.embed_dim,
            config.hidden_dim,
            config.num_layers,
            config.dropout,
            &mut rng,
        )?;
        let decoder_weight = if config.tie_weights {
            embedding.clone()
        } else {
            SharedWeight::new(Tensor::new(
                uniform(&mut rng, config.vocab_size * config.hidden_dim, INIT_RANGE),
                Shape::new(vec![config.vocab_size, config.hidden_dim]),
            ))
        };

        let encoder = Embedding::new(embedding)?;
        let decoder = Linear::new(decoder_weight, vec![0.0; config.vocab_size])?;

        debug!(
            rnn_type = %config.rnn_type,
            vocab_size = config.vocab_size,
            hidden_dim = config.hidden_dim,
            num_layers = config.num_layers,
            tie_weights = config.tie_weights,
            "model initialized"
        );

        Ok(RnnModel {
            drop: Dropout::new(config.dropout),
            config,
            encoder,
            rnn,
            decoder,
            training: false,
            rng: Mutex::new(rng),
        })
    }

    /// Positional constructor mirroring the classic model signature.
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        rnn_type: &str,
        vocab_size: usize,
        embed_dim: usize,
        hidden_dim: usize,
        num_layers: usize,
        dropout: f32,
        tie_weights: bool,
    ) -> Result<Self> {
        let config = ModelConfig::new(rnn_type, vocab_size, embed_dim, hidden_dim, num_layers)?
            .with_dropout(dropout)
            .with_tied_weights(tie_weights);
        RnnModel::new(config)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn encoder(&self) -> &Embedding {
        &self.encoder
    }

    pub fn decoder(&self) -> &Linear {
        &self.decoder
    }

    pub fn rnn(&self) -> &RecurrentStack {
        &self.rnn
    }

    pub fn vocab_size(&self) -> usize {
        self.config.vocab_size
    }

    /// Enable or disable dropout. Models start in evaluation mode.
    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Zero carried state for `batch_size` sequences.
    pub fn init_hidden(&self, batch_size: usize) -> HiddenState {
        self.rnn.init_hidden(batch_size)
    }

    /// Allocate a fresh neural cache sized for this model.
    pub fn init_cache(&self, config: CacheConfig) -> Result<CacheState> {
        let cache = NeuralCache::new(
            config,
            self.config.hidden_dim,
            self.config.num_layers,
            self.config.vocab_size,
        )?;
        Ok(CacheState::Enabled(cache))
    }

    /// Run a [seq_len][batch] block of tokens.
    ///
    /// Returns logits of shape [seq_len, batch, vocab_size] and the carried
    /// state after the last step. With a disabled cache this is one batched
    /// pass; with an enabled cache every timestep is processed in order and
    /// decoded exactly once, blended with the cache vote whenever earlier
    /// entries exist.
    ///
    /// All inputs are validated before any cache entry is written.
    pub fn forward(
        &self,
        tokens: &[Vec<u32>],
        hidden: &HiddenState,
        cache: &mut CacheState,
        backend: &dyn ComputeBackend,
    ) -> Result<(Tensor, HiddenState)> {
        let batch = self.validate_input(tokens, hidden)?;
        match cache {
            CacheState::Disabled => self.forward_batched(tokens, batch, hidden, backend),
            CacheState::Enabled(cache) => {
                if cache.batch_size() != batch {
                    return Err(ModelError::ShapeMismatch {
                        what: "cache batch",
                        expected: cache.batch_size(),
                        got: batch,
                    });
                }
                self.forward_cached(tokens, batch, hidden, cache, backend)
            }
        }
    }

    /// Check the token block is rectangular and in range, and that the
    /// carried state fits it. Returns the batch size.
    fn validate_input(&self, tokens: &[Vec<u32>], hidden: &HiddenState) -> Result<usize> {
        let first = tokens
            .first()
            .ok_or_else(|| ModelError::Other("no tokens to process".to_string()))?;
        let batch = first.len();
        if batch == 0 {
            return Err(ModelError::Other("empty batch".to_string()));
        }
        for row in tokens {
            if row.len() != batch {
                return Err(ModelError::ShapeMismatch {
                    what: "token batch",
                    expected: batch,
                    got: row.len(),
                });
            }
            if let Some(&token) = row.iter().find(|&&t| t as usize >= self.config.vocab_size) {
                return Err(ModelError::TokenOutOfRange {
                    token,
                    vocab_size: self.config.vocab_size,
                });
            }
        }
        hidden.validate(
            self.config.rnn_type,
            self.config.num_layers,
            batch,
            self.config.hidden_dim,
        )?;
        Ok(batch)
    }

    fn forward_batched(
        &self,
        tokens: &[Vec<u32>],
        batch: usize,
        hidden: &HiddenState,
        backend: &dyn ComputeBackend,
    ) -> Result<(Tensor, HiddenState)> {
        let seq_len = tokens.len();
        let embed_dim = self.config.embed_dim;
        let hidden_dim = self.config.hidden_dim;

        // The dropout RNG is only locked in training mode.
        let mut guard = self.training.then(|| self.rng.lock());
        let mut rng = guard.as_deref_mut();

        let mut emb = Tensor::zeros(Shape::new(vec![seq_len, batch, embed_dim]));
        for (t, row) in tokens.iter().enumerate() {
            emb.slice_at_mut(&[t])?.copy_from_slice(&self.encoder.encode(row)?);
        }
        if let Some(rng) = rng.as_deref_mut() {
            self.drop.apply(emb.data_f32_mut(), rng);
        }

        let (mut output, hidden) = self.rnn.forward(&emb, hidden, rng.as_deref_mut(), backend)?;
        if let Some(rng) = rng.as_deref_mut() {
            self.drop.apply(output.data_f32_mut(), rng);
        }

        let rows = output.reshape(Shape::new(vec![seq_len * batch, hidden_dim]))?;
        let decoded = self.decoder.forward_rows(&rows, backend)?;
        let logits = decoded.reshape(Shape::new(vec![seq_len, batch, self.config.vocab_size]))?;
        Ok((logits, hidden))
    }

    fn forward_cached(
        &self,
        tokens: &[Vec<u32>],
        batch: usize,
        hidden: &HiddenState,
        cache: &mut NeuralCache,
        backend: &dyn ComputeBackend,
    ) -> Result<(Tensor, HiddenState)> {
        let seq_len = tokens.len();
        let vocab_size = self.config.vocab_size;
        let hidden_dim = self.config.hidden_dim;

        // The dropout RNG is only locked in training mode.
        let mut guard = self.training.then(|| self.rng.lock());
        let mut rng = guard.as_deref_mut();

        let mut logits = Tensor::zeros(Shape::new(vec![seq_len, batch, vocab_size]));
        let mut state = hidden.clone();
        let mut evictions = 0usize;

        for (t, row) in tokens.iter().enumerate() {
            let mut emb_t = self.encoder.encode(row)?;
            if let Some(rng) = rng.as_deref_mut() {
                self.drop.apply(&mut emb_t, rng);
            }

            let (mut output_t, next) = self.rnn.step(&emb_t, &state, rng.as_deref_mut(), backend)?;
            state = next;
            let key = cache.extract_key(&state)?;

            if let Some(rng) = rng.as_deref_mut() {
                self.drop.apply(&mut output_t, rng);
            }
            let mut decoded = Vec::with_capacity(batch * vocab_size);
            for out_b in output_t.chunks(hidden_dim) {
                decoded.extend(self.decoder.forward(out_b, backend)?);
            }

            let step = cache.advance(&key, row, decoded, backend)?;
            if step.evicted {
                evictions += 1;
            }
            logits.slice_at_mut(&[t])?.copy_from_slice(&step.logits);

            if step.blended && cache.config().halt_after_first_blend {
                debug!(step = t, pointer = cache.pointer(), "halting after first blended step");
                return Err(ModelError::DebugHalt { step: t });
            }
        }

        debug!(
            seq_len,
            batch,
            pointer = cache.pointer(),
            evictions,
            "cached forward complete"
        );
        Ok((logits, state))
    }
}
