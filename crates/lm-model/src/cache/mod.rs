//! Neural cache: a bounded memory of recent hidden-state keys and the
//! tokens that followed them, blended into the decoder output at inference.

pub mod config;
pub mod kernel;
pub mod memory;

pub use config::{CacheConfig, CacheHiddenType, ValueAlignment};
pub use memory::{CacheMemory, CachePair, Insertion};

use lm_tensor::ComputeBackend;
use tracing::{debug, info};

use crate::error::{ModelError, Result};
use crate::rnn::HiddenState;

/// Outcome of advancing the cache by one timestep.
#[derive(Debug, Clone)]
pub struct CacheStep {
    /// [batch, vocab_size] output for this timestep.
    pub logits: Vec<f32>,
    /// True when at least one earlier entry contributed a vote.
    pub blended: bool,
    /// True when the insert evicted the oldest entry.
    pub evicted: bool,
}

/// Cache memory plus the parameters that drive retrieval.
#[derive(Debug, Clone)]
pub struct NeuralCache {
    config: CacheConfig,
    memory: CacheMemory,
}

impl NeuralCache {
    /// Validate `config` and allocate buffers sized for a stack with
    /// `num_layers` layers of `hidden_dim` units over `vocab_size` tokens.
    pub fn new(
        config: CacheConfig,
        hidden_dim: usize,
        num_layers: usize,
        vocab_size: usize,
    ) -> Result<Self> {
        config.validate()?;
        let key_dim = config.hidden_type.key_dim(hidden_dim, num_layers);
        let memory = CacheMemory::new(config.cache_size, config.batch_size, key_dim, vocab_size);
        info!(
            cache_size = config.cache_size,
            batch_size = config.batch_size,
            key_dim,
            hidden_type = %config.hidden_type,
            "neural cache initialized"
        );
        Ok(NeuralCache { config, memory })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn memory(&self) -> &CacheMemory {
        &self.memory
    }

    pub fn batch_size(&self) -> usize {
        self.memory.batch_size()
    }

    /// Next write slot, saturating at `cache_size - 1`.
    pub fn pointer(&self) -> usize {
        self.memory.pointer()
    }

    /// Drop every entry and resize for `batch_size` sequences.
    pub fn reset(&mut self, batch_size: usize) -> Result<()> {
        if batch_size == 0 {
            return Err(ModelError::InvalidConfiguration(
                "cache batch_size must be > 0".to_string(),
            ));
        }
        self.memory.reset(batch_size);
        self.config.batch_size = batch_size;
        debug!(batch_size, "neural cache reset");
        Ok(())
    }

    /// Key features of a carried state under the configured policy.
    pub fn extract_key(&self, hidden: &HiddenState) -> Result<Vec<f32>> {
        self.config.hidden_type.extract(hidden)
    }

    /// Record the current step and produce its output distribution.
    ///
    /// - `key`: [batch, key_dim] features of the state after consuming `tokens`
    /// - `tokens`: [batch] tokens consumed at this step
    /// - `decoded`: [batch, vocab_size] decoder output for this step
    ///
    /// With no earlier entry the decoder output passes through unchanged.
    pub fn advance(
        &mut self,
        key: &[f32],
        tokens: &[u32],
        decoded: Vec<f32>,
        backend: &dyn ComputeBackend,
    ) -> Result<CacheStep> {
        let vocab_size = self.memory.vocab_size();
        if decoded.len() != tokens.len() * vocab_size {
            return Err(ModelError::ShapeMismatch {
                what: "decoder output",
                expected: tokens.len() * vocab_size,
                got: decoded.len(),
            });
        }

        let insertion = self.memory.insert(key, tokens)?;
        if insertion.index == 0 {
            return Ok(CacheStep {
                logits: decoded,
                blended: false,
                evicted: insertion.evicted,
            });
        }

        let pairs = self.memory.read_all(self.config.value_alignment);
        let vote = kernel::cache_vote(
            key,
            &pairs,
            self.config.theta,
            self.memory.key_dim(),
            vocab_size,
        )?;
        let logits = kernel::blend(&decoded, &vote, self.config.lambda, backend)?;
        Ok(CacheStep {
            logits,
            blended: true,
            evicted: insertion.evicted,
        })
    }
}

/// Whether a forward pass runs with a neural cache.
#[derive(Debug, Clone, Default)]
pub enum CacheState {
    /// Plain batched inference.
    #[default]
    Disabled,
    /// Sequential, cache-augmented inference.
    Enabled(NeuralCache),
}

impl CacheState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, CacheState::Enabled(_))
    }

    pub fn cache(&self) -> Option<&NeuralCache> {
        match self {
            CacheState::Disabled => None,
            CacheState::Enabled(cache) => Some(cache),
        }
    }

    /// Clear the cache and resize it for `batch_size` sequences.
    pub fn reset(&mut self, batch_size: usize) -> Result<()> {
        match self {
            CacheState::Disabled => Err(ModelError::InvalidConfiguration(
                "cannot reset cache: caching is not enabled".to_string(),
            )),
            CacheState::Enabled(cache) => cache.reset(batch_size),
        }
    }
}
