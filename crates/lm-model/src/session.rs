use std::sync::Arc;

use lm_tensor::{ComputeBackend, Tensor};
use tracing::debug;

use crate::architecture::LanguageModel;
use crate::cache::{CacheConfig, CacheState};
use crate::error::Result;
use crate::model::RnnModel;
use crate::rnn::HiddenState;

/// One decoding stream over a shared model.
///
/// Weights are shared through an `Arc`; the neural cache belongs to the
/// session, so concurrent sessions never see each other's history.
#[derive(Debug, Clone)]
pub struct DecodingSession {
    model: Arc<RnnModel>,
    cache: CacheState,
}

impl DecodingSession {
    /// Start a session with the cache disabled.
    pub fn new(model: Arc<RnnModel>) -> Self {
        DecodingSession {
            model,
            cache: CacheState::Disabled,
        }
    }

    /// Start a session with a fresh cache built from `config`.
    pub fn with_cache(model: Arc<RnnModel>, config: CacheConfig) -> Result<Self> {
        let cache = model.init_cache(config)?;
        Ok(DecodingSession { model, cache })
    }

    pub fn model(&self) -> &Arc<RnnModel> {
        &self.model
    }

    pub fn cache(&self) -> &CacheState {
        &self.cache
    }

    /// Return to plain decoding, dropping any cached history.
    pub fn disable_cache(&mut self) {
        if self.cache.is_enabled() {
            debug!("neural cache disabled");
        }
        self.cache = CacheState::Disabled;
    }
}

impl LanguageModel for DecodingSession {
    fn forward(
        &mut self,
        tokens: &[Vec<u32>],
        hidden: &HiddenState,
        backend: &dyn ComputeBackend,
    ) -> Result<(Tensor, HiddenState)> {
        self.model.forward(tokens, hidden, &mut self.cache, backend)
    }

    fn init_hidden(&self, batch_size: usize) -> HiddenState {
        self.model.init_hidden(batch_size)
    }

    fn vocab_size(&self) -> usize {
        self.model.vocab_size()
    }

    fn init_cache(&mut self, config: CacheConfig) -> Result<()> {
        self.cache = self.model.init_cache(config)?;
        Ok(())
    }

    fn reset_cache(&mut self, batch_size: usize) -> Result<()> {
        self.cache.reset(batch_size)
    }
}
