use lm_tensor::{ComputeBackend, Tensor};

use crate::cache::CacheConfig;
use crate::rnn::HiddenState;

/// A stateful word-level language model.
///
/// Implementations own whatever per-stream state they need (such as a neural
/// cache) and produce logits for every input position.
pub trait LanguageModel: Send + Sync {
    /// Run the model over a [seq_len][batch] block of token ids.
    ///
    /// Returns logits of shape [seq_len, batch, vocab_size] and the carried
    /// state to pass into the next call.
    ///
    /// - `tokens`: one row of token ids per timestep, all rows the same width.
    /// - `hidden`: carried state from the previous call or `init_hidden`.
    /// - `backend`: the compute backend to use for tensor operations.
    fn forward(
        &mut self,
        tokens: &[Vec<u32>],
        hidden: &HiddenState,
        backend: &dyn ComputeBackend,
    ) -> crate::Result<(Tensor, HiddenState)>;

    /// Zero carried state for `batch_size` sequences.
    fn init_hidden(&self, batch_size: usize) -> HiddenState;

    /// Returns the vocabulary size (number of output logits).
    fn vocab_size(&self) -> usize;

    /// Enable neural-cache inference with a freshly allocated cache.
    fn init_cache(&mut self, config: CacheConfig) -> crate::Result<()>;

    /// Clear cached history, resizing for `batch_size` sequences.
    ///
    /// Fails if no cache was initialized.
    fn reset_cache(&mut self, batch_size: usize) -> crate::Result<()>;
}
