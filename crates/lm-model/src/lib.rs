//! `lm-model` - Recurrent word-level language model with neural-cache
//! augmented inference.

pub mod architecture;
pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod nn;
pub mod rnn;
pub mod score;
pub mod session;
pub mod tokenizer;

pub use architecture::LanguageModel;
pub use cache::{CacheConfig, CacheHiddenType, CacheState, NeuralCache, ValueAlignment};
pub use config::ModelConfig;
pub use error::{ModelError, Result};
pub use model::RnnModel;
pub use rnn::{HiddenState, RnnKind};
pub use session::DecodingSession;
pub use tokenizer::Dictionary;
