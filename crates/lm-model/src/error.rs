use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("shape mismatch for {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("token id {token} exceeds vocab size {vocab_size}")]
    TokenOutOfRange { token: u32, vocab_size: usize },
    #[error("halted after first cache-blended prediction at step {step}")]
    DebugHalt { step: usize },
    #[error("tokenizer error: {0}")]
    TokenizerError(String),
    #[error("tensor error: {0}")]
    TensorError(#[from] lm_tensor::TensorError),
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
