use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::rnn::RnnKind;

fn default_dropout() -> f32 {
    0.5
}

fn default_seed() -> u64 {
    1111
}

/// Hyperparameters of a recurrent language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Recurrent cell kind ("LSTM", "GRU", "RNN_TANH" or "RNN_RELU").
    pub rnn_type: RnnKind,
    /// Vocabulary size (number of token embeddings and output logits).
    pub vocab_size: usize,
    /// Embedding dimension.
    pub embed_dim: usize,
    /// Hidden units per recurrent layer.
    pub hidden_dim: usize,
    /// Number of stacked recurrent layers.
    pub num_layers: usize,
    /// Dropout probability applied to embeddings, between recurrent layers,
    /// and to the recurrent output. Only active in training mode.
    #[serde(default = "default_dropout")]
    pub dropout: f32,
    /// Share the embedding table with the decoder projection.
    #[serde(default)]
    pub tie_weights: bool,
    /// Seed for weight initialization and dropout masks.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl ModelConfig {
    /// Build a configuration from a cell-kind string and the layer sizes,
    /// using the default dropout (0.5), untied weights and the default seed.
    pub fn new(
        rnn_type: &str,
        vocab_size: usize,
        embed_dim: usize,
        hidden_dim: usize,
        num_layers: usize,
    ) -> Result<ModelConfig> {
        let config = ModelConfig {
            rnn_type: rnn_type.parse()?,
            vocab_size,
            embed_dim,
            hidden_dim,
            num_layers,
            dropout: default_dropout(),
            tie_weights: false,
            seed: default_seed(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_dropout(mut self, dropout: f32) -> Self {
        self.dropout = dropout;
        self
    }

    pub fn with_tied_weights(mut self, tie_weights: bool) -> Self {
        self.tie_weights = tie_weights;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Parse a configuration from JSON and validate it.
    pub fn from_json(json: &str) -> Result<ModelConfig> {
        let config: ModelConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check dimensional consistency.
    ///
    /// Weight tying reuses the decoder matrix as the lookup table, so it
    /// requires `hidden_dim == embed_dim`.
    pub fn validate(&self) -> Result<()> {
        if self.vocab_size == 0 {
            return Err(ModelError::InvalidConfiguration(
                "vocab_size must be > 0".to_string(),
            ));
        }
        if self.embed_dim == 0 || self.hidden_dim == 0 {
            return Err(ModelError::InvalidConfiguration(format!(
                "embed_dim ({}) and hidden_dim ({}) must be > 0",
                self.embed_dim, self.hidden_dim
            )));
        }
        if self.num_layers == 0 {
            return Err(ModelError::InvalidConfiguration(
                "num_layers must be > 0".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ModelError::InvalidConfiguration(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if self.tie_weights && self.hidden_dim != self.embed_dim {
            return Err(ModelError::InvalidConfiguration(format!(
                "when using tied weights, hidden_dim ({}) must be equal to embed_dim ({})",
                self.hidden_dim, self.embed_dim
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults() {
        let cfg = ModelConfig::new("LSTM", 100, 16, 32, 2).unwrap();
        assert_eq!(cfg.rnn_type, RnnKind::Lstm);
        assert_eq!(cfg.dropout, 0.5);
        assert!(!cfg.tie_weights);
    }

    #[test]
    fn test_invalid_rnn_type() {
        match ModelConfig::new("INVALID", 10, 4, 4, 1) {
            Err(ModelError::InvalidConfiguration(msg)) => {
                for option in ["LSTM", "GRU", "RNN_TANH", "RNN_RELU"] {
                    assert!(msg.contains(option), "{msg}");
                }
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_tie_weights_requires_equal_dims() {
        let cfg = ModelConfig::new("GRU", 10, 4, 8, 1)
            .unwrap()
            .with_tied_weights(true);
        assert!(matches!(
            cfg.validate(),
            Err(ModelError::InvalidConfiguration(_))
        ));

        let tied = ModelConfig::new("GRU", 10, 8, 8, 1)
            .unwrap()
            .with_tied_weights(true);
        assert!(tied.validate().is_ok());
    }

    #[test]
    fn test_zero_dims_rejected() {
        assert!(ModelConfig::new("LSTM", 0, 4, 4, 1).is_err());
        assert!(ModelConfig::new("LSTM", 10, 4, 4, 0).is_err());
        assert!(ModelConfig::new("LSTM", 10, 0, 4, 1).is_err());
    }

    #[test]
    fn test_from_json() {
        let cfg = ModelConfig::from_json(
            r#"{"rnn_type": "RNN_RELU", "vocab_size": 50, "embed_dim": 8,
                "hidden_dim": 8, "num_layers": 3, "tie_weights": true}"#,
        )
        .unwrap();
        assert_eq!(cfg.rnn_type, RnnKind::RnnRelu);
        assert_eq!(cfg.num_layers, 3);
        assert_eq!(cfg.dropout, 0.5);
        assert!(cfg.tie_weights);

        let round = serde_json::to_string(&cfg).unwrap();
        assert_eq!(ModelConfig::from_json(&round).unwrap(), cfg);
    }

    #[test]
    fn test_from_json_rejects_unknown_cell() {
        let err = ModelConfig::from_json(
            r#"{"rnn_type": "TRANSFORMER", "vocab_size": 5, "embed_dim": 4,
                "hidden_dim": 4, "num_layers": 1}"#,
        );
        assert!(err.is_err());
    }
}
