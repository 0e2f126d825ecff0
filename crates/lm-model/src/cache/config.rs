use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::rnn::HiddenState;

/// Which layer(s) of the recurrent output state become the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CacheHiddenType {
    /// Top layer only.
    Top,
    /// Bottom layer only.
    Bottom,
    /// All layers concatenated along the feature axis.
    Flat,
}

impl CacheHiddenType {
    pub const VALID: [&'static str; 3] = ["top", "bottom", "flat"];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheHiddenType::Top => "top",
            CacheHiddenType::Bottom => "bottom",
            CacheHiddenType::Flat => "flat",
        }
    }

    /// Width of one key vector for a stack of the given size.
    pub fn key_dim(&self, hidden_dim: usize, num_layers: usize) -> usize {
        match self {
            CacheHiddenType::Top | CacheHiddenType::Bottom => hidden_dim,
            CacheHiddenType::Flat => hidden_dim * num_layers,
        }
    }

    /// Extract the [batch, key_dim] key block from a carried state.
    pub fn extract(&self, hidden: &HiddenState) -> Result<Vec<f32>> {
        let h = hidden.output();
        let num_layers = hidden.num_layers();
        let batch = hidden.batch_size();
        let key_dim = self.key_dim(hidden.hidden_dim(), num_layers);

        let mut out = Vec::with_capacity(batch * key_dim);
        for b in 0..batch {
            match self {
                CacheHiddenType::Top => out.extend_from_slice(h.slice_at(&[num_layers - 1, b])?),
                CacheHiddenType::Bottom => out.extend_from_slice(h.slice_at(&[0, b])?),
                CacheHiddenType::Flat => {
                    for l in 0..num_layers {
                        out.extend_from_slice(h.slice_at(&[l, b])?);
                    }
                }
            }
        }
        Ok(out)
    }
}

impl FromStr for CacheHiddenType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "top" => Ok(CacheHiddenType::Top),
            "bottom" => Ok(CacheHiddenType::Bottom),
            "flat" => Ok(CacheHiddenType::Flat),
            other => Err(ModelError::InvalidConfiguration(format!(
                "invalid cache_hidden_type {:?}, options are [{}]",
                other,
                CacheHiddenType::VALID.join(", ")
            ))),
        }
    }
}

impl TryFrom<String> for CacheHiddenType {
    type Error = ModelError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<CacheHiddenType> for String {
    fn from(kind: CacheHiddenType) -> String {
        kind.as_str().to_string()
    }
}

impl fmt::Display for CacheHiddenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stored token is paired with a stored key at retrieval time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueAlignment {
    /// Key `i` votes for the token consumed at step `i + 1`, i.e. the token
    /// that followed the context summarized by the key.
    #[default]
    NextToken,
    /// Key `i` votes for the token consumed at step `i`.
    SameStep,
}

impl ValueAlignment {
    /// Logical index of the value paired with the key at `key_index`.
    pub fn value_index(&self, key_index: usize) -> usize {
        match self {
            ValueAlignment::NextToken => key_index + 1,
            ValueAlignment::SameStep => key_index,
        }
    }
}

/// Parameters of the neural cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Number of retained timesteps.
    pub cache_size: usize,
    /// Kernel sharpness: weights are `exp(theta * <query, key>)`.
    pub theta: f32,
    /// Share of the cache vote in the blended output.
    pub lambda: f32,
    /// Number of parallel sequences the buffers are sized for.
    pub batch_size: usize,
    pub hidden_type: CacheHiddenType,
    pub value_alignment: ValueAlignment,
    /// Stop the forward pass with `ModelError::DebugHalt` right after the
    /// first cache-blended prediction. Debugging aid only.
    pub halt_after_first_blend: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            cache_size: 2000,
            theta: 0.3,
            lambda: 0.1,
            batch_size: 10,
            hidden_type: CacheHiddenType::Flat,
            value_alignment: ValueAlignment::NextToken,
            halt_after_first_blend: false,
        }
    }
}

impl CacheConfig {
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    pub fn with_theta(mut self, theta: f32) -> Self {
        self.theta = theta;
        self
    }

    pub fn with_lambda(mut self, lambda: f32) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_hidden_type(mut self, hidden_type: CacheHiddenType) -> Self {
        self.hidden_type = hidden_type;
        self
    }

    pub fn with_value_alignment(mut self, value_alignment: ValueAlignment) -> Self {
        self.value_alignment = value_alignment;
        self
    }

    pub fn with_halt_after_first_blend(mut self, halt: bool) -> Self {
        self.halt_after_first_blend = halt;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_size == 0 {
            return Err(ModelError::InvalidConfiguration(
                "cache_size must be > 0".to_string(),
            ));
        }
        if !(self.theta.is_finite() && self.theta > 0.0) {
            return Err(ModelError::InvalidConfiguration(format!(
                "cache theta must be a positive finite number, got {}",
                self.theta
            )));
        }
        if !(0.0..=1.0).contains(&self.lambda) {
            return Err(ModelError::InvalidConfiguration(format!(
                "cache lambda must be in [0, 1], got {}",
                self.lambda
            )));
        }
        if self.batch_size == 0 {
            return Err(ModelError::InvalidConfiguration(
                "cache batch_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
