//! Kernel-weighted retrieval over cache entries and blending with the
//! decoder output.

use lm_tensor::ComputeBackend;

use crate::cache::memory::CachePair;
use crate::error::{ModelError, Result};

/// Unnormalized exponential kernel `exp(theta * score)`.
///
/// Positive for any score in f32 range of the exponent; saturates to 0 below
/// about -87/theta and to +inf above about 88/theta.
#[inline]
pub fn kernel_weight(theta: f32, score: f32) -> f32 {
    (theta * score).exp()
}

/// Accumulate a [batch, vocab_size] vote from retrieval pairs.
///
/// For each batch element `b` and pair `i`, adds
/// `exp(theta * <query_b, key_i_b>)` to the slot of the token paired with
/// key `i`. The vote is a non-negative combination of one-hot rows.
pub fn cache_vote(
    query: &[f32],
    pairs: &[CachePair<'_>],
    theta: f32,
    key_dim: usize,
    vocab_size: usize,
) -> Result<Vec<f32>> {
    if key_dim == 0 || query.len() % key_dim != 0 {
        return Err(ModelError::ShapeMismatch {
            what: "cache query",
            expected: key_dim,
            got: query.len(),
        });
    }
    let batch = query.len() / key_dim;
    let mut vote = vec![0.0f32; batch * vocab_size];

    for pair in pairs {
        if pair.key.len() != query.len() || pair.tokens.len() != batch {
            return Err(ModelError::ShapeMismatch {
                what: "cache entry",
                expected: query.len(),
                got: pair.key.len(),
            });
        }
        for b in 0..batch {
            let q = &query[b * key_dim..(b + 1) * key_dim];
            let k = &pair.key[b * key_dim..(b + 1) * key_dim];
            let mut dot = 0.0f32;
            for d in 0..key_dim {
                dot += q[d] * k[d];
            }
            let token = pair.tokens[b] as usize;
            if token >= vocab_size {
                return Err(ModelError::TokenOutOfRange {
                    token: pair.tokens[b],
                    vocab_size,
                });
            }
            vote[b * vocab_size + token] += kernel_weight(theta, dot);
        }
    }
    Ok(vote)
}

/// Convex blend `(1 - lambda) * decoded + lambda * vote`.
///
/// The endpoints return one input unchanged so that `lambda = 0` reproduces
/// the decoder output bit for bit even when the vote holds +inf.
pub fn blend(
    decoded: &[f32],
    vote: &[f32],
    lambda: f32,
    backend: &dyn ComputeBackend,
) -> Result<Vec<f32>> {
    if decoded.len() != vote.len() {
        return Err(ModelError::ShapeMismatch {
            what: "cache vote",
            expected: decoded.len(),
            got: vote.len(),
        });
    }
    if lambda == 0.0 {
        return Ok(decoded.to_vec());
    }
    if lambda == 1.0 {
        return Ok(vote.to_vec());
    }
    let model_part = backend.scale(decoded, 1.0 - lambda)?;
    let cache_part = backend.scale(vote, lambda)?;
    Ok(backend.add(&model_part, &cache_part)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lm_tensor::CpuBackend;

    #[test]
    fn test_kernel_weight_positive() {
        for score in [-50.0f32, -5.0, 0.0, 5.0, 80.0] {
            assert!(kernel_weight(0.3, score) > 0.0);
        }
        assert_relative_eq!(kernel_weight(0.5, 2.0), 1.0f32.exp());
    }

    #[test]
    fn test_vote_accumulates_on_paired_tokens() {
        // batch 1, key_dim 2, vocab 4
        let k0 = [1.0, 0.0];
        let k1 = [0.0, 1.0];
        let k2 = [1.0, 1.0];
        let pairs = [
            CachePair { key: &k0, tokens: &[2] },
            CachePair { key: &k1, tokens: &[3] },
            CachePair { key: &k2, tokens: &[2] },
        ];
        let vote = cache_vote(&[2.0, 0.0], &pairs, 1.0, 2, 4).unwrap();
        assert_eq!(vote[0], 0.0);
        assert_eq!(vote[1], 0.0);
        assert_relative_eq!(vote[2], 2.0f32.exp() + 2.0f32.exp());
        assert_relative_eq!(vote[3], 1.0);
        assert!(vote.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_vote_is_per_batch_element() {
        // batch 2, key_dim 1, vocab 2
        let key = [1.0, -1.0];
        let pairs = [CachePair { key: &key, tokens: &[0, 1] }];
        let vote = cache_vote(&[0.0, 0.0], &pairs, 0.3, 1, 2).unwrap();
        assert_eq!(vote, vec![1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_empty_history_votes_nothing() {
        let vote = cache_vote(&[1.0, 2.0], &[], 0.3, 2, 3).unwrap();
        assert_eq!(vote, vec![0.0; 3]);
    }

    #[test]
    fn test_vote_shape_checked() {
        let key = [1.0, 2.0, 3.0];
        let pairs = [CachePair { key: &key, tokens: &[0] }];
        assert!(cache_vote(&[1.0, 2.0], &pairs, 0.3, 2, 3).is_err());
    }

    #[test]
    fn test_blend_endpoints() {
        let backend = CpuBackend::new();
        let decoded = [0.25, -1.5, 3.0];
        let vote = [f32::INFINITY, 0.0, 2.0];
        assert_eq!(blend(&decoded, &vote, 0.0, &backend).unwrap(), decoded.to_vec());
        assert_eq!(blend(&decoded, &vote, 1.0, &backend).unwrap(), vote.to_vec());
    }

    #[test]
    fn test_blend_convex_combination() {
        let backend = CpuBackend::new();
        let out = blend(&[1.0, 0.0], &[0.0, 10.0], 0.1, &backend).unwrap();
        assert_relative_eq!(out[0], 0.9);
        assert_relative_eq!(out[1], 1.0);
    }
}
