use rand::rngs::StdRng;
use rand::Rng;

/// Draw `n` values uniformly from `[-bound, bound]`.
pub fn uniform(rng: &mut StdRng, n: usize, bound: f32) -> Vec<f32> {
    (0..n).map(|_| rng.gen_range(-bound..=bound)).collect()
}
