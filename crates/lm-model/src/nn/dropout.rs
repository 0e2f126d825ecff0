use rand::rngs::StdRng;
use rand::Rng;

/// Inverted dropout: zeroes each element with probability `p` and scales the
/// survivors by `1 / (1 - p)`.
#[derive(Debug, Clone, Copy)]
pub struct Dropout {
    p: f32,
}

impl Dropout {
    pub fn new(p: f32) -> Self {
        Dropout { p }
    }

    pub fn p(&self) -> f32 {
        self.p
    }

    /// Apply the dropout mask in place.
    pub fn apply(&self, x: &mut [f32], rng: &mut StdRng) {
        if self.p <= 0.0 {
            return;
        }
        let keep_scale = 1.0 / (1.0 - self.p);
        for v in x.iter_mut() {
            if rng.gen::<f32>() < self.p {
                *v = 0.0;
            } else {
                *v *= keep_scale;
            }
        }
    }
}
