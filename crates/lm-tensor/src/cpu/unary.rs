//! Scalar activation kernels shared by the CPU backend.

/// Numerically stable sigmoid.
///
/// Uses `sigmoid(-x) = 1 - sigmoid(x)` so the exponent is never positive.
#[inline]
pub(crate) fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[inline]
pub(crate) fn relu(x: f32) -> f32 {
    x.max(0.0)
}
