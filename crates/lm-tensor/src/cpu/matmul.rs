//! Reference matrix multiplication kernel.

/// Naive row-major `C = A @ B` with A of shape [m, k] and B of shape [k, n].
///
/// The inner loop walks `b` row by row so both operands are read
/// sequentially.
pub(crate) fn matmul_rowmajor(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    let mut c = vec![0.0f32; m * n];
    for i in 0..m {
        let c_row = &mut c[i * n..(i + 1) * n];
        for p in 0..k {
            let a_ip = a[i * k + p];
            let b_row = &b[p * n..(p + 1) * n];
            for (c_ij, &b_pj) in c_row.iter_mut().zip(b_row) {
                *c_ij += a_ip * b_pj;
            }
        }
    }
    c
}
