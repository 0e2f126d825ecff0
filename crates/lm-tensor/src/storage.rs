/// CPU-side tensor storage.
///
/// Only f32 storage exists; the model keeps every parameter and activation in
/// single precision.
#[derive(Debug, Clone, PartialEq)]
pub enum CpuStorage {
    /// 32-bit floating point storage.
    F32(Vec<f32>),
}

impl CpuStorage {
    /// Returns the data as an f32 slice.
    pub fn as_f32_slice(&self) -> &[f32] {
        match self {
            CpuStorage::F32(v) => v.as_slice(),
        }
    }

    /// Returns the data as a mutable f32 slice.
    pub fn as_f32_slice_mut(&mut self) -> &mut [f32] {
        match self {
            CpuStorage::F32(v) => v.as_mut_slice(),
        }
    }

    /// Create zero-filled storage with `n` elements.
    pub fn zeros(n: usize) -> Self {
        CpuStorage::F32(vec![0.0; n])
    }

    /// Create storage from an f32 vector.
    pub fn from_f32_vec(data: Vec<f32>) -> Self {
        CpuStorage::F32(data)
    }
}
