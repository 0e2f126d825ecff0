use std::sync::Arc;

use lm_tensor::Tensor;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A weight matrix behind shared, lockable storage.
///
/// Cloning a `SharedWeight` clones the handle, not the data: both handles
/// observe every write. Weight tying relies on this.
#[derive(Debug, Clone)]
pub struct SharedWeight {
    inner: Arc<RwLock<Tensor>>,
}

impl SharedWeight {
    pub fn new(tensor: Tensor) -> Self {
        SharedWeight {
            inner: Arc::new(RwLock::new(tensor)),
        }
    }

    /// Shared read access to the underlying tensor.
    pub fn read(&self) -> RwLockReadGuard<'_, Tensor> {
        self.inner.read()
    }

    /// Exclusive write access to the underlying tensor.
    pub fn write(&self) -> RwLockWriteGuard<'_, Tensor> {
        self.inner.write()
    }

    /// Returns true if both handles point at the same storage.
    pub fn shares_storage_with(&self, other: &SharedWeight) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
