use crate::error::{Result, TensorError};
use std::fmt;

/// A tensor shape, wrapping a vector of dimension sizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Create a new shape from a vector of dimensions.
    pub fn new(dims: Vec<usize>) -> Self {
        Shape { dims }
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements (product of all dimension sizes).
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    /// Returns the size of dimension `i`.
    ///
    /// # Panics
    /// Panics if `i >= ndim()`.
    pub fn dim(&self, i: usize) -> usize {
        self.dims[i]
    }

    /// Returns a reference to the underlying dimension sizes.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Computes row-major contiguous strides for this shape.
    ///
    /// For a shape [d0, d1, d2], the strides are [d1*d2, d2, 1].
    pub fn strides(&self) -> Vec<usize> {
        if self.dims.is_empty() {
            return vec![];
        }
        let mut strides = vec![0usize; self.dims.len()];
        strides[self.dims.len() - 1] = 1;
        for i in (0..self.dims.len() - 1).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1];
        }
        strides
    }

    /// Resolves a leading index prefix to `(offset, len)` of the contiguous
    /// block it addresses.
    ///
    /// For a shape [L, B, H], the prefix [l, b] addresses the H elements
    /// starting at `l*B*H + b*H`. An empty prefix addresses the whole tensor.
    pub fn block_of(&self, prefix: &[usize]) -> Result<(usize, usize)> {
        if prefix.len() > self.dims.len() {
            return Err(TensorError::Other(format!(
                "index prefix of length {} is too long for shape {}",
                prefix.len(),
                self
            )));
        }
        let strides = self.strides();
        let mut offset = 0;
        for (axis, &index) in prefix.iter().enumerate() {
            if index >= self.dims[axis] {
                return Err(TensorError::IndexOutOfBounds {
                    axis,
                    index,
                    size: self.dims[axis],
                });
            }
            offset += index * strides[axis];
        }
        let len = self.dims[prefix.len()..].iter().product();
        Ok((offset, len))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_shape() {
        let s = Shape::new(vec![2, 3, 4]);
        assert_eq!(s.ndim(), 3);
        assert_eq!(s.numel(), 24);
        assert_eq!(s.dim(0), 2);
        assert_eq!(s.dim(2), 4);
    }

    #[test]
    fn test_strides() {
        let s = Shape::new(vec![2, 3, 4]);
        assert_eq!(s.strides(), vec![12, 4, 1]);
    }

    #[test]
    fn test_scalar_shape() {
        let s = Shape::new(vec![]);
        assert_eq!(s.ndim(), 0);
        assert_eq!(s.numel(), 1); // product of empty = 1
        assert_eq!(s.strides(), vec![]);
    }

    #[test]
    fn test_block_of_prefix() {
        let s = Shape::new(vec![2, 3, 4]);
        assert_eq!(s.block_of(&[]).unwrap(), (0, 24));
        assert_eq!(s.block_of(&[1]).unwrap(), (12, 12));
        assert_eq!(s.block_of(&[1, 2]).unwrap(), (20, 4));
        assert_eq!(s.block_of(&[1, 2, 3]).unwrap(), (23, 1));
    }

    #[test]
    fn test_block_of_out_of_bounds() {
        let s = Shape::new(vec![2, 3]);
        match s.block_of(&[0, 3]) {
            Err(TensorError::IndexOutOfBounds { axis, index, size }) => {
                assert_eq!((axis, index, size), (1, 3, 3));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(s.block_of(&[0, 0, 0]).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape::new(vec![5, 1, 4]).to_string(), "[5, 1, 4]");
    }
}
