//! Dense column-major array, the numeric payload of every tracked value.

use std::rc::Rc;

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::strides::{cartesian_to_linear, compute_strides, num_elements};

/// A dense n-dimensional array with shared, copy-on-write storage.
///
/// Cloning an `Array` is cheap: both clones point to the same buffer until
/// one of them is mutated through [`Array::data_mut`]. A rank-0 array (empty
/// shape) holds exactly one element.
#[derive(Debug, Clone, PartialEq)]
pub struct Array<T: Scalar> {
    data: Rc<Vec<T>>,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

impl<T: Scalar> Array<T> {
    /// Create a new array with the given shape, zero-initialized.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndgrad::Array;
    ///
    /// let a: Array<f64> = Array::zeros(&[2, 3, 4]);
    /// assert_eq!(a.shape(), &[2, 3, 4]);
    /// assert_eq!(a.len(), 24);
    /// ```
    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, T::zero())
    }

    /// Create an array filled with ones.
    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, T::one())
    }

    /// Create an array filled with `value`.
    pub fn full(shape: &[usize], value: T) -> Self {
        Self {
            data: Rc::new(vec![value; num_elements(shape)]),
            shape: shape.to_vec(),
            strides: compute_strides(shape),
        }
    }

    /// Create a rank-0 array holding a single value.
    pub fn scalar(value: T) -> Self {
        Self::full(&[], value)
    }

    /// Zeros with the shape of `self`.
    pub fn zeros_like(&self) -> Self {
        Self::zeros(&self.shape)
    }

    /// Ones with the shape of `self`.
    pub fn ones_like(&self) -> Self {
        Self::ones(&self.shape)
    }

    /// Create an array from data and shape.
    ///
    /// Data is expected to be in column-major order.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::ShapeMismatch` if data length doesn't match shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndgrad::Array;
    ///
    /// let a = Array::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    /// assert_eq!(a.get(&[1, 0]), Some(&2.0)); // column-major: [1,0] is second
    /// assert_eq!(a.get(&[0, 1]), Some(&3.0));
    /// ```
    pub fn from_vec(data: Vec<T>, shape: &[usize]) -> Result<Self, TensorError> {
        let expected = num_elements(shape);
        if data.len() != expected {
            return Err(TensorError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data: Rc::new(data),
            shape: shape.to_vec(),
            strides: compute_strides(shape),
        })
    }

    /// Get the shape.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the rank (number of dimensions).
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Get total number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the array has zero elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get strides.
    #[inline]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Underlying data in column-major order.
    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Mutable access to the data, copying it first if the buffer is shared.
    pub fn data_mut(&mut self) -> &mut [T] {
        Rc::make_mut(&mut self.data).as_mut_slice()
    }

    /// Consume the array and return its data.
    pub fn into_vec(self) -> Vec<T> {
        Rc::try_unwrap(self.data).unwrap_or_else(|shared| shared.as_ref().clone())
    }

    /// The single element of a one-element array.
    pub fn item(&self) -> Option<T> {
        (self.len() == 1).then(|| self.data[0])
    }

    /// Get element by linear index.
    #[inline]
    pub fn get_linear(&self, i: usize) -> Option<&T> {
        self.data.get(i)
    }

    /// Get element by cartesian indices.
    ///
    /// Returns `None` if indices are out of bounds or wrong number of indices.
    pub fn get(&self, indices: &[usize]) -> Option<&T> {
        if indices.len() != self.ndim() {
            return None;
        }
        if indices.iter().zip(&self.shape).any(|(&i, &d)| i >= d) {
            return None;
        }
        self.data.get(cartesian_to_linear(indices, &self.strides))
    }

    /// Set element by cartesian indices.
    ///
    /// # Errors
    ///
    /// Returns error if indices are out of bounds or wrong number of indices.
    pub fn set(&mut self, indices: &[usize], value: T) -> Result<(), TensorError> {
        if indices.len() != self.ndim() {
            return Err(TensorError::WrongNumberOfIndices {
                expected: self.ndim(),
                actual: indices.len(),
            });
        }
        for (&index, &dim_size) in indices.iter().zip(&self.shape) {
            if index >= dim_size {
                return Err(TensorError::IndexOutOfBounds { index, dim_size });
            }
        }
        let linear = cartesian_to_linear(indices, &self.strides);
        self.data_mut()[linear] = value;
        Ok(())
    }

    /// Reshape to a new shape with the same number of elements (zero-copy).
    ///
    /// # Example
    ///
    /// ```
    /// use ndgrad::Array;
    ///
    /// let a = Array::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    /// let b = a.reshape(&[3, 2]).unwrap();
    /// assert_eq!(b.shape(), &[3, 2]);
    /// assert!(a.shares_storage_with(&b));
    /// ```
    pub fn reshape(&self, new_shape: &[usize]) -> Result<Self, TensorError> {
        let expected = num_elements(new_shape);
        if expected != self.len() {
            return Err(TensorError::ShapeMismatch {
                expected,
                actual: self.len(),
            });
        }
        Ok(Self {
            data: Rc::clone(&self.data),
            shape: new_shape.to_vec(),
            strides: compute_strides(new_shape),
        })
    }

    /// Check if this array shares its buffer with another.
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }

    /// Apply `f` to each element, producing a new array of the same shape.
    pub fn map<U: Scalar>(&self, mut f: impl FnMut(T) -> U) -> Array<U> {
        Array {
            data: Rc::new(self.data.iter().map(|&x| f(x)).collect()),
            shape: self.shape.clone(),
            strides: self.strides.clone(),
        }
    }

    /// Sum of all elements.
    pub fn sum(&self) -> T {
        self.data.iter().fold(T::zero(), |acc, &x| acc + x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros_and_ones() {
        let z: Array<f64> = Array::zeros(&[2, 3]);
        assert_eq!(z.len(), 6);
        assert!(z.data().iter().all(|&x| x == 0.0));
        let o: Array<i64> = Array::ones(&[4]);
        assert_eq!(o.data(), &[1, 1, 1, 1]);
    }

    #[test]
    fn test_scalar_has_one_element() {
        let s = Array::scalar(3.5_f64);
        assert_eq!(s.ndim(), 0);
        assert_eq!(s.len(), 1);
        assert_eq!(s.item(), Some(3.5));
        assert_eq!(s.get(&[]), Some(&3.5));
    }

    #[test]
    fn test_from_vec_wrong_length() {
        let result = Array::from_vec(vec![1.0, 2.0, 3.0], &[2, 2]);
        assert!(matches!(
            result,
            Err(TensorError::ShapeMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_get_set_column_major() {
        let mut a: Array<f64> = Array::zeros(&[2, 3]);
        a.set(&[1, 2], 7.0).unwrap();
        assert_eq!(a.data()[1 + 2 * 2], 7.0);
        assert_eq!(a.get(&[1, 2]), Some(&7.0));
        assert_eq!(a.get(&[2, 0]), None);
        assert!(a.set(&[0, 3], 1.0).is_err());
        assert!(a.set(&[0], 1.0).is_err());
    }

    #[test]
    fn test_copy_on_write() {
        let a = Array::from_vec(vec![1.0, 2.0], &[2]).unwrap();
        let mut b = a.clone();
        assert!(a.shares_storage_with(&b));
        b.data_mut()[0] = 10.0;
        assert!(!a.shares_storage_with(&b));
        assert_eq!(a.data(), &[1.0, 2.0]);
        assert_eq!(b.data(), &[10.0, 2.0]);
    }

    #[test]
    fn test_reshape_invalid() {
        let a: Array<f64> = Array::zeros(&[2, 3]);
        assert!(a.reshape(&[4]).is_err());
        assert_eq!(a.reshape(&[6, 1]).unwrap().strides(), &[1, 6]);
    }

    #[test]
    fn test_map_and_sum() {
        let a = Array::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
        let b = a.map(|x| x * x);
        assert_eq!(b.data(), &[1.0, 4.0, 9.0]);
        assert_eq!(b.sum(), 14.0);
        assert_eq!(b.into_vec(), vec![1.0, 4.0, 9.0]);
    }
}
