//! Axis permutation.

use crate::array::Array;
use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::strides::{cartesian_to_linear, increment_index};

/// Permute the axes of an array, returning a new array.
///
/// `perm[i]` gives the source axis for the i-th axis of the result.
///
/// # Errors
///
/// Returns error if `perm` is not a valid permutation of `0..ndim`.
///
/// # Examples
///
/// ```
/// use ndgrad::Array;
/// use ndgrad::operations::permutedims;
///
/// let a = Array::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
/// let t = permutedims(&a, &[1, 0]).unwrap();
/// assert_eq!(t.shape(), &[3, 2]);
/// assert_eq!(a.get(&[1, 0]), t.get(&[0, 1]));
/// ```
pub fn permutedims<T: Scalar>(array: &Array<T>, perm: &[usize]) -> Result<Array<T>, TensorError> {
    validate_permutation(perm, array.ndim())?;
    let new_shape: Vec<usize> = perm.iter().map(|&p| array.shape()[p]).collect();
    // stride of the source axis feeding each destination axis
    let src_strides: Vec<usize> = perm.iter().map(|&p| array.strides()[p]).collect();

    let src = array.data();
    let mut data = Vec::with_capacity(array.len());
    let mut index = vec![0usize; new_shape.len()];
    for _ in 0..array.len() {
        data.push(src[cartesian_to_linear(&index, &src_strides)]);
        increment_index(&mut index, &new_shape);
    }
    Array::from_vec(data, &new_shape)
}

/// Swap two axes.
pub fn transpose<T: Scalar>(
    array: &Array<T>,
    axis0: usize,
    axis1: usize,
) -> Result<Array<T>, TensorError> {
    permutedims(array, &swap_permutation(array.ndim(), axis0, axis1)?)
}

/// Permutation of `0..ndim` exchanging `axis0` and `axis1`.
pub fn swap_permutation(ndim: usize, axis0: usize, axis1: usize) -> Result<Vec<usize>, TensorError> {
    for axis in [axis0, axis1] {
        if axis >= ndim {
            return Err(TensorError::InvalidAxis { axis, ndim });
        }
    }
    let mut perm: Vec<usize> = (0..ndim).collect();
    perm.swap(axis0, axis1);
    Ok(perm)
}

/// The permutation that undoes `perm`.
pub fn inverse_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; perm.len()];
    for (i, &p) in perm.iter().enumerate() {
        inverse[p] = i;
    }
    inverse
}

/// Validate that perm is a valid permutation of 0..ndim.
pub fn validate_permutation(perm: &[usize], ndim: usize) -> Result<(), TensorError> {
    let invalid = || TensorError::InvalidPermutation {
        perm: perm.to_vec(),
        ndim,
    };
    if perm.len() != ndim {
        return Err(invalid());
    }
    let mut seen = vec![false; ndim];
    for &p in perm {
        if p >= ndim || seen[p] {
            return Err(invalid());
        }
        seen[p] = true;
    }
    Ok(())
}
