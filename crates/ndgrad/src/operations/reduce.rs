//! Reductions over axes.

use crate::array::Array;
use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::strides::{cartesian_to_linear, compute_strides, increment_index, num_elements};

/// Check that `axes` are in range and distinct, returning a per-axis mask.
pub fn validate_axes(axes: &[usize], ndim: usize) -> Result<Vec<bool>, TensorError> {
    let mut mask = vec![false; ndim];
    for &axis in axes {
        if axis >= ndim || mask[axis] {
            return Err(TensorError::InvalidAxis { axis, ndim });
        }
        mask[axis] = true;
    }
    Ok(mask)
}

/// Shape left after reducing `axes` out of `shape`.
///
/// With `keepdims` the reduced axes stay as size 1; otherwise they are removed.
pub fn reduced_shape(shape: &[usize], mask: &[bool], keepdims: bool) -> Vec<usize> {
    shape
        .iter()
        .zip(mask)
        .filter_map(|(&dim, &reduced)| match (reduced, keepdims) {
            (false, _) => Some(dim),
            (true, true) => Some(1),
            (true, false) => None,
        })
        .collect()
}

/// Fold every element into its slot of the reduced array.
fn reduce_axes<T: Scalar>(
    array: &Array<T>,
    axes: &[usize],
    keepdims: bool,
    init: impl Fn(T) -> T,
    combine: impl Fn(T, T) -> T,
) -> Result<Array<T>, TensorError> {
    let mask = validate_axes(axes, array.ndim())?;
    let kept = reduced_shape(array.shape(), &mask, true);
    let kept_strides: Vec<usize> = compute_strides(&kept)
        .into_iter()
        .zip(&mask)
        .map(|(stride, &reduced)| if reduced { 0 } else { stride })
        .collect();

    let mut out: Vec<Option<T>> = vec![None; num_elements(&kept)];
    let mut index = vec![0usize; array.ndim()];
    for &x in array.data() {
        let slot = &mut out[cartesian_to_linear(&index, &kept_strides)];
        *slot = Some(match *slot {
            Some(acc) => combine(acc, x),
            None => init(x),
        });
        increment_index(&mut index, array.shape());
    }

    let data = out.into_iter().map(Option::unwrap_or_default).collect();
    let result = Array::from_vec(data, &kept)?;
    if keepdims {
        Ok(result)
    } else {
        result.reshape(&reduced_shape(array.shape(), &mask, false))
    }
}

/// Sum over `axes`.
///
/// An empty `axes` list leaves the array unchanged.
///
/// # Example
///
/// ```
/// use ndgrad::Array;
/// use ndgrad::operations::sum_axes;
///
/// // column-major [[1, 3, 5], [2, 4, 6]]
/// let a = Array::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
/// assert_eq!(sum_axes(&a, &[0], false).unwrap().data(), &[3.0, 7.0, 11.0]);
/// assert_eq!(sum_axes(&a, &[1], true).unwrap().shape(), &[2, 1]);
/// ```
pub fn sum_axes<T: Scalar>(
    array: &Array<T>,
    axes: &[usize],
    keepdims: bool,
) -> Result<Array<T>, TensorError> {
    reduce_axes(array, axes, keepdims, |x| x, |acc, x| acc + x)
}

/// Maximum over `axes`.
pub fn max_axes<T: Scalar>(
    array: &Array<T>,
    axes: &[usize],
    keepdims: bool,
) -> Result<Array<T>, TensorError> {
    reduce_axes(array, axes, keepdims, |x| x, |acc, x| if x > acc { x } else { acc })
}

/// Minimum over `axes`.
pub fn min_axes<T: Scalar>(
    array: &Array<T>,
    axes: &[usize],
    keepdims: bool,
) -> Result<Array<T>, TensorError> {
    reduce_axes(array, axes, keepdims, |x| x, |acc, x| if x < acc { x } else { acc })
}

/// Number of elements folded into each slot when reducing `axes` of `shape`.
pub fn reduction_count(shape: &[usize], axes: &[usize]) -> usize {
    axes.iter().map(|&axis| shape[axis]).product()
}
