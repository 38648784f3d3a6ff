//! Broadcasting: shape resolution, expansion, and the inverse reduction.
//!
//! Shapes are aligned at their trailing axes. Two axes are compatible when
//! they are equal or one of them is 1.

use crate::array::Array;
use crate::error::TensorError;
use crate::operations::reduce::sum_axes;
use crate::scalar::Scalar;
use crate::strides::{broadcast_strides, cartesian_to_linear, increment_index, num_elements};

/// Shape produced by broadcasting `lhs` against `rhs`.
///
/// # Example
///
/// ```
/// use ndgrad::operations::broadcast_shape;
///
/// assert_eq!(broadcast_shape(&[3, 4, 5], &[4, 5]).unwrap(), vec![3, 4, 5]);
/// assert_eq!(broadcast_shape(&[3, 1], &[1, 4]).unwrap(), vec![3, 4]);
/// assert!(broadcast_shape(&[3], &[4]).is_err());
/// ```
pub fn broadcast_shape(lhs: &[usize], rhs: &[usize]) -> Result<Vec<usize>, TensorError> {
    let ndim = lhs.len().max(rhs.len());
    let mut shape = Vec::with_capacity(ndim);
    for axis in 0..ndim {
        let l = axis
            .checked_sub(ndim - lhs.len())
            .map_or(1, |i| lhs[i]);
        let r = axis
            .checked_sub(ndim - rhs.len())
            .map_or(1, |i| rhs[i]);
        let dim = match (l, r) {
            (l, r) if l == r => l,
            (1, r) => r,
            (l, 1) => l,
            _ => {
                return Err(TensorError::IncompatibleShapes {
                    lhs: lhs.to_vec(),
                    rhs: rhs.to_vec(),
                });
            }
        };
        shape.push(dim);
    }
    Ok(shape)
}

/// Expand `array` to `shape`, materialising repeated elements.
pub fn broadcast_to<T: Scalar>(array: &Array<T>, shape: &[usize]) -> Result<Array<T>, TensorError> {
    if array.shape() == shape {
        return Ok(array.clone());
    }
    let resolved = broadcast_shape(array.shape(), shape)?;
    if resolved != shape {
        return Err(TensorError::IncompatibleShapes {
            lhs: array.shape().to_vec(),
            rhs: shape.to_vec(),
        });
    }
    let strides = broadcast_strides(array.shape(), shape);
    let src = array.data();
    let total = num_elements(shape);
    let mut data = Vec::with_capacity(total);
    let mut index = vec![0usize; shape.len()];
    for _ in 0..total {
        data.push(src[cartesian_to_linear(&index, &strides)]);
        increment_index(&mut index, shape);
    }
    Array::from_vec(data, shape)
}

/// Sum `array` down to `shape`, undoing a broadcast.
///
/// `shape` is left-padded with ones to the rank of `array`; every axis where
/// the padded shape differs from `array` is summed. The padded leading axes
/// are then dropped, while summed axes that exist in `shape` stay as size 1.
///
/// # Errors
///
/// `TensorError::CotangentShape` when `shape` has a higher rank than `array`
/// or an axis differs without the target being 1.
///
/// # Example
///
/// ```
/// use ndgrad::Array;
/// use ndgrad::operations::sum_to_shape;
///
/// let g: Array<f64> = Array::ones(&[3, 4, 5]);
/// let reduced = sum_to_shape(&g, &[4, 5]).unwrap();
/// assert_eq!(reduced.shape(), &[4, 5]);
/// assert!(reduced.data().iter().all(|&v| v == 3.0));
///
/// let kept = sum_to_shape(&g, &[3, 1, 5]).unwrap();
/// assert_eq!(kept.shape(), &[3, 1, 5]);
/// ```
pub fn sum_to_shape<T: Scalar>(array: &Array<T>, shape: &[usize]) -> Result<Array<T>, TensorError> {
    if array.shape() == shape {
        return Ok(array.clone());
    }
    let mismatch = || TensorError::CotangentShape {
        expected: shape.to_vec(),
        actual: array.shape().to_vec(),
    };
    let ndim = array.ndim();
    if shape.len() > ndim {
        return Err(mismatch());
    }
    let pad = ndim - shape.len();
    let mut axes = Vec::new();
    for (axis, &dim) in array.shape().iter().enumerate() {
        let target = if axis < pad { 1 } else { shape[axis - pad] };
        if target == dim {
            continue;
        }
        if target != 1 {
            return Err(mismatch());
        }
        axes.push(axis);
    }
    sum_axes(array, &axes, true)?.reshape(shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_shape_rank_extension() {
        assert_eq!(broadcast_shape(&[], &[2, 3]).unwrap(), vec![2, 3]);
        assert_eq!(broadcast_shape(&[2, 1, 4], &[3, 1]).unwrap(), vec![2, 3, 4]);
    }

    #[test]
    fn test_broadcast_shape_incompatible() {
        let err = broadcast_shape(&[2, 3], &[4, 3]).unwrap_err();
        assert!(matches!(err, TensorError::IncompatibleShapes { .. }));
    }

    #[test]
    fn test_broadcast_to_row() {
        // (1, 3) -> (2, 3): each column repeats its single entry
        let a = Array::from_vec(vec![1.0, 2.0, 3.0], &[1, 3]).unwrap();
        let b = broadcast_to(&a, &[2, 3]).unwrap();
        assert_eq!(b.data(), &[1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn test_broadcast_to_rejects_shrinking() {
        let a: Array<f64> = Array::ones(&[2, 3]);
        assert!(broadcast_to(&a, &[3]).is_err());
    }

    #[test]
    fn test_sum_to_shape_leading_axis() {
        let g = Array::from_vec((1..=6).map(|x| x as f64).collect(), &[2, 3]).unwrap();
        // drop axis 0: column sums
        let r = sum_to_shape(&g, &[3]).unwrap();
        assert_eq!(r.data(), &[3.0, 7.0, 11.0]);
    }

    #[test]
    fn test_sum_to_shape_scalar_target() {
        let g: Array<f64> = Array::ones(&[2, 2]);
        let r = sum_to_shape(&g, &[]).unwrap();
        assert_eq!(r.shape(), &[] as &[usize]);
        assert_eq!(r.item(), Some(4.0));
    }

    #[test]
    fn test_sum_to_shape_rejects_non_broadcast() {
        let g: Array<f64> = Array::ones(&[2, 3]);
        assert!(matches!(
            sum_to_shape(&g, &[2]),
            Err(TensorError::CotangentShape { .. })
        ));
        assert!(sum_to_shape(&g, &[1, 2, 3]).is_err());
    }
}
