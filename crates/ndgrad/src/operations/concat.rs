//! Concatenation and splitting along an axis.

use crate::array::Array;
use crate::error::TensorError;
use crate::operations::slice::{SliceRange, slice};
use crate::scalar::Scalar;
use crate::strides::{cartesian_to_linear, compute_strides, increment_index};

/// Join arrays along `axis`. All other axes must agree.
///
/// # Example
///
/// ```
/// use ndgrad::Array;
/// use ndgrad::operations::concat;
///
/// let a: Array<f64> = Array::zeros(&[2, 1]);
/// let b: Array<f64> = Array::ones(&[2, 3]);
/// let c = concat(&[a, b], 1).unwrap();
/// assert_eq!(c.shape(), &[2, 4]);
/// assert_eq!(c.get(&[1, 0]), Some(&0.0));
/// assert_eq!(c.get(&[1, 3]), Some(&1.0));
/// ```
pub fn concat<T: Scalar>(arrays: &[Array<T>], axis: usize) -> Result<Array<T>, TensorError> {
    let first = arrays.first().ok_or(TensorError::ArgumentCount {
        expected: 1,
        actual: 0,
    })?;
    let ndim = first.ndim();
    if axis >= ndim {
        return Err(TensorError::InvalidAxis { axis, ndim });
    }
    let mut shape = first.shape().to_vec();
    shape[axis] = 0;
    for array in arrays {
        let compatible = array.ndim() == ndim
            && array
                .shape()
                .iter()
                .zip(first.shape())
                .enumerate()
                .all(|(i, (a, b))| i == axis || a == b);
        if !compatible {
            return Err(TensorError::IncompatibleShapes {
                lhs: first.shape().to_vec(),
                rhs: array.shape().to_vec(),
            });
        }
        shape[axis] += array.shape()[axis];
    }

    let out_strides = compute_strides(&shape);
    let mut out = Array::zeros(&shape);
    let dst = out.data_mut();
    let mut offset = 0;
    for array in arrays {
        let mut index = vec![0usize; ndim];
        for &x in array.data() {
            index[axis] += offset;
            dst[cartesian_to_linear(&index, &out_strides)] = x;
            index[axis] -= offset;
            increment_index(&mut index, array.shape());
        }
        offset += array.shape()[axis];
    }
    Ok(out)
}

/// Split `array` along `axis` into consecutive pieces of the given sizes.
///
/// # Errors
///
/// `IncompatibleShapes` if the sizes do not add up to the axis length.
pub fn split<T: Scalar>(
    array: &Array<T>,
    axis: usize,
    sizes: &[usize],
) -> Result<Vec<Array<T>>, TensorError> {
    let ndim = array.ndim();
    if axis >= ndim {
        return Err(TensorError::InvalidAxis { axis, ndim });
    }
    if sizes.iter().sum::<usize>() != array.shape()[axis] {
        return Err(TensorError::IncompatibleShapes {
            lhs: array.shape().to_vec(),
            rhs: sizes.to_vec(),
        });
    }
    let mut ranges = vec![SliceRange::full(); ndim];
    let mut start = 0;
    sizes
        .iter()
        .map(|&size| {
            ranges[axis] = SliceRange::range(start as isize, (start + size) as isize);
            start += size;
            slice(array, &ranges)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_axis0() {
        let a = Array::from_vec(vec![1.0, 2.0], &[1, 2]).unwrap();
        let b = Array::from_vec(vec![3.0, 4.0, 5.0, 6.0], &[2, 2]).unwrap();
        let c = concat(&[a, b], 0).unwrap();
        assert_eq!(c.shape(), &[3, 2]);
        // column 0: 1, 3, 4; column 1: 2, 5, 6
        assert_eq!(c.data(), &[1.0, 3.0, 4.0, 2.0, 5.0, 6.0]);
    }

    #[test]
    fn test_split_then_concat() {
        let a = Array::from_vec((0..12).map(|x| x as f64).collect(), &[3, 4]).unwrap();
        let parts = split(&a, 1, &[1, 3]).unwrap();
        assert_eq!(parts[0].shape(), &[3, 1]);
        assert_eq!(parts[1].shape(), &[3, 3]);
        assert_eq!(concat(&parts, 1).unwrap(), a);
    }

    #[test]
    fn test_concat_errors() {
        let a: Array<f64> = Array::ones(&[2, 2]);
        let b: Array<f64> = Array::ones(&[3, 3]);
        assert!(concat(&[a.clone(), b], 0).is_err());
        assert!(concat(&[a.clone()], 2).is_err());
        assert!(concat::<f64>(&[], 0).is_err());
    }

    #[test]
    fn test_split_sizes_must_cover_axis() {
        let a: Array<f64> = Array::ones(&[4]);
        assert!(split(&a, 0, &[1, 2]).is_err());
        assert_eq!(split(&a, 0, &[2, 2]).unwrap().len(), 2);
    }
}
