//! Element-wise array operations.

use crate::array::Array;
use crate::error::TensorError;
use crate::operations::broadcast::broadcast_shape;
use crate::scalar::Scalar;
use crate::strides::{broadcast_strides, cartesian_to_linear, increment_index, num_elements};

/// Apply a function to each element, returning a new array.
///
/// # Example
///
/// ```
/// use ndgrad::Array;
/// use ndgrad::operations::apply;
///
/// let a = Array::from_vec(vec![1.0, 4.0, 9.0], &[3]).unwrap();
/// let r = apply(&a, |x: f64| x.sqrt());
/// assert_eq!(r.data(), &[1.0, 2.0, 3.0]);
/// ```
pub fn apply<T: Scalar>(array: &Array<T>, f: impl Fn(T) -> T) -> Array<T> {
    array.map(f)
}

/// Apply a function through `f64`, for transcendental kernels.
pub fn apply_f64<T: Scalar>(array: &Array<T>, f: impl Fn(f64) -> f64) -> Array<T> {
    array.map(|x| T::from_f64(f(x.as_f64())))
}

/// Combine two arrays of identical shape element by element.
///
/// # Errors
///
/// `TensorError::IncompatibleShapes` if the shapes differ.
pub fn apply_binary<T: Scalar>(
    lhs: &Array<T>,
    rhs: &Array<T>,
    f: impl Fn(T, T) -> T,
) -> Result<Array<T>, TensorError> {
    if lhs.shape() != rhs.shape() {
        return Err(TensorError::IncompatibleShapes {
            lhs: lhs.shape().to_vec(),
            rhs: rhs.shape().to_vec(),
        });
    }
    let data = lhs
        .data()
        .iter()
        .zip(rhs.data())
        .map(|(&a, &b)| f(a, b))
        .collect();
    Array::from_vec(data, lhs.shape())
}

/// Combine two arrays element by element after broadcasting them together.
///
/// # Example
///
/// ```
/// use ndgrad::Array;
/// use ndgrad::operations::zip_broadcast;
///
/// let a = Array::from_vec(vec![1.0, 2.0], &[2, 1]).unwrap();
/// let b = Array::from_vec(vec![10.0, 20.0, 30.0], &[3]).unwrap();
/// let c = zip_broadcast(&a, &b, |x, y| x + y).unwrap();
/// assert_eq!(c.shape(), &[2, 3]);
/// assert_eq!(c.get(&[1, 2]), Some(&32.0));
/// ```
pub fn zip_broadcast<T: Scalar>(
    lhs: &Array<T>,
    rhs: &Array<T>,
    f: impl Fn(T, T) -> T,
) -> Result<Array<T>, TensorError> {
    if lhs.shape() == rhs.shape() {
        return apply_binary(lhs, rhs, f);
    }
    let shape = broadcast_shape(lhs.shape(), rhs.shape())?;
    let lhs_strides = broadcast_strides(lhs.shape(), &shape);
    let rhs_strides = broadcast_strides(rhs.shape(), &shape);
    let (a, b) = (lhs.data(), rhs.data());

    let total = num_elements(&shape);
    let mut data = Vec::with_capacity(total);
    let mut index = vec![0usize; shape.len()];
    for _ in 0..total {
        let x = a[cartesian_to_linear(&index, &lhs_strides)];
        let y = b[cartesian_to_linear(&index, &rhs_strides)];
        data.push(f(x, y));
        increment_index(&mut index, &shape);
    }
    Array::from_vec(data, &shape)
}

/// Broadcasting element-wise sum.
pub fn add<T: Scalar>(lhs: &Array<T>, rhs: &Array<T>) -> Result<Array<T>, TensorError> {
    zip_broadcast(lhs, rhs, |a, b| a + b)
}

/// Broadcasting element-wise difference.
pub fn sub<T: Scalar>(lhs: &Array<T>, rhs: &Array<T>) -> Result<Array<T>, TensorError> {
    zip_broadcast(lhs, rhs, |a, b| a - b)
}

/// Broadcasting element-wise product.
pub fn mul<T: Scalar>(lhs: &Array<T>, rhs: &Array<T>) -> Result<Array<T>, TensorError> {
    zip_broadcast(lhs, rhs, |a, b| a * b)
}

/// Broadcasting element-wise quotient.
pub fn div<T: Scalar>(lhs: &Array<T>, rhs: &Array<T>) -> Result<Array<T>, TensorError> {
    zip_broadcast(lhs, rhs, |a, b| a / b)
}

/// Element-wise negation.
pub fn neg<T: Scalar>(array: &Array<T>) -> Array<T> {
    array.map(|x| T::zero() - x)
}

/// Multiply all elements by a scalar, returning a new array.
///
/// # Example
///
/// ```
/// use ndgrad::Array;
/// use ndgrad::operations::scale;
///
/// let a = Array::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
/// assert_eq!(scale(&a, 2.0).data(), &[2.0, 4.0, 6.0]);
/// ```
pub fn scale<T: Scalar>(array: &Array<T>, alpha: T) -> Array<T> {
    array.map(|x| x * alpha)
}

/// 1 where `x > 0`, else 0.
pub fn positive_mask<T: Scalar>(array: &Array<T>) -> Array<T> {
    array.map(|x| if x > T::zero() { T::one() } else { T::zero() })
}
