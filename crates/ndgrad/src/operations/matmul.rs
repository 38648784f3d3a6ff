//! Matrix product with batch broadcasting.
//!
//! The last two axes of each operand are the matrix axes; leading axes are
//! batch axes and broadcast against each other. A 1-D left operand is
//! treated as a row vector and a 1-D right operand as a column vector; the
//! inserted axis is removed from the result.

use crate::array::Array;
use crate::error::TensorError;
use crate::operations::broadcast::broadcast_shape;
use crate::operations::permutedims::{permutedims, swap_permutation};
use crate::scalar::Scalar;
use crate::strides::{cartesian_to_linear, compute_strides, increment_index, num_elements};

/// Shapes involved in a matmul, before and after 1-D promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatmulShapes {
    /// Left operand shape after promotion (rank >= 2).
    pub lhs: Vec<usize>,
    /// Right operand shape after promotion (rank >= 2).
    pub rhs: Vec<usize>,
    /// Broadcast batch shape.
    pub batch: Vec<usize>,
    /// Result shape with both matrix axes present.
    pub out_promoted: Vec<usize>,
    /// Result shape with promoted axes removed.
    pub out: Vec<usize>,
}

impl MatmulShapes {
    /// Resolve the shapes of `lhs @ rhs`.
    pub fn new(lhs: &[usize], rhs: &[usize]) -> Result<Self, TensorError> {
        for shape in [lhs, rhs] {
            if shape.is_empty() {
                return Err(TensorError::RankMismatch {
                    expected: 1,
                    actual: 0,
                });
            }
        }
        let lhs_p = if lhs.len() == 1 { vec![1, lhs[0]] } else { lhs.to_vec() };
        let rhs_p = if rhs.len() == 1 { vec![rhs[0], 1] } else { rhs.to_vec() };
        let (lb, lm) = lhs_p.split_at(lhs_p.len() - 2);
        let (rb, rm) = rhs_p.split_at(rhs_p.len() - 2);
        if lm[1] != rm[0] {
            return Err(TensorError::IncompatibleShapes {
                lhs: lhs.to_vec(),
                rhs: rhs.to_vec(),
            });
        }
        let batch = broadcast_shape(lb, rb).map_err(|_| TensorError::IncompatibleShapes {
            lhs: lhs.to_vec(),
            rhs: rhs.to_vec(),
        })?;

        let mut out_promoted = batch.clone();
        out_promoted.extend([lm[0], rm[1]]);
        let mut out = batch.clone();
        if lhs.len() > 1 {
            out.push(lm[0]);
        }
        if rhs.len() > 1 {
            out.push(rm[1]);
        }
        Ok(Self {
            lhs: lhs_p,
            rhs: rhs_p,
            batch,
            out_promoted,
            out,
        })
    }
}

/// Matrix product `lhs @ rhs`.
///
/// # Example
///
/// ```
/// use ndgrad::Array;
/// use ndgrad::operations::matmul;
///
/// // column-major [[1, 2], [3, 4]]
/// let a = Array::from_vec(vec![1.0, 3.0, 2.0, 4.0], &[2, 2]).unwrap();
/// let v = Array::from_vec(vec![1.0, 1.0], &[2]).unwrap();
/// assert_eq!(matmul(&a, &v).unwrap().data(), &[3.0, 7.0]);
/// assert_eq!(matmul(&v, &v).unwrap().item(), Some(2.0));
/// ```
pub fn matmul<T: Scalar>(lhs: &Array<T>, rhs: &Array<T>) -> Result<Array<T>, TensorError> {
    let shapes = MatmulShapes::new(lhs.shape(), rhs.shape())?;
    let nb = shapes.batch.len();
    let nl = shapes.lhs.len();
    let (m, k, n) = (shapes.lhs[nl - 2], shapes.lhs[nl - 1], shapes.rhs[shapes.rhs.len() - 1]);
    let (lhs_batch, ls) = batch_strides(&shapes.lhs, &shapes.batch);
    let (rhs_batch, rs) = batch_strides(&shapes.rhs, &shapes.batch);
    let os = compute_strides(&shapes.out_promoted);

    let (a, b) = (lhs.data(), rhs.data());
    let mut data = vec![T::zero(); num_elements(&shapes.out_promoted)];
    let mut index = vec![0usize; nb];
    for _ in 0..num_elements(&shapes.batch) {
        let a_off = cartesian_to_linear(&index, &lhs_batch);
        let b_off = cartesian_to_linear(&index, &rhs_batch);
        let o_off = cartesian_to_linear(&index, &os[..nb]);
        for j in 0..n {
            for p in 0..k {
                let bv = b[b_off + p * rs[0] + j * rs[1]];
                for i in 0..m {
                    let o = o_off + i * os[nb] + j * os[nb + 1];
                    data[o] = data[o] + a[a_off + i * ls[0] + p * ls[1]] * bv;
                }
            }
        }
        increment_index(&mut index, &shapes.batch);
    }
    Array::from_vec(data, &shapes.out_promoted)?.reshape(&shapes.out)
}

/// Strides of the batch axes (broadcast against `batch`) and of the two
/// matrix axes, for an operand of column-major `shape`.
fn batch_strides(shape: &[usize], batch: &[usize]) -> (Vec<usize>, [usize; 2]) {
    let strides = compute_strides(shape);
    let nb = shape.len() - 2;
    let offset = batch.len() - nb;
    let batch_strides = (0..batch.len())
        .map(|axis| {
            if axis < offset || shape[axis - offset] == 1 {
                0
            } else {
                strides[axis - offset]
            }
        })
        .collect();
    (batch_strides, [strides[nb], strides[nb + 1]])
}

/// Swap the last two axes.
pub fn matrix_transpose<T: Scalar>(array: &Array<T>) -> Result<Array<T>, TensorError> {
    let ndim = array.ndim();
    if ndim < 2 {
        return Err(TensorError::RankMismatch {
            expected: 2,
            actual: ndim,
        });
    }
    permutedims(array, &swap_permutation(ndim, ndim - 2, ndim - 1)?)
}
