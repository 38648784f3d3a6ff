//! Shape manipulation: reshape, axis moves, slicing, split and concat.

use crate::autograd::op::Op;
use crate::autograd::record::{record, record_one};
use crate::autograd::tensor::Tensor;
use crate::error::TensorError;
use crate::operations::{self, ResolvedSlice, SliceRange, permutedims, swap_permutation};
use crate::scalar::Scalar;

impl<T: Scalar> Tensor<T> {
    /// Same elements in column-major order under a new shape.
    pub fn reshape(&self, shape: &[usize]) -> Result<Tensor<T>, TensorError> {
        let input = self.data();
        let out = input.reshape(shape)?;
        let op = Op::Reshape {
            input_shape: input.shape().to_vec(),
            output_shape: shape.to_vec(),
        };
        record_one(op, &[self], out)
    }

    /// Remove a size-1 axis.
    pub fn squeeze(&self, axis: usize) -> Result<Tensor<T>, TensorError> {
        let mut shape = self.shape();
        let ndim = shape.len();
        if axis >= ndim || shape[axis] != 1 {
            return Err(TensorError::InvalidAxis { axis, ndim });
        }
        shape.remove(axis);
        self.reshape(&shape)
    }

    /// Insert a size-1 axis at `axis` (which may equal `ndim`).
    pub fn unsqueeze(&self, axis: usize) -> Result<Tensor<T>, TensorError> {
        let mut shape = self.shape();
        let ndim = shape.len();
        if axis > ndim {
            return Err(TensorError::InvalidAxis { axis, ndim });
        }
        shape.insert(axis, 1);
        self.reshape(&shape)
    }

    /// Exchange two axes.
    pub fn transpose(&self, axis0: usize, axis1: usize) -> Result<Tensor<T>, TensorError> {
        self.permute(&swap_permutation(self.ndim(), axis0, axis1)?)
    }

    /// Reorder axes; `perm[i]` is the source axis of result axis `i`.
    pub fn permute(&self, perm: &[usize]) -> Result<Tensor<T>, TensorError> {
        let out = permutedims(&self.data(), perm)?;
        record_one(
            Op::Permute {
                perm: perm.to_vec(),
            },
            &[self],
            out,
        )
    }

    /// Strided sub-array, one [`SliceRange`] per axis.
    ///
    /// # Example
    ///
    /// ```
    /// use ndgrad::Array;
    /// use ndgrad::autograd::Tensor;
    /// use ndgrad::operations::SliceRange;
    ///
    /// let x = Tensor::tracked(Array::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0], &[5]).unwrap()).unwrap();
    /// let y = x.slice(&[SliceRange::new(Some(1), None, 2)]).unwrap();
    /// assert_eq!(y.to_vec(), vec![2.0, 4.0]);
    /// y.sum_all().unwrap().backward().unwrap();
    /// assert_eq!(x.grad().unwrap().data(), &[0.0, 1.0, 0.0, 1.0, 0.0]);
    /// ```
    pub fn slice(&self, ranges: &[SliceRange]) -> Result<Tensor<T>, TensorError> {
        let input = self.data();
        let slice = ResolvedSlice::new(input.shape(), ranges)?;
        let out = slice.gather(&input)?;
        record_one(Op::Slice { slice }, &[self], out)
    }

    /// Cut along `axis` into pieces of the given sizes.
    ///
    /// All pieces come from one recorded operation.
    pub fn split(&self, axis: usize, sizes: &[usize]) -> Result<Vec<Tensor<T>>, TensorError> {
        let outs = operations::split(&self.data(), axis, sizes)?;
        let op = Op::Split {
            axis,
            sizes: sizes.to_vec(),
        };
        record(op, &[self], outs)
    }
}

/// Join tensors along `axis`.
///
/// # Errors
///
/// `ArgumentCount` for an empty slice, `IncompatibleShapes` if the shapes
/// differ off `axis`.
pub fn concat<T: Scalar>(tensors: &[Tensor<T>], axis: usize) -> Result<Tensor<T>, TensorError> {
    let arrays: Vec<_> = tensors.iter().map(Tensor::data).collect();
    let out = operations::concat(&arrays, axis)?;
    let sizes = arrays.iter().map(|a| a.shape()[axis]).collect();
    let inputs: Vec<&Tensor<T>> = tensors.iter().collect();
    record_one(Op::Concat { axis, sizes }, &inputs, out)
}
