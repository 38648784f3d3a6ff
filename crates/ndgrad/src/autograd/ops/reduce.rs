//! Reductions over axes.

use crate::autograd::op::{Extremum, Op};
use crate::autograd::record::record_one;
use crate::autograd::tensor::Tensor;
use crate::error::TensorError;
use crate::operations::{
    max_axes, min_axes, reduced_shape, reduction_count, scale, sum_axes, validate_axes,
};
use crate::scalar::Scalar;

impl<T: Scalar> Tensor<T> {
    /// Sum over `axes`. With `keepdims` the reduced axes stay as size 1.
    ///
    /// An empty `axes` slice reduces nothing.
    pub fn sum(&self, axes: &[usize], keepdims: bool) -> Result<Tensor<T>, TensorError> {
        let input = self.data();
        let out = sum_axes(&input, axes, keepdims)?;
        let op = Op::Sum {
            input_shape: input.shape().to_vec(),
            axes: axes.to_vec(),
            keepdims,
        };
        record_one(op, &[self], out)
    }

    /// Sum of every element, as a rank-0 value.
    pub fn sum_all(&self) -> Result<Tensor<T>, TensorError> {
        self.sum(&self.all_axes(), false)
    }

    /// Mean over `axes`.
    pub fn mean(&self, axes: &[usize], keepdims: bool) -> Result<Tensor<T>, TensorError> {
        let input = self.data();
        validate_axes(axes, input.ndim())?;
        let count = reduction_count(input.shape(), axes);
        let out = scale(&sum_axes(&input, axes, keepdims)?, T::one() / T::from_usize(count));
        let op = Op::Mean {
            input_shape: input.shape().to_vec(),
            axes: axes.to_vec(),
            keepdims,
        };
        record_one(op, &[self], out)
    }

    /// Mean of every element, as a rank-0 value.
    pub fn mean_all(&self) -> Result<Tensor<T>, TensorError> {
        self.mean(&self.all_axes(), false)
    }

    /// Maximum over `axes`. Gradients are shared equally between ties.
    pub fn max(&self, axes: &[usize], keepdims: bool) -> Result<Tensor<T>, TensorError> {
        self.extremum(Extremum::Max, axes, keepdims)
    }

    /// Minimum over `axes`. Gradients are shared equally between ties.
    pub fn min(&self, axes: &[usize], keepdims: bool) -> Result<Tensor<T>, TensorError> {
        self.extremum(Extremum::Min, axes, keepdims)
    }

    fn extremum(
        &self,
        kind: Extremum,
        axes: &[usize],
        keepdims: bool,
    ) -> Result<Tensor<T>, TensorError> {
        let input = self.data();
        let selected = match kind {
            Extremum::Max => max_axes(&input, axes, true)?,
            Extremum::Min => min_axes(&input, axes, true)?,
        };
        let out = if keepdims {
            selected.clone()
        } else {
            let mask = validate_axes(axes, input.ndim())?;
            selected.reshape(&reduced_shape(input.shape(), &mask, false))?
        };
        let op = Op::Extremum {
            kind,
            input,
            selected,
            axes: axes.to_vec(),
            keepdims,
        };
        record_one(op, &[self], out)
    }

    fn all_axes(&self) -> Vec<usize> {
        (0..self.ndim()).collect()
    }
}
