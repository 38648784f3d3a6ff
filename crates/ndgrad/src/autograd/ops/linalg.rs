//! Matrix products.

use crate::autograd::op::Op;
use crate::autograd::record::record_one;
use crate::autograd::tensor::Tensor;
use crate::error::TensorError;
use crate::operations::matmul;
use crate::scalar::Scalar;

impl<T: Scalar> Tensor<T> {
    /// Matrix product `self @ other`.
    ///
    /// Leading axes are batch axes and broadcast. A 1-D operand is promoted
    /// to a matrix and the inserted axis is dropped from the result.
    ///
    /// # Example
    ///
    /// ```
    /// use ndgrad::Array;
    /// use ndgrad::autograd::Tensor;
    ///
    /// let a = Tensor::tracked(Array::<f64>::ones(&[2, 3])).unwrap();
    /// let b = Tensor::tracked(Array::<f64>::ones(&[3, 4])).unwrap();
    /// let c = a.matmul(&b).unwrap();
    /// assert_eq!(c.shape(), vec![2, 4]);
    /// c.sum_all().unwrap().backward().unwrap();
    /// assert_eq!(a.grad().unwrap().data(), &[4.0; 6]);
    /// ```
    pub fn matmul(&self, other: &Tensor<T>) -> Result<Tensor<T>, TensorError> {
        let (lhs, rhs) = (self.data(), other.data());
        let out = matmul(&lhs, &rhs)?;
        record_one(Op::Matmul { lhs, rhs }, &[self, other], out)
    }

    /// Inner product of two vectors, as a rank-0 value.
    pub fn dot(&self, other: &Tensor<T>) -> Result<Tensor<T>, TensorError> {
        for t in [self, other] {
            if t.ndim() != 1 {
                return Err(TensorError::RankMismatch {
                    expected: 1,
                    actual: t.ndim(),
                });
            }
        }
        self.matmul(other)
    }
}
