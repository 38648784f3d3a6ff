//! Broadcasting binary operations and scalar scaling.

use std::ops;

use crate::autograd::op::Op;
use crate::autograd::record::record_one;
use crate::autograd::tensor::Tensor;
use crate::error::TensorError;
use crate::operations::{self, zip_broadcast};
use crate::scalar::Scalar;

impl<T: Scalar> Tensor<T> {
    /// Element-wise `self + other` with broadcasting.
    pub fn add(&self, other: &Tensor<T>) -> Result<Tensor<T>, TensorError> {
        let out = operations::add(&self.data(), &other.data())?;
        record_one(Op::Add, &[self, other], out)
    }

    /// Element-wise `self - other` with broadcasting.
    pub fn sub(&self, other: &Tensor<T>) -> Result<Tensor<T>, TensorError> {
        let out = operations::sub(&self.data(), &other.data())?;
        record_one(Op::Sub, &[self, other], out)
    }

    /// Element-wise `self * other` with broadcasting.
    pub fn mul(&self, other: &Tensor<T>) -> Result<Tensor<T>, TensorError> {
        let (lhs, rhs) = (self.data(), other.data());
        let out = operations::mul(&lhs, &rhs)?;
        record_one(Op::Mul { lhs, rhs }, &[self, other], out)
    }

    /// Element-wise `self / other` with broadcasting.
    pub fn div(&self, other: &Tensor<T>) -> Result<Tensor<T>, TensorError> {
        let (lhs, rhs) = (self.data(), other.data());
        let out = operations::div(&lhs, &rhs)?;
        record_one(Op::Div { lhs, rhs }, &[self, other], out)
    }

    /// Element-wise `self ^ exponent` with broadcasting.
    ///
    /// The derivative with respect to the exponent uses `ln(self)`, so it is
    /// only finite for positive bases.
    pub fn pow(&self, exponent: &Tensor<T>) -> Result<Tensor<T>, TensorError> {
        let (base, exp) = (self.data(), exponent.data());
        let out = zip_broadcast(&base, &exp, |x, y| {
            T::from_f64(x.as_f64().powf(y.as_f64()))
        })?;
        let op = Op::Pow {
            base,
            exponent: exp,
            output: out.clone(),
        };
        record_one(op, &[self, exponent], out)
    }

    /// Element-wise `self ^ exponent` for a constant exponent.
    pub fn pow_scalar(&self, exponent: T) -> Result<Tensor<T>, TensorError> {
        let input = self.data();
        let e = exponent.as_f64();
        let out = operations::apply_f64(&input, |x| x.powf(e));
        record_one(Op::PowScalar { input, exponent }, &[self], out)
    }

    pub fn neg(&self) -> Result<Tensor<T>, TensorError> {
        let out = operations::neg(&self.data());
        record_one(Op::Neg, &[self], out)
    }

    /// Multiply every element by a constant.
    pub fn scale(&self, alpha: T) -> Result<Tensor<T>, TensorError> {
        let out = operations::scale(&self.data(), alpha);
        record_one(Op::Scale { alpha }, &[self], out)
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident) => {
        impl<T: Scalar> ops::$trait<&Tensor<T>> for &Tensor<T> {
            type Output = Result<Tensor<T>, TensorError>;

            fn $method(self, rhs: &Tensor<T>) -> Self::Output {
                Tensor::$method(self, rhs)
            }
        }
    };
}

impl_binary_op!(Add, add);
impl_binary_op!(Sub, sub);
impl_binary_op!(Mul, mul);
impl_binary_op!(Div, div);

impl<T: Scalar> ops::Neg for &Tensor<T> {
    type Output = Result<Tensor<T>, TensorError>;

    fn neg(self) -> Self::Output {
        Tensor::neg(self)
    }
}
