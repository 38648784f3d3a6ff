//! Element-wise unary functions.

use crate::autograd::op::Op;
use crate::autograd::record::record_one;
use crate::autograd::tensor::Tensor;
use crate::error::TensorError;
use crate::operations::apply_f64;
use crate::scalar::Scalar;

impl<T: Scalar> Tensor<T> {
    pub fn exp(&self) -> Result<Tensor<T>, TensorError> {
        let output = apply_f64(&self.data(), f64::exp);
        record_one(
            Op::Exp {
                output: output.clone(),
            },
            &[self],
            output,
        )
    }

    /// Natural logarithm.
    pub fn log(&self) -> Result<Tensor<T>, TensorError> {
        let input = self.data();
        let output = apply_f64(&input, f64::ln);
        record_one(Op::Log { input }, &[self], output)
    }

    pub fn sin(&self) -> Result<Tensor<T>, TensorError> {
        let input = self.data();
        let output = apply_f64(&input, f64::sin);
        record_one(Op::Sin { input }, &[self], output)
    }

    pub fn cos(&self) -> Result<Tensor<T>, TensorError> {
        let input = self.data();
        let output = apply_f64(&input, f64::cos);
        record_one(Op::Cos { input }, &[self], output)
    }

    pub fn sqrt(&self) -> Result<Tensor<T>, TensorError> {
        let output = apply_f64(&self.data(), f64::sqrt);
        record_one(
            Op::Sqrt {
                output: output.clone(),
            },
            &[self],
            output,
        )
    }

    pub fn tanh(&self) -> Result<Tensor<T>, TensorError> {
        let output = apply_f64(&self.data(), f64::tanh);
        record_one(
            Op::Tanh {
                output: output.clone(),
            },
            &[self],
            output,
        )
    }

    /// Logistic function `1 / (1 + e^-x)`.
    pub fn sigmoid(&self) -> Result<Tensor<T>, TensorError> {
        let output = apply_f64(&self.data(), |x| 1.0 / (1.0 + (-x).exp()));
        record_one(
            Op::Sigmoid {
                output: output.clone(),
            },
            &[self],
            output,
        )
    }

    /// `max(x, 0)`. The derivative at zero is taken as zero.
    pub fn relu(&self) -> Result<Tensor<T>, TensorError> {
        let input = self.data();
        let output = input.map(|x| if x > T::zero() { x } else { T::zero() });
        record_one(Op::Relu { input }, &[self], output)
    }

    /// Absolute value. The derivative at zero is taken as zero.
    pub fn abs(&self) -> Result<Tensor<T>, TensorError> {
        let input = self.data();
        let output = input.map(|x| if x < T::zero() { T::zero() - x } else { x });
        record_one(Op::Abs { input }, &[self], output)
    }

    pub fn square(&self) -> Result<Tensor<T>, TensorError> {
        let input = self.data();
        let output = input.map(|x| x * x);
        record_one(Op::Square { input }, &[self], output)
    }

    /// Identity as a recorded operation. The result owns its own buffer.
    pub fn copy(&self) -> Result<Tensor<T>, TensorError> {
        let data = self.data();
        let output = data.map(|x| x);
        record_one(Op::Copy, &[self], output)
    }
}

#[cfg(test)]
mod tests {
    use crate::array::Array;
    use crate::autograd::Tensor;
    use approx::assert_relative_eq;

    fn grad_of(f: impl Fn(&Tensor<f64>) -> Tensor<f64>, x: f64) -> f64 {
        let t = Tensor::tracked(Array::from_vec(vec![x], &[1]).unwrap()).unwrap();
        f(&t).sum_all().unwrap().backward().unwrap();
        t.grad().unwrap().data()[0]
    }

    #[test]
    fn test_derivatives_at_point() {
        let x = 0.7;
        assert_relative_eq!(grad_of(|t| t.exp().unwrap(), x), x.exp());
        assert_relative_eq!(grad_of(|t| t.log().unwrap(), x), 1.0 / x);
        assert_relative_eq!(grad_of(|t| t.sin().unwrap(), x), x.cos());
        assert_relative_eq!(grad_of(|t| t.cos().unwrap(), x), -x.sin());
        assert_relative_eq!(grad_of(|t| t.sqrt().unwrap(), x), 0.5 / x.sqrt());
        assert_relative_eq!(
            grad_of(|t| t.tanh().unwrap(), x),
            1.0 - x.tanh().powi(2),
            epsilon = 1e-12
        );
        let s = 1.0 / (1.0 + (-x).exp());
        assert_relative_eq!(grad_of(|t| t.sigmoid().unwrap(), x), s * (1.0 - s), epsilon = 1e-12);
        assert_relative_eq!(grad_of(|t| t.relu().unwrap(), x), 1.0);
        assert_relative_eq!(grad_of(|t| t.relu().unwrap(), -x), 0.0);
        assert_relative_eq!(grad_of(|t| t.abs().unwrap(), x), 1.0);
        assert_relative_eq!(grad_of(|t| t.abs().unwrap(), -x), -1.0);
        assert_relative_eq!(grad_of(|t| t.abs().unwrap(), 0.0), 0.0);
        assert_relative_eq!(grad_of(|t| t.square().unwrap(), -x), -2.0 * x);
    }

    #[test]
    fn test_copy_is_independent() {
        let x = Tensor::tracked(Array::<f64>::ones(&[3])).unwrap();
        let y = x.copy().unwrap();
        assert!(!y.data().shares_storage_with(&x.data()));
        y.sum_all().unwrap().backward().unwrap();
        assert_eq!(x.grad().unwrap().data(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_abs_and_square_values() {
        let x = Tensor::from_vec(vec![-3_i64, 0, 2], &[3]).unwrap();
        assert_eq!(x.abs().unwrap().to_vec(), vec![3, 0, 2]);
        assert_eq!(x.square().unwrap().to_vec(), vec![9, 0, 4]);
    }

    #[test]
    fn test_f32_unary() {
        let x = Tensor::tracked(Array::<f32>::full(&[2], 0.0)).unwrap();
        x.sin().unwrap().sum_all().unwrap().backward().unwrap();
        assert_eq!(x.grad().unwrap().data(), &[1.0_f32, 1.0]);
    }
}
