//! Operation kinds and their local derivative rules.
//!
//! Each variant carries whatever its rules need from the forward pass.
//! `vjp` maps output cotangents to one cotangent per input (cotangents may
//! still have the broadcast output shape; the executor reduces them).
//! `jvp` maps one tangent per input to one tangent per output.

use crate::array::Array;
use crate::error::TensorError;
use crate::operations::{
    MatmulShapes, ResolvedSlice, add, apply_f64, broadcast_to, concat, div, inverse_permutation,
    matmul, matrix_transpose, mul, neg, permutedims, positive_mask, reduced_shape, reduction_count,
    scale, split, sub, sum_axes, sum_to_shape, validate_axes, zip_broadcast,
};
use crate::scalar::Scalar;

/// Which extremum a reduction selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Extremum {
    Max,
    Min,
}

/// A recorded operation.
#[derive(Debug, Clone)]
pub(crate) enum Op<T: Scalar> {
    Leaf,
    Add,
    Sub,
    Mul {
        lhs: Array<T>,
        rhs: Array<T>,
    },
    Div {
        lhs: Array<T>,
        rhs: Array<T>,
    },
    Pow {
        base: Array<T>,
        exponent: Array<T>,
        output: Array<T>,
    },
    PowScalar {
        input: Array<T>,
        exponent: T,
    },
    Neg,
    Scale {
        alpha: T,
    },
    Exp {
        output: Array<T>,
    },
    Log {
        input: Array<T>,
    },
    Sin {
        input: Array<T>,
    },
    Cos {
        input: Array<T>,
    },
    Sqrt {
        output: Array<T>,
    },
    Tanh {
        output: Array<T>,
    },
    Sigmoid {
        output: Array<T>,
    },
    Relu {
        input: Array<T>,
    },
    Abs {
        input: Array<T>,
    },
    Square {
        input: Array<T>,
    },
    Matmul {
        lhs: Array<T>,
        rhs: Array<T>,
    },
    Sum {
        input_shape: Vec<usize>,
        axes: Vec<usize>,
        keepdims: bool,
    },
    Mean {
        input_shape: Vec<usize>,
        axes: Vec<usize>,
        keepdims: bool,
    },
    Extremum {
        kind: Extremum,
        input: Array<T>,
        /// Reduced values with reduced axes kept as size 1.
        selected: Array<T>,
        axes: Vec<usize>,
        keepdims: bool,
    },
    Reshape {
        input_shape: Vec<usize>,
        output_shape: Vec<usize>,
    },
    Permute {
        perm: Vec<usize>,
    },
    Slice {
        slice: ResolvedSlice,
    },
    Concat {
        axis: usize,
        sizes: Vec<usize>,
    },
    Split {
        axis: usize,
        sizes: Vec<usize>,
    },
    Copy,
}

fn powf<T: Scalar>(x: T, y: T) -> T {
    T::from_f64(x.as_f64().powf(y.as_f64()))
}

impl<T: Scalar> Op<T> {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Op::Leaf => "leaf",
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul { .. } => "mul",
            Op::Div { .. } => "div",
            Op::Pow { .. } => "pow",
            Op::PowScalar { .. } => "pow_scalar",
            Op::Neg => "neg",
            Op::Scale { .. } => "scale",
            Op::Exp { .. } => "exp",
            Op::Log { .. } => "log",
            Op::Sin { .. } => "sin",
            Op::Cos { .. } => "cos",
            Op::Sqrt { .. } => "sqrt",
            Op::Tanh { .. } => "tanh",
            Op::Sigmoid { .. } => "sigmoid",
            Op::Relu { .. } => "relu",
            Op::Abs { .. } => "abs",
            Op::Square { .. } => "square",
            Op::Matmul { .. } => "matmul",
            Op::Sum { .. } => "sum",
            Op::Mean { .. } => "mean",
            Op::Extremum {
                kind: Extremum::Max,
                ..
            } => "max",
            Op::Extremum {
                kind: Extremum::Min,
                ..
            } => "min",
            Op::Reshape { .. } => "reshape",
            Op::Permute { .. } => "permute",
            Op::Slice { .. } => "slice",
            Op::Concat { .. } => "concat",
            Op::Split { .. } => "split",
            Op::Copy => "copy",
        }
    }

    /// Element-wise derivative `dy/dx` of a unary element-wise operation.
    fn elementwise_derivative(&self) -> Result<Array<T>, TensorError> {
        let one = T::one();
        let two = one + one;
        let derivative = match self {
            Op::PowScalar { input, exponent } => {
                let e = *exponent;
                input.map(|x| e * powf(x, e - one))
            }
            Op::Exp { output } => output.clone(),
            Op::Log { input } => input.map(|x| one / x),
            Op::Sin { input } => apply_f64(input, f64::cos),
            Op::Cos { input } => apply_f64(input, |x| -x.sin()),
            Op::Sqrt { output } => output.map(|y| one / (two * y)),
            Op::Tanh { output } => output.map(|y| one - y * y),
            Op::Sigmoid { output } => output.map(|y| y * (one - y)),
            Op::Relu { input } => positive_mask(input),
            // sign(x), zero at zero
            Op::Abs { input } => input.map(|x| {
                if x > T::zero() {
                    one
                } else if x < T::zero() {
                    T::zero() - one
                } else {
                    T::zero()
                }
            }),
            Op::Square { input } => input.map(|x| two * x),
            other => {
                return Err(TensorError::InvalidOperation(format!(
                    "{} is not an element-wise unary operation",
                    other.name()
                )));
            }
        };
        Ok(derivative)
    }

    /// Per-element weights routing a reduced value back to the elements
    /// that attained it. Ties share the weight equally.
    fn extremum_weights(
        input: &Array<T>,
        selected: &Array<T>,
        axes: &[usize],
    ) -> Result<Array<T>, TensorError> {
        let mask = zip_broadcast(input, selected, |x, m| {
            if x == m { T::one() } else { T::zero() }
        })?;
        let count = sum_axes(&mask, axes, true)?;
        div(&mask, &count)
    }

    /// Reverse rule: one cotangent per input.
    pub(crate) fn vjp(&self, cotangents: &[Array<T>]) -> Result<Vec<Array<T>>, TensorError> {
        let g = &cotangents[0];
        let grads = match self {
            Op::Leaf => Vec::new(),
            Op::Add => vec![g.clone(), g.clone()],
            Op::Sub => vec![g.clone(), neg(g)],
            Op::Mul { lhs, rhs } => vec![mul(g, rhs)?, mul(g, lhs)?],
            Op::Div { lhs, rhs } => {
                let g_over_b = div(g, rhs)?;
                let minus_a_over_b = neg(&div(lhs, rhs)?);
                vec![g_over_b.clone(), mul(&g_over_b, &minus_a_over_b)?]
            }
            Op::Pow {
                base,
                exponent,
                output,
            } => {
                let d_base = zip_broadcast(base, exponent, |x, y| y * powf(x, y - T::one()))?;
                vec![mul(g, &d_base)?, mul(g, &exponent_partial(base, output)?)?]
            }
            Op::Neg => vec![neg(g)],
            Op::Scale { alpha } => vec![scale(g, *alpha)],
            Op::Matmul { lhs, rhs } => {
                let shapes = MatmulShapes::new(lhs.shape(), rhs.shape())?;
                let a = lhs.reshape(&shapes.lhs)?;
                let b = rhs.reshape(&shapes.rhs)?;
                let g = g.reshape(&shapes.out_promoted)?;
                let ga = matmul(&g, &matrix_transpose(&b)?)?;
                let gb = matmul(&matrix_transpose(&a)?, &g)?;
                vec![
                    sum_to_shape(&ga, &shapes.lhs)?.reshape(lhs.shape())?,
                    sum_to_shape(&gb, &shapes.rhs)?.reshape(rhs.shape())?,
                ]
            }
            Op::Sum {
                input_shape,
                axes,
                keepdims,
            } => vec![expand_reduced(g, input_shape, axes, *keepdims)?],
            Op::Mean {
                input_shape,
                axes,
                keepdims,
            } => {
                let expanded = expand_reduced(g, input_shape, axes, *keepdims)?;
                vec![scale(&expanded, mean_factor(input_shape, axes))]
            }
            Op::Extremum {
                input,
                selected,
                axes,
                keepdims,
                ..
            } => {
                let weights = Self::extremum_weights(input, selected, axes)?;
                let g = if *keepdims {
                    g.clone()
                } else {
                    g.reshape(selected.shape())?
                };
                vec![mul(&weights, &g)?]
            }
            Op::Reshape { input_shape, .. } => vec![g.reshape(input_shape)?],
            Op::Permute { perm } => vec![permutedims(g, &inverse_permutation(perm))?],
            Op::Slice { slice } => vec![slice.scatter(g)?],
            Op::Concat { axis, sizes } => split(g, *axis, sizes)?,
            Op::Split { axis, .. } => vec![concat(cotangents, *axis)?],
            Op::Copy => vec![g.clone()],
            _ => vec![mul(g, &self.elementwise_derivative()?)?],
        };
        Ok(grads)
    }

    /// Forward rule: one tangent per output.
    pub(crate) fn jvp(&self, tangents: &[Array<T>]) -> Result<Vec<Array<T>>, TensorError> {
        let t = &tangents[0];
        let outs = match self {
            Op::Leaf | Op::Copy => vec![t.clone()],
            Op::Add => vec![add(t, &tangents[1])?],
            Op::Sub => vec![sub(t, &tangents[1])?],
            Op::Mul { lhs, rhs } => vec![add(&mul(t, rhs)?, &mul(lhs, &tangents[1])?)?],
            Op::Div { lhs, rhs } => {
                // (da * b - a * db) / b^2
                let numerator = sub(&mul(t, rhs)?, &mul(lhs, &tangents[1])?)?;
                vec![div(&numerator, &mul(rhs, rhs)?)?]
            }
            Op::Pow {
                base,
                exponent,
                output,
            } => {
                let d_base = zip_broadcast(base, exponent, |x, y| y * powf(x, y - T::one()))?;
                // a zero exponent tangent contributes nothing, even where ln(base) is undefined
                let d_exponent = exponent_partial(base, output)?;
                let exponent_term = zip_broadcast(&tangents[1], &d_exponent, |dt, d| {
                    if dt == T::zero() { T::zero() } else { dt * d }
                })?;
                vec![add(&mul(t, &d_base)?, &exponent_term)?]
            }
            Op::Neg => vec![neg(t)],
            Op::Scale { alpha } => vec![scale(t, *alpha)],
            Op::Matmul { lhs, rhs } => {
                vec![add(&matmul(t, rhs)?, &matmul(lhs, &tangents[1])?)?]
            }
            Op::Sum { axes, keepdims, .. } => vec![sum_axes(t, axes, *keepdims)?],
            Op::Mean {
                input_shape,
                axes,
                keepdims,
            } => vec![scale(
                &sum_axes(t, axes, *keepdims)?,
                mean_factor(input_shape, axes),
            )],
            Op::Extremum {
                input,
                selected,
                axes,
                keepdims,
                ..
            } => {
                let weights = Self::extremum_weights(input, selected, axes)?;
                vec![sum_axes(&mul(&weights, t)?, axes, *keepdims)?]
            }
            Op::Reshape { output_shape, .. } => vec![t.reshape(output_shape)?],
            Op::Permute { perm } => vec![permutedims(t, perm)?],
            Op::Slice { slice } => vec![slice.gather(t)?],
            Op::Concat { axis, .. } => vec![concat(tangents, *axis)?],
            Op::Split { axis, sizes } => split(t, *axis, sizes)?,
            _ => vec![mul(t, &self.elementwise_derivative()?)?],
        };
        Ok(outs)
    }
}

/// `d(x^y)/dy = x^y ln(x)`, taken as zero wherever `x^y` is zero.
fn exponent_partial<T: Scalar>(
    base: &Array<T>,
    output: &Array<T>,
) -> Result<Array<T>, TensorError> {
    let log_base = apply_f64(base, f64::ln);
    zip_broadcast(output, &log_base, |y, l| if y == T::zero() { T::zero() } else { y * l })
}

/// Broadcast a cotangent of a reduction back over the reduced axes.
fn expand_reduced<T: Scalar>(
    g: &Array<T>,
    input_shape: &[usize],
    axes: &[usize],
    keepdims: bool,
) -> Result<Array<T>, TensorError> {
    let g = if keepdims {
        g.clone()
    } else {
        let mask = validate_axes(axes, input_shape.len())?;
        g.reshape(&reduced_shape(input_shape, &mask, true))?
    };
    broadcast_to(&g, input_shape)
}

fn mean_factor<T: Scalar>(input_shape: &[usize], axes: &[usize]) -> T {
    T::one() / T::from_usize(reduction_count(input_shape, axes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn arr(data: &[f64], shape: &[usize]) -> Array<f64> {
        Array::from_vec(data.to_vec(), shape).unwrap()
    }

    #[test]
    fn test_mul_rules() {
        let a = arr(&[1.0, 2.0], &[2]);
        let b = arr(&[3.0, 4.0], &[2]);
        let op = Op::Mul {
            lhs: a.clone(),
            rhs: b.clone(),
        };
        let g = op.vjp(&[Array::ones(&[2])]).unwrap();
        assert_eq!(g[0].data(), b.data());
        assert_eq!(g[1].data(), a.data());
        let t = op.jvp(&[Array::ones(&[2]), Array::zeros(&[2])]).unwrap();
        assert_eq!(t[0].data(), &[3.0, 4.0]);
    }

    #[test]
    fn test_div_rules() {
        let op = Op::Div {
            lhs: arr(&[6.0], &[1]),
            rhs: arr(&[2.0], &[1]),
        };
        let g = op.vjp(&[arr(&[1.0], &[1])]).unwrap();
        assert_relative_eq!(g[0].data()[0], 0.5);
        assert_relative_eq!(g[1].data()[0], -1.5);
        let t = op.jvp(&[arr(&[1.0], &[1]), arr(&[1.0], &[1])]).unwrap();
        assert_relative_eq!(t[0].data()[0], 0.5 - 1.5);
    }

    #[test]
    fn test_add_vjp_keeps_broadcast_shape() {
        let g = Op::<f64>::Add.vjp(&[Array::ones(&[3, 4])]).unwrap();
        assert_eq!(g.len(), 2);
        assert_eq!(g[1].shape(), &[3, 4]);
    }

    #[test]
    fn test_sum_vjp_expands() {
        let op: Op<f64> = Op::Sum {
            input_shape: vec![2, 3],
            axes: vec![1],
            keepdims: false,
        };
        let g = op.vjp(&[arr(&[1.0, 2.0], &[2])]).unwrap();
        assert_eq!(g[0].shape(), &[2, 3]);
        assert_eq!(g[0].data(), &[1.0, 2.0, 1.0, 2.0, 1.0, 2.0]);
    }

    #[test]
    fn test_max_ties_split_evenly() {
        let input = arr(&[1.0, 3.0, 3.0], &[3]);
        let op = Op::Extremum {
            kind: Extremum::Max,
            input,
            selected: arr(&[3.0], &[1]),
            axes: vec![0],
            keepdims: false,
        };
        assert_eq!(op.name(), "max");
        let g = op.vjp(&[Array::scalar(1.0)]).unwrap();
        assert_eq!(g[0].data(), &[0.0, 0.5, 0.5]);
        let t = op.jvp(&[arr(&[5.0, 2.0, 4.0], &[3])]).unwrap();
        assert_relative_eq!(t[0].item().unwrap(), 3.0);
    }

    #[test]
    fn test_unary_derivatives() {
        let x = arr(&[0.5, 2.0], &[2]);
        let log = Op::Log { input: x.clone() };
        assert_eq!(log.vjp(&[Array::ones(&[2])]).unwrap()[0].data(), &[2.0, 0.5]);
        let pow = Op::PowScalar {
            input: x.clone(),
            exponent: 3.0,
        };
        let d = pow.jvp(&[Array::ones(&[2])]).unwrap();
        assert_relative_eq!(d[0].data()[1], 12.0);
        let relu = Op::Relu {
            input: arr(&[-1.0, 1.0], &[2]),
        };
        assert_eq!(relu.vjp(&[arr(&[5.0, 5.0], &[2])]).unwrap()[0].data(), &[0.0, 5.0]);
    }

    #[test]
    fn test_pow_rules_with_constant_exponent_on_nonpositive_base() {
        let base = arr(&[-1.0, 0.0, 2.0], &[3]);
        let exponent = Array::scalar(2.0);
        let output = arr(&[1.0, 0.0, 4.0], &[3]);
        let op = Op::Pow {
            base,
            exponent,
            output,
        };
        let t = op.jvp(&[Array::ones(&[3]), Array::scalar(0.0)]).unwrap();
        assert_eq!(t[0].data(), &[-2.0, 0.0, 4.0]);
        let g = op.vjp(&[Array::ones(&[3])]).unwrap();
        assert_eq!(g[0].data(), &[-2.0, 0.0, 4.0]);
        // exponent partial: 0 where the power vanishes, NaN where ln(base) is undefined
        assert!(g[1].data()[0].is_nan());
        assert_eq!(g[1].data()[1], 0.0);
        assert_relative_eq!(g[1].data()[2], 4.0 * 2f64.ln());
    }

    #[test]
    fn test_split_vjp_concatenates() {
        let op: Op<f64> = Op::Split {
            axis: 0,
            sizes: vec![1, 2],
        };
        let g = op
            .vjp(&[arr(&[1.0], &[1]), arr(&[2.0, 3.0], &[2])])
            .unwrap();
        assert_eq!(g[0].data(), &[1.0, 2.0, 3.0]);
    }
}
