//! Differentiation drivers.
//!
//! The free functions here never touch the `grad` field of the caller's
//! tensors except [`backward`], which accumulates exactly like
//! [`Tensor::backward`].

use super::backward::{Accumulation, run_backward};
use super::mode::{GradMode, with_mode};
use super::tensor::Tensor;
use crate::array::Array;
use crate::error::TensorError;
use crate::scalar::Scalar;

fn check_differentiable<T: Scalar>() -> Result<(), TensorError> {
    if T::DTYPE.is_differentiable() {
        Ok(())
    } else {
        Err(TensorError::NotDifferentiable { dtype: T::DTYPE })
    }
}

fn check_position(pos: usize, count: usize) -> Result<(), TensorError> {
    if pos < count {
        Ok(())
    } else {
        Err(TensorError::IndexOutOfBounds {
            index: pos,
            dim_size: count,
        })
    }
}

/// Fresh tracked leaves holding the inputs' data.
fn fresh_leaves<T: Scalar>(inputs: &[Tensor<T>]) -> Result<Vec<Tensor<T>>, TensorError> {
    inputs.iter().map(|input| Tensor::tracked(input.data())).collect()
}

fn or_zeros<T: Scalar>(results: Vec<Option<Array<T>>>, inputs: &[Tensor<T>]) -> Vec<Array<T>> {
    results
        .into_iter()
        .zip(inputs)
        .map(|(grad, input)| grad.unwrap_or_else(|| Array::zeros(&input.shape())))
        .collect()
}

/// Accumulate gradients of several outputs at once.
///
/// `cotangents[i]` seeds `outputs[i]`; `None` means ones and is only allowed
/// for one-element outputs. When `inputs` is non-empty, the pass stops at
/// those values and also stores their gradients.
///
/// # Errors
///
/// `ArgumentCount` if `cotangents` and `outputs` differ in length,
/// `MissingSeed`, `NotTracked` and `StaleGraph` as for [`Tensor::backward`].
pub fn backward<T: Scalar>(
    outputs: &[Tensor<T>],
    cotangents: &[Option<Array<T>>],
    inputs: &[Tensor<T>],
) -> Result<(), TensorError> {
    run_backward(outputs, cotangents, inputs, Accumulation::Mutate).map(drop)
}

/// Gradients of `output` with respect to `inputs`, without mutating any
/// tensor.
///
/// Inputs that `output` does not depend on get zeros.
///
/// # Example
///
/// ```
/// use ndgrad::Array;
/// use ndgrad::autograd::{Tensor, grad};
///
/// let x = Tensor::tracked(Array::from_vec(vec![3.0], &[1]).unwrap()).unwrap();
/// let y = x.mul(&x).unwrap().sum_all().unwrap();
/// let g = grad(&[x.clone()], &y, None).unwrap();
/// assert_eq!(g[0].data(), &[6.0]);
/// assert!(x.grad().is_none());
/// ```
pub fn grad<T: Scalar>(
    inputs: &[Tensor<T>],
    output: &Tensor<T>,
    cotangent: Option<&Array<T>>,
) -> Result<Vec<Array<T>>, TensorError> {
    let results = run_backward(
        std::slice::from_ref(output),
        &[cotangent.cloned()],
        inputs,
        Accumulation::Collect,
    )?;
    Ok(or_zeros(results, inputs))
}

/// Evaluate `f` and pull `cotangent` back through it.
///
/// # Arguments
///
/// * `inputs` - Points at which `f` is evaluated. They are copied into fresh
///   tracked leaves; the caller's tensors are left untouched.
/// * `cotangent` - Seed with the shape of `f`'s output.
/// * `f` - The function to differentiate.
///
/// # Returns
///
/// The (untracked) output of `f` and one gradient per input.
///
/// # Errors
///
/// `NotDifferentiable` for integer element types, `CotangentShape` if the
/// seed does not match the output, or any error raised by `f`.
pub fn vjp<T, F>(
    inputs: &[Tensor<T>],
    cotangent: &Array<T>,
    f: F,
) -> Result<(Tensor<T>, Vec<Array<T>>), TensorError>
where
    T: Scalar,
    F: Fn(&[Tensor<T>]) -> Result<Tensor<T>, TensorError>,
{
    check_differentiable::<T>()?;
    let leaves = fresh_leaves(inputs)?;
    let output = with_mode(GradMode::reverse_only(), || f(&leaves))?;
    if cotangent.shape() != output.shape().as_slice() {
        return Err(TensorError::CotangentShape {
            expected: output.shape(),
            actual: cotangent.shape().to_vec(),
        });
    }
    let results = if output.node().is_some() {
        run_backward(
            std::slice::from_ref(&output),
            &[Some(cotangent.clone())],
            &leaves,
            Accumulation::Collect,
        )?
    } else {
        vec![None; leaves.len()]
    };
    Ok((output.detach(), or_zeros(results, &leaves)))
}

/// Evaluate `f` and push `tangents` forward through it.
///
/// Returns the (untracked) output and its tangent. An output that does not
/// depend on the inputs has a zero tangent.
///
/// # Errors
///
/// `NotDifferentiable` for integer element types, `ArgumentCount` if the
/// numbers of inputs and tangents differ, `IncompatibleShapes` if a tangent
/// does not match its input.
pub fn jvp<T, F>(
    inputs: &[Tensor<T>],
    tangents: &[Array<T>],
    f: F,
) -> Result<(Tensor<T>, Array<T>), TensorError>
where
    T: Scalar,
    F: Fn(&[Tensor<T>]) -> Result<Tensor<T>, TensorError>,
{
    check_differentiable::<T>()?;
    if inputs.len() != tangents.len() {
        return Err(TensorError::ArgumentCount {
            expected: inputs.len(),
            actual: tangents.len(),
        });
    }
    let duals = inputs
        .iter()
        .zip(tangents)
        .map(|(input, tangent)| Tensor::with_tangent(input.data(), tangent.clone()))
        .collect::<Result<Vec<_>, _>>()?;
    let output = with_mode(GradMode::forward_only(), || f(&duals))?;
    let tangent = output
        .tangent()
        .unwrap_or_else(|| output.data().zeros_like());
    Ok((output.detach(), tangent))
}

/// Dense Jacobian of `f` with respect to `inputs[pos]`, one backward pass
/// per output element.
///
/// Returns the detached output of `f` and the Jacobian, which has shape
/// `output.shape ++ input.shape`.
///
/// # Example
///
/// ```
/// use ndgrad::Array;
/// use ndgrad::autograd::{Tensor, jacrev};
///
/// let a = Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap();
/// let b = Tensor::from_vec(vec![3.0, 4.0], &[2]).unwrap();
/// let (y, j) = jacrev(&[a, b], |x| x[0].mul(&x[1]), 0).unwrap();
/// assert_eq!(y.to_vec(), vec![3.0, 8.0]);
/// assert_eq!(j.shape(), &[2, 2]);
/// assert_eq!(j.data(), &[3.0, 0.0, 0.0, 4.0]);
/// ```
pub fn jacrev<T, F>(
    inputs: &[Tensor<T>],
    f: F,
    pos: usize,
) -> Result<(Tensor<T>, Array<T>), TensorError>
where
    T: Scalar,
    F: Fn(&[Tensor<T>]) -> Result<Tensor<T>, TensorError>,
{
    check_position(pos, inputs.len())?;
    check_differentiable::<T>()?;
    let leaves = fresh_leaves(inputs)?;
    let output = with_mode(GradMode::reverse_only(), || f(&leaves))?;

    let out_shape = output.shape();
    let in_shape = leaves[pos].shape();
    let (out_len, in_len) = (output.len(), leaves[pos].len());
    let mut jacobian = vec![T::zero(); out_len * in_len];

    if output.node().is_some() {
        let wrt = std::slice::from_ref(&leaves[pos]);
        for k in 0..out_len {
            let mut seed = Array::zeros(&out_shape);
            seed.data_mut()[k] = T::one();
            let results = run_backward(
                std::slice::from_ref(&output),
                &[Some(seed)],
                wrt,
                Accumulation::Collect,
            )?;
            if let Some(row) = &results[0] {
                for (j, &value) in row.data().iter().enumerate() {
                    jacobian[k + out_len * j] = value;
                }
            }
        }
    }

    let jacobian = Array::from_vec(jacobian, &[out_shape, in_shape].concat())?;
    Ok((output.detach(), jacobian))
}

/// Dense Jacobian of `f` with respect to `inputs[pos]`, one forward pass
/// per input element.
///
/// Same return value and layout as [`jacrev`].
pub fn jacfwd<T, F>(
    inputs: &[Tensor<T>],
    f: F,
    pos: usize,
) -> Result<(Tensor<T>, Array<T>), TensorError>
where
    T: Scalar,
    F: Fn(&[Tensor<T>]) -> Result<Tensor<T>, TensorError>,
{
    check_position(pos, inputs.len())?;
    check_differentiable::<T>()?;
    let detached: Vec<Tensor<T>> = inputs.iter().map(Tensor::detach).collect();
    let output = with_mode(GradMode::disabled(), || f(&detached))?.detach();
    let out_shape = output.shape();
    let out_len: usize = out_shape.iter().product();
    let in_shape = inputs[pos].shape();
    let in_len = inputs[pos].len();
    let mut jacobian = vec![T::zero(); out_len * in_len];

    let mut tangents: Vec<Array<T>> = inputs.iter().map(|input| input.data().zeros_like()).collect();
    for j in 0..in_len {
        let mut basis = Array::zeros(&in_shape);
        basis.data_mut()[j] = T::one();
        tangents[pos] = basis;
        let (_, column) = jvp(inputs, &tangents, &f)?;
        for (k, &value) in column.data().iter().enumerate() {
            jacobian[k + out_len * j] = value;
        }
    }

    let jacobian = Array::from_vec(jacobian, &[out_shape, in_shape].concat())?;
    Ok((output, jacobian))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn vector(data: &[f64]) -> Tensor<f64> {
        Tensor::from_vec(data.to_vec(), &[data.len()]).unwrap()
    }

    #[test]
    fn test_vjp_leaves_inputs_untouched() {
        let x = vector(&[1.0, 2.0]);
        let (y, grads) = vjp(&[x.clone()], &Array::ones(&[2]), |v| v[0].exp()).unwrap();
        assert!(!x.requires_grad());
        assert!(!y.requires_grad());
        assert_relative_eq!(grads[0].data()[1], 2f64.exp());
    }

    #[test]
    fn test_vjp_constant_output() {
        let x = vector(&[1.0]);
        let (_, grads) = vjp(&[x], &Array::ones(&[1]), |_| Ok(vector(&[5.0]))).unwrap();
        assert_eq!(grads[0].data(), &[0.0]);
    }

    #[test]
    fn test_vjp_cotangent_shape_checked() {
        let x = vector(&[1.0, 2.0]);
        assert!(matches!(
            vjp(&[x], &Array::ones(&[3]), |v| v[0].exp()),
            Err(TensorError::CotangentShape { .. })
        ));
    }

    #[test]
    fn test_jvp_argument_count() {
        let x = vector(&[1.0]);
        assert!(matches!(
            jvp(&[x], &[], |v| v[0].exp()),
            Err(TensorError::ArgumentCount { .. })
        ));
    }

    #[test]
    fn test_jvp_constant_output_has_zero_tangent() {
        let x = vector(&[1.0, 2.0]);
        let (y, t) = jvp(&[x], &[Array::ones(&[2])], |_| Ok(vector(&[7.0]))).unwrap();
        assert_eq!(y.to_vec(), vec![7.0]);
        assert_eq!(t.data(), &[0.0]);
    }

    #[test]
    fn test_integer_inputs_rejected() {
        let x = Tensor::from_vec(vec![1_i64], &[1]).unwrap();
        assert!(matches!(
            jacfwd(&[x], |v| Ok(v[0].clone()), 0),
            Err(TensorError::NotDifferentiable { .. })
        ));
    }

    #[test]
    fn test_position_out_of_range() {
        let x = vector(&[1.0]);
        assert!(matches!(
            jacrev(&[x], |v| v[0].exp(), 1),
            Err(TensorError::IndexOutOfBounds { index: 1, .. })
        ));
    }

    #[test]
    fn test_grad_zeros_for_unused_input() {
        let x = Tensor::tracked(Array::from_vec(vec![2.0], &[1]).unwrap()).unwrap();
        let z = Tensor::tracked(Array::from_vec(vec![1.0, 1.0], &[2]).unwrap()).unwrap();
        let y = x.exp().unwrap().sum_all().unwrap();
        let g = grad(&[x.clone(), z], &y, None).unwrap();
        assert_relative_eq!(g[0].data()[0], 2f64.exp());
        assert_eq!(g[1].data(), &[0.0, 0.0]);
        assert!(x.grad().is_none());
    }
}
