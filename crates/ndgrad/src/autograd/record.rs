//! Recording of tracked operations and inline tangent propagation.

use std::cell::RefCell;
use std::rc::Rc;

use smallvec::SmallVec;

use super::mode::current_mode;
use super::node::{Node, ValueRef};
use super::op::Op;
use super::tensor::{Tensor, TensorInner};
use crate::array::Array;
use crate::error::TensorError;
use crate::operations::broadcast_to;
use crate::scalar::Scalar;

/// Wrap the forward results of `op` applied to `inputs`.
///
/// Reads the mode once. Depending on it, the outputs get a recorded node,
/// a propagated tangent, both, or neither.
pub(crate) fn record<T: Scalar>(
    op: Op<T>,
    inputs: &[&Tensor<T>],
    outputs: Vec<Array<T>>,
) -> Result<Vec<Tensor<T>>, TensorError> {
    let mode = current_mode();
    if !mode.enabled || !inputs.iter().any(|input| input.requires_grad()) {
        return Ok(outputs.into_iter().map(Tensor::new).collect());
    }

    let tangents = if mode.propagates_tangents() && inputs.iter().any(|input| input.has_tangent()) {
        Some(propagate_tangents(&op, inputs, &outputs)?)
    } else {
        None
    };
    let records = mode.records_nodes();
    if !records && tangents.is_none() {
        return Ok(outputs.into_iter().map(Tensor::new).collect());
    }

    let mut tangents = tangents.map(Vec::into_iter);
    let values: Vec<ValueRef<T>> = outputs
        .into_iter()
        .enumerate()
        .map(|(slot, data)| {
            Rc::new(RefCell::new(TensorInner {
                data,
                requires_grad: true,
                is_leaf: !records,
                node: None,
                slot,
                grad: None,
                tangent: tangents.as_mut().and_then(Iterator::next),
                version: 0,
            }))
        })
        .collect();

    if records {
        let parents: SmallVec<[_; 2]> = inputs
            .iter()
            .map(|input| if input.requires_grad() { input.edge() } else { None })
            .collect();
        let node = Node::new(op, parents, &values);
        tracing::trace!(node = %node.id(), op = node.op_name(), inputs = inputs.len(), "recorded");
        for value in &values {
            value.borrow_mut().node = Some(Rc::clone(&node));
        }
    }

    Ok(values.into_iter().map(Tensor::from_inner).collect())
}

/// [`record`] for single-output operations.
pub(crate) fn record_one<T: Scalar>(
    op: Op<T>,
    inputs: &[&Tensor<T>],
    output: Array<T>,
) -> Result<Tensor<T>, TensorError> {
    record(op, inputs, vec![output])?
        .pop()
        .ok_or(TensorError::ArgumentCount {
            expected: 1,
            actual: 0,
        })
}

fn propagate_tangents<T: Scalar>(
    op: &Op<T>,
    inputs: &[&Tensor<T>],
    outputs: &[Array<T>],
) -> Result<Vec<Array<T>>, TensorError> {
    let input_tangents: Vec<Array<T>> = inputs
        .iter()
        .map(|input| input.tangent().unwrap_or_else(|| input.data().zeros_like()))
        .collect();
    let output_tangents = op.jvp(&input_tangents)?;
    if output_tangents.len() != outputs.len() {
        return Err(TensorError::ArgumentCount {
            expected: outputs.len(),
            actual: output_tangents.len(),
        });
    }
    output_tangents
        .iter()
        .zip(outputs)
        .map(|(tangent, output)| broadcast_to(tangent, output.shape()))
        .collect()
}
