//! Reverse pass over a recorded graph.

use std::collections::{HashMap, HashSet};

use super::graph::GraphSnapshot;
use super::node::ValueRef;
use super::tensor::Tensor;
use crate::array::Array;
use crate::error::TensorError;
use crate::operations::{add, sum_to_shape};
use crate::scalar::Scalar;

/// What the executor does with cotangents that reach accumulating nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Accumulation {
    /// Add into the `grad` field of leaves, retained values and inputs.
    /// Retained nodes accumulate and stop there.
    Mutate,
    /// Return the cotangents of the requested inputs; touch no `grad` field.
    /// Retained nodes are traversed like any other.
    Collect,
}

/// Add `cotangent` into a slot, reducing broadcast axes to `shape` first.
fn accumulate<T: Scalar>(
    entry: &mut Option<Array<T>>,
    cotangent: &Array<T>,
    shape: &[usize],
) -> Result<(), TensorError> {
    let cotangent = if cotangent.shape() == shape {
        cotangent.clone()
    } else {
        sum_to_shape(cotangent, shape)?
    };
    *entry = Some(match entry.take() {
        Some(existing) => add(&existing, &cotangent)?,
        None => cotangent,
    });
    Ok(())
}

/// Run one reverse pass.
///
/// Returns one entry per element of `inputs`: the cotangent that reached it,
/// or `None` if the outputs do not depend on it. Requested inputs stop the
/// fan-out. With [`Accumulation::Mutate`], `grad` fields are only written
/// after every reverse rule in the pass has succeeded.
pub(crate) fn run_backward<T: Scalar>(
    outputs: &[Tensor<T>],
    cotangents: &[Option<Array<T>>],
    inputs: &[Tensor<T>],
    accumulation: Accumulation,
) -> Result<Vec<Option<Array<T>>>, TensorError> {
    if outputs.len() != cotangents.len() {
        return Err(TensorError::ArgumentCount {
            expected: outputs.len(),
            actual: cotangents.len(),
        });
    }

    let mut roots = Vec::with_capacity(outputs.len());
    let mut seeds = Vec::with_capacity(outputs.len());
    for (output, cotangent) in outputs.iter().zip(cotangents) {
        let node = output.node().ok_or(TensorError::NotTracked)?;
        let shape = output.shape();
        let seed = match cotangent {
            Some(cotangent) if cotangent.shape() == shape.as_slice() => cotangent.clone(),
            Some(cotangent) => sum_to_shape(cotangent, &shape)?,
            None if output.len() == 1 => Array::ones(&shape),
            None => return Err(TensorError::MissingSeed { len: output.len() }),
        };
        roots.push(node);
        seeds.push((output.slot(), seed));
    }

    let mut input_keys = Vec::with_capacity(inputs.len());
    for input in inputs {
        let node = input.node().ok_or(TensorError::NotTracked)?;
        input_keys.push((node.id(), input.slot()));
    }
    let stop: HashSet<_> = input_keys.iter().map(|&(id, _)| id).collect();

    let snapshot = GraphSnapshot::build(&roots, &stop);
    let order = snapshot.schedule()?;

    let span = tracing::debug_span!(
        "backward",
        nodes = snapshot.len(),
        outputs = outputs.len(),
        inputs = inputs.len(),
        ?accumulation
    );
    let _enter = span.enter();

    // (arena index, slot) -> positions in `inputs`
    let mut requested: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    for (position, &(id, slot)) in input_keys.iter().enumerate() {
        if let Some(i) = snapshot.index_of(id) {
            requested.entry((i, slot)).or_default().push(position);
        }
    }

    let mut entries: Vec<Option<Vec<Option<Array<T>>>>> = vec![None; snapshot.len()];
    for (root, (slot, seed)) in roots.iter().zip(seeds) {
        let Some(i) = snapshot.index_of(root.id()) else {
            continue;
        };
        let slots = entries[i].get_or_insert_with(|| vec![None; root.num_outputs()]);
        accumulate(&mut slots[slot], &seed, &root.output_shapes()[slot])?;
    }

    let mut results: Vec<Option<Array<T>>> = vec![None; inputs.len()];
    let mut writes: Vec<(ValueRef<T>, Array<T>)> = Vec::new();

    for i in order {
        let Some(slots) = entries[i].take() else {
            continue;
        };
        let node = snapshot.node(i);
        node.check_versions()?;
        tracing::trace!(node = %node.id(), op = node.op_name(), "backward step");

        let cotangents: Vec<Array<T>> = slots
            .into_iter()
            .zip(node.output_shapes())
            .map(|(cotangent, shape)| cotangent.unwrap_or_else(|| Array::zeros(shape)))
            .collect();

        let mut is_input = false;
        for (slot, cotangent) in cotangents.iter().enumerate() {
            if let Some(positions) = requested.get(&(i, slot)) {
                is_input = true;
                for &position in positions {
                    results[position] = Some(cotangent.clone());
                }
            }
        }
        let accumulates = match accumulation {
            Accumulation::Mutate => node.is_leaf() || node.retains_grad() || is_input,
            Accumulation::Collect => node.is_leaf() || is_input,
        };
        if accumulation == Accumulation::Mutate && accumulates {
            for (slot, cotangent) in cotangents.iter().enumerate() {
                // untracked since recording: never receives a gradient
                match node.output(slot) {
                    Some(value) if value.borrow().requires_grad => {
                        writes.push((value, cotangent.clone()));
                    }
                    _ => {}
                }
            }
        }
        if accumulates || stop.contains(&node.id()) {
            continue;
        }

        let parents = snapshot.parents_of(i);
        if parents.iter().all(Option::is_none) {
            continue;
        }
        let grads = node.op().vjp(&cotangents)?;
        if grads.len() != parents.len() {
            return Err(TensorError::ArgumentCount {
                expected: parents.len(),
                actual: grads.len(),
            });
        }
        for ((grad, parent), edge) in grads.iter().zip(parents).zip(node.parents()) {
            let (Some(p), Some(edge)) = (parent, edge) else {
                continue;
            };
            let producer = snapshot.node(*p);
            let slots = entries[*p].get_or_insert_with(|| vec![None; producer.num_outputs()]);
            accumulate(
                &mut slots[edge.slot],
                grad,
                &producer.output_shapes()[edge.slot],
            )?;
        }
    }

    // Sum with existing gradients before touching any value.
    let mut updates = Vec::with_capacity(writes.len());
    for (value, cotangent) in writes {
        let combined = match value.borrow().grad.as_ref() {
            Some(existing) => add(existing, &cotangent)?,
            None => cotangent,
        };
        updates.push((value, combined));
    }
    for (value, grad) in updates {
        value.borrow_mut().grad = Some(grad);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(data: &[f64]) -> Tensor<f64> {
        Tensor::tracked(Array::from_vec(data.to_vec(), &[data.len()]).unwrap()).unwrap()
    }

    #[test]
    fn test_missing_seed_for_vector_output() {
        let x = leaf(&[1.0, 2.0]);
        let y = x.exp().unwrap();
        assert!(matches!(
            run_backward(&[y], &[None], &[], Accumulation::Mutate),
            Err(TensorError::MissingSeed { len: 2 })
        ));
    }

    #[test]
    fn test_untracked_output() {
        let y = Tensor::<f64>::scalar(1.0);
        assert!(matches!(
            run_backward(&[y], &[None], &[], Accumulation::Mutate),
            Err(TensorError::NotTracked)
        ));
    }

    #[test]
    fn test_collect_does_not_mutate() {
        let x = leaf(&[1.0, 2.0]);
        let y = x.mul(&x).unwrap().sum_all().unwrap();
        let result = run_backward(&[y], &[None], &[x.clone()], Accumulation::Collect).unwrap();
        assert_eq!(result[0].as_ref().unwrap().data(), &[2.0, 4.0]);
        assert!(x.grad().is_none());
    }

    #[test]
    fn test_input_stops_fan_out() {
        let x = leaf(&[1.0, 2.0]);
        let a = x.scale(3.0).unwrap();
        let y = a.sum_all().unwrap();
        let result = run_backward(&[y], &[None], &[a.clone()], Accumulation::Mutate).unwrap();
        assert_eq!(result[0].as_ref().unwrap().data(), &[1.0, 1.0]);
        assert_eq!(a.grad().unwrap().data(), &[1.0, 1.0]);
        assert!(x.grad().is_none());
    }

    #[test]
    fn test_retained_node_accumulates_and_stops() {
        let x = leaf(&[1.0, 2.0]);
        let a = x.scale(3.0).unwrap();
        a.retain().unwrap();
        a.sum_all().unwrap().backward().unwrap();
        assert_eq!(a.grad().unwrap().data(), &[1.0, 1.0]);
        assert!(x.grad().is_none());
    }

    #[test]
    fn test_collect_traverses_retained_nodes() {
        let x = leaf(&[1.0, 2.0]);
        let a = x.scale(3.0).unwrap();
        a.retain().unwrap();
        let y = a.sum_all().unwrap();
        let result = run_backward(&[y], &[None], &[x.clone()], Accumulation::Collect).unwrap();
        assert_eq!(result[0].as_ref().unwrap().data(), &[3.0, 3.0]);
        assert!(a.grad().is_none());
    }

    #[test]
    fn test_untracked_leaf_gets_no_gradient() {
        let x = leaf(&[1.0, 2.0]);
        let w = leaf(&[3.0, 4.0]);
        let y = x.mul(&w).unwrap().sum_all().unwrap();
        x.set_requires_grad(false).unwrap();
        y.backward().unwrap();
        assert!(!x.requires_grad());
        assert!(x.grad().is_none());
        assert_eq!(w.grad().unwrap().data(), &[1.0, 2.0]);
    }

    #[test]
    fn test_unreached_input_is_none() {
        let x = leaf(&[1.0]);
        let z = leaf(&[1.0]);
        let y = x.exp().unwrap();
        let result = run_backward(&[y], &[None], &[z], Accumulation::Collect).unwrap();
        assert!(result[0].is_none());
    }

    #[test]
    fn test_failed_pass_leaves_grads_untouched() {
        let x = leaf(&[1.0, 2.0]);
        let y = x.exp().unwrap().sum_all().unwrap();
        y.backward().unwrap();
        let before = x.grad().unwrap();

        let w = leaf(&[1.0, 2.0]);
        let z = x.mul(&w).unwrap().sum_all().unwrap();
        w.assign(Array::zeros(&[2])).unwrap();
        assert!(matches!(z.backward(), Err(TensorError::StaleGraph { .. })));
        assert_eq!(x.grad().unwrap(), before);
    }

    #[test]
    fn test_multiple_outputs_on_one_node() {
        let x = leaf(&[1.0, 2.0, 3.0]);
        let parts = x.split(0, &[1, 2]).unwrap();
        let cotangents = [Some(Array::full(&[1], 5.0)), Some(Array::full(&[2], 7.0))];
        run_backward(&parts, &cotangents, &[], Accumulation::Mutate).unwrap();
        assert_eq!(x.grad().unwrap().data(), &[5.0, 7.0, 7.0]);
    }
}
