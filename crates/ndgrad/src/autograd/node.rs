//! Recorded operation nodes.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug, Display};
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::op::Op;
use super::tensor::TensorInner;
use crate::error::TensorError;
use crate::scalar::Scalar;

/// Unique identifier of a recorded node.
///
/// Ids come from a per-thread counter and are never reused on that thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Get the raw counter value.
    pub fn index(&self) -> u64 {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

thread_local! {
    static NEXT_ID: Cell<u64> = const { Cell::new(0) };
}

fn next_node_id() -> NodeId {
    NEXT_ID.with(|id| {
        let current = id.get();
        id.set(current + 1);
        NodeId(current)
    })
}

pub(crate) type ValueRef<T> = Rc<RefCell<TensorInner<T>>>;

/// Link from a node to the producer of one of its inputs.
pub(crate) struct Edge<T: Scalar> {
    pub(crate) node: Rc<Node<T>>,
    /// Output slot of `node` that was consumed.
    pub(crate) slot: usize,
    /// Version of the consumed value when the edge was recorded.
    pub(crate) version: u64,
}

/// One recorded application of a differentiable operation.
///
/// Parents are held strongly so the graph upstream of a live value stays
/// alive; outputs are held weakly so a node never keeps its results alive.
pub(crate) struct Node<T: Scalar> {
    id: NodeId,
    op: Op<T>,
    parents: SmallVec<[Option<Edge<T>>; 2]>,
    output_shapes: Vec<Vec<usize>>,
    outputs: Vec<Weak<RefCell<TensorInner<T>>>>,
    retain: Cell<bool>,
}

impl<T: Scalar> Node<T> {
    pub(crate) fn new(
        op: Op<T>,
        parents: SmallVec<[Option<Edge<T>>; 2]>,
        outputs: &[ValueRef<T>],
    ) -> Rc<Self> {
        Rc::new(Self {
            id: next_node_id(),
            op,
            parents,
            output_shapes: outputs
                .iter()
                .map(|value| value.borrow().data.shape().to_vec())
                .collect(),
            outputs: outputs.iter().map(Rc::downgrade).collect(),
            retain: Cell::new(false),
        })
    }

    /// Node for a tracked leaf value.
    pub(crate) fn leaf(value: &ValueRef<T>) -> Rc<Self> {
        Self::new(Op::Leaf, SmallVec::new(), std::slice::from_ref(value))
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn op(&self) -> &Op<T> {
        &self.op
    }

    pub(crate) fn op_name(&self) -> &'static str {
        self.op.name()
    }

    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self.op, Op::Leaf)
    }

    pub(crate) fn parents(&self) -> &[Option<Edge<T>>] {
        &self.parents
    }

    pub(crate) fn output_shapes(&self) -> &[Vec<usize>] {
        &self.output_shapes
    }

    pub(crate) fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// The value in `slot`, if it is still alive.
    pub(crate) fn output(&self, slot: usize) -> Option<ValueRef<T>> {
        self.outputs.get(slot).and_then(Weak::upgrade)
    }

    pub(crate) fn retains_grad(&self) -> bool {
        self.retain.get()
    }

    pub(crate) fn set_retain(&self, retain: bool) {
        self.retain.set(retain);
    }

    /// Fail if the input recorded at `position` has been mutated since.
    pub(crate) fn check_parent_version(&self, position: usize) -> Result<(), TensorError> {
        let Some(Some(edge)) = self.parents.get(position) else {
            return Ok(());
        };
        match edge.node.output(edge.slot) {
            Some(value) if value.borrow().version != edge.version => Err(self.stale("input", position)),
            _ => Ok(()),
        }
    }

    /// Fail if any input or live output was mutated after recording.
    ///
    /// Leaf payloads may change freely; only their consumers are checked.
    pub(crate) fn check_versions(&self) -> Result<(), TensorError> {
        for position in 0..self.parents.len() {
            self.check_parent_version(position)?;
        }
        if self.is_leaf() {
            return Ok(());
        }
        for slot in 0..self.outputs.len() {
            if self.output(slot).is_some_and(|value| value.borrow().version != 0) {
                return Err(self.stale("output", slot));
            }
        }
        Ok(())
    }

    fn stale(&self, role: &'static str, slot: usize) -> TensorError {
        TensorError::StaleGraph {
            node: self.id.index(),
            op: self.op_name(),
            role,
            slot,
        }
    }
}

impl<T: Scalar> Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("op", &self.op_name())
            .field(
                "parents",
                &self
                    .parents
                    .iter()
                    .map(|edge| edge.as_ref().map(|e| (e.node.id, e.slot)))
                    .collect::<Vec<_>>(),
            )
            .field("output_shapes", &self.output_shapes)
            .field("retain", &self.retain.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Array;
    use crate::autograd::Tensor;

    #[test]
    fn test_node_ids_increase() {
        let a = next_node_id();
        let b = next_node_id();
        assert!(b > a);
        assert_eq!(b.index(), a.index() + 1);
        assert_eq!(format!("{}", NodeId(3)), "#3");
    }

    #[test]
    fn test_leaf_node_holds_output_weakly() {
        let t = Tensor::tracked(Array::<f64>::ones(&[2, 3])).unwrap();
        let node = t.node().unwrap();
        assert!(node.is_leaf());
        assert_eq!(node.output_shapes(), &[vec![2, 3]]);
        assert!(node.output(0).is_some());
        drop(t);
        assert!(node.output(0).is_none());
    }

    #[test]
    fn test_parents_keep_upstream_alive() {
        let x = Tensor::tracked(Array::<f64>::ones(&[2])).unwrap();
        let leaf_id = x.node_id().unwrap();
        let y = x.exp().unwrap();
        drop(x);
        let node = y.node().unwrap();
        let parent = node.parents()[0].as_ref().unwrap();
        assert_eq!(parent.node.id(), leaf_id);
        assert_eq!(node.op_name(), "exp");
    }

    #[test]
    fn test_stale_parent_detected() {
        let x = Tensor::tracked(Array::<f64>::ones(&[2])).unwrap();
        let y = x.sin().unwrap();
        let node = y.node().unwrap();
        assert!(node.check_parent_version(0).is_ok());
        x.assign(Array::zeros(&[2])).unwrap();
        assert!(matches!(
            node.check_parent_version(0),
            Err(TensorError::StaleGraph {
                op: "sin",
                role: "input",
                ..
            })
        ));
    }

    #[test]
    fn test_mutated_output_detected() {
        let x = Tensor::tracked(Array::<f64>::ones(&[2])).unwrap();
        let y = x.exp().unwrap();
        let node = y.node().unwrap();
        assert!(node.check_versions().is_ok());
        y.update(|v| v + 1.0);
        let err = node.check_versions().unwrap_err();
        assert!(matches!(
            err,
            TensorError::StaleGraph {
                op: "exp",
                role: "output",
                slot: 0,
                ..
            }
        ));
        assert!(err.to_string().starts_with("output 0 of node"));
        x.assign(Array::zeros(&[2])).unwrap();
        assert!(x.node().unwrap().check_versions().is_ok());
    }
}
