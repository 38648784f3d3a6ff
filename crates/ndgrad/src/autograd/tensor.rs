//! Tensor - an array with gradient tracking.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::backward::{Accumulation, run_backward};
use super::node::{Edge, Node, NodeId, ValueRef};
use crate::array::Array;
use crate::error::TensorError;
use crate::scalar::Scalar;

pub(crate) struct TensorInner<T: Scalar> {
    pub(crate) data: Array<T>,
    pub(crate) requires_grad: bool,
    pub(crate) is_leaf: bool,
    /// Producing node, or the leaf node of a tracked leaf.
    pub(crate) node: Option<Rc<Node<T>>>,
    /// Output slot of `node` this value occupies.
    pub(crate) slot: usize,
    pub(crate) grad: Option<Array<T>>,
    pub(crate) tangent: Option<Array<T>>,
    pub(crate) version: u64,
}

impl<T: Scalar> TensorInner<T> {
    pub(crate) fn untracked(data: Array<T>) -> Self {
        Self {
            data,
            requires_grad: false,
            is_leaf: true,
            node: None,
            slot: 0,
            grad: None,
            tangent: None,
            version: 0,
        }
    }
}

/// A value that can take part in differentiation.
///
/// `Tensor` is a shared handle: cloning it yields another handle to the same
/// value, so gradients accumulated through one handle are visible through
/// all of them. Use [`Tensor::detach`] for an independent, untracked value.
///
/// # Example
///
/// ```
/// use ndgrad::Array;
/// use ndgrad::autograd::Tensor;
///
/// let x = Tensor::tracked(Array::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap()).unwrap();
/// let y = x.mul(&x).unwrap().sum_all().unwrap();
/// y.backward().unwrap();
/// assert_eq!(x.grad().unwrap().data(), &[2.0, 4.0, 6.0]);
/// ```
#[derive(Clone)]
pub struct Tensor<T: Scalar> {
    inner: ValueRef<T>,
}

impl<T: Scalar> Tensor<T> {
    /// An untracked value.
    pub fn new(data: Array<T>) -> Self {
        Self::from_inner(Rc::new(RefCell::new(TensorInner::untracked(data))))
    }

    /// A leaf that requires gradients.
    ///
    /// # Errors
    ///
    /// `NotDifferentiable` for integer element types.
    pub fn tracked(data: Array<T>) -> Result<Self, TensorError> {
        let tensor = Self::new(data);
        tensor.set_requires_grad(true)?;
        Ok(tensor)
    }

    /// A tracked leaf carrying a forward-mode tangent.
    pub fn with_tangent(data: Array<T>, tangent: Array<T>) -> Result<Self, TensorError> {
        if data.shape() != tangent.shape() {
            return Err(TensorError::IncompatibleShapes {
                lhs: data.shape().to_vec(),
                rhs: tangent.shape().to_vec(),
            });
        }
        let tensor = Self::tracked(data)?;
        tensor.inner.borrow_mut().tangent = Some(tangent);
        Ok(tensor)
    }

    /// Untracked value from column-major data.
    pub fn from_vec(data: Vec<T>, shape: &[usize]) -> Result<Self, TensorError> {
        Ok(Self::new(Array::from_vec(data, shape)?))
    }

    /// Untracked rank-0 value.
    pub fn scalar(value: T) -> Self {
        Self::new(Array::scalar(value))
    }

    /// Untracked zeros.
    pub fn zeros(shape: &[usize]) -> Self {
        Self::new(Array::zeros(shape))
    }

    /// Untracked ones.
    pub fn ones(shape: &[usize]) -> Self {
        Self::new(Array::ones(shape))
    }

    pub(crate) fn from_inner(inner: ValueRef<T>) -> Self {
        Self { inner }
    }

    /// Turn gradient tracking on or off for a leaf.
    ///
    /// # Errors
    ///
    /// `NotDifferentiable` when enabling on an integer type, and
    /// `InvalidOperation` when called on a value produced by a recorded
    /// operation.
    pub fn set_requires_grad(&self, requires_grad: bool) -> Result<(), TensorError> {
        if !self.is_leaf() {
            return Err(TensorError::InvalidOperation(
                "requires_grad can only be changed on leaf values".to_string(),
            ));
        }
        if requires_grad && !T::DTYPE.is_differentiable() {
            return Err(TensorError::NotDifferentiable { dtype: T::DTYPE });
        }
        let needs_node = requires_grad && self.inner.borrow().node.is_none();
        let node = needs_node.then(|| Node::leaf(&self.inner));
        let mut inner = self.inner.borrow_mut();
        inner.requires_grad = requires_grad;
        if !requires_grad {
            inner.node = None;
        } else if node.is_some() {
            inner.node = node;
            inner.slot = 0;
        }
        Ok(())
    }

    /// Whether operations on this value are tracked.
    pub fn requires_grad(&self) -> bool {
        self.inner.borrow().requires_grad
    }

    /// True unless the value was produced by a recorded operation.
    pub fn is_leaf(&self) -> bool {
        self.inner.borrow().is_leaf
    }

    /// The payload. Cheap: the buffer is shared, not copied.
    pub fn data(&self) -> Array<T> {
        self.inner.borrow().data.clone()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.inner.borrow().data.shape().to_vec()
    }

    pub fn ndim(&self) -> usize {
        self.inner.borrow().data.ndim()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The single element of a one-element value.
    pub fn item(&self) -> Option<T> {
        self.inner.borrow().data.item()
    }

    /// Copy of the data in column-major order.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.borrow().data.data().to_vec()
    }

    /// Gradient accumulated by backward passes.
    pub fn grad(&self) -> Option<Array<T>> {
        self.inner.borrow().grad.clone()
    }

    /// Reset an existing gradient to zeros.
    pub fn zero_grad(&self) {
        let mut inner = self.inner.borrow_mut();
        if let Some(grad) = inner.grad.as_mut() {
            *grad = grad.zeros_like();
        }
    }

    /// Drop the gradient entirely.
    pub fn clear_grad(&self) {
        self.inner.borrow_mut().grad = None;
    }

    /// Forward-mode tangent, if one was attached or propagated.
    pub fn tangent(&self) -> Option<Array<T>> {
        self.inner.borrow().tangent.clone()
    }

    pub(crate) fn has_tangent(&self) -> bool {
        self.inner.borrow().tangent.is_some()
    }

    /// Number of in-place mutations so far.
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Id of the node this value belongs to (including leaf nodes).
    pub fn node_id(&self) -> Option<NodeId> {
        self.inner.borrow().node.as_ref().map(|node| node.id())
    }

    /// Id and operation name of the recorded operation that produced this value.
    ///
    /// `None` for leaves.
    pub fn producer(&self) -> Option<(NodeId, &'static str)> {
        let inner = self.inner.borrow();
        inner
            .node
            .as_ref()
            .filter(|node| !node.is_leaf())
            .map(|node| (node.id(), node.op_name()))
    }

    pub(crate) fn node(&self) -> Option<Rc<Node<T>>> {
        self.inner.borrow().node.clone()
    }

    pub(crate) fn slot(&self) -> usize {
        self.inner.borrow().slot
    }

    /// Edge to record when this value is consumed by an operation.
    pub(crate) fn edge(&self) -> Option<Edge<T>> {
        let inner = self.inner.borrow();
        inner.node.as_ref().map(|node| Edge {
            node: Rc::clone(node),
            slot: inner.slot,
            version: inner.version,
        })
    }

    /// Keep this intermediate value's gradient on backward passes.
    ///
    /// # Errors
    ///
    /// `InvalidRetain` if the value has no producing operation.
    pub fn retain(&self) -> Result<(), TensorError> {
        self.set_retain(true)
    }

    /// Stop keeping this intermediate value's gradient.
    pub fn unretain(&self) -> Result<(), TensorError> {
        self.set_retain(false)
    }

    fn set_retain(&self, retain: bool) -> Result<(), TensorError> {
        let inner = self.inner.borrow();
        match inner.node.as_ref() {
            Some(node) if !node.is_leaf() => {
                node.set_retain(retain);
                Ok(())
            }
            _ => Err(TensorError::InvalidRetain),
        }
    }

    /// Whether backward passes store a gradient on this intermediate value.
    pub fn retains_grad(&self) -> bool {
        self.node().is_some_and(|node| node.retains_grad())
    }

    /// An untracked value sharing this value's data.
    pub fn detach(&self) -> Self {
        Self::new(self.data())
    }

    /// Replace the payload in place. Graphs that consumed the old payload
    /// become stale.
    pub fn assign(&self, data: Array<T>) -> Result<(), TensorError> {
        let mut inner = self.inner.borrow_mut();
        if inner.data.shape() != data.shape() {
            return Err(TensorError::IncompatibleShapes {
                lhs: inner.data.shape().to_vec(),
                rhs: data.shape().to_vec(),
            });
        }
        inner.data = data;
        inner.version += 1;
        Ok(())
    }

    /// Map every element in place.
    pub fn update(&self, f: impl Fn(T) -> T) {
        let mut inner = self.inner.borrow_mut();
        inner.data = inner.data.map(f);
        inner.version += 1;
    }

    /// Whether both handles refer to the same value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Accumulate gradients of this one-element value into every leaf and
    /// retained value it depends on. Propagation stops at retained values.
    ///
    /// # Errors
    ///
    /// `MissingSeed` if the value has more than one element, `NotTracked` if
    /// it was not produced by a recorded operation.
    pub fn backward(&self) -> Result<(), TensorError> {
        run_backward(&[self.clone()], &[None], &[], Accumulation::Mutate).map(drop)
    }

    /// Like [`Tensor::backward`] with an explicit cotangent.
    pub fn backward_with(&self, cotangent: &Array<T>) -> Result<(), TensorError> {
        run_backward(
            &[self.clone()],
            &[Some(cotangent.clone())],
            &[],
            Accumulation::Mutate,
        )
        .map(drop)
    }
}

impl<T: Scalar> Debug for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Tensor")
            .field("shape", &inner.data.shape())
            .field("data", &inner.data.data())
            .field("requires_grad", &inner.requires_grad)
            .field("node", &inner.node.as_ref().map(|node| node.id()))
            .field("version", &inner.version)
            .finish()
    }
}

impl<T: Scalar> From<Array<T>> for Tensor<T> {
    fn from(data: Array<T>) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untracked_by_default() {
        let t = Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap();
        assert!(!t.requires_grad());
        assert!(t.is_leaf());
        assert!(t.node_id().is_none());
        assert!(t.grad().is_none());
    }

    #[test]
    fn test_tracked_leaf_has_node_but_no_producer() {
        let t = Tensor::tracked(Array::<f64>::ones(&[2])).unwrap();
        assert!(t.requires_grad());
        assert!(t.node_id().is_some());
        assert!(t.producer().is_none());
    }

    #[test]
    fn test_integer_cannot_be_tracked() {
        let t = Tensor::from_vec(vec![1_i64, 2], &[2]).unwrap();
        assert!(matches!(
            t.set_requires_grad(true),
            Err(TensorError::NotDifferentiable { .. })
        ));
        assert!(Tensor::tracked(Array::<i32>::zeros(&[1])).is_err());
    }

    #[test]
    fn test_set_requires_grad_off_drops_node() {
        let t = Tensor::tracked(Array::<f64>::ones(&[1])).unwrap();
        t.set_requires_grad(false).unwrap();
        assert!(!t.requires_grad());
        assert!(t.node_id().is_none());
    }

    #[test]
    fn test_clone_aliases_detach_does_not() {
        let t = Tensor::tracked(Array::<f64>::ones(&[2])).unwrap();
        let alias = t.clone();
        let detached = t.detach();
        assert!(alias.ptr_eq(&t));
        assert!(!detached.ptr_eq(&t));
        assert!(!detached.requires_grad());
        assert!(detached.data().shares_storage_with(&t.data()));
    }

    #[test]
    fn test_assign_and_update_bump_version() {
        let t = Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap();
        assert_eq!(t.version(), 0);
        t.assign(Array::from_vec(vec![3.0, 4.0], &[2]).unwrap()).unwrap();
        t.update(|x| x * 2.0);
        assert_eq!(t.version(), 2);
        assert_eq!(t.to_vec(), vec![6.0, 8.0]);
        assert!(t.assign(Array::zeros(&[3])).is_err());
    }

    #[test]
    fn test_retain_requires_producer() {
        let leaf = Tensor::tracked(Array::<f64>::ones(&[2])).unwrap();
        assert!(matches!(leaf.retain(), Err(TensorError::InvalidRetain)));
        assert!(matches!(
            Tensor::<f64>::zeros(&[1]).unretain(),
            Err(TensorError::InvalidRetain)
        ));
        let y = leaf.exp().unwrap();
        y.retain().unwrap();
        assert!(y.retains_grad());
        y.unretain().unwrap();
        assert!(!y.retains_grad());
    }

    #[test]
    fn test_with_tangent_checks_shape() {
        let ok = Tensor::with_tangent(Array::<f64>::ones(&[2]), Array::zeros(&[2])).unwrap();
        assert!(ok.tangent().is_some());
        assert!(Tensor::with_tangent(Array::<f64>::ones(&[2]), Array::zeros(&[3])).is_err());
    }

    #[test]
    fn test_zero_and_clear_grad() {
        let x = Tensor::tracked(Array::from_vec(vec![1.0, 2.0], &[2]).unwrap()).unwrap();
        x.sum_all().unwrap().backward().unwrap();
        assert_eq!(x.grad().unwrap().data(), &[1.0, 1.0]);
        x.zero_grad();
        assert_eq!(x.grad().unwrap().data(), &[0.0, 0.0]);
        x.clear_grad();
        assert!(x.grad().is_none());
    }
}
