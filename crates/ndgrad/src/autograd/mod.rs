//! Automatic differentiation for [`Array`](crate::Array) computations.
//!
//! Reverse mode records a graph of operation nodes as tracked operations run
//! and walks it backwards from the outputs. Forward mode carries a tangent
//! alongside each value and needs no graph. Which of the two (or both) are
//! active is controlled per thread by a [`GradMode`].
//!
//! # Architecture
//!
//! ```text
//! Tensor<T> ──owns──► TensorInner { data, grad, tangent, version }
//!     │                       │
//!     │ node, slot            ▼
//!     └──────────────► Node<T> { op: Op<T>, parents: [Edge], outputs: [Weak] }
//!                             │
//!              backward() ────┼──► GraphSnapshot ──► toposort ──► op.vjp
//!                             │
//!              forward mode ──┴──► op.jvp at record time
//! ```
//!
//! # Example
//!
//! ```
//! use ndgrad::Array;
//! use ndgrad::autograd::{Tensor, jacfwd, jacrev};
//!
//! let x = Tensor::tracked(Array::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap()).unwrap();
//! let w = Tensor::from_vec(vec![0.5, -1.0, 2.0], &[3]).unwrap();
//!
//! // Reverse mode: gradient of a scalar loss.
//! let loss = x.mul(&w).unwrap().sum_all().unwrap();
//! loss.backward().unwrap();
//! assert_eq!(x.grad().unwrap().data(), w.data().data());
//!
//! // Jacobians from either mode agree.
//! let f = |v: &[Tensor<f64>]| v[0].sin();
//! let (y, jr) = jacrev(&[x.clone()], f, 0).unwrap();
//! let (_, jf) = jacfwd(&[x.clone()], f, 0).unwrap();
//! assert!(!y.requires_grad());
//! assert_eq!(jr.shape(), &[3, 3]);
//! assert_eq!(jr.data(), jf.data());
//! ```
//!
//! # Design Notes
//!
//! - Everything is `Rc`-based and therefore `!Send`; each thread is an
//!   independent differentiation context.
//! - Nodes hold their inputs' producers strongly and their own outputs
//!   weakly, so dropping the last value of a graph frees it.
//! - In-place mutation ([`Tensor::assign`], [`Tensor::update`]) bumps a
//!   version counter; a backward pass through a node whose inputs changed
//!   fails with [`StaleGraph`](crate::TensorError::StaleGraph).

mod backward;
mod functional;
mod graph;
mod mode;
mod node;
mod op;
mod ops;
mod record;
mod tensor;

pub use functional::{backward, grad, jacfwd, jacrev, jvp, vjp};
pub use mode::{GradMode, ModeGuard, current_mode, enable_grad, is_grad_enabled, no_grad, with_mode};
pub use node::NodeId;
pub use ops::concat;
pub use tensor::Tensor;
