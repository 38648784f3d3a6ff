//! ndgrad - n-dimensional arrays with automatic differentiation
//!
//! This crate provides column-major n-dimensional arrays and a define-by-run
//! differentiation engine on top of them, supporting both reverse mode
//! (backpropagation) and forward mode (tangent propagation).
//!
//! # Architecture
//!
//! ```text
//! Level 1: Differentiation drivers (autograd module)
//!     → backward, grad, vjp, jvp, jacrev, jacfwd
//!
//! Level 2: Tracked values and recorded operations
//!     → Tensor, Node, Op (vjp/jvp rules), GradMode
//!
//! Level 3: Array kernels (operations module)
//!     → broadcasting element-wise ops, matmul, reductions, reshaping
//! ```
//!
//! # Example
//!
//! ```
//! use ndgrad::Array;
//!
//! // Create a 2x3 zero-initialized array
//! let mut a: Array<f64> = Array::zeros(&[2, 3]);
//!
//! // Set and get elements
//! a.set(&[0, 1], 5.0).unwrap();
//! assert_eq!(a.get(&[0, 1]), Some(&5.0));
//!
//! // Create from data (column-major order)
//! let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
//! let b: Array<f64> = Array::from_vec(data, &[2, 3]).unwrap();
//! assert_eq!(b.get(&[1, 0]), Some(&2.0));
//! ```

pub mod array;
#[cfg(feature = "autodiff")]
pub mod autograd;
pub mod error;
pub mod operations;
#[cfg(feature = "random")]
pub mod random;
pub mod scalar;
pub mod strides;

pub use array::Array;
pub use error::TensorError;
#[cfg(feature = "random")]
pub use random::RandomScalar;
pub use scalar::{DType, Scalar};
