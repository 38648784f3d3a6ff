//! Tracked operations on [`Tensor`](super::Tensor).
//!
//! Each method runs the array kernel, captures what the derivative rules
//! need in an `Op`, and hands both to the recorder.

mod arithmetic;
mod linalg;
mod reduce;
mod shape;
mod unary;

pub use shape::concat;
