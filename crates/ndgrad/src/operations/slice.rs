//! Strided slicing and its scatter inverse.

use std::ops::{Range, RangeFull};

use crate::array::Array;
use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::strides::{cartesian_to_linear, increment_index, num_elements};

/// Slice specification for one axis.
///
/// `start` and `end` may be negative, counting from the end of the axis.
/// Bounds are clamped to the axis like Python slices; `None` means the
/// corresponding end of the axis. `step` must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceRange {
    pub start: Option<isize>,
    pub end: Option<isize>,
    pub step: isize,
}

impl SliceRange {
    pub fn new(start: Option<isize>, end: Option<isize>, step: isize) -> Self {
        Self { start, end, step }
    }

    /// The whole axis.
    pub fn full() -> Self {
        Self::new(None, None, 1)
    }

    /// `start..end` with unit step.
    pub fn range(start: isize, end: isize) -> Self {
        Self::new(Some(start), Some(end), 1)
    }

    /// Same bounds with a different step.
    pub fn step_by(self, step: isize) -> Self {
        Self { step, ..self }
    }

    /// Resolve against an axis of `size`, returning `(first index, count)`.
    fn resolve(&self, dim: usize, size: usize) -> Result<(usize, usize), TensorError> {
        if self.step <= 0 {
            return Err(TensorError::InvalidSliceStep {
                dim,
                step: self.step,
            });
        }
        let size_i = size as isize;
        let clamp = |bound: isize| {
            let bound = if bound < 0 { bound + size_i } else { bound };
            bound.clamp(0, size_i) as usize
        };
        let start = self.start.map_or(0, clamp);
        let end = self.end.map_or(size, clamp);
        let step = self.step as usize;
        let count = if end > start { (end - start).div_ceil(step) } else { 0 };
        Ok((start, count))
    }
}

impl From<Range<isize>> for SliceRange {
    fn from(range: Range<isize>) -> Self {
        Self::range(range.start, range.end)
    }
}

impl From<RangeFull> for SliceRange {
    fn from(_: RangeFull) -> Self {
        Self::full()
    }
}

/// A slice resolved against a concrete shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSlice {
    /// Shape of the array being sliced.
    pub source_shape: Vec<usize>,
    starts: Vec<usize>,
    steps: Vec<usize>,
    /// Shape of the slice.
    pub shape: Vec<usize>,
}

impl ResolvedSlice {
    /// Resolve one range per axis of `shape`.
    ///
    /// # Errors
    ///
    /// `WrongNumberOfIndices` if the range count differs from the rank,
    /// `InvalidSliceStep` for a non-positive step.
    pub fn new(shape: &[usize], ranges: &[SliceRange]) -> Result<Self, TensorError> {
        if ranges.len() != shape.len() {
            return Err(TensorError::WrongNumberOfIndices {
                expected: shape.len(),
                actual: ranges.len(),
            });
        }
        let mut starts = Vec::with_capacity(shape.len());
        let mut steps = Vec::with_capacity(shape.len());
        let mut out = Vec::with_capacity(shape.len());
        for (dim, (range, &size)) in ranges.iter().zip(shape).enumerate() {
            let (start, count) = range.resolve(dim, size)?;
            starts.push(start);
            steps.push(range.step as usize);
            out.push(count);
        }
        Ok(Self {
            source_shape: shape.to_vec(),
            starts,
            steps,
            shape: out,
        })
    }

    /// Visit `(slice linear index, source linear index)` pairs in column-major order.
    fn for_each_pair(&self, mut f: impl FnMut(usize, usize)) {
        let source_strides = crate::strides::compute_strides(&self.source_shape);
        let mut index = vec![0usize; self.shape.len()];
        let mut source_index = vec![0usize; self.shape.len()];
        for linear in 0..num_elements(&self.shape) {
            for (axis, src) in source_index.iter_mut().enumerate() {
                *src = self.starts[axis] + index[axis] * self.steps[axis];
            }
            f(linear, cartesian_to_linear(&source_index, &source_strides));
            increment_index(&mut index, &self.shape);
        }
    }

    /// Copy the selected elements out of `array`.
    pub fn gather<T: Scalar>(&self, array: &Array<T>) -> Result<Array<T>, TensorError> {
        self.check_source(array.shape())?;
        let src = array.data();
        let mut data = Vec::with_capacity(num_elements(&self.shape));
        self.for_each_pair(|_, s| data.push(src[s]));
        Array::from_vec(data, &self.shape)
    }

    /// Place `values` (shaped like the slice) into zeros of the source shape.
    pub fn scatter<T: Scalar>(&self, values: &Array<T>) -> Result<Array<T>, TensorError> {
        if values.shape() != self.shape.as_slice() {
            return Err(TensorError::IncompatibleShapes {
                lhs: values.shape().to_vec(),
                rhs: self.shape.clone(),
            });
        }
        let mut out = Array::zeros(&self.source_shape);
        let dst = out.data_mut();
        let src = values.data();
        self.for_each_pair(|v, s| dst[s] = dst[s] + src[v]);
        Ok(out)
    }

    fn check_source(&self, shape: &[usize]) -> Result<(), TensorError> {
        if shape != self.source_shape.as_slice() {
            return Err(TensorError::IncompatibleShapes {
                lhs: shape.to_vec(),
                rhs: self.source_shape.clone(),
            });
        }
        Ok(())
    }
}

/// Extract a slice from an array, one range per axis.
///
/// This creates a copy of the sliced data (not a view).
///
/// # Example
///
/// ```
/// use ndgrad::Array;
/// use ndgrad::operations::{SliceRange, slice};
///
/// let a: Array<f64> = Array::ones(&[4, 5, 6]);
/// let s = slice(&a, &[SliceRange::range(1, 3), SliceRange::full(), SliceRange::range(-2, 6)]).unwrap();
/// assert_eq!(s.shape(), &[2, 5, 2]);
/// ```
pub fn slice<T: Scalar>(array: &Array<T>, ranges: &[SliceRange]) -> Result<Array<T>, TensorError> {
    ResolvedSlice::new(array.shape(), ranges)?.gather(array)
}
