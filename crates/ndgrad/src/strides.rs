//! Stride and index utilities.
//!
//! Storage is column-major (Fortran) order: the first axis varies fastest.

/// Compute column-major strides from shape.
///
/// For shape [d0, d1, d2, ...], returns strides [1, d0, d0*d1, ...].
///
/// # Examples
///
/// ```
/// use ndgrad::strides::compute_strides;
///
/// assert_eq!(compute_strides(&[3, 4, 5]), vec![1, 3, 12]);
/// assert_eq!(compute_strides(&[5]), vec![1]);
/// assert_eq!(compute_strides(&[]), Vec::<usize>::new());
/// ```
pub fn compute_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = Vec::with_capacity(shape.len());
    let mut stride = 1;
    for &dim in shape {
        strides.push(stride);
        stride *= dim;
    }
    strides
}

/// Number of elements described by a shape. The empty shape holds one element.
#[inline]
pub fn num_elements(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Convert cartesian indices to a linear offset.
#[inline]
pub fn cartesian_to_linear(indices: &[usize], strides: &[usize]) -> usize {
    indices
        .iter()
        .zip(strides)
        .map(|(&idx, &stride)| idx * stride)
        .sum()
}

/// Convert a linear offset to cartesian indices using column-major order.
pub fn linear_to_cartesian(mut linear: usize, shape: &[usize]) -> Vec<usize> {
    let mut indices = Vec::with_capacity(shape.len());
    for &dim in shape {
        indices.push(linear % dim);
        linear /= dim;
    }
    indices
}

/// Advance `indices` to the next position in column-major order.
///
/// Returns `false` once every position has been visited (the indices wrap
/// back to all zeros).
#[inline]
pub fn increment_index(indices: &mut [usize], shape: &[usize]) -> bool {
    for (idx, &dim) in indices.iter_mut().zip(shape) {
        *idx += 1;
        if *idx < dim {
            return true;
        }
        *idx = 0;
    }
    false
}

/// Strides for reading an array of `shape` as if it had `target` shape.
///
/// Shapes are aligned at their trailing axes; axes the source lacks or holds
/// with size 1 get stride 0. The caller guarantees the shapes broadcast.
pub fn broadcast_strides(shape: &[usize], target: &[usize]) -> Vec<usize> {
    let strides = compute_strides(shape);
    let offset = target.len() - shape.len();
    (0..target.len())
        .map(|axis| {
            if axis < offset || shape[axis - offset] == 1 {
                0
            } else {
                strides[axis - offset]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_strides_3d() {
        assert_eq!(compute_strides(&[3, 4, 5]), vec![1, 3, 12]);
        assert_eq!(compute_strides(&[2, 3]), vec![1, 2]);
    }

    #[test]
    fn test_num_elements_scalar() {
        assert_eq!(num_elements(&[]), 1);
        assert_eq!(num_elements(&[2, 0, 3]), 0);
    }

    #[test]
    fn test_cartesian_to_linear() {
        let strides = compute_strides(&[3, 4, 5]);
        // index [i, j, k] -> i + 3*j + 12*k
        assert_eq!(cartesian_to_linear(&[0, 0, 0], &strides), 0);
        assert_eq!(cartesian_to_linear(&[0, 1, 0], &strides), 3);
        assert_eq!(
            cartesian_to_linear(&[2, 3, 4], &strides),
            2 + 3 * 3 + 4 * 12
        );
    }

    #[test]
    fn test_linear_to_cartesian() {
        let shape = [3, 4, 5];
        assert_eq!(linear_to_cartesian(1, &shape), vec![1, 0, 0]);
        assert_eq!(linear_to_cartesian(12, &shape), vec![0, 0, 1]);
    }

    #[test]
    fn test_increment_index_visits_column_major() {
        let shape = [2, 3];
        let mut idx = vec![0, 0];
        let mut seen = vec![idx.clone()];
        while increment_index(&mut idx, &shape) {
            seen.push(idx.clone());
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(seen[1], vec![1, 0]);
        assert_eq!(seen[2], vec![0, 1]);
        assert_eq!(idx, vec![0, 0]);
    }

    #[test]
    fn test_broadcast_strides() {
        // (4, 5) read as (3, 4, 5): leading axis is new
        assert_eq!(broadcast_strides(&[4, 5], &[3, 4, 5]), vec![0, 1, 4]);
        // (3, 1) read as (3, 4)
        assert_eq!(broadcast_strides(&[3, 1], &[3, 4]), vec![1, 0]);
        assert_eq!(broadcast_strides(&[], &[2]), vec![0]);
    }
}
