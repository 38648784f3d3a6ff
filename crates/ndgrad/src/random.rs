//! Random array construction.

use rand::Rng;
use rand::distr::StandardUniform;
use rand_distr::StandardNormal;

use crate::array::Array;
use crate::scalar::Scalar;

/// Float types that can be sampled from uniform and normal distributions.
pub trait RandomScalar: Scalar {
    /// Sample from the uniform distribution on [0, 1).
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self;

    /// Sample from the standard normal distribution.
    fn sample_normal<R: Rng>(rng: &mut R) -> Self;
}

impl RandomScalar for f64 {
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self {
        rng.sample(StandardUniform)
    }

    fn sample_normal<R: Rng>(rng: &mut R) -> Self {
        rng.sample(StandardNormal)
    }
}

impl RandomScalar for f32 {
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self {
        rng.sample(StandardUniform)
    }

    fn sample_normal<R: Rng>(rng: &mut R) -> Self {
        rng.sample(StandardNormal)
    }
}

impl<T: RandomScalar> Array<T> {
    /// Array with uniform random values in [0, 1).
    ///
    /// # Example
    ///
    /// ```
    /// use ndgrad::Array;
    ///
    /// let a: Array<f64> = Array::random(&[2, 3]);
    /// assert!(a.data().iter().all(|&v| (0.0..1.0).contains(&v)));
    /// ```
    pub fn random(shape: &[usize]) -> Self {
        Self::random_with_rng(shape, &mut rand::rng())
    }

    /// Uniform random values from a caller-supplied RNG, for reproducible runs.
    ///
    /// # Example
    ///
    /// ```
    /// use ndgrad::Array;
    /// use rand::SeedableRng;
    /// use rand::rngs::StdRng;
    ///
    /// let a1: Array<f64> = Array::random_with_rng(&[2, 3], &mut StdRng::seed_from_u64(42));
    /// let a2: Array<f64> = Array::random_with_rng(&[2, 3], &mut StdRng::seed_from_u64(42));
    /// assert_eq!(a1, a2);
    /// ```
    pub fn random_with_rng<R: Rng>(shape: &[usize], rng: &mut R) -> Self {
        Self::uniform_with_rng(shape, T::zero(), T::one(), rng)
    }

    /// Uniform random values in [low, high).
    pub fn uniform_with_rng<R: Rng>(shape: &[usize], low: T, high: T, rng: &mut R) -> Self {
        let width = high - low;
        Self::zeros(shape).map(|_: T| low + width * T::sample_uniform(rng))
    }

    /// Array with standard normal random values.
    pub fn randn(shape: &[usize]) -> Self {
        Self::randn_with_rng(shape, &mut rand::rng())
    }

    /// Standard normal values from a caller-supplied RNG.
    pub fn randn_with_rng<R: Rng>(shape: &[usize], rng: &mut R) -> Self {
        Self::zeros(shape).map(|_: T| T::sample_normal(rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_random_in_unit_interval() {
        let a: Array<f64> = Array::random(&[2, 3]);
        assert_eq!(a.shape(), &[2, 3]);
        for &v in a.data() {
            assert!((0.0..1.0).contains(&v), "value {} not in [0, 1)", v);
        }
    }

    #[test]
    fn test_uniform_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let a: Array<f32> = Array::uniform_with_rng(&[50], 0.5, 2.0, &mut rng);
        assert!(a.data().iter().all(|&v| (0.5..2.0).contains(&v)));
    }

    #[test]
    fn test_randn_reproducible() {
        let t1: Array<f64> = Array::randn_with_rng(&[3, 4], &mut StdRng::seed_from_u64(54321));
        let t2: Array<f64> = Array::randn_with_rng(&[3, 4], &mut StdRng::seed_from_u64(54321));
        assert_eq!(t1.data(), t2.data());
    }

    #[test]
    fn test_randn_moments() {
        let a: Array<f64> = Array::randn_with_rng(&[400], &mut StdRng::seed_from_u64(1));
        let mean = a.sum() / 400.0;
        assert!(mean.abs() < 0.3, "mean {} too far from 0", mean);
        let var = a.data().iter().map(|x| (x - mean).powi(2)).sum::<f64>() / 400.0;
        assert!(var > 0.5 && var < 1.5, "variance {} too far from 1", var);
    }

    #[test]
    fn test_random_scalar_shape() {
        let a: Array<f64> = Array::random(&[]);
        assert_eq!(a.len(), 1);
    }
}
