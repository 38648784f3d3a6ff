//! Scalar trait for array element types.

use num_traits::{Num, NumCast, ToPrimitive};
use std::fmt::{self, Debug, Display};

/// Runtime tag for an element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
    I32,
    I64,
}

impl DType {
    /// Short lowercase name, e.g. `"f64"`.
    pub fn name(self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I32 => "i32",
            DType::I64 => "i64",
        }
    }

    /// Whether values of this type can carry gradients or tangents.
    pub fn is_differentiable(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }
}

impl Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Trait for scalar types supported by ndgrad.
///
/// Builds on `num_traits::Num` for arithmetic; transcendental functions are
/// evaluated through `f64`.
pub trait Scalar: Num + NumCast + Copy + PartialOrd + Debug + Default + 'static {
    /// Runtime tag for this type.
    const DTYPE: DType;

    /// Lossy conversion to `f64`.
    fn as_f64(self) -> f64 {
        ToPrimitive::to_f64(&self).unwrap_or(f64::NAN)
    }

    /// Lossy conversion from `f64`. Values that cannot be represented become zero.
    fn from_f64(value: f64) -> Self {
        <Self as NumCast>::from(value).unwrap_or_default()
    }

    /// Conversion from a count, used for means and tie splitting.
    fn from_usize(value: usize) -> Self {
        <Self as NumCast>::from(value).unwrap_or_default()
    }
}

macro_rules! impl_scalar {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Scalar for $ty {
                const DTYPE: DType = DType::$dtype;
            }
        )*
    };
}

impl_scalar!(f32 => F32, f64 => F64, i32 => I32, i64 => I64);

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::{One, Zero};

    #[test]
    fn test_differentiable_dtypes() {
        assert!(f64::DTYPE.is_differentiable());
        assert!(f32::DTYPE.is_differentiable());
        assert!(!i32::DTYPE.is_differentiable());
        assert!(!i64::DTYPE.is_differentiable());
    }

    #[test]
    fn test_zero_one() {
        assert_eq!(f64::zero(), 0.0);
        assert_eq!(f64::one(), 1.0);
        assert_eq!(i64::zero(), 0);
        assert_eq!(i32::one(), 1);
    }

    #[test]
    fn test_f64_roundtrip() {
        assert_eq!(f32::from_f64(0.5).as_f64(), 0.5);
        assert_eq!(i32::from_f64(3.0), 3);
        assert_eq!(i32::from_f64(f64::NAN), 0);
        assert_eq!(f64::from_usize(4), 4.0);
    }

    #[test]
    fn test_dtype_display() {
        assert_eq!(DType::I64.to_string(), "i64");
        assert_eq!(format!("{}", DType::F32), "f32");
    }
}
