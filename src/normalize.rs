//! Maps a plane's scalar dtype to a (scale, bias) pair that lands unsigned
//! integer samples in [0, 1], signed integer samples in [-1, 1], and leaves
//! float samples untouched.

/// Scalar dtype of one input plane, as reported by the caller.
///
/// Unknown/unsupported dtypes are represented by [`Dtype::Other`] and
/// degrade to the identity transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dtype {
    U8,
    U16,
    I8,
    I16,
    F32,
    Other,
}

/// An affine transform `scale * x + bias` applied while packing a plane's
/// samples into their canonical `f32` representation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Normalization {
    pub scale: f32,
    pub bias: f32,
}

impl Normalization {
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        self.scale * x + self.bias
    }

    pub const IDENTITY: Normalization = Normalization {
        scale: 1.0,
        bias: 0.0,
    };
}

/// Compute the (scale, bias) pair for a given dtype.
pub fn normalization_for(dtype: Dtype) -> Normalization {
    match dtype {
        Dtype::U8 => Normalization {
            scale: 1.0 / u8::MAX as f32,
            bias: 0.0,
        },
        Dtype::U16 => Normalization {
            scale: 1.0 / u16::MAX as f32,
            bias: 0.0,
        },
        Dtype::I8 => Normalization {
            scale: 1.0 / i8::MAX as f32,
            bias: 0.0,
        },
        Dtype::I16 => Normalization {
            scale: 1.0 / i16::MAX as f32,
            bias: 0.0,
        },
        Dtype::F32 | Dtype::Other => Normalization::IDENTITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_dtypes_land_in_unit_interval() {
        let n = normalization_for(Dtype::U8);
        assert_eq!(n.apply(0.0), 0.0);
        assert!((n.apply(u8::MAX as f32) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn signed_dtypes_land_in_symmetric_interval() {
        let n = normalization_for(Dtype::I16);
        assert!((n.apply(i16::MAX as f32) - 1.0).abs() < 1e-6);
        assert!((n.apply(i16::MIN as f32) + 1.0).abs() < 2e-4);
    }

    #[test]
    fn float_and_unknown_are_identity() {
        assert_eq!(normalization_for(Dtype::F32), Normalization::IDENTITY);
        assert_eq!(normalization_for(Dtype::Other), Normalization::IDENTITY);
    }
}
