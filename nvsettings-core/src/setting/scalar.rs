//! Rust scalar types a setting can hold

use crate::store::{ScalarKind, ScalarValue};
use std::fmt;

/// A fixed-width scalar with a dedicated store read/write pairing
pub trait Scalar: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Kind used when reading from and writing to the store
    const KIND: ScalarKind;

    fn into_value(self) -> ScalarValue;

    /// Extract `Self` from a value of the matching kind
    fn from_value(value: ScalarValue) -> Option<Self>;
}

macro_rules! impl_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Scalar for $ty {
                const KIND: ScalarKind = ScalarKind::$variant;

                fn into_value(self) -> ScalarValue {
                    ScalarValue::$variant(self)
                }

                fn from_value(value: ScalarValue) -> Option<Self> {
                    match value {
                        ScalarValue::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_scalar! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    bool => Bool,
    f32 => F32,
    f64 => F64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_value() {
        assert_eq!(200u8.into_value().kind(), u8::KIND);
        assert_eq!((-5i64).into_value().kind(), i64::KIND);
        assert_eq!(true.into_value().kind(), bool::KIND);
    }

    #[test]
    fn test_from_value_rejects_other_kinds() {
        assert_eq!(u16::from_value(ScalarValue::U16(9)), Some(9));
        assert_eq!(u16::from_value(ScalarValue::U32(9)), None);
        assert_eq!(f64::from_value(ScalarValue::F32(1.0)), None);
    }
}
