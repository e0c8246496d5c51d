//! Fixed-width scalar values exchanged with a store backend
//!
//! Every value crossing the store boundary is tagged with its kind so a
//! backend can keep one read/write pairing per width and refuse reads of
//! the wrong width.

use std::fmt;

/// Scalar kinds a backend knows how to store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    Bool,
    F32,
    F64,
}

impl ScalarKind {
    /// All kinds in tag order
    pub const ALL: [ScalarKind; 11] = [
        ScalarKind::U8,
        ScalarKind::I8,
        ScalarKind::U16,
        ScalarKind::I16,
        ScalarKind::U32,
        ScalarKind::I32,
        ScalarKind::U64,
        ScalarKind::I64,
        ScalarKind::Bool,
        ScalarKind::F32,
        ScalarKind::F64,
    ];

    /// One-byte tag used in persisted layouts
    pub fn tag(self) -> u8 {
        match self {
            ScalarKind::U8 => 0x01,
            ScalarKind::I8 => 0x11,
            ScalarKind::U16 => 0x02,
            ScalarKind::I16 => 0x12,
            ScalarKind::U32 => 0x04,
            ScalarKind::I32 => 0x14,
            ScalarKind::U64 => 0x08,
            ScalarKind::I64 => 0x18,
            ScalarKind::Bool => 0x21,
            ScalarKind::F32 => 0x34,
            ScalarKind::F64 => 0x38,
        }
    }

    /// Inverse of [`ScalarKind::tag`]
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScalarKind::U8 => "u8",
            ScalarKind::I8 => "i8",
            ScalarKind::U16 => "u16",
            ScalarKind::I16 => "i16",
            ScalarKind::U32 => "u32",
            ScalarKind::I32 => "i32",
            ScalarKind::U64 => "u64",
            ScalarKind::I64 => "i64",
            ScalarKind::Bool => "bool",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged scalar value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    Bool(bool),
    F32(f32),
    F64(f64),
}

impl ScalarValue {
    pub fn kind(&self) -> ScalarKind {
        match self {
            ScalarValue::U8(_) => ScalarKind::U8,
            ScalarValue::I8(_) => ScalarKind::I8,
            ScalarValue::U16(_) => ScalarKind::U16,
            ScalarValue::I16(_) => ScalarKind::I16,
            ScalarValue::U32(_) => ScalarKind::U32,
            ScalarValue::I32(_) => ScalarKind::I32,
            ScalarValue::U64(_) => ScalarKind::U64,
            ScalarValue::I64(_) => ScalarKind::I64,
            ScalarValue::Bool(_) => ScalarKind::Bool,
            ScalarValue::F32(_) => ScalarKind::F32,
            ScalarValue::F64(_) => ScalarKind::F64,
        }
    }

    /// Widen to a 64-bit payload (signed values sign-extend, floats keep their bit pattern)
    pub fn to_bits(&self) -> u64 {
        match *self {
            ScalarValue::U8(v) => v as u64,
            ScalarValue::I8(v) => v as i64 as u64,
            ScalarValue::U16(v) => v as u64,
            ScalarValue::I16(v) => v as i64 as u64,
            ScalarValue::U32(v) => v as u64,
            ScalarValue::I32(v) => v as i64 as u64,
            ScalarValue::U64(v) => v,
            ScalarValue::I64(v) => v as u64,
            ScalarValue::Bool(v) => v as u64,
            ScalarValue::F32(v) => v.to_bits() as u64,
            ScalarValue::F64(v) => v.to_bits(),
        }
    }

    /// Narrow a 64-bit payload back into a value of `kind`
    ///
    /// Returns `None` when the payload does not fit the kind, which only
    /// happens for corrupted input.
    pub fn from_bits(kind: ScalarKind, bits: u64) -> Option<Self> {
        let value = match kind {
            ScalarKind::U8 => ScalarValue::U8(u8::try_from(bits).ok()?),
            ScalarKind::I8 => ScalarValue::I8(i8::try_from(bits as i64).ok()?),
            ScalarKind::U16 => ScalarValue::U16(u16::try_from(bits).ok()?),
            ScalarKind::I16 => ScalarValue::I16(i16::try_from(bits as i64).ok()?),
            ScalarKind::U32 => ScalarValue::U32(u32::try_from(bits).ok()?),
            ScalarKind::I32 => ScalarValue::I32(i32::try_from(bits as i64).ok()?),
            ScalarKind::U64 => ScalarValue::U64(bits),
            ScalarKind::I64 => ScalarValue::I64(bits as i64),
            ScalarKind::Bool => match bits {
                0 => ScalarValue::Bool(false),
                1 => ScalarValue::Bool(true),
                _ => return None,
            },
            ScalarKind::F32 => ScalarValue::F32(f32::from_bits(u32::try_from(bits).ok()?)),
            ScalarKind::F64 => ScalarValue::F64(f64::from_bits(bits)),
        };
        Some(value)
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::U8(v) => write!(f, "{}", v),
            ScalarValue::I8(v) => write!(f, "{}", v),
            ScalarValue::U16(v) => write!(f, "{}", v),
            ScalarValue::I16(v) => write!(f, "{}", v),
            ScalarValue::U32(v) => write!(f, "{}", v),
            ScalarValue::I32(v) => write!(f, "{}", v),
            ScalarValue::U64(v) => write!(f, "{}", v),
            ScalarValue::I64(v) => write!(f, "{}", v),
            ScalarValue::Bool(v) => write!(f, "{}", v),
            ScalarValue::F32(v) => write!(f, "{}", v),
            ScalarValue::F64(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_unique() {
        for kind in ScalarKind::ALL {
            assert_eq!(ScalarKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ScalarKind::from_tag(0xFF), None);
    }

    #[test]
    fn test_signed_values_sign_extend() {
        assert_eq!(ScalarValue::I8(-1).to_bits(), u64::MAX);
        assert_eq!(
            ScalarValue::from_bits(ScalarKind::I16, ScalarValue::I16(-300).to_bits()),
            Some(ScalarValue::I16(-300))
        );
    }

    #[test]
    fn test_out_of_range_payload_is_rejected() {
        assert_eq!(ScalarValue::from_bits(ScalarKind::U8, 256), None);
        assert_eq!(ScalarValue::from_bits(ScalarKind::Bool, 2), None);
        assert_eq!(ScalarValue::from_bits(ScalarKind::I8, 200), None);
    }

    #[test]
    fn test_float_bits_preserved() {
        let value = ScalarValue::F32(-0.5);
        assert_eq!(
            ScalarValue::from_bits(ScalarKind::F32, value.to_bits()),
            Some(value)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ScalarValue::I32(-7).to_string(), "-7");
        assert_eq!(ScalarValue::Bool(true).to_string(), "true");
        assert_eq!(ScalarKind::U64.to_string(), "u64");
    }
}
