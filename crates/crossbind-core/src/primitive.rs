//! Built-in primitive kinds and their numeric limits.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::TypeHash;

/// The primitive shapes every registry knows about from the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PrimitiveKind {
    Void = 0,
    Bool = 1,
    Int8 = 2,
    Int16 = 3,
    Int32 = 4,
    Int64 = 5,
    Uint8 = 6,
    Uint16 = 7,
    Uint32 = 8,
    Uint64 = 9,
    Float = 10,
    Double = 11,
}

impl PrimitiveKind {
    /// Iterate over every primitive kind in tag order.
    pub fn all() -> impl Iterator<Item = PrimitiveKind> {
        (0u8..=u8::MAX).map_while(|tag| PrimitiveKind::try_from(tag).ok())
    }

    /// The registered name of this primitive.
    pub const fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Void => "void",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Int8 => "int8",
            PrimitiveKind::Int16 => "int16",
            PrimitiveKind::Int32 => "int32",
            PrimitiveKind::Int64 => "int64",
            PrimitiveKind::Uint8 => "uint8",
            PrimitiveKind::Uint16 => "uint16",
            PrimitiveKind::Uint32 => "uint32",
            PrimitiveKind::Uint64 => "uint64",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        }
    }

    /// The type hash of this primitive's descriptor.
    pub fn type_hash(self) -> TypeHash {
        TypeHash::from_name(self.name())
    }

    pub const fn is_integer(self) -> bool {
        self.int_range().is_some()
    }

    pub const fn is_float(self) -> bool {
        matches!(self, PrimitiveKind::Float | PrimitiveKind::Double)
    }

    /// 8-bit kinds are the only ones allowed to wrap.
    pub const fn is_byte_sized(self) -> bool {
        matches!(self, PrimitiveKind::Int8 | PrimitiveKind::Uint8)
    }

    /// Inclusive range of representable values for integer kinds.
    pub const fn int_range(self) -> Option<(i128, i128)> {
        match self {
            PrimitiveKind::Int8 => Some((i8::MIN as i128, i8::MAX as i128)),
            PrimitiveKind::Int16 => Some((i16::MIN as i128, i16::MAX as i128)),
            PrimitiveKind::Int32 => Some((i32::MIN as i128, i32::MAX as i128)),
            PrimitiveKind::Int64 => Some((i64::MIN as i128, i64::MAX as i128)),
            PrimitiveKind::Uint8 => Some((0, u8::MAX as i128)),
            PrimitiveKind::Uint16 => Some((0, u16::MAX as i128)),
            PrimitiveKind::Uint32 => Some((0, u32::MAX as i128)),
            PrimitiveKind::Uint64 => Some((0, u64::MAX as i128)),
            _ => None,
        }
    }
}

/// How out-of-range integers are treated when entering native code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IntegerPolicy {
    /// Reject values outside the representable range.
    #[default]
    Checked,
    /// Reduce modulo 2^8 using two's-complement arithmetic. 8-bit kinds only.
    Wrapping,
}

/// Wrap `value` into an 8-bit integer kind.
///
/// Returns `None` for kinds that are not byte sized.
pub fn wrap_to_byte(kind: PrimitiveKind, value: i128) -> Option<i128> {
    let low = (value & 0xff) as u8;
    match kind {
        PrimitiveKind::Uint8 => Some(low as i128),
        PrimitiveKind::Int8 => Some(low as i8 as i128),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_kinds_in_tag_order() {
        let kinds: Vec<_> = PrimitiveKind::all().collect();
        assert_eq!(kinds.len(), 12);
        assert_eq!(kinds[0], PrimitiveKind::Void);
        assert_eq!(kinds[11], PrimitiveKind::Double);
        assert_eq!(u8::from(PrimitiveKind::Int32), 4);
    }

    #[test]
    fn int_ranges() {
        assert_eq!(PrimitiveKind::Int8.int_range(), Some((-128, 127)));
        assert_eq!(PrimitiveKind::Uint64.int_range(), Some((0, u64::MAX as i128)));
        assert_eq!(PrimitiveKind::Double.int_range(), None);
        assert!(PrimitiveKind::Uint16.is_integer());
        assert!(!PrimitiveKind::Bool.is_integer());
    }

    #[test]
    fn wrapping_is_twos_complement() {
        assert_eq!(wrap_to_byte(PrimitiveKind::Uint8, 256), Some(0));
        assert_eq!(wrap_to_byte(PrimitiveKind::Uint8, 300), Some(44));
        assert_eq!(wrap_to_byte(PrimitiveKind::Uint8, -1), Some(255));
        assert_eq!(wrap_to_byte(PrimitiveKind::Int8, 128), Some(-128));
        assert_eq!(wrap_to_byte(PrimitiveKind::Int8, 255), Some(-1));
        assert_eq!(wrap_to_byte(PrimitiveKind::Int8, -129), Some(127));
        assert_eq!(wrap_to_byte(PrimitiveKind::Int16, 5), None);
    }

    #[test]
    fn names_hash_distinctly() {
        let hashes: Vec<_> = PrimitiveKind::all().map(PrimitiveKind::type_hash).collect();
        for (i, a) in hashes.iter().enumerate() {
            for b in &hashes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
