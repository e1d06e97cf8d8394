//! Primitive conversions.
//!
//! Integers convert exactly or not at all, including into floats: an integer
//! the float type cannot hold exactly is rejected rather than rounded. The
//! only sanctioned narrowing is two's-complement wrapping into an 8-bit type
//! declared with [`IntegerPolicy::Wrapping`].

use crossbind_core::primitive::wrap_to_byte;
use crossbind_core::{ConversionError, DynamicValue, IntegerPolicy, NativeValue, PrimitiveKind};

use crate::conversion::{Conversion, ConversionKind};

pub(crate) fn score(
    value: &DynamicValue,
    kind: PrimitiveKind,
    policy: IntegerPolicy,
) -> Option<Conversion> {
    match (kind, value) {
        (PrimitiveKind::Void, DynamicValue::None) => Some(Conversion::identity()),
        (PrimitiveKind::Bool, DynamicValue::Bool(_)) => Some(Conversion::identity()),
        (PrimitiveKind::Float | PrimitiveKind::Double, DynamicValue::Float(_)) => {
            Some(Conversion::identity())
        }
        (PrimitiveKind::Float | PrimitiveKind::Double, DynamicValue::Int(v)) => {
            exact_float(*v, kind).map(|_| {
                Conversion::implicit(ConversionKind::IntToFloat, Conversion::COST_INT_TO_FLOAT)
            })
        }
        (_, DynamicValue::Int(v)) => {
            let (min, max) = kind.int_range()?;
            if (min..=max).contains(v) {
                Some(Conversion::identity())
            } else if policy == IntegerPolicy::Wrapping && kind.is_byte_sized() {
                Some(Conversion::implicit(
                    ConversionKind::WrappingNarrow,
                    Conversion::COST_WRAPPING_NARROW,
                ))
            } else {
                None
            }
        }
        _ => None,
    }
}

pub(crate) fn to_native(
    value: &DynamicValue,
    kind: PrimitiveKind,
    policy: IntegerPolicy,
) -> Result<NativeValue, ConversionError> {
    match (kind, value) {
        (PrimitiveKind::Void, DynamicValue::None) => Ok(NativeValue::Void),
        (PrimitiveKind::Bool, DynamicValue::Bool(v)) => Ok(NativeValue::Bool(*v)),
        (PrimitiveKind::Double, DynamicValue::Float(v)) => Ok(NativeValue::F64(*v)),
        (PrimitiveKind::Float, DynamicValue::Float(v)) => narrow_float(*v),
        (PrimitiveKind::Float | PrimitiveKind::Double, DynamicValue::Int(v)) => {
            exact_float(*v, kind)
                .ok_or(ConversionError::InexactFloat { value: *v, target_type: kind.name() })
        }
        (_, DynamicValue::Int(v)) if kind.is_integer() => integer_to_native(*v, kind, policy),
        (_, other) => Err(ConversionError::mismatch(kind.name(), other.type_name())),
    }
}

pub(crate) fn to_dynamic(
    value: NativeValue,
    kind: PrimitiveKind,
) -> Result<DynamicValue, ConversionError> {
    match (kind, &value) {
        (PrimitiveKind::Void, NativeValue::Void) => Ok(DynamicValue::None),
        (PrimitiveKind::Bool, NativeValue::Bool(v)) => Ok(DynamicValue::Bool(*v)),
        (PrimitiveKind::Float | PrimitiveKind::Double, NativeValue::F32(v)) => {
            Ok(DynamicValue::Float(f64::from(*v)))
        }
        (PrimitiveKind::Float | PrimitiveKind::Double, NativeValue::F64(v)) => {
            Ok(DynamicValue::Float(*v))
        }
        _ => match (kind.int_range(), value.as_integer()) {
            (Some((min, max)), Some(v)) if (min..=max).contains(&v) => Ok(DynamicValue::Int(v)),
            (Some(_), Some(v)) => {
                Err(ConversionError::IntegerOverflow { value: v, target_type: kind.name() })
            }
            _ => Err(ConversionError::mismatch(kind.name(), value.type_name())),
        },
    }
}

/// `value` as a float of `kind`, if the float holds it exactly.
fn exact_float(value: i128, kind: PrimitiveKind) -> Option<NativeValue> {
    // i128::MAX rounds up to 2^127, which saturates back to i128::MAX
    if value == i128::MAX {
        return None;
    }
    match kind {
        PrimitiveKind::Double => {
            let float = value as f64;
            (float as i128 == value).then_some(NativeValue::F64(float))
        }
        PrimitiveKind::Float => {
            let float = value as f32;
            (float as i128 == value).then_some(NativeValue::F32(float))
        }
        _ => None,
    }
}

fn narrow_float(value: f64) -> Result<NativeValue, ConversionError> {
    if value.is_finite() && value.abs() > f32::MAX as f64 {
        return Err(ConversionError::FloatConversion { value, target_type: "float" });
    }
    Ok(NativeValue::F32(value as f32))
}

fn integer_to_native(
    value: i128,
    kind: PrimitiveKind,
    policy: IntegerPolicy,
) -> Result<NativeValue, ConversionError> {
    let overflow = || ConversionError::IntegerOverflow { value, target_type: kind.name() };
    let (min, max) = kind.int_range().ok_or_else(overflow)?;
    let value = if (min..=max).contains(&value) {
        value
    } else if policy == IntegerPolicy::Wrapping {
        wrap_to_byte(kind, value).ok_or_else(overflow)?
    } else {
        return Err(overflow());
    };
    // in range for `kind` from here on
    let native = match kind {
        PrimitiveKind::Int8 => NativeValue::I8(value as i8),
        PrimitiveKind::Int16 => NativeValue::I16(value as i16),
        PrimitiveKind::Int32 => NativeValue::I32(value as i32),
        PrimitiveKind::Int64 => NativeValue::I64(value as i64),
        PrimitiveKind::Uint8 => NativeValue::U8(value as u8),
        PrimitiveKind::Uint16 => NativeValue::U16(value as u16),
        PrimitiveKind::Uint32 => NativeValue::U32(value as u32),
        PrimitiveKind::Uint64 => NativeValue::U64(value as u64),
        _ => return Err(overflow()),
    };
    Ok(native)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKED: IntegerPolicy = IntegerPolicy::Checked;
    const WRAPPING: IntegerPolicy = IntegerPolicy::Wrapping;

    // ========================================================================
    // Integers
    // ========================================================================

    #[test]
    fn integer_limits_are_exact() {
        let cases = [
            (PrimitiveKind::Int8, i8::MIN as i128, NativeValue::I8(i8::MIN)),
            (PrimitiveKind::Int8, i8::MAX as i128, NativeValue::I8(i8::MAX)),
            (PrimitiveKind::Int64, i64::MIN as i128, NativeValue::I64(i64::MIN)),
            (PrimitiveKind::Uint32, u32::MAX as i128, NativeValue::U32(u32::MAX)),
            (PrimitiveKind::Uint64, u64::MAX as i128, NativeValue::U64(u64::MAX)),
        ];
        for (kind, value, expected) in cases {
            assert_eq!(to_native(&DynamicValue::Int(value), kind, CHECKED).unwrap(), expected);
            assert!(score(&DynamicValue::Int(value), kind, CHECKED).unwrap().is_exact());
        }
    }

    #[test]
    fn out_of_range_fails() {
        let cases = [
            (PrimitiveKind::Int8, 128),
            (PrimitiveKind::Uint8, -1),
            (PrimitiveKind::Uint16, 65536),
            (PrimitiveKind::Int32, i32::MAX as i128 + 1),
            (PrimitiveKind::Uint64, u64::MAX as i128 + 1),
        ];
        for (kind, value) in cases {
            let err = to_native(&DynamicValue::Int(value), kind, CHECKED).unwrap_err();
            assert!(matches!(err, ConversionError::IntegerOverflow { .. }), "{kind:?} {value}");
            assert!(score(&DynamicValue::Int(value), kind, CHECKED).is_none());
        }
    }

    #[test]
    fn byte_types_wrap_when_sanctioned() {
        let wrap =
            |value: i128, kind| to_native(&DynamicValue::Int(value), kind, WRAPPING).unwrap();
        assert_eq!(wrap(300, PrimitiveKind::Uint8), NativeValue::U8(44));
        assert_eq!(wrap(-1, PrimitiveKind::Uint8), NativeValue::U8(255));
        assert_eq!(wrap(200, PrimitiveKind::Int8), NativeValue::I8(-56));
        let conv = score(&DynamicValue::Int(300), PrimitiveKind::Uint8, WRAPPING).unwrap();
        assert_eq!(conv.kind, ConversionKind::WrappingNarrow);
    }

    #[test]
    fn in_range_wrapping_values_are_exact() {
        assert!(score(&DynamicValue::Int(7), PrimitiveKind::Int8, WRAPPING).unwrap().is_exact());
    }

    #[test]
    fn to_dynamic_checks_range() {
        assert_eq!(
            to_dynamic(NativeValue::U64(u64::MAX), PrimitiveKind::Uint64).unwrap(),
            DynamicValue::Int(u64::MAX as i128)
        );
        let err = to_dynamic(NativeValue::I32(-1), PrimitiveKind::Uint8).unwrap_err();
        assert!(matches!(err, ConversionError::IntegerOverflow { .. }));
    }

    // ========================================================================
    // Floats and others
    // ========================================================================

    #[test]
    fn int_to_float_is_implicit() {
        let conv = score(&DynamicValue::Int(3), PrimitiveKind::Double, CHECKED).unwrap();
        assert_eq!(conv.kind, ConversionKind::IntToFloat);
        let native = to_native(&DynamicValue::Int(3), PrimitiveKind::Double, CHECKED).unwrap();
        assert_eq!(native, NativeValue::F64(3.0));
    }

    #[test]
    fn int_to_float_must_be_exact() {
        let above_f64 = DynamicValue::Int((1i128 << 53) + 1);
        assert!(score(&above_f64, PrimitiveKind::Double, CHECKED).is_none());
        let err = to_native(&above_f64, PrimitiveKind::Double, CHECKED).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::InexactFloat { value: 9007199254740993, target_type: "double" }
        ));
        let exact = to_native(&DynamicValue::Int(1i128 << 53), PrimitiveKind::Double, CHECKED);
        assert_eq!(exact.unwrap(), NativeValue::F64(9007199254740992.0));

        let above_f32 = DynamicValue::Int((1i128 << 24) + 1);
        assert!(score(&above_f32, PrimitiveKind::Float, CHECKED).is_none());
        assert!(score(&above_f32, PrimitiveKind::Double, CHECKED).is_some());
        assert!(matches!(
            to_native(&above_f32, PrimitiveKind::Float, CHECKED),
            Err(ConversionError::InexactFloat { .. })
        ));

        assert!(score(&DynamicValue::Int(i128::MAX), PrimitiveKind::Double, CHECKED).is_none());
        let (max, min) = (DynamicValue::Int(i64::MAX as i128), DynamicValue::Int(i64::MIN as i128));
        assert!(score(&max, PrimitiveKind::Double, CHECKED).is_none());
        assert!(score(&min, PrimitiveKind::Double, CHECKED).is_some());
    }

    #[test]
    fn float_never_becomes_int() {
        assert!(score(&DynamicValue::Float(1.0), PrimitiveKind::Int32, CHECKED).is_none());
        assert!(to_native(&DynamicValue::Float(1.0), PrimitiveKind::Int32, CHECKED).is_err());
    }

    #[test]
    fn f32_range_is_checked() {
        let err =
            to_native(&DynamicValue::Float(1e300), PrimitiveKind::Float, CHECKED).unwrap_err();
        assert!(matches!(err, ConversionError::FloatConversion { .. }));
        assert!(matches!(
            to_native(&DynamicValue::Float(f64::INFINITY), PrimitiveKind::Float, CHECKED).unwrap(),
            NativeValue::F32(v) if v.is_infinite()
        ));
    }

    #[test]
    fn bool_is_not_an_int() {
        assert!(score(&DynamicValue::Bool(true), PrimitiveKind::Int32, CHECKED).is_none());
        assert!(score(&DynamicValue::Int(1), PrimitiveKind::Bool, CHECKED).is_none());
    }

    #[test]
    fn void_accepts_none() {
        assert!(score(&DynamicValue::None, PrimitiveKind::Void, CHECKED).unwrap().is_exact());
        assert_eq!(to_dynamic(NativeValue::Void, PrimitiveKind::Void).unwrap(), DynamicValue::None);
    }
}
