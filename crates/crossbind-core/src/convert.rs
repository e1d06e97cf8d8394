//! Conversion traits between Rust values and [`NativeValue`].
//!
//! Native function bodies use these to read typed arguments and set typed
//! returns:
//!
//! - [`FromNative`]: extract a Rust value from a [`NativeValue`]
//! - [`IntoNative`]: convert a Rust value into a [`NativeValue`]
//!
//! ```
//! use crossbind_core::{FromNative, IntoNative, NativeValue};
//!
//! let value = 42i32.into_native();
//! assert_eq!(i32::from_native(&value).unwrap(), 42);
//! ```

use crate::error::ConversionError;
use crate::value::NativeValue;

/// Extract a Rust value from a native value.
pub trait FromNative: Sized {
    fn from_native(value: &NativeValue) -> Result<Self, ConversionError>;
}

/// Convert a Rust value into a native value.
pub trait IntoNative {
    fn into_native(self) -> NativeValue;
}

// ============================================================================
// Primitive implementations
// ============================================================================

macro_rules! impl_native_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromNative for $ty {
                fn from_native(value: &NativeValue) -> Result<Self, ConversionError> {
                    match value {
                        NativeValue::$variant(v) => Ok(*v),
                        other => Err(ConversionError::mismatch(stringify!($ty), other.type_name())),
                    }
                }
            }

            impl IntoNative for $ty {
                fn into_native(self) -> NativeValue {
                    NativeValue::$variant(self)
                }
            }
        )*
    };
}

impl_native_primitive!(
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);

impl FromNative for String {
    fn from_native(value: &NativeValue) -> Result<Self, ConversionError> {
        match value {
            NativeValue::Text(v) => Ok(v.clone()),
            other => Err(ConversionError::mismatch("string", other.type_name())),
        }
    }
}

impl IntoNative for String {
    fn into_native(self) -> NativeValue {
        NativeValue::Text(self)
    }
}

impl IntoNative for &str {
    fn into_native(self) -> NativeValue {
        NativeValue::Text(self.to_string())
    }
}

impl FromNative for Vec<u8> {
    fn from_native(value: &NativeValue) -> Result<Self, ConversionError> {
        match value {
            NativeValue::Bytes(v) => Ok(v.clone()),
            other => Err(ConversionError::mismatch("bytes", other.type_name())),
        }
    }
}

impl IntoNative for Vec<u8> {
    fn into_native(self) -> NativeValue {
        NativeValue::Bytes(self)
    }
}

impl IntoNative for () {
    fn into_native(self) -> NativeValue {
        NativeValue::Void
    }
}

impl IntoNative for NativeValue {
    fn into_native(self) -> NativeValue {
        self
    }
}

/// `Absent` maps to `None`.
impl<T: FromNative> FromNative for Option<T> {
    fn from_native(value: &NativeValue) -> Result<Self, ConversionError> {
        match value {
            NativeValue::Absent => Ok(None),
            other => T::from_native(other).map(Some),
        }
    }
}

impl<T: IntoNative> IntoNative for Option<T> {
    fn into_native(self) -> NativeValue {
        self.map_or(NativeValue::Absent, IntoNative::into_native)
    }
}
