//! Values on either side of the boundary.
//!
//! [`DynamicValue`] is the finite set of runtime shapes the dynamic side can
//! hand over. [`NativeValue`] is the typed form native functions receive and
//! return. Converters pattern-match exhaustively on both.

use std::collections::BTreeMap;
use std::fmt;

use ordered_float::OrderedFloat;

use crate::callable::CallbackHandle;
use crate::object::ObjectValue;
use crate::wrapper::WrapperHandle;

/// Hashable, ordered mapping key shared by both sides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapKey {
    Bool(bool),
    Int(i128),
    Float(OrderedFloat<f64>),
    Text(String),
    Bytes(Vec<u8>),
}

impl MapKey {
    pub fn type_name(&self) -> &'static str {
        match self {
            MapKey::Bool(_) => "bool",
            MapKey::Int(_) => "int",
            MapKey::Float(_) => "float",
            MapKey::Text(_) => "str",
            MapKey::Bytes(_) => "bytes",
        }
    }

    /// Key form of a dynamic value, if it is hashable.
    pub fn from_dynamic(value: &DynamicValue) -> Option<MapKey> {
        match value {
            DynamicValue::Bool(v) => Some(MapKey::Bool(*v)),
            DynamicValue::Int(v) => Some(MapKey::Int(*v)),
            DynamicValue::Float(v) => Some(MapKey::Float(OrderedFloat(*v))),
            DynamicValue::Text(v) => Some(MapKey::Text(v.clone())),
            DynamicValue::Bytes(v) => Some(MapKey::Bytes(v.clone())),
            _ => None,
        }
    }

    /// Key form of a native value, if it is a primitive, text or bytes.
    pub fn from_native(value: &NativeValue) -> Option<MapKey> {
        let key = match value {
            NativeValue::Bool(v) => MapKey::Bool(*v),
            NativeValue::Text(v) => MapKey::Text(v.clone()),
            NativeValue::Bytes(v) => MapKey::Bytes(v.clone()),
            NativeValue::F32(v) => MapKey::Float(OrderedFloat(f64::from(*v))),
            NativeValue::F64(v) => MapKey::Float(OrderedFloat(*v)),
            other => MapKey::Int(other.as_integer()?),
        };
        Some(key)
    }

    pub fn to_dynamic(&self) -> DynamicValue {
        match self {
            MapKey::Bool(v) => DynamicValue::Bool(*v),
            MapKey::Int(v) => DynamicValue::Int(*v),
            MapKey::Float(v) => DynamicValue::Float(v.into_inner()),
            MapKey::Text(v) => DynamicValue::Text(v.clone()),
            MapKey::Bytes(v) => DynamicValue::Bytes(v.clone()),
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(v) => write!(f, "{v}"),
            MapKey::Int(v) => write!(f, "{v}"),
            MapKey::Float(v) => write!(f, "{}", v.into_inner()),
            MapKey::Text(v) => write!(f, "{v:?}"),
            MapKey::Bytes(v) => write!(f, "b{:?}", String::from_utf8_lossy(v)),
        }
    }
}

// ============================================================================
// Dynamic values
// ============================================================================

/// A value as the dynamic runtime sees it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DynamicValue {
    #[default]
    None,
    Bool(bool),
    /// Wide enough for the full `i64` and `u64` ranges.
    Int(i128),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Sequence(Vec<DynamicValue>),
    Mapping(BTreeMap<MapKey, DynamicValue>),
    Callable(CallbackHandle),
    Object(WrapperHandle),
}

impl DynamicValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            DynamicValue::None => "None",
            DynamicValue::Bool(_) => "bool",
            DynamicValue::Int(_) => "int",
            DynamicValue::Float(_) => "float",
            DynamicValue::Text(_) => "str",
            DynamicValue::Bytes(_) => "bytes",
            DynamicValue::Sequence(_) => "list",
            DynamicValue::Mapping(_) => "dict",
            DynamicValue::Callable(_) => "callable",
            DynamicValue::Object(_) => "object",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, DynamicValue::None)
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            DynamicValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DynamicValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&CallbackHandle> {
        match self {
            DynamicValue::Callable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&WrapperHandle> {
        match self {
            DynamicValue::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Build a mapping from string keys.
    pub fn mapping<K: Into<String>>(entries: impl IntoIterator<Item = (K, DynamicValue)>) -> Self {
        DynamicValue::Mapping(
            entries
                .into_iter()
                .map(|(k, v)| (MapKey::Text(k.into()), v))
                .collect(),
        )
    }

    /// Render the argument shapes of a call, e.g. `(int, str)`.
    pub fn describe_args(args: &[DynamicValue]) -> String {
        let names: Vec<_> = args.iter().map(DynamicValue::type_name).collect();
        format!("({})", names.join(", "))
    }
}

macro_rules! impl_dynamic_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for DynamicValue {
                fn from(value: $ty) -> Self {
                    DynamicValue::Int(value as i128)
                }
            }
        )*
    };
}

impl_dynamic_from_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl From<bool> for DynamicValue {
    fn from(value: bool) -> Self {
        DynamicValue::Bool(value)
    }
}

impl From<f64> for DynamicValue {
    fn from(value: f64) -> Self {
        DynamicValue::Float(value)
    }
}

impl From<&str> for DynamicValue {
    fn from(value: &str) -> Self {
        DynamicValue::Text(value.to_string())
    }
}

impl From<String> for DynamicValue {
    fn from(value: String) -> Self {
        DynamicValue::Text(value)
    }
}

impl From<Vec<u8>> for DynamicValue {
    fn from(value: Vec<u8>) -> Self {
        DynamicValue::Bytes(value)
    }
}

impl From<CallbackHandle> for DynamicValue {
    fn from(value: CallbackHandle) -> Self {
        DynamicValue::Callable(value)
    }
}

impl From<WrapperHandle> for DynamicValue {
    fn from(value: WrapperHandle) -> Self {
        DynamicValue::Object(value)
    }
}

// ============================================================================
// Native values
// ============================================================================

/// A typed value as native code sees it.
#[derive(Debug, PartialEq, Default)]
pub enum NativeValue {
    #[default]
    Void,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Sequence(Vec<NativeValue>),
    Mapping(BTreeMap<MapKey, NativeValue>),
    /// Field values in declaration order.
    Record(Vec<(String, NativeValue)>),
    Function(CallbackHandle),
    Object(ObjectValue),
    /// An explicitly absent pointer, reference or callable. Never a zero value.
    Absent,
}

impl NativeValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            NativeValue::Void => "void",
            NativeValue::Bool(_) => "bool",
            NativeValue::I8(_) => "int8",
            NativeValue::I16(_) => "int16",
            NativeValue::I32(_) => "int32",
            NativeValue::I64(_) => "int64",
            NativeValue::U8(_) => "uint8",
            NativeValue::U16(_) => "uint16",
            NativeValue::U32(_) => "uint32",
            NativeValue::U64(_) => "uint64",
            NativeValue::F32(_) => "float",
            NativeValue::F64(_) => "double",
            NativeValue::Text(_) => "string",
            NativeValue::Bytes(_) => "bytes",
            NativeValue::Sequence(_) => "sequence",
            NativeValue::Mapping(_) => "mapping",
            NativeValue::Record(_) => "record",
            NativeValue::Function(_) => "function",
            NativeValue::Object(_) => "object",
            NativeValue::Absent => "absent",
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, NativeValue::Absent)
    }

    /// The exact integer value of any integer variant.
    pub fn as_integer(&self) -> Option<i128> {
        match *self {
            NativeValue::I8(v) => Some(v as i128),
            NativeValue::I16(v) => Some(v as i128),
            NativeValue::I32(v) => Some(v as i128),
            NativeValue::I64(v) => Some(v as i128),
            NativeValue::U8(v) => Some(v as i128),
            NativeValue::U16(v) => Some(v as i128),
            NativeValue::U32(v) => Some(v as i128),
            NativeValue::U64(v) => Some(v as i128),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&CallbackHandle> {
        match self {
            NativeValue::Function(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            NativeValue::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<ObjectValue> {
        match self {
            NativeValue::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Duplicate the value. Returns `None` if it contains a unique owner.
    pub fn try_clone(&self) -> Option<NativeValue> {
        let value = match self {
            NativeValue::Void => NativeValue::Void,
            NativeValue::Bool(v) => NativeValue::Bool(*v),
            NativeValue::I8(v) => NativeValue::I8(*v),
            NativeValue::I16(v) => NativeValue::I16(*v),
            NativeValue::I32(v) => NativeValue::I32(*v),
            NativeValue::I64(v) => NativeValue::I64(*v),
            NativeValue::U8(v) => NativeValue::U8(*v),
            NativeValue::U16(v) => NativeValue::U16(*v),
            NativeValue::U32(v) => NativeValue::U32(*v),
            NativeValue::U64(v) => NativeValue::U64(*v),
            NativeValue::F32(v) => NativeValue::F32(*v),
            NativeValue::F64(v) => NativeValue::F64(*v),
            NativeValue::Text(v) => NativeValue::Text(v.clone()),
            NativeValue::Bytes(v) => NativeValue::Bytes(v.clone()),
            NativeValue::Sequence(items) => {
                let items = items.iter().map(NativeValue::try_clone).collect::<Option<_>>()?;
                NativeValue::Sequence(items)
            }
            NativeValue::Mapping(entries) => NativeValue::Mapping(
                entries
                    .iter()
                    .map(|(k, v)| Some((k.clone(), v.try_clone()?)))
                    .collect::<Option<_>>()?,
            ),
            NativeValue::Record(fields) => NativeValue::Record(
                fields
                    .iter()
                    .map(|(k, v)| Some((k.clone(), v.try_clone()?)))
                    .collect::<Option<_>>()?,
            ),
            NativeValue::Function(handle) => NativeValue::Function(handle.clone()),
            NativeValue::Object(object) => NativeValue::Object(object.try_clone()?),
            NativeValue::Absent => NativeValue::Absent,
        };
        Some(value)
    }
}
