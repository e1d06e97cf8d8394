//! The converter seam.

use crossbind_core::{
    ConversionError, DynamicValue, NativeValue, ObjectBinder, OwnershipMode, TypeDescriptor,
    TypeHash,
};

use crate::conversion::Conversion;
use crate::registry::TypeConverterRegistry;

/// Everything a converter may consult while converting one value.
pub struct ConvertCx<'a> {
    pub registry: &'a TypeConverterRegistry,
    pub descriptor: &'a TypeDescriptor,
    pub mode: OwnershipMode,
    pub binder: &'a dyn ObjectBinder,
}

/// A bidirectional converter for one descriptor.
///
/// `score` must agree with `to_native`: a value that scores must convert,
/// and scoring must not have side effects.
pub trait Converter: Send + Sync {
    /// How well `value` fits the descriptor, or `None` if it does not.
    fn score(&self, value: &DynamicValue, cx: &ConvertCx<'_>) -> Option<Conversion>;

    fn to_native(
        &self,
        value: &DynamicValue,
        cx: &ConvertCx<'_>,
    ) -> Result<NativeValue, ConversionError>;

    fn to_dynamic(
        &self,
        value: NativeValue,
        cx: &ConvertCx<'_>,
    ) -> Result<DynamicValue, ConversionError>;

    /// Identifies the converter's definition. Registering the same descriptor
    /// again is only idempotent when the keys match.
    fn definition_key(&self) -> TypeHash;
}
