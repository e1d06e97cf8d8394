//! Built-in converters for every descriptor shape.

mod callable;
mod container;
mod object;
mod primitive;
mod record;
mod text;

use crossbind_core::{ConversionError, DynamicValue, NativeValue, TypeHash, TypeKind};

use crate::conversion::Conversion;
use crate::converter::{ConvertCx, Converter};

/// Converts any descriptor by dispatching on its [`TypeKind`].
///
/// Registered for every type that is not given its own converter.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinConverter;

impl BuiltinConverter {
    pub const KEY: TypeHash = TypeHash(0x6275_696c_7469_6e00);
}

impl Converter for BuiltinConverter {
    fn score(&self, value: &DynamicValue, cx: &ConvertCx<'_>) -> Option<Conversion> {
        match &cx.descriptor.kind {
            TypeKind::Primitive { kind, policy } => primitive::score(value, *kind, *policy),
            TypeKind::Text => text::score_text(value),
            TypeKind::Bytes => text::score_bytes(value),
            TypeKind::Sequence { element, storage } => {
                container::score_sequence(value, *element, *storage, cx)
            }
            TypeKind::Mapping { key, value: element, storage } => {
                container::score_mapping(value, *key, *element, *storage, cx)
            }
            TypeKind::Record { fields } => record::score(value, fields, cx),
            TypeKind::Callable(signature) => callable::score(value, signature),
            TypeKind::Class(_) => object::score(value, cx),
        }
    }

    fn to_native(
        &self,
        value: &DynamicValue,
        cx: &ConvertCx<'_>,
    ) -> Result<NativeValue, ConversionError> {
        match &cx.descriptor.kind {
            TypeKind::Primitive { kind, policy } => primitive::to_native(value, *kind, *policy),
            TypeKind::Text => text::text_to_native(value),
            TypeKind::Bytes => text::bytes_to_native(value),
            TypeKind::Sequence { element, storage } => {
                container::sequence_to_native(value, *element, *storage, cx)
            }
            TypeKind::Mapping { key, value: element, storage } => {
                container::mapping_to_native(value, *key, *element, *storage, cx)
            }
            TypeKind::Record { fields } => record::to_native(value, fields, cx),
            TypeKind::Callable(signature) => callable::to_native(value, signature),
            TypeKind::Class(_) => object::to_native(value, cx),
        }
    }

    fn to_dynamic(
        &self,
        value: NativeValue,
        cx: &ConvertCx<'_>,
    ) -> Result<DynamicValue, ConversionError> {
        match &cx.descriptor.kind {
            TypeKind::Primitive { kind, .. } => primitive::to_dynamic(value, *kind),
            TypeKind::Text => text::text_to_dynamic(value),
            TypeKind::Bytes => text::bytes_to_dynamic(value),
            TypeKind::Sequence { element, storage } => {
                container::sequence_to_dynamic(value, *element, *storage, cx)
            }
            TypeKind::Mapping { key, value: element, storage } => {
                container::mapping_to_dynamic(value, *key, *element, *storage, cx)
            }
            TypeKind::Record { fields } => record::to_dynamic(value, fields, cx),
            TypeKind::Callable(signature) => callable::to_dynamic(value, signature),
            TypeKind::Class(_) => object::to_dynamic(value, cx),
        }
    }

    fn definition_key(&self) -> TypeHash {
        Self::KEY
    }
}
