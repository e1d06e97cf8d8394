//! Sequence and mapping conversions.
//!
//! Containers convert element by element through the registry, so nested
//! shapes work for any registered element type. The element storage kind of
//! the descriptor decides each element's ownership mode.

use std::collections::BTreeMap;

use crossbind_core::{ConversionError, DynamicValue, MapKey, NativeValue, StorageKind, TypeHash};

use crate::conversion::Conversion;
use crate::converter::ConvertCx;

pub(crate) fn score_sequence(
    value: &DynamicValue,
    element: TypeHash,
    storage: StorageKind,
    cx: &ConvertCx<'_>,
) -> Option<Conversion> {
    let DynamicValue::Sequence(items) = value else {
        return None;
    };
    Conversion::combine(
        items.iter().map(|item| cx.registry.element_score(element, storage, item, cx.binder)),
        None,
    )
}

pub(crate) fn sequence_to_native(
    value: &DynamicValue,
    element: TypeHash,
    storage: StorageKind,
    cx: &ConvertCx<'_>,
) -> Result<NativeValue, ConversionError> {
    let DynamicValue::Sequence(items) = value else {
        return Err(ConversionError::mismatch(cx.descriptor.name.clone(), value.type_name()));
    };
    items
        .iter()
        .map(|item| cx.registry.element_to_native(element, storage, item, cx.binder))
        .collect::<Result<Vec<_>, _>>()
        .map(NativeValue::Sequence)
}

pub(crate) fn sequence_to_dynamic(
    value: NativeValue,
    element: TypeHash,
    storage: StorageKind,
    cx: &ConvertCx<'_>,
) -> Result<DynamicValue, ConversionError> {
    let NativeValue::Sequence(items) = value else {
        return Err(ConversionError::mismatch(cx.descriptor.name.clone(), value.type_name()));
    };
    items
        .into_iter()
        .map(|item| cx.registry.element_to_dynamic(element, storage, item, cx.binder))
        .collect::<Result<Vec<_>, _>>()
        .map(DynamicValue::Sequence)
}

pub(crate) fn score_mapping(
    value: &DynamicValue,
    key: TypeHash,
    element: TypeHash,
    storage: StorageKind,
    cx: &ConvertCx<'_>,
) -> Option<Conversion> {
    let DynamicValue::Mapping(entries) = value else {
        return None;
    };
    let parts = entries.iter().flat_map(|(k, v)| {
        [
            cx.registry.element_score(key, StorageKind::Value, &k.to_dynamic(), cx.binder),
            cx.registry.element_score(element, storage, v, cx.binder),
        ]
    });
    Conversion::combine(parts, None)
}

pub(crate) fn mapping_to_native(
    value: &DynamicValue,
    key: TypeHash,
    element: TypeHash,
    storage: StorageKind,
    cx: &ConvertCx<'_>,
) -> Result<NativeValue, ConversionError> {
    let DynamicValue::Mapping(entries) = value else {
        return Err(ConversionError::mismatch(cx.descriptor.name.clone(), value.type_name()));
    };
    let mut out = BTreeMap::new();
    for (k, v) in entries {
        let native_key =
            cx.registry.element_to_native(key, StorageKind::Value, &k.to_dynamic(), cx.binder)?;
        let native_key = MapKey::from_native(&native_key).ok_or_else(|| {
            ConversionError::failed(format!("'{}' cannot be used as a key", native_key.type_name()))
        })?;
        let native_value = cx.registry.element_to_native(element, storage, v, cx.binder)?;
        out.insert(native_key, native_value);
    }
    Ok(NativeValue::Mapping(out))
}

pub(crate) fn mapping_to_dynamic(
    value: NativeValue,
    key: TypeHash,
    element: TypeHash,
    storage: StorageKind,
    cx: &ConvertCx<'_>,
) -> Result<DynamicValue, ConversionError> {
    let NativeValue::Mapping(entries) = value else {
        return Err(ConversionError::mismatch(cx.descriptor.name.clone(), value.type_name()));
    };
    let mut out = BTreeMap::new();
    for (k, v) in entries {
        let dynamic_key = k.to_dynamic();
        if cx.registry.element_score(key, StorageKind::Value, &dynamic_key, cx.binder).is_none() {
            let expected =
                cx.registry.descriptor(key).map_or_else(|| key.to_string(), |d| d.name.clone());
            return Err(ConversionError::mismatch(expected, dynamic_key.type_name()));
        }
        out.insert(k, cx.registry.element_to_dynamic(element, storage, v, cx.binder)?);
    }
    Ok(DynamicValue::Mapping(out))
}
