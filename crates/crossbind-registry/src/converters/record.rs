//! Records travel as mappings with text keys, one entry per field.

use std::collections::BTreeMap;

use crossbind_core::{ConversionError, DynamicValue, FieldSpec, MapKey, NativeValue, StorageKind};

use crate::conversion::{Conversion, ConversionKind};
use crate::converter::ConvertCx;

pub(crate) fn score(
    value: &DynamicValue,
    fields: &[FieldSpec],
    cx: &ConvertCx<'_>,
) -> Option<Conversion> {
    let DynamicValue::Mapping(entries) = value else {
        return None;
    };
    if entries.len() != fields.len() {
        return None;
    }
    let parts = fields.iter().map(|field| {
        let item = entries.get(&MapKey::Text(field.name.clone()))?;
        cx.registry.element_score(field.ty, StorageKind::Value, item, cx.binder)
    });
    let floor = Conversion::implicit(ConversionKind::MappingToRecord, Conversion::COST_TO_RECORD);
    Conversion::combine(parts, Some(floor))
}

pub(crate) fn to_native(
    value: &DynamicValue,
    fields: &[FieldSpec],
    cx: &ConvertCx<'_>,
) -> Result<NativeValue, ConversionError> {
    let record = &cx.descriptor.name;
    let DynamicValue::Mapping(entries) = value else {
        return Err(ConversionError::mismatch(record.clone(), value.type_name()));
    };
    check_keys(record, entries.keys(), fields)?;

    let mut out = Vec::with_capacity(fields.len());
    for field in fields {
        let item = entries
            .get(&MapKey::Text(field.name.clone()))
            .ok_or_else(|| missing_field(record, field))?;
        let native =
            cx.registry.element_to_native(field.ty, StorageKind::Value, item, cx.binder)?;
        out.push((field.name.clone(), native));
    }
    Ok(NativeValue::Record(out))
}

pub(crate) fn to_dynamic(
    value: NativeValue,
    fields: &[FieldSpec],
    cx: &ConvertCx<'_>,
) -> Result<DynamicValue, ConversionError> {
    let record = &cx.descriptor.name;
    let NativeValue::Record(values) = value else {
        return Err(ConversionError::mismatch(record.clone(), value.type_name()));
    };

    let mut by_name: BTreeMap<String, NativeValue> = BTreeMap::new();
    for (name, item) in values {
        if !fields.iter().any(|f| f.name == name) {
            return Err(ConversionError::UnexpectedField { record: record.clone(), field: name });
        }
        by_name.insert(name, item);
    }

    let mut out = BTreeMap::new();
    for field in fields {
        let item = by_name.remove(&field.name).ok_or_else(|| missing_field(record, field))?;
        let dynamic =
            cx.registry.element_to_dynamic(field.ty, StorageKind::Value, item, cx.binder)?;
        out.insert(MapKey::Text(field.name.clone()), dynamic);
    }
    Ok(DynamicValue::Mapping(out))
}

fn missing_field(record: &str, field: &FieldSpec) -> ConversionError {
    ConversionError::MissingField { record: record.to_string(), field: field.name.clone() }
}

fn check_keys<'k>(
    record: &str,
    keys: impl Iterator<Item = &'k MapKey>,
    fields: &[FieldSpec],
) -> Result<(), ConversionError> {
    for key in keys {
        match key {
            MapKey::Text(name) if fields.iter().any(|f| &f.name == name) => {}
            MapKey::Text(name) => {
                let record = record.to_string();
                return Err(ConversionError::UnexpectedField { record, field: name.clone() });
            }
            other => return Err(ConversionError::mismatch("str", other.type_name())),
        }
    }
    Ok(())
}
