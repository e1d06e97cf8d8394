//! Callable conversions.
//!
//! A callable handle crosses as itself. When its signature differs from the
//! parameter's, it is re-wrapped so later invocations convert through the
//! parameter's signature.

use std::sync::Arc;

use crossbind_core::{ConversionError, DynamicValue, NativeValue, Signature};

use crate::conversion::{Conversion, ConversionKind};

pub(crate) fn score(value: &DynamicValue, signature: &Arc<Signature>) -> Option<Conversion> {
    let DynamicValue::Callable(handle) = value else {
        return None;
    };
    match handle.signature() {
        None => Some(Conversion::identity()),
        Some(own) if same_signature(own, signature) => Some(Conversion::identity()),
        Some(_) => Some(Conversion::implicit(
            ConversionKind::CallableAdapt,
            Conversion::COST_CALLABLE_ADAPT,
        )),
    }
}

pub(crate) fn to_native(
    value: &DynamicValue,
    signature: &Arc<Signature>,
) -> Result<NativeValue, ConversionError> {
    let DynamicValue::Callable(handle) = value else {
        return Err(mismatch(signature, value.type_name()));
    };
    let handle = match handle.signature() {
        Some(own) if same_signature(own, signature) => handle.clone(),
        _ => handle.with_signature(signature.clone()),
    };
    Ok(NativeValue::Function(handle))
}

pub(crate) fn to_dynamic(
    value: NativeValue,
    signature: &Arc<Signature>,
) -> Result<DynamicValue, ConversionError> {
    match value {
        NativeValue::Function(handle) if handle.signature().is_some() => {
            Ok(DynamicValue::Callable(handle))
        }
        NativeValue::Function(handle) => {
            Ok(DynamicValue::Callable(handle.with_signature(signature.clone())))
        }
        other => Err(mismatch(signature, other.type_name())),
        }
        }

        fn same_signature(own: &Arc<Signature>, signature: &Arc<Signature>) -> bool {
            Arc::ptr_eq(own, signature) || **own == **signature
        }

        fn mismatch(signature: &Signature, actual: &'static str) -> ConversionError {
            ConversionError::mismatch(format!("callable<{}>", signature.name), actual)
        }
