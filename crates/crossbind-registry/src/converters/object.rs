//! Class instance conversions.
//!
//! Dynamic wrappers are accepted for their own class or any base of it. What
//! the native side receives depends on the ownership mode:
//!
//! | mode            | native receives                          |
//! |-----------------|------------------------------------------|
//! | `Copy`          | a fresh unique copy                      |
//! | `BorrowConst`   | a const view                             |
//! | `BorrowMutable` | a mutable view, refused on const wraps   |
//! | `Move`          | the owned object; the wrapper empties    |
//! | `SharedRef`     | another shared reference                 |

use crossbind_core::{
    ConversionError, DynamicValue, NativeObject, NativeValue, ObjectValue, OwnershipError,
    OwnershipMode, TypeDescriptor, UniqueObject, WrapperHandle,
};

use crate::conversion::{Conversion, ConversionKind};
use crate::converter::ConvertCx;

pub(crate) fn score(value: &DynamicValue, cx: &ConvertCx<'_>) -> Option<Conversion> {
    let DynamicValue::Object(wrapper) = value else {
        return None;
    };
    if wrapper.is_empty() {
        return None;
    }
    let conversion = class_fit(wrapper, cx)?;
    let feasible = match cx.mode {
        OwnershipMode::Copy => {
            concrete(wrapper, cx).as_class().is_some_and(|info| info.is_copyable())
        }
        OwnershipMode::BorrowConst => true,
        OwnershipMode::BorrowMutable => wrapper.mode() != OwnershipMode::BorrowConst,
        OwnershipMode::Move => wrapper.holds_owned(),
        OwnershipMode::SharedRef => wrapper.holds_shared(),
    };
    feasible.then_some(conversion)
}

pub(crate) fn to_native(
    value: &DynamicValue,
    cx: &ConvertCx<'_>,
) -> Result<NativeValue, ConversionError> {
    let DynamicValue::Object(wrapper) = value else {
        return Err(ConversionError::mismatch(cx.descriptor.name.clone(), value.type_name()));
    };
    if class_fit(wrapper, cx).is_none() {
        return Err(ConversionError::ClassMismatch {
            expected: cx.descriptor.name.clone(),
            actual: wrapper.class(),
        });
    }

    let object = match cx.mode {
        OwnershipMode::Copy => {
            let source = wrapper.object()?;
            ObjectValue::Unique(UniqueObject::new(copy_object(&source, concrete(wrapper, cx))?))
        }
        OwnershipMode::BorrowConst => ObjectValue::borrowed(wrapper.object()?),
        OwnershipMode::BorrowMutable => {
            if wrapper.mode() == OwnershipMode::BorrowConst {
                return Err(OwnershipError::ConstViolation.into());
            }
            ObjectValue::borrowed_mut(wrapper.object()?)
        }
        OwnershipMode::Move => ObjectValue::Unique(UniqueObject::new(wrapper.take_owned()?)),
        OwnershipMode::SharedRef => ObjectValue::Shared(wrapper.shared()?),
    };
    Ok(NativeValue::Object(object))
}

pub(crate) fn to_dynamic(
    value: NativeValue,
    cx: &ConvertCx<'_>,
) -> Result<DynamicValue, ConversionError> {
    let NativeValue::Object(object) = value else {
        return Err(ConversionError::mismatch(cx.descriptor.name.clone(), value.type_name()));
    };
    let class = object.object()?.class();
    if class != cx.descriptor.hash && !cx.registry.is_subclass(class, cx.descriptor.hash) {
        let expected = cx.descriptor.name.clone();
        return Err(ConversionError::ClassMismatch { expected, actual: class });
    }
    let descriptor = cx.registry.descriptor(class).unwrap_or(cx.descriptor);

    let object = if cx.mode == OwnershipMode::Copy {
        let copy = copy_object(object.object()?, descriptor)?;
        ObjectValue::Unique(UniqueObject::new(copy))
    } else {
        object
    };
    let wrapper = cx.binder.wrap(object, cx.mode, descriptor)?;
    Ok(DynamicValue::Object(wrapper))
}

/// Exact class or derived-to-base, if the wrapper fits the descriptor at all.
fn class_fit(wrapper: &WrapperHandle, cx: &ConvertCx<'_>) -> Option<Conversion> {
    let class = wrapper.class();
    if class == cx.descriptor.hash {
        Some(Conversion::identity())
    } else if cx.registry.is_subclass(class, cx.descriptor.hash) {
        Some(Conversion::implicit(
            ConversionKind::DerivedToBase { base: cx.descriptor.hash },
            Conversion::COST_DERIVED_TO_BASE,
        ))
    } else {
        None
    }
}

/// The descriptor of the wrapper's own class.
fn concrete<'a>(wrapper: &WrapperHandle, cx: &ConvertCx<'a>) -> &'a TypeDescriptor {
    cx.registry.descriptor(wrapper.class()).unwrap_or(cx.descriptor)
}

fn copy_object(
    object: &NativeObject,
    class: &TypeDescriptor,
) -> Result<NativeObject, ConversionError> {
    let copy = class
        .as_class()
        .filter(|info| info.is_copyable())
        .and_then(|info| info.copy.as_ref())
        .ok_or_else(|| ConversionError::NotCopyable { class: class.name.clone() })?;
    Ok(copy(object)?)
}
