//! The seam between object conversion and instance tracking.

use crate::descriptor::TypeDescriptor;
use crate::error::OwnershipError;
use crate::object::{ObjectValue, SharedObject};
use crate::ownership::OwnershipMode;
use crate::wrapper::{Holding, WrapperHandle};

/// Turns native objects into dynamic wrappers.
///
/// Implementations decide identity (whether an object that already has a
/// wrapper gets the same one back) and what happens when a wrapper dies.
pub trait ObjectBinder: Send + Sync {
    fn wrap(&self, object: ObjectValue, mode: OwnershipMode, class: &TypeDescriptor)
    -> Result<WrapperHandle, OwnershipError>;
}

/// Work out what a new wrapper holds for `object` under `mode`.
///
/// Moves require a unique owner. Shared mode promotes a unique owner into a
/// shared one. Borrows keep whatever ownership they were handed, so a
/// borrowed view of a unique or shared value still keeps it alive.
pub fn holding_for(object: ObjectValue, mode: OwnershipMode) -> Result<Holding, OwnershipError> {
    match (mode, object) {
        (OwnershipMode::Copy | OwnershipMode::Move, ObjectValue::Unique(unique)) => {
            unique.into_inner().map(Holding::Owned).ok_or(OwnershipError::Empty)
        }
        (OwnershipMode::Copy | OwnershipMode::Move, _) => Err(OwnershipError::NotOwned),
        (OwnershipMode::SharedRef, ObjectValue::Shared(shared)) => Ok(Holding::Shared(shared)),
        (OwnershipMode::SharedRef, ObjectValue::Unique(unique)) => {
            SharedObject::from_unique(unique).map(Holding::Shared)
        }
        (OwnershipMode::SharedRef, ObjectValue::Borrowed { .. }) => Err(OwnershipError::NotShared),
        (_, ObjectValue::Borrowed { object, .. }) => Ok(Holding::Borrowed(object)),
        (_, ObjectValue::Unique(unique)) => {
            unique.into_inner().map(Holding::Owned).ok_or(OwnershipError::Empty)
        }
        (_, ObjectValue::Shared(shared)) => Ok(Holding::Shared(shared)),
    }
}

/// Binder that creates untracked wrappers.
///
/// No identity is preserved and owned objects are destroyed inline when the
/// wrapper drops.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedBinder;

impl ObjectBinder for DetachedBinder {
    fn wrap(
        &self,
        object: ObjectValue,
        mode: OwnershipMode,
        class: &TypeDescriptor,
    ) -> Result<WrapperHandle, OwnershipError> {
        let holding = holding_for(object, mode)?;
        WrapperHandle::new(holding, mode, class, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ClassInfo;
    use crate::object::{NativeObject, UniqueObject};

    fn class() -> TypeDescriptor {
        TypeDescriptor::class("Thing", ClassInfo::new())
    }

    fn unique() -> ObjectValue {
        ObjectValue::Unique(UniqueObject::new(NativeObject::new(class().hash, 1u32)))
    }

    #[test]
    fn move_requires_unique() {
        assert!(matches!(holding_for(unique(), OwnershipMode::Move), Ok(Holding::Owned(_))));
        let borrowed = ObjectValue::borrowed(NativeObject::new(class().hash, 1u32));
        assert_eq!(
            holding_for(borrowed, OwnershipMode::Move).unwrap_err(),
            OwnershipError::NotOwned
        );
        let empty = ObjectValue::Unique(UniqueObject::empty());
        assert_eq!(holding_for(empty, OwnershipMode::Move).unwrap_err(), OwnershipError::Empty);
    }

    #[test]
    fn shared_promotes_unique() {
        assert!(matches!(holding_for(unique(), OwnershipMode::SharedRef), Ok(Holding::Shared(_))));
        let borrowed = ObjectValue::borrowed(NativeObject::new(class().hash, 1u32));
        assert_eq!(
            holding_for(borrowed, OwnershipMode::SharedRef).unwrap_err(),
            OwnershipError::NotShared
        );
    }

    #[test]
    fn borrows_keep_given_ownership() {
        assert!(matches!(holding_for(unique(), OwnershipMode::BorrowConst), Ok(Holding::Owned(_))));
        let borrowed = ObjectValue::borrowed(NativeObject::new(class().hash, 1u32));
        assert!(matches!(
            holding_for(borrowed, OwnershipMode::BorrowMutable),
            Ok(Holding::Borrowed(_))
        ));
    }

    #[test]
    fn detached_binder_wraps() {
        let wrapper = DetachedBinder.wrap(unique(), OwnershipMode::Move, &class()).unwrap();
        assert_eq!(wrapper.with_object(|v: &u32| *v).unwrap(), 1);
        assert_eq!(wrapper.class(), class().hash);
    }
}
