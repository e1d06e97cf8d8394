//! Instance binding.
//!
//! [`InstanceBinder`] tracks every live dynamic wrapper by the lifetime
//! token of the native object it wraps. It preserves identity (the same
//! object crossing twice gets the same wrapper back), refuses a second
//! independent binding of an object unless ownership is shared, and runs
//! native destructors with the boundary lock released.

use std::sync::Arc;

use crossbind_core::{
    BridgeError, Holding, LifetimeToken, ObjectBinder, ObjectValue, OwnershipError, OwnershipMode,
    ReleaseHook, TypeDescriptor, WeakWrapper, WrapperHandle, WrapperId, holding_for,
};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::lock::BoundaryLock;

/// A native object bound to a dynamic wrapper.
pub type BoundInstance = WrapperHandle;

struct BinderCore {
    bound: Mutex<FxHashMap<LifetimeToken, Vec<(WrapperId, WeakWrapper)>>>,
    lock: Arc<BoundaryLock>,
}

/// Tracks bound instances and releases them outside the boundary lock.
///
/// Cloning shares the same table.
#[derive(Clone)]
pub struct InstanceBinder {
    core: Arc<BinderCore>,
}

impl std::fmt::Debug for InstanceBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceBinder").field("bound", &self.bound_count()).finish()
    }
}

impl InstanceBinder {
    pub fn new(lock: Arc<BoundaryLock>) -> Self {
        Self { core: Arc::new(BinderCore { bound: Mutex::new(FxHashMap::default()), lock }) }
    }

    /// Bind `object` to a new wrapper.
    ///
    /// # Errors
    ///
    /// [`BridgeError::DoubleBinding`] if the object already has a live
    /// wrapper, unless that wrapper and the new one are both
    /// [`OwnershipMode::SharedRef`].
    pub fn bind(
        &self,
        object: ObjectValue,
        mode: OwnershipMode,
        class: &TypeDescriptor,
    ) -> Result<BoundInstance, BridgeError> {
        let token = object.object()?.token();
        let existing = self.live_wrappers(token);
        let shared = |mode: OwnershipMode| mode == OwnershipMode::SharedRef;
        let aliases_shared = shared(mode) && existing.iter().all(|w| shared(w.mode()));
        if !existing.is_empty() && !aliases_shared {
            return Err(BridgeError::DoubleBinding { token });
        }
        Ok(self.create(object, mode, class)?)
    }

    /// Detach `instance` from its object and release what it held.
    ///
    /// The wrapper stays valid but empty afterwards.
    pub fn unbind(&self, instance: &BoundInstance) {
        self.forget(instance.token(), instance.id());
        let holding = instance.detach();
        log::debug!("unbound {} ({})", instance.token(), instance.class_name());
        self.release(instance.token(), holding);
    }

    /// The live wrapper bound to `token`, if any.
    pub fn lookup(&self, token: LifetimeToken) -> Option<BoundInstance> {
        self.live_wrappers(token).into_iter().next()
    }

    /// Every non-empty wrapper bound to `token`.
    ///
    /// Handles are upgraded under the table lock but inspected and dropped
    /// after it: dropping the last handle re-enters the table.
    fn live_wrappers(&self, token: LifetimeToken) -> Vec<BoundInstance> {
        let upgraded: Vec<_> = {
            let bound = self.core.bound.lock();
            match bound.get(&token) {
                Some(entries) => entries.iter().filter_map(|(_, weak)| weak.upgrade()).collect(),
                None => return Vec::new(),
            }
        };
        upgraded.into_iter().filter(|wrapper| !wrapper.is_empty()).collect()
    }

    /// Number of objects with at least one tracked wrapper.
    pub fn bound_count(&self) -> usize {
        self.core.bound.lock().len()
    }

    pub fn is_bound(&self, token: LifetimeToken) -> bool {
        self.lookup(token).is_some()
    }

    fn create(
        &self,
        object: ObjectValue,
        mode: OwnershipMode,
        class: &TypeDescriptor,
    ) -> Result<WrapperHandle, OwnershipError> {
        let holding = holding_for(object, mode)?;
        let hook: Arc<dyn ReleaseHook> = self.core.clone();
        let wrapper = WrapperHandle::new(holding, mode, class, Some(hook))?;
        self.core
            .bound
            .lock()
            .entry(wrapper.token())
            .or_default()
            .push((wrapper.id(), wrapper.downgrade()));
        log::debug!("bound {} as {} ({})", wrapper.token(), class.name, mode.name());
        Ok(wrapper)
    }

    fn forget(&self, token: LifetimeToken, id: WrapperId) {
        self.core.forget(token, id);
    }

    fn release(&self, token: LifetimeToken, holding: Holding) {
        self.core.release(token, holding);
    }
}

impl ObjectBinder for InstanceBinder {
    /// Wrap `object`, returning its existing wrapper when there is one.
    fn wrap(
        &self,
        object: ObjectValue,
        mode: OwnershipMode,
        class: &TypeDescriptor,
    ) -> Result<WrapperHandle, OwnershipError> {
        let token = object.object()?.token();
        if let Some(existing) = self.lookup(token) {
            return match mode {
                // handing over ownership of an object the dynamic side already wraps
                OwnershipMode::Move => Err(OwnershipError::AlreadyBound { token }),
                _ => Ok(existing),
            };
        }
        self.create(object, mode, class)
    }
}

impl BinderCore {
    fn forget(&self, token: LifetimeToken, id: WrapperId) {
        let mut bound = self.bound.lock();
        if let Some(entries) = bound.get_mut(&token) {
            entries.retain(|(wrapper, _)| *wrapper != id);
            if entries.is_empty() {
                bound.remove(&token);
            }
        }
    }

    fn release(&self, token: LifetimeToken, holding: Holding) {
        if !holding.runs_destructor() {
            return;
        }
        if self.lock.is_held_by_current_thread() {
            log::warn!(
                "releasing {token} with the boundary lock held; running its destructor unlocked"
            );
        }
        self.lock.release_while(|| holding.release());
    }
}

impl ReleaseHook for BinderCore {
    fn released(&self, id: WrapperId, token: LifetimeToken, holding: Holding) {
        self.forget(token, id);
        log::debug!("wrapper for {token} dropped");
        self.release(token, holding);
    }
}
