//! Dynamic-side wrappers around native objects.
//!
//! A [`WrapperHandle`] is what the dynamic runtime holds when a native object
//! crosses over. Cloning it adds a dynamic reference; when the last one drops
//! the wrapper hands whatever it holds to its [`ReleaseHook`], which decides
//! how (and under which lock state) the native side is torn down.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::TypeHash;
use crate::descriptor::TypeDescriptor;
use crate::error::{BridgeError, OwnershipError};
use crate::object::{LifetimeToken, NativeObject, SharedObject};
use crate::ownership::OwnershipMode;
use crate::value::DynamicValue;

static NEXT_WRAPPER: AtomicU64 = AtomicU64::new(1);

/// Identity of one dynamic wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WrapperId(pub u64);

/// What a wrapper keeps of its native object.
#[derive(Debug)]
pub enum Holding {
    /// A view of an object owned elsewhere.
    Borrowed(NativeObject),
    /// The wrapper is the object's sole owner.
    Owned(NativeObject),
    /// The wrapper shares ownership with native code.
    Shared(SharedObject),
    /// The object was moved out to a native owner.
    Empty,
}

impl Holding {
    pub fn object(&self) -> Option<&NativeObject> {
        match self {
            Holding::Borrowed(object) | Holding::Owned(object) => Some(object),
            Holding::Shared(shared) => Some(shared.object()),
            Holding::Empty => None,
        }
    }

    /// Give up whatever is held: owned objects are destroyed, shared
    /// references dropped, borrows forgotten.
    pub fn release(self) {
        match self {
            Holding::Owned(object) => {
                object.destroy();
            }
            Holding::Shared(shared) => drop(shared),
            Holding::Borrowed(_) | Holding::Empty => {}
        }
    }

    pub fn runs_destructor(&self) -> bool {
        matches!(self, Holding::Owned(_) | Holding::Shared(_))
    }
}

/// Which attributes a wrapper accepts.
#[derive(Debug, Clone, Default)]
pub struct AttrPolicy {
    pub dynamic: bool,
    pub slots: Arc<[String]>,
}

impl AttrPolicy {
    pub fn for_class(descriptor: &TypeDescriptor) -> Self {
        match descriptor.as_class() {
            Some(info) => Self {
                dynamic: info.flags.contains(crate::descriptor::ClassFlags::DYNAMIC_ATTRS),
                slots: info.slots.iter().cloned().collect(),
            },
            None => Self::default(),
        }
    }

    fn allows(&self, name: &str) -> bool {
        self.dynamic || self.slots.iter().any(|s| s == name)
    }
}

/// Receives a wrapper's holding when the last dynamic reference drops.
pub trait ReleaseHook: Send + Sync {
    fn released(&self, id: WrapperId, token: LifetimeToken, holding: Holding);
}

struct WrapperInner {
    id: WrapperId,
    token: LifetimeToken,
    class: TypeHash,
    class_name: String,
    mode: OwnershipMode,
    holding: Mutex<Holding>,
    attrs: Mutex<FxHashMap<String, DynamicValue>>,
    policy: AttrPolicy,
    hook: Option<Arc<dyn ReleaseHook>>,
}

impl Drop for WrapperInner {
    fn drop(&mut self) {
        let holding = std::mem::replace(self.holding.get_mut(), Holding::Empty);
        let attrs = std::mem::take(self.attrs.get_mut());
        match &self.hook {
            Some(hook) => hook.released(self.id, self.token, holding),
            None => holding.release(),
        }
        drop(attrs);
    }
}

/// A dynamic reference to a bound native object.
#[derive(Clone)]
pub struct WrapperHandle(Arc<WrapperInner>);

/// A weak reference used by binders to track live wrappers.
#[derive(Clone)]
pub struct WeakWrapper(std::sync::Weak<WrapperInner>);

impl WeakWrapper {
    pub fn upgrade(&self) -> Option<WrapperHandle> {
        self.0.upgrade().map(WrapperHandle)
    }
}

impl WrapperHandle {
    /// Create a wrapper for an object of class `descriptor`.
    ///
    /// Returns `Empty` if `holding` is empty.
    pub fn new(
        holding: Holding,
        mode: OwnershipMode,
        descriptor: &TypeDescriptor,
        hook: Option<Arc<dyn ReleaseHook>>,
    ) -> Result<Self, OwnershipError> {
        let object = holding.object().ok_or(OwnershipError::Empty)?;
        let token = object.token();
        let class = object.class();
        Ok(WrapperHandle(Arc::new(WrapperInner {
            id: WrapperId(NEXT_WRAPPER.fetch_add(1, Ordering::Relaxed)),
            token,
            class,
            class_name: descriptor.name.clone(),
            mode,
            holding: Mutex::new(holding),
            attrs: Mutex::new(FxHashMap::default()),
            policy: AttrPolicy::for_class(descriptor),
            hook,
        })))
    }

    pub fn id(&self) -> WrapperId {
        self.0.id
    }

    pub fn token(&self) -> LifetimeToken {
        self.0.token
    }

    /// Concrete class of the wrapped object.
    pub fn class(&self) -> TypeHash {
        self.0.class
    }

    pub fn class_name(&self) -> &str {
        &self.0.class_name
    }

    pub fn mode(&self) -> OwnershipMode {
        self.0.mode
    }

    pub fn downgrade(&self) -> WeakWrapper {
        WeakWrapper(Arc::downgrade(&self.0))
    }

    /// Number of live dynamic references.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    pub fn ptr_eq(a: &WrapperHandle, b: &WrapperHandle) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub fn is_empty(&self) -> bool {
        matches!(*self.0.holding.lock(), Holding::Empty)
    }

    pub fn holds_owned(&self) -> bool {
        matches!(*self.0.holding.lock(), Holding::Owned(_))
    }

    pub fn holds_shared(&self) -> bool {
        matches!(*self.0.holding.lock(), Holding::Shared(_))
    }

    /// The wrapped object, or `Empty` after a move.
    pub fn object(&self) -> Result<NativeObject, OwnershipError> {
        self.0.holding.lock().object().cloned().ok_or(OwnershipError::Empty)
    }

    /// A new shared reference, if the wrapper shares ownership.
    pub fn shared(&self) -> Result<SharedObject, OwnershipError> {
        match &*self.0.holding.lock() {
            Holding::Shared(shared) => Ok(shared.clone()),
            Holding::Empty => Err(OwnershipError::Empty),
            _ => Err(OwnershipError::NotShared),
        }
    }

    /// Move the owned object out, leaving the wrapper empty.
    pub fn take_owned(&self) -> Result<NativeObject, OwnershipError> {
        let mut holding = self.0.holding.lock();
        match std::mem::replace(&mut *holding, Holding::Empty) {
            Holding::Owned(object) => Ok(object),
            Holding::Empty => Err(OwnershipError::Empty),
            other => {
                *holding = other;
                Err(OwnershipError::NotOwned)
            }
        }
    }

    /// Put back an object moved out by [`take_owned`](Self::take_owned).
    ///
    /// Hands `object` back if the wrapper is not empty or wraps a different
    /// object.
    pub fn restore_owned(&self, object: NativeObject) -> Result<(), NativeObject> {
        let mut holding = self.0.holding.lock();
        if !matches!(*holding, Holding::Empty) || object.token() != self.0.token {
            return Err(object);
        }
        *holding = Holding::Owned(object);
        Ok(())
    }

    /// Detach the holding without releasing it.
    pub fn detach(&self) -> Holding {
        std::mem::replace(&mut *self.0.holding.lock(), Holding::Empty)
    }

    pub fn with_object<T: 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, OwnershipError> {
        self.object()?.with(f)
    }

    /// Mutable access. Fails on wrappers created as const views.
    pub fn with_object_mut<T: 'static, R>(
        &self,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, OwnershipError> {
        if self.0.mode == OwnershipMode::BorrowConst {
            return Err(OwnershipError::ConstViolation);
        }
        self.object()?.with_mut(f)
    }

    /// Attach an attribute to the wrapper.
    pub fn set_attr(
        &self,
        name: impl Into<String>,
        value: DynamicValue,
    ) -> Result<(), BridgeError> {
        let name = name.into();
        if !self.0.policy.allows(&name) {
            return Err(BridgeError::UnknownAttribute { class: self.0.class_name.clone(), name });
        }
        let previous = self.0.attrs.lock().insert(name, value);
        drop(previous);
        Ok(())
    }

    pub fn get_attr(&self, name: &str) -> Result<DynamicValue, BridgeError> {
        self.0
            .attrs
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownAttribute {
                class: self.0.class_name.clone(),
                name: name.to_string(),
            })
    }

    pub fn attr_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.0.attrs.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl PartialEq for WrapperHandle {
    fn eq(&self, other: &Self) -> bool {
        WrapperHandle::ptr_eq(self, other)
    }
}

impl fmt::Debug for WrapperHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapperHandle")
            .field("id", &self.0.id)
            .field("token", &self.0.token)
            .field("class", &self.0.class_name)
            .field("mode", &self.0.mode)
            .finish()
    }
}
