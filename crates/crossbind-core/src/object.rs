//! Native object storage and the ownership holders built on top of it.
//!
//! A [`NativeObject`] is a cell holding one type-erased native value plus the
//! [`LifetimeToken`] that identifies it for the whole of its life. The cell
//! can be destroyed exactly once; any access afterwards reports
//! [`OwnershipError::Destroyed`] instead of touching freed memory.
//!
//! On top of the cell sit the three ways native code can hold an object:
//!
//! - borrowed: a plain [`NativeObject`] clone plus a const flag
//! - [`UniqueObject`]: the single owner, which can be moved out and left empty
//! - [`SharedObject`]: atomically counted shared ownership with a release hook

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::TypeHash;
use crate::error::OwnershipError;
use crate::release::{PendingRelease, SharedReleaseHook, release_or_defer};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identity of one native object for the whole of its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LifetimeToken(pub u64);

impl LifetimeToken {
    fn next() -> Self {
        LifetimeToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for LifetimeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type Payload = Box<dyn Any + Send + Sync>;

struct ObjectCell {
    token: LifetimeToken,
    class: TypeHash,
    slot: RwLock<Option<Payload>>,
}

/// A shared reference to a native object cell.
#[derive(Clone)]
pub struct NativeObject(Arc<ObjectCell>);

impl NativeObject {
    pub fn new<T>(class: TypeHash, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        NativeObject(Arc::new(ObjectCell {
            token: LifetimeToken::next(),
            class,
            slot: RwLock::new(Some(Box::new(value))),
        }))
    }

    pub fn token(&self) -> LifetimeToken {
        self.0.token
    }

    pub fn class(&self) -> TypeHash {
        self.0.class
    }

    pub fn is_alive(&self) -> bool {
        self.0.slot.read().is_some()
    }

    /// Run `f` with a shared view of the payload.
    pub fn with<T, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, OwnershipError>
    where
        T: 'static,
    {
        let guard = self.0.slot.read();
        let payload = guard.as_ref().ok_or(OwnershipError::Destroyed { token: self.token() })?;
        let value = payload
            .downcast_ref::<T>()
            .ok_or(OwnershipError::TypeMismatch { expected: type_name::<T>() })?;
        Ok(f(value))
    }

    /// Run `f` with an exclusive view of the payload.
    pub fn with_mut<T, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, OwnershipError>
    where
        T: 'static,
    {
        let mut guard = self.0.slot.write();
        let token = self.token();
        let payload = guard.as_mut().ok_or(OwnershipError::Destroyed { token })?;
        let value = payload
            .downcast_mut::<T>()
            .ok_or(OwnershipError::TypeMismatch { expected: type_name::<T>() })?;
        Ok(f(value))
    }

    /// Destroy the payload. Returns `false` if it was already gone.
    ///
    /// The payload's destructor runs after the cell lock is released.
    pub fn destroy(&self) -> bool {
        let taken = self.0.slot.write().take();
        let was_alive = taken.is_some();
        drop(taken);
        was_alive
    }

    pub fn ptr_eq(a: &NativeObject, b: &NativeObject) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for NativeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeObject")
            .field("token", &self.token())
            .field("class", &self.class())
            .field("alive", &self.is_alive())
            .finish()
    }
}

// ============================================================================
// Unique ownership
// ============================================================================

/// The single owner of a native object.
///
/// Moving out with [`take`](UniqueObject::take) leaves this holder empty and
/// every later access fails with [`OwnershipError::Empty`]. Dropping a
/// non-empty holder destroys the object, or queues the destruction inside
/// [`defer_destruction`](crate::defer_destruction).
#[derive(Debug, Default)]
pub struct UniqueObject {
    object: Option<NativeObject>,
}

impl UniqueObject {
    pub fn new(object: NativeObject) -> Self {
        Self { object: Some(object) }
    }

    pub fn empty() -> Self {
        Self { object: None }
    }

    pub fn is_empty(&self) -> bool {
        self.object.is_none()
    }

    pub fn get(&self) -> Result<&NativeObject, OwnershipError> {
        self.object.as_ref().ok_or(OwnershipError::Empty)
    }

    /// Transfer ownership to a new holder, leaving this one empty.
    pub fn take(&mut self) -> Result<UniqueObject, OwnershipError> {
        self.object.take().map(UniqueObject::new).ok_or(OwnershipError::Empty)
    }

    /// Give up ownership without destroying the object.
    pub fn into_inner(mut self) -> Option<NativeObject> {
        self.object.take()
    }

    pub fn with<T: 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, OwnershipError> {
        self.get()?.with(f)
    }

    pub fn with_mut<T: 'static, R>(
        &self,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, OwnershipError> {
        self.get()?.with_mut(f)
    }
}

impl Drop for UniqueObject {
    fn drop(&mut self) {
        if let Some(object) = self.object.take() {
            release_or_defer(PendingRelease::Destroy(object));
        }
    }
}

// ============================================================================
// Shared ownership
// ============================================================================

struct SharedInner {
    object: NativeObject,
    on_release: Mutex<Option<SharedReleaseHook>>,
}

impl Drop for SharedInner {
    fn drop(&mut self) {
        let hook = self.on_release.get_mut().take();
        release_or_defer(PendingRelease::Shared { object: self.object.clone(), hook });
    }
}

/// Reference-counted shared ownership of a native object.
///
/// Clones share one atomic count. When the last clone on either side drops,
/// the release hook runs once and the object is destroyed.
#[derive(Clone)]
pub struct SharedObject(Arc<SharedInner>);

impl SharedObject {
    pub fn new(object: NativeObject) -> Self {
        SharedObject(Arc::new(SharedInner { object, on_release: Mutex::new(None) }))
    }

    /// Attach a hook that runs exactly once, when the count reaches zero.
    pub fn with_release_hook(self, hook: impl FnOnce(&NativeObject) + Send + 'static) -> Self {
        *self.0.on_release.lock() = Some(Box::new(hook));
        self
    }

    /// Promote a unique owner into shared ownership.
    pub fn from_unique(unique: UniqueObject) -> Result<Self, OwnershipError> {
        unique.into_inner().map(SharedObject::new).ok_or(OwnershipError::Empty)
    }

    pub fn object(&self) -> &NativeObject {
        &self.0.object
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    pub fn ptr_eq(a: &SharedObject, b: &SharedObject) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for SharedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedObject")
            .field("object", &self.0.object)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

// ============================================================================
// Object values
// ============================================================================

/// A native object as seen by a native function argument or return value.
#[derive(Debug)]
pub enum ObjectValue {
    Borrowed { object: NativeObject, mutable: bool },
    Unique(UniqueObject),
    Shared(SharedObject),
}

impl ObjectValue {
    pub fn borrowed(object: NativeObject) -> Self {
        ObjectValue::Borrowed { object, mutable: false }
    }

    pub fn borrowed_mut(object: NativeObject) -> Self {
        ObjectValue::Borrowed { object, mutable: true }
    }

    pub fn object(&self) -> Result<&NativeObject, OwnershipError> {
        match self {
            ObjectValue::Borrowed { object, .. } => Ok(object),
            ObjectValue::Unique(unique) => unique.get(),
            ObjectValue::Shared(shared) => Ok(shared.object()),
        }
    }

    pub fn token(&self) -> Option<LifetimeToken> {
        self.object().ok().map(NativeObject::token)
    }

    pub fn with<T: 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, OwnershipError> {
        self.object()?.with(f)
    }

    /// Mutable access. Fails on const borrows.
    pub fn with_mut<T: 'static, R>(
        &self,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, OwnershipError> {
        if let ObjectValue::Borrowed { mutable: false, .. } = self {
            return Err(OwnershipError::ConstViolation);
        }
        self.object()?.with_mut(f)
    }

    /// Duplicate the reference without duplicating ownership.
    ///
    /// Unique owners cannot be duplicated.
    pub fn try_clone(&self) -> Option<ObjectValue> {
        match self {
            ObjectValue::Borrowed { object, mutable } => {
                Some(ObjectValue::Borrowed { object: object.clone(), mutable: *mutable })
            }
            ObjectValue::Unique(_) => None,
            ObjectValue::Shared(shared) => Some(ObjectValue::Shared(shared.clone())),
        }
    }
}

impl PartialEq for ObjectValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                ObjectValue::Borrowed { object: a, mutable: ma },
                ObjectValue::Borrowed { object: b, mutable: mb },
            ) => a.token() == b.token() && ma == mb,
            (ObjectValue::Unique(a), ObjectValue::Unique(b)) => {
                a.get().ok().map(NativeObject::token) == b.get().ok().map(NativeObject::token)
            }
            (ObjectValue::Shared(a), ObjectValue::Shared(b)) => SharedObject::ptr_eq(a, b),
            _ => false,
        }
    }
}
