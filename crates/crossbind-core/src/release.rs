//! Deferred destruction of native objects.
//!
//! Dropping the last owner of a native object normally destroys it on the
//! spot. Inside [`defer_destruction`] the current thread collects those
//! destructions instead and hands them back as a [`DeferredRelease`], so the
//! caller decides when (and under which lock state) they run. Code that
//! leaves the boundary lock wraps itself in [`destroy_immediately`] to turn
//! collection off again for its own duration.

use std::cell::RefCell;
use std::fmt;

use crate::object::NativeObject;

pub(crate) type SharedReleaseHook = Box<dyn FnOnce(&NativeObject) + Send>;

/// One destruction waiting to run.
pub(crate) enum PendingRelease {
    /// The last unique owner let go.
    Destroy(NativeObject),
    /// The last shared owner let go; the hook runs before the object dies.
    Shared { object: NativeObject, hook: Option<SharedReleaseHook> },
}

impl PendingRelease {
    fn run(self) {
        match self {
            PendingRelease::Destroy(object) => {
                object.destroy();
            }
            PendingRelease::Shared { object, hook } => {
                if let Some(hook) = hook {
                    hook(&object);
                }
                object.destroy();
            }
        }
    }
}

thread_local! {
    static COLLECTING: RefCell<Option<Vec<PendingRelease>>> = const { RefCell::new(None) };
}

/// Run `release` now, or queue it if the current thread is collecting.
pub(crate) fn release_or_defer(release: PendingRelease) {
    let now = COLLECTING
        .try_with(|collecting| match collecting.borrow_mut().as_mut() {
            Some(queue) => {
                queue.push(release);
                None
            }
            None => Some(release),
        })
        .unwrap_or(None);
    if let Some(release) = now {
        release.run();
    }
}

/// Destructions collected by [`defer_destruction`].
///
/// They run, in the order they were collected, when this value is dropped
/// or [`run`](DeferredRelease::run) is called.
#[must_use = "dropping runs the collected destructors in place"]
#[derive(Default)]
pub struct DeferredRelease {
    pending: Vec<PendingRelease>,
}

impl DeferredRelease {
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn run(self) {
        drop(self);
    }
}

impl Drop for DeferredRelease {
    fn drop(&mut self) {
        for release in std::mem::take(&mut self.pending) {
            release.run();
        }
    }
}

impl fmt::Debug for DeferredRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredRelease").field("pending", &self.pending.len()).finish()
    }
}

/// Puts the previous collection state back, even on unwind.
struct Restore {
    previous: Option<Option<Vec<PendingRelease>>>,
    collected: Option<Vec<PendingRelease>>,
}

impl Restore {
    fn swap_in(state: Option<Vec<PendingRelease>>) -> Self {
        let previous = COLLECTING.with(|collecting| collecting.replace(state));
        Restore { previous: Some(previous), collected: None }
    }

    fn finish(mut self) -> Vec<PendingRelease> {
        self.restore();
        self.collected.take().unwrap_or_default()
    }

    fn restore(&mut self) {
        if let Some(previous) = self.previous.take() {
            let current = COLLECTING.with(|collecting| collecting.replace(previous));
            self.collected = current;
        }
    }
}

impl Drop for Restore {
    fn drop(&mut self) {
        self.restore();
        // destructors collected before a panic still run
        drop(DeferredRelease { pending: self.collected.take().unwrap_or_default() });
    }
}

/// Run `f`, collecting every native destruction it triggers on this thread.
pub fn defer_destruction<R>(f: impl FnOnce() -> R) -> (R, DeferredRelease) {
    let scope = Restore::swap_in(Some(Vec::new()));
    let out = f();
    let pending = scope.finish();
    (out, DeferredRelease { pending })
}

/// Run `f` with collection turned off, so destructions happen in place.
pub fn destroy_immediately<R>(f: impl FnOnce() -> R) -> R {
    let scope = Restore::swap_in(None);
    let out = f();
    drop(scope.finish());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TypeHash;
    use crate::object::{SharedObject, UniqueObject};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn object() -> NativeObject {
        NativeObject::new(TypeHash::from_name("Thing"), 1u32)
    }

    #[test]
    fn drops_inside_the_scope_are_deferred() {
        let obj = object();
        let observer = obj.clone();
        let ((), deferred) = defer_destruction(|| drop(UniqueObject::new(obj)));
        assert!(observer.is_alive());
        assert_eq!(deferred.len(), 1);
        deferred.run();
        assert!(!observer.is_alive());
    }

    #[test]
    fn shared_release_hook_is_deferred_with_the_object() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let shared = SharedObject::new(object()).with_release_hook(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let observer = shared.object().clone();
        let ((), deferred) = defer_destruction(|| drop(shared));
        assert_eq!(released.load(Ordering::SeqCst), 0);
        assert!(observer.is_alive());
        drop(deferred);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(!observer.is_alive());
    }

    #[test]
    fn immediate_scope_inside_a_deferred_one() {
        let inner = object();
        let outer = object();
        let (inner_alive, deferred) = defer_destruction(|| {
            let observer = inner.clone();
            destroy_immediately(|| drop(UniqueObject::new(inner)));
            drop(UniqueObject::new(outer.clone()));
            observer.is_alive()
        });
        assert!(!inner_alive);
        assert!(outer.is_alive());
        assert_eq!(deferred.len(), 1);
        drop(deferred);
        assert!(!outer.is_alive());
    }

    #[test]
    fn nested_scopes_collect_separately() {
        let a = object();
        let b = object();
        let (inner, outer) = defer_destruction(|| {
            let ((), inner) = defer_destruction(|| drop(UniqueObject::new(a.clone())));
            drop(UniqueObject::new(b.clone()));
            inner
        });
        assert_eq!((inner.len(), outer.len()), (1, 1));
        drop(inner);
        assert!(!a.is_alive());
        assert!(b.is_alive());
        drop(outer);
        assert!(!b.is_alive());
    }

    #[test]
    fn outside_any_scope_destruction_is_immediate() {
        let obj = object();
        let observer = obj.clone();
        drop(UniqueObject::new(obj));
        assert!(!observer.is_alive());
    }
}
