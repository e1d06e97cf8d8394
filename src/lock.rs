//! The boundary lock.
//!
//! Only one thread may run dynamic-side code at a time. [`BoundaryLock`] is a
//! re-entrant, owner-tracked lock: the thread holding it may acquire it again
//! (a native call made from a dynamic callback that calls back again), and
//! [`BoundaryLock::release_while`] hands it over entirely for the duration of
//! work that must not hold it, such as a native destructor.

use std::thread::{self, ThreadId};

use crossbind_core::{defer_destruction, destroy_immediately};
use parking_lot::{Condvar, Mutex};

/// Who holds the boundary lock, as seen from the calling thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryState {
    Unlocked,
    HeldByCurrent { depth: usize },
    HeldByOther,
}

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    depth: usize,
}

/// Re-entrant mutual exclusion for dynamic-side execution.
#[derive(Debug, Default)]
pub struct BoundaryLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl BoundaryLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the current thread holds the lock.
    pub fn acquire(&self) -> BoundaryGuard<'_> {
        self.lock_depth(1);
        BoundaryGuard { lock: self }
    }

    /// Acquire without blocking. Always succeeds for the current holder.
    pub fn try_acquire(&self) -> Option<BoundaryGuard<'_>> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        match state.owner {
            Some(owner) if owner != me => None,
            _ => {
                state.owner = Some(me);
                state.depth += 1;
                Some(BoundaryGuard { lock: self })
            }
        }
    }

    pub fn state(&self) -> BoundaryState {
        let state = self.state.lock();
        match state.owner {
            None => BoundaryState::Unlocked,
            Some(owner) if owner == thread::current().id() => {
                BoundaryState::HeldByCurrent { depth: state.depth }
            }
            Some(_) => BoundaryState::HeldByOther,
        }
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        matches!(self.state(), BoundaryState::HeldByCurrent { .. })
    }

    /// Run `f` with the lock fully released by the current thread.
    ///
    /// Every level the current thread holds is given up and restored
    /// afterwards, even if `f` panics. Other threads may take the lock while
    /// `f` runs. When the current thread does not hold the lock, `f` simply
    /// runs. Native objects `f` lets go of are destroyed in place, even inside
    /// a [`defer_destruction`] scope.
    pub fn release_while<R>(&self, f: impl FnOnce() -> R) -> R {
        let depth = {
            let me = thread::current().id();
            let mut state = self.state.lock();
            if state.owner != Some(me) {
                0
            } else {
                let depth = state.depth;
                state.owner = None;
                state.depth = 0;
                self.released.notify_one();
                depth
            }
        };
        if depth == 0 {
            return destroy_immediately(f);
        }

        let _restore = Restore { lock: self, depth };
        destroy_immediately(f)
    }

    /// Run `f` holding the lock.
    ///
    /// Native objects `f` lets go of are destroyed once the current thread
    /// has released the lock again, not while `f` holds it.
    pub fn run_locked<R>(&self, f: impl FnOnce() -> R) -> R {
        let (out, deferred) = defer_destruction(|| {
            let _guard = self.acquire();
            f()
        });
        if !deferred.is_empty() {
            self.release_while(|| deferred.run());
        }
        out
    }

    fn lock_depth(&self, levels: usize) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = levels;
                    return;
                }
                Some(owner) if owner == me => {
                    state.depth += levels;
                    return;
                }
                Some(_) => self.released.wait(&mut state),
            }
        }
    }

    fn unlock_one(&self) {
        let mut state = self.state.lock();
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            state.owner = None;
            self.released.notify_one();
        }
    }
}

/// Holds one level of the boundary lock until dropped.
#[must_use = "the lock is released when the guard drops"]
#[derive(Debug)]
pub struct BoundaryGuard<'a> {
    lock: &'a BoundaryLock,
}

impl Drop for BoundaryGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock_one();
    }
}

/// Re-acquires the levels given up by `release_while`.
struct Restore<'a> {
    lock: &'a BoundaryLock,
    depth: usize,
}

impl Drop for Restore<'_> {
    fn drop(&mut self) {
        self.lock.lock_depth(self.depth);
    }
}
