//! Reentrant mutual exclusion.
//!
//! [`ReentrantLock`] may be acquired again by its current holder without blocking.
//! It keeps track of the holder identity and of the nesting depth;
//! the lock is released once the holder has unlocked it as many times as it has locked it.
//!
//! Internally there are two guards:
//! * `owner` protects the bookkeeping (holder identity, depth) and is held only for
//!   the duration of a single `lock()`/`unlock()` step,
//! * `gate` provides the actual mutual exclusion and is held from the outermost `lock()`
//!   to the matching `unlock()`, possibly for a long time. Its `balance` counts the
//!   acquisitions currently available: 1 when the gate is open, 0 when it is taken.
//!
//! When both are needed, `owner` is always locked before `gate`'s internal mutex.
//!
//! Misuse (unlocking a lock which the caller doesn't hold, failing to identify the caller)
//! is a bug in the calling code and panics.
use std::{
    fmt,
    marker::PhantomData,
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
};

pub mod identity;

pub use identity::{IdentityError, IdentityProvider, TaskIdentity, ThreadIdentity};

/// Holder of the lock.
/// Invariant: `depth > 0` iff `id.is_some()`.
#[derive(Debug)]
struct Owner<I> {
    id: Option<I>,
    depth: usize,
}

/// Binary semaphore.
#[derive(Debug)]
struct Gate {
    balance: Mutex<i32>,
    released: Condvar,
}

impl Gate {
    fn new() -> Self {
        Self {
            balance: Mutex::new(1),
            released: Condvar::new(),
        }
    }

    fn balance(&self) -> MutexGuard<'_, i32> {
        self.balance.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes the gate, blocking until it is released.
    fn acquire(&self) {
        let balance = self.balance();
        let mut balance = self
            .released
            .wait_while(balance, |balance| *balance <= 0)
            .unwrap_or_else(PoisonError::into_inner);
        *balance -= 1;
    }

    /// Takes the gate iff it is open.
    fn try_acquire(&self) -> bool {
        let mut balance = self.balance();
        if *balance <= 0 {
            return false;
        }
        *balance -= 1;
        true
    }

    /// Releases the gate, waking one blocked `acquire()`.
    fn release(&self) {
        let mut balance = self.balance();
        *balance += 1;
        debug_assert_eq!(*balance, 1);
        self.released.notify_one();
    }
}

/// Mutual exclusion lock which its holder can lock again without deadlocking itself.
/// Execution units are told apart by the `IdentityProvider`, by OS thread by default.
///
/// `ReentrantLock` doesn't own the data it protects; pair `lock()` with `unlock()`
/// (or use [`ReentrantLock::guard`]) around the critical section.
pub struct ReentrantLock<P: IdentityProvider = ThreadIdentity> {
    provider: P,
    owner: Mutex<Owner<P::Id>>,
    gate: Gate,
}

impl Default for ReentrantLock {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: IdentityProvider> fmt::Debug for ReentrantLock<P> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let owner = self.owner();
        formatter
            .debug_struct("ReentrantLock")
            .field("owner", &owner.id)
            .field("depth", &owner.depth)
            .finish_non_exhaustive()
    }
}

impl ReentrantLock {
    /// Constructs an unlocked lock identifying execution units by OS thread.
    pub fn new() -> Self {
        Self::with_provider(ThreadIdentity)
    }
}

impl<P: IdentityProvider> ReentrantLock<P> {
    /// Constructs an unlocked lock identifying execution units with `provider`.
    pub fn with_provider(provider: P) -> Self {
        Self {
            provider,
            owner: Mutex::new(Owner { id: None, depth: 0 }),
            gate: Gate::new(),
        }
    }

    fn owner(&self) -> MutexGuard<'_, Owner<P::Id>> {
        // Bookkeeping is updated only after all the checks which may panic.
        self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Id of the caller.
    /// Panics if it cannot be resolved: a lock which cannot tell its holder apart
    /// from other execution units cannot guarantee anything.
    fn caller(&self) -> P::Id {
        match self.provider.current() {
            Ok(id) => id,
            Err(err) => panic!("ReentrantLock: failed to resolve the caller identity: {err}"),
        }
    }

    /// Acquires the lock.
    /// Returns immediately if the caller already holds it;
    /// otherwise blocks until the current holder (if any) releases it.
    pub fn lock(&self) {
        let me = self.caller();
        {
            let mut owner = self.owner();
            if owner.id == Some(me) {
                owner.depth += 1;
                return;
            }
        }
        // `owner` is unlocked here, so that the holder can make progress.
        if !self.gate.try_acquire() {
            tracing::trace!("ReentrantLock: {me:?} waiting for the holder");
            self.gate.acquire();
        }
        let mut owner = self.owner();
        debug_assert!(owner.id.is_none() && owner.depth == 0);
        owner.id = Some(me);
        owner.depth = 1;
    }

    /// Acquires the lock iff it is free or already held by the caller.
    /// Never blocks on the holder. Returns true iff the lock was acquired.
    pub fn try_lock(&self) -> bool {
        let me = self.caller();
        let mut owner = self.owner();
        if owner.id == Some(me) {
            owner.depth += 1;
            return true;
        }
        if !self.gate.try_acquire() {
            return false;
        }
        owner.id = Some(me);
        owner.depth = 1;
        true
    }

    /// Releases one level of the lock. The lock becomes available to other
    /// execution units once the holder unlocks it as many times as it has locked it.
    ///
    /// Panics if the caller doesn't hold the lock.
    pub fn unlock(&self) {
        let mut owner = self.owner();
        let Some(id) = owner.id else {
            panic!("unlock of unlocked ReentrantLock");
        };
        assert!(
            id == self.caller(),
            "unlock of ReentrantLock held by another execution unit"
        );
        owner.depth -= 1;
        if owner.depth == 0 {
            owner.id = None;
            self.gate.release();
        }
    }

    /// Acquires the lock, returning a guard which unlocks it when dropped.
    pub fn guard(&self) -> ReentrantGuard<'_, P> {
        self.lock();
        ReentrantGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Checks if the caller holds the lock.
    pub fn is_held_by_caller(&self) -> bool {
        let me = self.caller();
        self.owner().id == Some(me)
    }

    /// Number of times the caller has locked the lock without unlocking it;
    /// 0 if the caller doesn't hold it.
    pub fn hold_count(&self) -> usize {
        let me = self.caller();
        let owner = self.owner();
        if owner.id == Some(me) {
            owner.depth
        } else {
            0
        }
    }
}

/// Guard unlocking the [`ReentrantLock`] when dropped.
///
/// It is NOT Send: it has to be dropped by the execution unit which acquired the lock.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ReentrantGuard<'a, P: IdentityProvider> {
    lock: &'a ReentrantLock<P>,
    _not_send: PhantomData<*mut ()>,
}

impl<P: IdentityProvider> fmt::Debug for ReentrantGuard<'_, P> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_tuple("ReentrantGuard").field(self.lock).finish()
    }
}

impl<P: IdentityProvider> Drop for ReentrantGuard<'_, P> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
