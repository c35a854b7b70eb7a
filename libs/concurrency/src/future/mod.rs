//! Write-once asynchronous values.
//!
//! A [`Promise`] is the producer side of a one-shot result cell: it is completed exactly once,
//! either with a value or with an [`Error`]. A [`Future`] is a cheaply cloneable read-only
//! handle observing that cell. Any number of threads may block on the same future; all of them
//! observe the same outcome.
//!
//! Combinators ([`Future::map`], [`Future::flat_map`], [`Future::recover`],
//! [`Future::recover_with`], [`seq`], [`first_completed_of`]) never block the caller.
//! Each of them spawns a background subscriber thread, which waits for its inputs,
//! computes the derived outcome and completes a fresh promise. Completion is thus
//! propagated push-style, and long chains don't grow the call stack.
//!
//! Nothing is ever canceled: a timed-out [`Future::get`] or a losing branch of
//! [`first_completed_of`] just stops observing, the underlying computation keeps running.
use crate::{signal, time};
use std::{
    any::Any,
    fmt, panic,
    sync::{Arc, OnceLock},
    thread,
};

mod ops;
#[cfg(test)]
mod tests;

pub use ops::*;

/// Outcome of an asynchronous computation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The computation failed.
    #[error("{0:#}")]
    Failure(Arc<anyhow::Error>),
    /// Waiting for the outcome timed out.
    #[error("timeout")]
    Timeout,
    /// All `Promise` handles were dropped before completion.
    #[error("promise dropped before completion")]
    Broken,
    /// A combinator closure panicked.
    #[error("panicked: {0}")]
    Panicked(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Failure(Arc::new(err))
    }
}

/// Wraps result with `Error` as an error.
pub type Outcome<T> = Result<T, Error>;

/// Result cell shared by a promise and its futures.
struct Cell<T> {
    result: OnceLock<Outcome<T>>,
    /// Sent once `result` is set.
    completed: signal::Once,
}

impl<T> Cell<T> {
    /// Attempts the `Pending -> Completed` transition.
    /// Returns false if the cell was already completed.
    fn complete(&self, res: Outcome<T>) -> bool {
        if self.result.set(res).is_err() {
            return false;
        }
        self.completed.send();
        true
    }
}

/// Producer side of a write-once result cell.
///
/// Dropping the last handle of a pending promise completes it with [`Error::Broken`],
/// so that its observers never wait for a producer which no longer exists.
/// Wrap it in an `Arc` to complete it from multiple places.
pub struct Promise<T>(Arc<Cell<T>>);

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Promise")
            .field("completed", &self.0.completed.try_recv())
            .finish_non_exhaustive()
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if self.0.result.get().is_none() && self.0.complete(Err(Error::Broken)) {
            tracing::debug!("promise dropped before completion");
        }
    }
}

impl<T> Promise<T> {
    /// Constructs a pending promise.
    pub fn new() -> Self {
        Self(Arc::new(Cell {
            result: OnceLock::new(),
            completed: signal::Once::new(),
        }))
    }

    /// Returns a future observing this promise.
    pub fn future(&self) -> Future<T> {
        Future(self.0.clone())
    }

    /// Completes the promise with `res`, waking all the waiting threads.
    /// Completing an already completed promise is a noop.
    /// Returns true iff this call completed the promise.
    pub fn complete(&self, res: Outcome<T>) -> bool {
        let done = self.0.complete(res);
        if !done {
            tracing::debug!("ignoring completion of an already completed promise");
        }
        done
    }

    /// Completes the promise with a value.
    /// See [`Promise::complete`].
    pub fn success(&self, v: T) -> bool {
        self.complete(Ok(v))
    }

    /// Completes the promise with a failure.
    /// See [`Promise::complete`].
    pub fn failure(&self, err: impl Into<anyhow::Error>) -> bool {
        self.complete(Err(err.into().into()))
    }
}

/// Read-only observer of a [`Promise`].
pub struct Future<T>(Arc<Cell<T>>);

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Future")
            .field("completed", &self.is_completed())
            .finish_non_exhaustive()
    }
}

impl<T> Future<T> {
    /// Constructs an already completed future.
    pub fn ready(res: Outcome<T>) -> Self {
        let promise = Promise::new();
        promise.complete(res);
        promise.future()
    }

    /// Checks whether the outcome is already available.
    pub fn is_completed(&self) -> bool {
        self.0.completed.try_recv()
    }
}

impl<T: Clone> Future<T> {
    fn outcome(&self) -> Outcome<T> {
        self.0.result.get().cloned().unwrap()
        // ^ `unwrap()` is safe; `completed` is sent only after `result` is set.
    }

    /// Blocks until the promise is completed and returns its outcome.
    pub fn join(&self) -> Outcome<T> {
        self.0.completed.recv();
        self.outcome()
    }

    /// Blocks until the promise is completed, but at most for `timeout`.
    /// Returns `Error::Timeout` if the promise wasn't completed in time.
    /// The timeout affects only this call: the promise may still complete later
    /// and subsequent calls will observe its outcome.
    pub fn get(&self, timeout: time::Duration) -> Outcome<T> {
        if !self.0.completed.recv_timeout(timeout) {
            return Err(Error::Timeout);
        }
        self.outcome()
    }

    /// Returns the outcome if it is already available.
    pub fn try_get(&self) -> Option<Outcome<T>> {
        self.0.result.get().cloned()
    }
}

impl<T: 'static + Clone + Send + Sync> Future<T> {
    /// Derives a future applying `f` to the value of this future.
    /// A failure of this future is propagated as-is, without calling `f`.
    pub fn map<U, F>(&self, f: F) -> Future<U>
    where
        U: 'static + Send + Sync,
        F: 'static + Send + FnOnce(T) -> anyhow::Result<U>,
    {
        let this = self.clone();
        subscribe("future-map", move |promise| {
            promise.complete(this.join().and_then(|v| catch_panic(|| f(v))));
        })
    }

    /// Derives a future which adopts the outcome of the future returned by `f`.
    /// A failure of this future is propagated as-is, without calling `f`.
    pub fn flat_map<U, F>(&self, f: F) -> Future<U>
    where
        U: 'static + Clone + Send + Sync,
        F: 'static + Send + FnOnce(T) -> anyhow::Result<Future<U>>,
    {
        let this = self.clone();
        subscribe("future-flat-map", move |promise| {
            let next = this.join().and_then(|v| catch_panic(|| f(v)));
            promise.complete(next.and_then(|next| next.join()));
        })
    }

    /// Derives a future which replaces a failure of this future with the outcome of `f`.
    /// A value of this future is passed through without calling `f`.
    pub fn recover<F>(&self, f: F) -> Future<T>
    where
        F: 'static + Send + FnOnce() -> anyhow::Result<T>,
    {
        let this = self.clone();
        subscribe("future-recover", move |promise| {
            promise.complete(this.join().or_else(|err| {
                tracing::debug!("recovering from: {err}");
                catch_panic(f)
            }));
        })
    }

    /// Derives a future which replaces a failure of this future with
    /// the outcome of `alternative`, whatever it turns out to be.
    /// A value of this future is passed through.
    pub fn recover_with(&self, alternative: Future<T>) -> Future<T> {
        let this = self.clone();
        subscribe("future-recover-with", move |promise| {
            promise.complete(this.join().or_else(|err| {
                tracing::debug!("recovering from: {err}");
                alternative.join()
            }));
        })
    }
}

/// Runs `task` on a new named thread.
/// Dropping `task` is the only cleanup if the thread cannot be spawned.
fn spawn(name: &str, task: impl 'static + Send + FnOnce()) {
    if let Err(err) = thread::Builder::new().name(name.to_owned()).spawn(task) {
        tracing::error!("failed to spawn {name} subscriber thread: {err}");
    }
}

/// Spawns a subscriber thread completing a fresh promise.
/// Returns the future of that promise.
///
/// If the thread cannot be spawned, the promise gets dropped
/// and the future fails with `Error::Broken`.
fn subscribe<T, F>(name: &str, task: F) -> Future<T>
where
    T: 'static + Send + Sync,
    F: 'static + Send + FnOnce(Promise<T>),
{
    let promise = Promise::new();
    let future = promise.future();
    spawn(name, move || task(promise));
    future
}

/// Calls `f`, turning a panic into `Error::Panicked`.
fn catch_panic<R>(f: impl FnOnce() -> anyhow::Result<R>) -> Outcome<R> {
    match panic::catch_unwind(panic::AssertUnwindSafe(f)) {
        Ok(res) => res.map_err(Error::from),
        Err(payload) => Err(Error::Panicked(panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return (*msg).to_owned();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "unknown panic payload".to_owned()
}
