//! Free functions combining and producing futures.
use super::{spawn, subscribe, Error, Future, Promise};
use crate::time;
use std::{sync::Arc, thread};

/// Combines `futures` into a future of all their values, in the input order.
///
/// Fails with the first failure in the input order: inputs are awaited one by one,
/// so a failure of a later input is observed only after all the earlier inputs succeed.
pub fn seq<T>(futures: impl IntoIterator<Item = Future<T>>) -> Future<Vec<T>>
where
    T: 'static + Clone + Send + Sync,
{
    let futures: Vec<_> = futures.into_iter().collect();
    subscribe("future-seq", move |promise| {
        promise.complete(futures.iter().map(Future::join).collect());
    })
}

/// Returns a future adopting the outcome of whichever of `futures` completes first.
/// The remaining futures are not canceled; their outcomes are discarded.
/// Fails immediately if `futures` is empty.
pub fn first_completed_of<T>(futures: impl IntoIterator<Item = Future<T>>) -> Future<T>
where
    T: 'static + Clone + Send + Sync,
{
    let futures: Vec<_> = futures.into_iter().collect();
    let promise = Arc::new(Promise::new());
    let first = promise.future();
    if futures.is_empty() {
        promise.failure(anyhow::format_err!("no futures to wait for"));
        return first;
    }
    for (i, f) in futures.into_iter().enumerate() {
        let promise = promise.clone();
        spawn("future-first-completed", move || {
            if promise.complete(f.join()) {
                tracing::trace!("future #{i} completed first");
            }
        });
    }
    first
}

/// Returns a future which succeeds once `d` passes.
pub fn timer(d: time::Duration) -> Future<()> {
    subscribe("future-timer", move |promise| {
        thread::sleep(time::to_std(d));
        promise.success(());
    })
}

/// Returns a future which fails with `Error::Timeout` once `d` passes.
/// Race it against other futures with [`first_completed_of`] to bound their waiting time.
pub fn timeout<T>(d: time::Duration) -> Future<T>
where
    T: 'static + Send + Sync,
{
    subscribe("future-timeout", move |promise| {
        thread::sleep(time::to_std(d));
        promise.complete(Err(Error::Timeout));
    })
}
