//! Simple signal reporting primitive. A building block for `future::Promise`.
//! Unlike a channel, the signal carries no payload and can be observed by
//! any number of threads, any number of times.
use crate::time;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Communication channel over which a signal can be sent only once.
/// Useful for reporting very simple events.
#[derive(Debug, Default)]
pub struct Once {
    sent: Mutex<bool>,
    cond: Condvar,
}

impl Once {
    /// Constructs a new `Once` channel.
    pub fn new() -> Self {
        Self::default()
    }

    fn sent(&self) -> MutexGuard<'_, bool> {
        // The flag is a plain bool, a panic cannot leave it half-written.
        self.sent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sends the signal, waking all threads blocked in recv().
    ///
    /// After this call recv() will always return immediately.
    /// After this call any subsequent call to send() is a noop.
    pub fn send(&self) {
        let mut sent = self.sent();
        if !*sent {
            *sent = true;
            self.cond.notify_all();
        }
    }

    /// Blocks until the signal is sent.
    pub fn recv(&self) {
        let sent = self.sent();
        let _sent = self
            .cond
            .wait_while(sent, |sent| !*sent)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Blocks until the signal is sent or `timeout` passes.
    /// Returns true iff the signal was sent.
    pub fn recv_timeout(&self, timeout: time::Duration) -> bool {
        self.recv_until(time::Deadline::after(timeout))
    }

    /// Blocks until the signal is sent or the deadline passes.
    /// Returns true iff the signal was sent.
    pub fn recv_until(&self, deadline: time::Deadline) -> bool {
        let Some(timeout) = deadline.remaining() else {
            self.recv();
            return true;
        };
        let sent = self.sent();
        let (sent, _) = self
            .cond
            .wait_timeout_while(sent, timeout, |sent| !*sent)
            .unwrap_or_else(PoisonError::into_inner);
        *sent
    }

    /// Checks if send() was already called.
    pub fn try_recv(&self) -> bool {
        *self.sent()
    }
}
