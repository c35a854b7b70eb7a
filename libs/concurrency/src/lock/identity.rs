//! Identities of execution units, as tracked by [`super::ReentrantLock`].
use std::{fmt, thread};

/// Error returned when the identity of the calling execution unit cannot be resolved.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The caller is not running inside a tokio task.
    #[error("not running inside a tokio task")]
    NoTask,
    /// Other error.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Provides a stable, comparable id of the calling execution unit.
pub trait IdentityProvider: Send + Sync {
    /// Id of an execution unit.
    type Id: Copy + Eq + fmt::Debug + Send;

    /// Id of the calling execution unit.
    fn current(&self) -> Result<Self::Id, IdentityError>;
}

/// Identifies execution units by OS thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadIdentity;

impl IdentityProvider for ThreadIdentity {
    type Id = thread::ThreadId;

    fn current(&self) -> Result<Self::Id, IdentityError> {
        Ok(thread::current().id())
    }
}

/// Identifies execution units by tokio task.
/// Many tasks may run on the same OS thread, so a thread id is not enough to
/// tell them apart. Resolution fails outside of a tokio task.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskIdentity;

impl IdentityProvider for TaskIdentity {
    type Id = tokio::task::Id;

    fn current(&self) -> Result<Self::Id, IdentityError> {
        tokio::task::try_id().ok_or(IdentityError::NoTask)
    }
}
