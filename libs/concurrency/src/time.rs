//! Well-defined alternatives to types in std::time.
//! Timed waits and timers in this crate take a signed `Duration`;
//! a negative duration is treated as an already elapsed one.

/// A signed Duration.
pub type Duration = time::Duration;

/// Converts `d` into a `std::time::Duration`, clamping negative values to zero.
pub(crate) fn to_std(d: Duration) -> std::time::Duration {
    d.try_into().unwrap_or(std::time::Duration::ZERO)
}

/// Represents an optional deadline.
/// Isomorphic to `Option<std::time::Instant>`,
/// however the total ordering on `Deadline` is purposefully
/// defined, while on `Option<std::time::Instant>` it is accidental.
/// By the definition of derive(PartialEq), Finite(...) < Infinite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Deadline {
    /// Finite deadline.
    Finite(std::time::Instant),
    /// Infinite deadline.
    Infinite,
}

impl From<std::time::Instant> for Deadline {
    fn from(t: std::time::Instant) -> Self {
        Self::Finite(t)
    }
}

impl Deadline {
    /// Deadline `d` from now. Saturates to `Infinite` if the result
    /// is not representable.
    pub fn after(d: Duration) -> Self {
        std::time::Instant::now()
            .checked_add(to_std(d))
            .map_or(Self::Infinite, Self::Finite)
    }

    /// Time left until the deadline, `None` if the deadline is infinite.
    pub fn remaining(self) -> Option<std::time::Duration> {
        match self {
            Self::Finite(t) => Some(t.saturating_duration_since(std::time::Instant::now())),
            Self::Infinite => None,
        }
    }
}
