//! Fiber lifecycle state machine

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

/// State of a fiber
///
/// `Active` covers both "currently running" and "suspended"; the registry,
/// not the state, says which fiber holds the thread at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FiberState {
    /// Created, entry not yet run, no execution context
    NotStarted = 0,

    /// Entry has started and has not yet terminated
    Active = 1,

    /// Entry returned or was killed; never leaves this state
    Ended = 2,
}

impl FiberState {
    /// Check if this fiber has terminated
    #[inline]
    pub const fn is_ended(&self) -> bool {
        matches!(self, FiberState::Ended)
    }

    /// Check if this fiber has started running its entry
    #[inline]
    pub const fn has_started(&self) -> bool {
        !matches!(self, FiberState::NotStarted)
    }
}

impl From<u8> for FiberState {
    fn from(v: u8) -> Self {
        match v {
            0 => FiberState::NotStarted,
            1 => FiberState::Active,
            _ => FiberState::Ended,
        }
    }
}

impl From<FiberState> for u8 {
    fn from(state: FiberState) -> u8 {
        state as u8
    }
}

impl fmt::Display for FiberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FiberState::NotStarted => write!(f, "not-started"),
            FiberState::Active => write!(f, "active"),
            FiberState::Ended => write!(f, "ended"),
        }
    }
}

/// Atomic holder for a [`FiberState`]
///
/// Transitions only ever move forward: NotStarted -> Active -> Ended, or
/// NotStarted -> Ended for a fiber killed before it ran. Once `Ended` the
/// state never changes again.
pub struct StateCell(AtomicU8);

impl StateCell {
    /// Create a cell in the given state
    #[inline]
    pub const fn new(state: FiberState) -> Self {
        StateCell(AtomicU8::new(state as u8))
    }

    /// Read the current state
    #[inline]
    pub fn get(&self) -> FiberState {
        FiberState::from(self.0.load(Ordering::Acquire))
    }

    /// Check whether the fiber has terminated
    #[inline]
    pub fn is_ended(&self) -> bool {
        self.get().is_ended()
    }

    /// Mark the fiber as running its entry (NotStarted -> Active)
    #[inline]
    pub fn activate(&self) {
        let _ = self.0.compare_exchange(
            FiberState::NotStarted as u8,
            FiberState::Active as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Mark the fiber as terminated
    ///
    /// Returns true if this call performed the transition, false if the
    /// fiber had already ended.
    #[inline]
    pub fn end(&self) -> bool {
        self.0.swap(FiberState::Ended as u8, Ordering::AcqRel) != FiberState::Ended as u8
    }
}

impl fmt::Debug for StateCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateCell({:?})", self.get())
    }
}
