//! Error types for fiber operations

use core::fmt;

use crate::value::{SwitchValue, ThrowPayload};

/// Result type for fiber operations and fiber entry bodies
pub type FiberResult = Result<SwitchValue, FiberError>;

/// Errors raised by fiber lifecycle and transfer operations
///
/// All variants are returned synchronously to the caller of the failing
/// operation; nothing is retried or swallowed internally.
pub enum FiberError {
    /// Operation crossed a thread-affinity boundary
    Affinity(AffinityError),

    /// Operation not permitted in the target fiber's current state
    Lifecycle(LifecycleError),

    /// Fiber stack could not be mapped
    Stack(StackError),

    /// A fiber tried to switch into itself
    SelfSwitch,

    /// A fiber tried to throw into itself
    SelfThrow,

    /// A value was carried into a fiber that has not been started
    ValueBeforeStart,

    /// Parent assignment would create a cycle in the fiber tree
    ParentCycle,

    /// An exception value delivered from another fiber
    ///
    /// This is how a `throw` surfaces at the target's suspension point, and
    /// how an unhandled exception or panic in a fiber body surfaces at the
    /// call site that receives the termination.
    Thrown(ThrowPayload),
}

impl FiberError {
    /// Extract the delivered exception payload, if any
    pub fn into_thrown(self) -> Option<ThrowPayload> {
        match self {
            FiberError::Thrown(payload) => Some(payload),
            _ => None,
        }
    }

    /// Check if this is a thread-affinity violation
    #[inline]
    pub fn is_affinity(&self) -> bool {
        matches!(self, FiberError::Affinity(_))
    }

    /// Check if this is a lifecycle violation
    #[inline]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, FiberError::Lifecycle(_))
    }
}

impl fmt::Debug for FiberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FiberError::Affinity(e) => f.debug_tuple("Affinity").field(e).finish(),
            FiberError::Lifecycle(e) => f.debug_tuple("Lifecycle").field(e).finish(),
            FiberError::Stack(e) => f.debug_tuple("Stack").field(e).finish(),
            FiberError::SelfSwitch => f.write_str("SelfSwitch"),
            FiberError::SelfThrow => f.write_str("SelfThrow"),
            FiberError::ValueBeforeStart => f.write_str("ValueBeforeStart"),
            FiberError::ParentCycle => f.write_str("ParentCycle"),
            FiberError::Thrown(_) => f.write_str("Thrown(..)"),
        }
    }
}

impl fmt::Display for FiberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FiberError::Affinity(e) => write!(f, "{}", e),
            FiberError::Lifecycle(e) => write!(f, "{}", e),
            FiberError::Stack(e) => write!(f, "stack error: {}", e),
            FiberError::SelfSwitch => write!(f, "cannot switch from a fiber to itself"),
            FiberError::SelfThrow => write!(f, "cannot throw from a fiber to itself"),
            FiberError::ValueBeforeStart => {
                write!(f, "cannot carry a value into a fiber that was not started")
            }
            FiberError::ParentCycle => write!(f, "cyclic parent chain"),
            FiberError::Thrown(_) => write!(f, "exception delivered from another fiber"),
        }
    }
}

impl std::error::Error for FiberError {}

/// Thread-affinity violations
///
/// A fiber is permanently affine to the thread that created it; every
/// lifecycle operation from another thread fails with one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffinityError {
    /// Target fiber belongs to a different thread
    ForeignFiber,

    /// Parent candidate belongs to a different thread than the fiber
    ForeignParent,
}

impl fmt::Display for AffinityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AffinityError::ForeignFiber => {
                write!(f, "cannot operate on a fiber owned by a different thread")
            }
            AffinityError::ForeignParent => write!(f, "parent cannot be on a different thread"),
        }
    }
}

impl std::error::Error for AffinityError {}

impl From<AffinityError> for FiberError {
    fn from(e: AffinityError) -> Self {
        FiberError::Affinity(e)
    }
}

/// Lifecycle violations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    /// Switch or throw targeted a fiber that has ended
    Ended,

    /// Construction or reparenting named a parent that has ended
    EndedParent,
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::Ended => write!(f, "fiber has ended"),
            LifecycleError::EndedParent => write!(f, "parent must not have ended"),
        }
    }
}

impl std::error::Error for LifecycleError {}

impl From<LifecycleError> for FiberError {
    fn from(e: LifecycleError) -> Self {
        FiberError::Lifecycle(e)
    }
}

/// Stack mapping errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    /// Requested stack size was zero or otherwise unusable
    InvalidSize,

    /// mmap failed
    AllocationFailed,

    /// mprotect failed
    ProtectionFailed,
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackError::InvalidSize => write!(f, "invalid stack size"),
            StackError::AllocationFailed => write!(f, "stack allocation failed"),
            StackError::ProtectionFailed => write!(f, "stack protection change failed"),
        }
    }
}

impl std::error::Error for StackError {}

impl From<StackError> for FiberError {
    fn from(e: StackError) -> Self {
        FiberError::Stack(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = FiberError::from(LifecycleError::Ended);
        assert_eq!(format!("{}", e), "fiber has ended");

        let e = FiberError::from(AffinityError::ForeignParent);
        assert_eq!(format!("{}", e), "parent cannot be on a different thread");

        let e = FiberError::from(StackError::AllocationFailed);
        assert_eq!(format!("{}", e), "stack error: stack allocation failed");
    }

    #[test]
    fn test_error_conversion() {
        let e: FiberError = AffinityError::ForeignFiber.into();
        assert!(e.is_affinity());
        assert!(!e.is_lifecycle());

        let e: FiberError = LifecycleError::EndedParent.into();
        assert!(e.is_lifecycle());
        assert!(matches!(
            e,
            FiberError::Lifecycle(LifecycleError::EndedParent)
        ));
    }

    #[test]
    fn test_into_thrown() {
        let e = FiberError::Thrown(Box::new("boom"));
        let payload = e.into_thrown().unwrap();
        assert_eq!(*payload.downcast::<&str>().unwrap(), "boom");

        assert!(FiberError::SelfSwitch.into_thrown().is_none());
    }

    #[test]
    fn test_thrown_debug_is_opaque() {
        let e = FiberError::Thrown(Box::new(5u8));
        assert_eq!(format!("{:?}", e), "Thrown(..)");
    }
}
