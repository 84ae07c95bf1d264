//! Transfer value and exception payload types
//!
//! Fibers hand values of arbitrary type to each other, so the transfer
//! currency is a boxed `Any`. Exceptions use the same shape a panic payload
//! has, which lets a panicking fiber body and an explicit `throw` travel the
//! same delivery path.

use std::any::Any;

/// Value carried by a transfer between two fibers
///
/// `None` is the analogue of switching without an argument.
pub type SwitchValue = Option<Box<dyn Any + Send>>;

/// Exception value delivered by `throw`
pub type ThrowPayload = Box<dyn Any + Send>;

/// Outcome of a transfer as seen by the fiber receiving control
pub type TransferResult = Result<SwitchValue, ThrowPayload>;

/// Kill payload
///
/// When a fiber body lets this payload propagate out unhandled, the
/// termination path folds it into a normal completion carrying the inner
/// value instead of an exception. `Fiber::kill` throws one with no value.
pub struct FiberExit(pub SwitchValue);

impl FiberExit {
    /// Exit with no completion value
    pub fn new() -> Self {
        FiberExit(None)
    }
}

impl Default for FiberExit {
    fn default() -> Self {
        FiberExit::new()
    }
}

impl std::fmt::Debug for FiberExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(_) => f.write_str("FiberExit(Some(..))"),
            None => f.write_str("FiberExit(None)"),
        }
    }
}

/// Box a value for transfer
///
/// ```ignore
/// fiber.switch(value(42))?;
/// ```
pub fn value<T: Any + Send>(v: T) -> SwitchValue {
    Some(Box::new(v))
}

/// Unbox a transferred value, if it is present and of the expected type
pub fn downcast<T: Any + Send>(v: SwitchValue) -> Option<T> {
    v.and_then(|b| b.downcast::<T>().ok()).map(|b| *b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_round_trip() {
        let v = value(42u32);
        assert_eq!(downcast::<u32>(v), Some(42));
    }

    #[test]
    fn test_downcast_wrong_type() {
        let v = value("hello");
        assert_eq!(downcast::<u32>(v), None);
    }

    #[test]
    fn test_downcast_none() {
        assert_eq!(downcast::<u32>(None), None);
    }

    #[test]
    fn test_fiber_exit_debug() {
        assert_eq!(format!("{:?}", FiberExit::new()), "FiberExit(None)");
        assert_eq!(format!("{:?}", FiberExit(value(1u8))), "FiberExit(Some(..))");
    }
}
