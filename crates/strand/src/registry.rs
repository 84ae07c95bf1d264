//! Thread-local fiber registry
//!
//! Each host thread tracks its own current fiber and the payload of the
//! transfer in progress. No entry is ever visible to another thread, so
//! there is nothing to lock; cross-thread misuse is rejected by the
//! affinity checks in the engine before it could reach these cells.
//!
//! The current-fiber slot is updated by the side *giving up* control,
//! immediately before the raw transfer. That way no suspended frame ever
//! holds an engine-side handle to its own fiber, and an abandoned fiber's
//! lifetime is decided by user handles alone.

use std::cell::RefCell;

use strand_core::value::TransferResult;

use crate::fiber::Fiber;

thread_local! {
    /// The fiber currently running on this thread
    static CURRENT: RefCell<Option<Fiber>> = const { RefCell::new(None) };

    /// Payload carried by the transfer in progress on this thread
    static IN_FLIGHT: RefCell<Option<InFlight>> = const { RefCell::new(None) };
}

/// A transfer in progress on the calling thread
///
/// Set by the side giving up control, consumed by the side receiving it.
pub(crate) struct InFlight {
    /// Value or exception being delivered
    pub(crate) payload: TransferResult,

    /// Terminated fiber whose context the landing side must release
    ///
    /// A fiber cannot unmap the stack it is running on, so its final
    /// transfer leaves this note and the fiber that lands does the release.
    pub(crate) retire: Option<Fiber>,
}

/// The fiber currently running on the calling thread
///
/// The first call on any given thread creates that thread's root fiber,
/// representing its original call stack. Idempotent thereafter until a
/// switch hands the thread to another fiber.
pub fn current() -> Fiber {
    CURRENT.with(|cell| {
        let mut slot = cell.borrow_mut();
        match &*slot {
            Some(fiber) => fiber.clone(),
            None => {
                let root = Fiber::root();
                *slot = Some(root.clone());
                root
            }
        }
    })
}

/// Record `fiber` as the thread's current fiber
///
/// Called by the outgoing side of a transfer, once the destination is
/// final; the registry's handle is also what keeps the destination alive
/// through the handoff.
pub(crate) fn set_current(fiber: &Fiber) {
    CURRENT.with(|cell| {
        *cell.borrow_mut() = Some(fiber.clone());
    });
}

/// Stash the payload for the transfer about to happen
pub(crate) fn begin_transfer(transfer: InFlight) {
    IN_FLIGHT.with(|cell| {
        let previous = cell.borrow_mut().replace(transfer);
        debug_assert!(previous.is_none(), "a transfer was already in flight");
    });
}

/// Bookkeeping for the landing side of a transfer
///
/// Releases the context of a fiber that terminated on the way here and
/// hands back the delivered payload. The current-fiber slot already points
/// at the lander; the outgoing side set it.
pub(crate) fn land() -> TransferResult {
    let transfer = IN_FLIGHT.with(|cell| cell.borrow_mut().take());
    let Some(transfer) = transfer else {
        unreachable!("transfer landed with no in-flight payload");
    };

    if let Some(dead) = transfer.retire {
        dead.release_context();
    }
    transfer.payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_is_lazy_and_idempotent() {
        let a = current();
        let b = current();
        assert_eq!(a, b);
        assert!(a.is_root());
        assert!(a.is_alive());
        assert!(a.parent().is_none());
    }

    #[test]
    fn test_each_thread_gets_its_own_root() {
        let here = current();
        let there = std::thread::spawn(current).join().unwrap();
        assert_ne!(here, there);
        assert!(there.is_root());
    }
}
