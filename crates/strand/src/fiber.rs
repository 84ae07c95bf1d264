//! Fiber lifecycle and transfer engine
//!
//! A fiber is a node in a per-thread tree. Control moves between fibers
//! only through explicit `switch` and `throw` calls; when a fiber's entry
//! terminates, control and the outcome are handed to its nearest ancestor
//! that has started and not ended (the active parent).
//!
//! Every lifecycle operation is checked against two hard boundaries before
//! anything irreversible happens: the target must not have ended, and the
//! caller must be on the fiber's host thread. A fiber never migrates.

use std::cell::UnsafeCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use strand_core::error::{AffinityError, FiberError, FiberResult, LifecycleError};
use strand_core::id::FiberId;
use strand_core::state::{FiberState, StateCell};
use strand_core::spinlock::SpinLock;
use strand_core::value::{FiberExit, SwitchValue, ThrowPayload, TransferResult};
use strand_core::{kdebug, ktrace};
use strand_runtime::config;
use strand_runtime::context::Context;

use crate::registry::{self, InFlight};

type EntryFn = Box<dyn FnOnce() -> FiberResult + Send + 'static>;

/// A cooperative fiber
///
/// Handles are cheap to clone and compare by identity. They may be sent to
/// other threads so that misuse can be detected, but every lifecycle
/// operation is only valid on the thread that created the fiber.
pub struct Fiber {
    inner: Arc<FiberInner>,
}

struct FiberInner {
    id: FiberId,
    host: ThreadId,
    is_root: bool,
    state: StateCell,

    /// Parent link; `None` only for root fibers
    parent: SpinLock<Option<Fiber>>,

    /// Entry body, consumed when the context first runs
    entry: UnsafeCell<Option<EntryFn>>,

    /// Execution context, created on the first switch, released on
    /// termination or when the last handle drops
    context: UnsafeCell<Option<Box<Context>>>,
}

// Safety: `state` is atomic and `parent` is behind a lock; `entry` and
// `context` are touched only by the host thread (enforced by the affinity
// checks) except in Drop, which runs when no other access can exist.
unsafe impl Send for FiberInner {}
unsafe impl Sync for FiberInner {}

impl Fiber {
    /// Create a fiber that will run `entry` when first switched into
    ///
    /// The parent is the fiber currently running on the calling thread.
    /// The entry body runs lazily: construction never executes any of it.
    pub fn new<F>(entry: F) -> Fiber
    where
        F: FnOnce() -> FiberResult + Send + 'static,
    {
        let parent = registry::current();
        Fiber::construct(Box::new(entry), parent)
    }

    /// Create a fiber with an explicit parent
    ///
    /// Fails if the parent lives on a different thread or has already
    /// ended.
    pub fn with_parent<F>(entry: F, parent: &Fiber) -> Result<Fiber, FiberError>
    where
        F: FnOnce() -> FiberResult + Send + 'static,
    {
        if parent.inner.host != thread::current().id() {
            return Err(AffinityError::ForeignParent.into());
        }
        if parent.inner.state.is_ended() {
            return Err(LifecycleError::EndedParent.into());
        }
        Ok(Fiber::construct(Box::new(entry), parent.clone()))
    }

    fn construct(entry: EntryFn, parent: Fiber) -> Fiber {
        let fiber = Fiber {
            inner: Arc::new(FiberInner {
                id: FiberId::next(),
                host: thread::current().id(),
                is_root: false,
                state: StateCell::new(FiberState::NotStarted),
                parent: SpinLock::new(Some(parent)),
                entry: UnsafeCell::new(Some(entry)),
                context: UnsafeCell::new(None),
            }),
        };
        ktrace!("fiber {} created", fiber.inner.id);
        fiber
    }

    /// Root fiber for the calling thread
    ///
    /// Carries a stackless context (it represents the thread's original
    /// stack), has no parent and no entry, and never ends.
    pub(crate) fn root() -> Fiber {
        let fiber = Fiber {
            inner: Arc::new(FiberInner {
                id: FiberId::next(),
                host: thread::current().id(),
                is_root: true,
                state: StateCell::new(FiberState::Active),
                parent: SpinLock::new(None),
                entry: UnsafeCell::new(None),
                context: UnsafeCell::new(Some(Context::for_host())),
            }),
        };
        kdebug!("root fiber {} created on {:?}", fiber.inner.id, fiber.inner.host);
        fiber
    }

    /// Stable identifier of this fiber
    #[inline]
    pub fn id(&self) -> FiberId {
        self.inner.id
    }

    /// Current lifecycle state
    #[inline]
    pub fn state(&self) -> FiberState {
        self.inner.state.get()
    }

    /// Whether this is a thread's root fiber
    #[inline]
    pub fn is_root(&self) -> bool {
        self.inner.is_root
    }

    /// Whether this fiber can still be switched into
    ///
    /// Root fibers are always alive.
    #[inline]
    pub fn is_alive(&self) -> bool {
        !self.inner.state.is_ended()
    }

    /// This fiber's parent, or `None` for a root fiber
    pub fn parent(&self) -> Option<Fiber> {
        self.inner.parent.lock().clone()
    }

    /// Replace this fiber's parent
    ///
    /// Only the host thread may reparent. The new parent must live on the
    /// same thread, must not have ended, and must not be a descendant of
    /// this fiber (or the fiber itself). Reparenting the currently running
    /// fiber is permitted and takes effect for future terminations and
    /// throws.
    pub fn set_parent(&self, parent: &Fiber) -> Result<(), FiberError> {
        if self.inner.host != thread::current().id() {
            return Err(AffinityError::ForeignFiber.into());
        }
        if parent.inner.host != self.inner.host {
            return Err(AffinityError::ForeignParent.into());
        }
        if parent.inner.state.is_ended() {
            return Err(LifecycleError::EndedParent.into());
        }

        let mut cursor = Some(parent.clone());
        while let Some(ancestor) = cursor {
            if ancestor == *self {
                return Err(FiberError::ParentCycle);
            }
            cursor = ancestor.parent();
        }

        *self.inner.parent.lock() = Some(parent.clone());
        Ok(())
    }

    /// Switch execution to this fiber, carrying `value`
    ///
    /// The first switch into a fiber creates its context and runs its entry
    /// from the top; the value must be `None` then, since nothing is
    /// suspended to receive it. Later switches resume the fiber at its last
    /// suspension point, where the pending call returns `Ok(value)`.
    ///
    /// The call returns when some fiber switches back here: `Ok` with the
    /// value it sent, or `Err(FiberError::Thrown)` if an exception was
    /// delivered or the fiber that terminated into us ended with one.
    pub fn switch(&self, value: SwitchValue) -> Result<SwitchValue, FiberError> {
        let current = registry::current();
        if *self == current {
            return Err(FiberError::SelfSwitch);
        }
        if self.inner.state.is_ended() {
            return Err(LifecycleError::Ended.into());
        }
        if self.inner.host != thread::current().id() {
            return Err(AffinityError::ForeignFiber.into());
        }

        if !self.has_context() {
            if value.is_some() {
                return Err(FiberError::ValueBeforeStart);
            }
            self.start_context()?;
        }

        self.transfer_into(current, Ok(value))
    }

    /// Resume this fiber with an exception raised at its suspension point
    ///
    /// A fiber that has not started is marked ended without ever running
    /// its entry, and the exception moves on to its active parent; if that
    /// resolution lands back on the calling fiber, the payload surfaces
    /// right here as `Err(FiberError::Thrown)`.
    ///
    /// Otherwise the call behaves like `switch`: it returns once some fiber
    /// transfers back into the caller.
    pub fn throw(&self, payload: ThrowPayload) -> Result<SwitchValue, FiberError> {
        let current = registry::current();
        if *self == current {
            return Err(FiberError::SelfThrow);
        }
        if self.inner.state.is_ended() {
            return Err(LifecycleError::Ended.into());
        }
        if self.inner.host != thread::current().id() {
            return Err(AffinityError::ForeignFiber.into());
        }

        if !self.has_context() {
            self.inner.state.end();
            self.drop_entry();
            kdebug!("fiber {} killed before start", self.inner.id);

            // a kill payload folds into a normal completion here too, same
            // as in the termination path
            let outcome = fold_exit(payload);
            let target = self.active_parent();
            if target == current {
                return outcome.map_err(FiberError::Thrown);
            }
            return target.transfer_into(current, outcome);
        }

        self.transfer_into(current, Err(payload))
    }

    /// Kill this fiber
    ///
    /// Throws a [`FiberExit`] payload; a body that propagates errors with
    /// `?` unwinds to its termination path, which folds the exit into a
    /// normal completion, so this call usually returns `Ok(None)`.
    pub fn kill(&self) -> Result<SwitchValue, FiberError> {
        self.throw(Box::new(FiberExit::new()))
    }

    /// Nearest ancestor with a started, unfinished context
    ///
    /// Ancestors that never started have no stack to return into and
    /// ancestors that ended cannot receive control; both are skipped.
    /// Resolution always succeeds while the hierarchy invariants hold: the
    /// chain is finite and roots never end.
    fn active_parent(&self) -> Fiber {
        let mut cursor = self.parent();
        while let Some(candidate) = cursor {
            if candidate.has_context() && !candidate.inner.state.is_ended() {
                return candidate;
            }
            cursor = candidate.parent();
        }
        unreachable!("fiber {} has no live ancestor to receive control", self.inner.id)
    }

    /// Hand the thread to this fiber's context, blocking the caller's stack
    /// until something transfers back
    ///
    /// Takes the outgoing fiber by value and drops that handle before the
    /// raw transfer: a suspended frame must not pin its own fiber, or an
    /// abandoned fiber could never be reclaimed. The outgoing fiber stays
    /// alive through its caller's borrow; the destination stays alive
    /// through the registry slot.
    fn transfer_into(
        &self,
        from: Fiber,
        payload: TransferResult,
    ) -> Result<SwitchValue, FiberError> {
        let save = from.context_ptr();
        let load = self.context_ptr();

        registry::set_current(self);
        drop(from);
        registry::begin_transfer(InFlight {
            payload,
            retire: None,
        });

        unsafe { Context::transfer(save, load) };

        registry::land().map_err(FiberError::Thrown)
    }

    fn has_context(&self) -> bool {
        // host thread only
        unsafe { (*self.inner.context.get()).is_some() }
    }

    fn context_ptr(&self) -> *mut Context {
        unsafe {
            match &mut *self.inner.context.get() {
                Some(ctx) => &mut **ctx as *mut Context,
                None => unreachable!("fiber {} has no context during a transfer", self.inner.id),
            }
        }
    }

    /// Create this fiber's context, bound to the internal trampoline
    ///
    /// Called exactly once, by the first successful switch.
    fn start_context(&self) -> Result<(), FiberError> {
        let arg = Arc::into_raw(Arc::clone(&self.inner)) as usize;
        match Context::with_entry(fiber_main, arg, config::stack_size()) {
            Ok(ctx) => {
                unsafe { *self.inner.context.get() = Some(ctx) };
                ktrace!("fiber {} context created", self.inner.id);
                Ok(())
            }
            Err(e) => {
                // reclaim the handle minted for the trampoline
                unsafe { drop(Arc::from_raw(arg as *const FiberInner)) };
                Err(e.into())
            }
        }
    }

    fn take_entry(&self) -> Option<EntryFn> {
        unsafe { (*self.inner.entry.get()).take() }
    }

    fn drop_entry(&self) {
        drop(self.take_entry());
    }

    /// Release a terminated fiber's context
    ///
    /// Called from the landing side of a termination transfer, once the
    /// dead stack is no longer executing.
    pub(crate) fn release_context(&self) {
        unsafe { drop((*self.inner.context.get()).take()) };
    }

    #[cfg(test)]
    fn downgrade(&self) -> std::sync::Weak<FiberInner> {
        Arc::downgrade(&self.inner)
    }
}

impl Clone for Fiber {
    fn clone(&self) -> Fiber {
        Fiber {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl PartialEq for Fiber {
    fn eq(&self, other: &Fiber) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Fiber {}

impl fmt::Debug for Fiber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("id", &self.inner.id)
            .field("state", &self.inner.state.get())
            .field("root", &self.inner.is_root)
            .finish()
    }
}

/// First code to run inside a fresh fiber context
///
/// Entered through the architecture trampoline. Never returns: termination
/// is a final transfer to the active parent.
extern "C" fn fiber_main(arg: usize) -> ! {
    // Reclaim the handle minted in start_context. It is held only between
    // landing and the start of the entry body; while the fiber is suspended
    // inside its entry, user handles alone keep it alive, which is what
    // lets an abandoned fiber be reclaimed, stack included.
    let fiber = Fiber {
        inner: unsafe { Arc::from_raw(arg as *const FiberInner) },
    };
    debug_assert!(registry::current() == fiber, "switcher records the destination");

    let inbound = registry::land();
    debug_assert!(
        matches!(inbound, Ok(None)),
        "first transfer into a fiber carries no value"
    );
    drop(inbound);

    fiber.inner.state.activate();
    kdebug!("fiber {} started", fiber.inner.id);

    let entry = fiber.take_entry();
    drop(fiber);

    let result: TransferResult = match entry {
        Some(entry) => match panic::catch_unwind(AssertUnwindSafe(entry)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(FiberError::Thrown(payload))) => fold_exit(payload),
            Ok(Err(err)) => Err(Box::new(err) as ThrowPayload),
            Err(payload) => fold_exit(payload),
        },
        None => unreachable!("fiber entry already consumed"),
    };

    finish(result)
}

/// Treat an unhandled kill payload as a normal completion
fn fold_exit(payload: ThrowPayload) -> TransferResult {
    match payload.downcast::<FiberExit>() {
        Ok(exit) => Ok(exit.0),
        Err(payload) => Err(payload),
    }
}

/// Terminate the current fiber
///
/// Marks it ended and hands control plus the outcome to its active parent
/// in one tail transfer. The landing side releases this fiber's context
/// via the retire note, since a stack cannot unmap itself.
fn finish(result: TransferResult) -> ! {
    let fiber = registry::current();
    fiber.inner.state.end();
    kdebug!("fiber {} ended", fiber.inner.id);

    let target = fiber.active_parent();
    let save = fiber.context_ptr();
    let load = target.context_ptr();

    registry::set_current(&target);
    drop(target);
    registry::begin_transfer(InFlight {
        payload: result,
        retire: Some(fiber),
    });

    unsafe { Context::transfer(save, load) };
    unreachable!("terminated fiber was resumed");
}
