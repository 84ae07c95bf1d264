//! Execution-context primitive
//!
//! A [`Context`] is one suspendable flow of control: a register save area
//! plus, for fibers, the stack those registers point into. Host contexts
//! (one per thread root) have no stack of their own because they represent
//! the thread's original call stack.
//!
//! The primitive knows nothing about fiber identity, parents, or exception
//! routing; the lifecycle engine layers those on top.

use std::ptr;

use strand_core::error::StackError;

use crate::current_arch;
use crate::stack::FiberStack;
use crate::SavedRegs;

/// One suspendable execution context
///
/// Always boxed by the owner so the register save area has a stable address
/// while the context is suspended.
pub struct Context {
    regs: SavedRegs,
    stack: Option<FiberStack>,
}

impl Context {
    /// Save area for the calling thread's own stack
    ///
    /// Used by root fibers: the registers get filled in by the first switch
    /// away, and there is no owned stack to release.
    pub fn for_host() -> Box<Context> {
        Box::new(Context {
            regs: SavedRegs::default(),
            stack: None,
        })
    }

    /// Create a context that will run `entry(arg)` on a fresh stack
    ///
    /// The entry function must never return; it must leave the context with
    /// a final transfer instead.
    pub fn with_entry(
        entry: extern "C" fn(usize) -> !,
        arg: usize,
        stack_size: usize,
    ) -> Result<Box<Context>, StackError> {
        let stack = FiberStack::allocate(stack_size)?;
        let stack_top = stack.top();

        let mut ctx = Box::new(Context {
            regs: SavedRegs::default(),
            stack: Some(stack),
        });

        unsafe {
            current_arch::init_context(&mut ctx.regs, stack_top, entry as usize, arg);
        }

        Ok(ctx)
    }

    /// Whether this context owns a fiber stack
    #[inline]
    pub fn has_stack(&self) -> bool {
        self.stack.is_some()
    }

    /// Transfer control from `save` to `load`
    ///
    /// Returns when something later transfers back into `save`.
    ///
    /// # Safety
    ///
    /// Both pointers must be valid for the whole suspension: `load` must be
    /// a context that is genuinely suspended (or fresh), `save` must stay
    /// alive until control comes back to it, and both must belong to the
    /// calling thread.
    #[inline]
    pub unsafe fn transfer(save: *mut Context, load: *const Context) {
        current_arch::switch_context(
            ptr::addr_of_mut!((*save).regs),
            ptr::addr_of!((*load).regs),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_context_has_no_stack() {
        let ctx = Context::for_host();
        assert!(!ctx.has_stack());
    }

    extern "C" fn never_runs(_arg: usize) -> ! {
        unreachable!("context was only constructed, not entered");
    }

    #[test]
    fn test_with_entry_allocates_stack() {
        let ctx = Context::with_entry(never_runs, 0, 64 * 1024).unwrap();
        assert!(ctx.has_stack());
        // dropping without ever entering releases the mapping
        drop(ctx);
    }
}
