//! Fiber stack allocation
//!
//! Each fiber owns one anonymous private mapping: a PROT_NONE guard region
//! at the low end, a read/write usable region above it. Stack overflow hits
//! the guard and faults instead of silently corrupting a neighbour.

use std::ptr;

use strand_core::constants::{GUARD_SIZE, MIN_STACK_SIZE};
use strand_core::error::StackError;

/// A mapped fiber stack
///
/// The mapping is released when the stack is dropped. Dropping may happen
/// on any thread; a suspended stack that will never resume is simply
/// unmapped, its frames are not unwound.
#[derive(Debug)]
pub struct FiberStack {
    base: *mut u8,
    total_size: usize,
    guard_size: usize,
}

// Safety: the mapping is plain memory; unmapping it is thread-agnostic
unsafe impl Send for FiberStack {}

impl FiberStack {
    /// Map a new stack with at least `usable` bytes above the guard
    pub fn allocate(usable: usize) -> Result<FiberStack, StackError> {
        if usable == 0 {
            return Err(StackError::InvalidSize);
        }

        let page = page_size();
        let usable = align_up(usable.max(MIN_STACK_SIZE), page);
        let guard_size = align_up(GUARD_SIZE, page);
        let total_size = usable + guard_size;

        // Reserve the whole region with no access, then open up everything
        // above the guard
        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                total_size,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(StackError::AllocationFailed);
        }
        let base = base as *mut u8;

        let ret = unsafe {
            libc::mprotect(
                base.add(guard_size) as *mut libc::c_void,
                usable,
                libc::PROT_READ | libc::PROT_WRITE,
            )
        };
        if ret != 0 {
            unsafe {
                libc::munmap(base as *mut libc::c_void, total_size);
            }
            return Err(StackError::ProtectionFailed);
        }

        Ok(FiberStack {
            base,
            total_size,
            guard_size,
        })
    }

    /// High end of the stack (stacks grow down)
    #[inline]
    pub fn top(&self) -> *mut u8 {
        unsafe { self.base.add(self.total_size) }
    }

    /// Lowest usable address, just above the guard
    #[inline]
    pub fn limit(&self) -> *mut u8 {
        unsafe { self.base.add(self.guard_size) }
    }

    /// Usable bytes between guard and top
    #[inline]
    pub fn usable_size(&self) -> usize {
        self.total_size - self.guard_size
    }
}

impl Drop for FiberStack {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.total_size);
        }
    }
}

/// System page size
#[inline]
pub fn page_size() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

#[inline]
fn align_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_drop() {
        let stack = FiberStack::allocate(64 * 1024).unwrap();
        assert!(stack.usable_size() >= 64 * 1024);
        assert!(stack.top() > stack.limit());
        drop(stack);
    }

    #[test]
    fn test_minimum_is_enforced() {
        let stack = FiberStack::allocate(1).unwrap();
        assert!(stack.usable_size() >= MIN_STACK_SIZE);
    }

    #[test]
    fn test_zero_size_rejected() {
        assert_eq!(
            FiberStack::allocate(0).unwrap_err(),
            StackError::InvalidSize
        );
    }

    #[test]
    fn test_usable_region_is_writable() {
        let stack = FiberStack::allocate(32 * 1024).unwrap();
        unsafe {
            let top = stack.top();
            // touch the first usable bytes below the top
            *top.sub(8) = 0xAB;
            assert_eq!(*top.sub(8), 0xAB);
            *stack.limit() = 0xCD;
            assert_eq!(*stack.limit(), 0xCD);
        }
    }

    #[test]
    fn test_drop_from_other_thread() {
        let stack = FiberStack::allocate(32 * 1024).unwrap();
        std::thread::spawn(move || drop(stack)).join().unwrap();
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(1, 4096), 4096);
        assert_eq!(align_up(4096, 4096), 4096);
        assert_eq!(align_up(4097, 4096), 8192);
    }
}
