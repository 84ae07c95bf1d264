//! # strand-runtime
//!
//! Platform-specific runtime for the strand fiber library.
//!
//! This crate provides:
//! - Fiber stacks (mmap with guard pages)
//! - Context switching (architecture-specific assembly)
//! - The execution-context primitive consumed by the lifecycle engine
//! - Stack-size configuration

pub mod arch;
pub mod config;
pub mod context;
pub mod stack;

// Re-exports
pub use context::Context;
pub use stack::FiberStack;

// Platform detection
cfg_if::cfg_if! {
    if #[cfg(unix)] {
        // mmap-based stacks live in stack.rs
    } else {
        compile_error!("Unsupported platform: fiber stacks require mmap");
    }
}

// Architecture detection
cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub use arch::x86_64 as current_arch;
    } else if #[cfg(target_arch = "aarch64")] {
        pub use arch::aarch64 as current_arch;
    } else {
        compile_error!("Unsupported architecture");
    }
}

pub use self::current_arch::SavedRegs;
