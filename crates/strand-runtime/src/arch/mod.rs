//! Architecture-specific context switching
//!
//! Each module provides the register save area, a voluntary switch that
//! saves and restores callee-saved state, and the entry trampoline used the
//! first time a fiber's context runs.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub mod x86_64;
    } else if #[cfg(target_arch = "aarch64")] {
        pub mod aarch64;
    }
}
