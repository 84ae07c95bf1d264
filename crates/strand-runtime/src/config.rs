//! Runtime configuration
//!
//! The only knob is the fiber stack size, read once from the environment.
//!
//! - `STRAND_STACK_SIZE=<bytes>` - usable stack per fiber (default 128 KiB,
//!   clamped to the minimum the runtime supports)

use std::sync::OnceLock;

use strand_core::constants::{DEFAULT_STACK_SIZE, MIN_STACK_SIZE};
use strand_core::env::env_get;

static STACK_SIZE: OnceLock<usize> = OnceLock::new();

/// Usable stack size for newly started fibers
pub fn stack_size() -> usize {
    *STACK_SIZE
        .get_or_init(|| env_get("STRAND_STACK_SIZE", DEFAULT_STACK_SIZE).max(MIN_STACK_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_size_is_sane() {
        let size = stack_size();
        assert!(size >= MIN_STACK_SIZE);
        // cached: a second read agrees
        assert_eq!(stack_size(), size);
    }
}
