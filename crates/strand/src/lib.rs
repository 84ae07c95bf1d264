//! # strand - cooperative fibers
//!
//! Explicitly-switched, stackful micro-threads that share a single host
//! thread. Fibers never run in parallel with each other and are never
//! preempted: control moves only when a fiber calls [`Fiber::switch`] or
//! [`Fiber::throw`], carrying a value or an exception to the target.
//!
//! Fibers form a tree per host thread, rooted in an implicit fiber that
//! represents the thread's original stack. When a fiber's entry returns
//! (or an exception goes unhandled in it), control and the outcome are
//! delivered to its nearest ancestor that has started and not yet ended.
//!
//! ## Quick Start
//!
//! ```ignore
//! use strand::{current, downcast, value, Fiber};
//!
//! let doubler = Fiber::new(|| {
//!     let parent = current().parent().expect("spawned fibers have a parent");
//!     let mut got: Option<i64> = None;
//!     loop {
//!         let reply = match got.take() {
//!             Some(n) => value(n * 2),
//!             None => None,
//!         };
//!         got = downcast::<i64>(parent.switch(reply)?);
//!     }
//! });
//!
//! doubler.switch(None)?;                    // run until the first suspension
//! let answer = doubler.switch(value(21i64))?;
//! assert_eq!(downcast::<i64>(answer), Some(42));
//! doubler.kill()?;                          // unwind it cooperatively
//! ```
//!
//! ## Control flow
//!
//! ```text
//!   root ──switch──▶ fiber A ──switch──▶ fiber B
//!    ▲                  ▲                   │
//!    │                  └───────switch──────┘
//!    └──── termination / unhandled exception of A
//!          (B's would go to A, its active parent)
//! ```
//!
//! ## Threads
//!
//! Every fiber is permanently affine to the thread that created it. Handles
//! may cross threads, but switching, throwing, constructing with, or
//! reparenting onto a fiber from another thread fails with an
//! [`AffinityError`] instead of corrupting anything. Each thread's fiber
//! tree is fully independent.

mod fiber;
mod registry;

pub use fiber::Fiber;
pub use registry::current;

// Re-export core types
pub use strand_core::error::{
    AffinityError, FiberError, FiberResult, LifecycleError, StackError,
};
pub use strand_core::id::FiberId;
pub use strand_core::state::FiberState;
pub use strand_core::value::{downcast, value, FiberExit, SwitchValue, ThrowPayload};

// Re-export kprint macros for debug logging
pub use strand_core::kprint::{set_log_level, LogLevel};
pub use strand_core::{kdebug, kerror, kinfo, kprintln, ktrace, kwarn};

// Re-export env utilities
pub use strand_core::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};

// Re-export the stack-size knob
pub use strand_runtime::config::stack_size;
