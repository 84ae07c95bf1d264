//! Basic fiber example
//!
//! Two fibers handing values back and forth with explicit switches, a
//! completion value, and a cooperative kill.
//!
//! # Environment Variables
//!
//! - `STRAND_LOG_LEVEL=debug` - Log level (off, error, warn, info, debug, trace)
//! - `STRAND_FLUSH_EPRINT=1` - Flush debug output immediately
//! - `STRAND_STACK_SIZE=<bytes>` - Usable stack per fiber
//
// STRAND_LOG_LEVEL=debug cargo run -p strand-basic

use strand::{current, downcast, kinfo, value, Fiber};

fn main() {
    println!("=== strand basic example ===\n");

    // A fiber that doubles whatever the driver sends it
    let doubler = Fiber::new(|| {
        let parent = current().parent().expect("spawned fibers have a parent");
        let mut got: Option<i64> = None;
        loop {
            let reply = match got.take() {
                Some(n) => value(n * 2),
                None => None,
            };
            got = downcast::<i64>(parent.switch(reply)?);
        }
    });

    kinfo!("starting doubler fiber {}", doubler.id());
    doubler.switch(None).expect("first switch runs to the first suspension");

    for n in [1i64, 7, 21] {
        let reply = doubler.switch(value(n)).expect("doubler answers");
        println!("doubler({}) = {:?}", n, downcast::<i64>(reply));
    }

    // Kill it: the loop's `?` unwinds and the kill completes normally
    let out = doubler.kill().expect("kill completes the fiber");
    assert!(out.is_none());
    println!("doubler alive after kill: {}", doubler.is_alive());

    // Termination values flow to the parent
    let summer = Fiber::new(|| {
        kinfo!("summing inside fiber {}", current().id());
        Ok(value((1i64..=10).sum::<i64>()))
    });
    let total = summer.switch(None).expect("summer runs to completion");
    println!("sum(1..=10) = {:?}", downcast::<i64>(total));

    println!("\nDone!");
}
