//! Generator example
//!
//! A lazy sequence built on fibers: the producer runs until it emits a
//! value, then suspends until the consumer asks for the next one. Each
//! resume re-parents the producer onto whoever is iterating, so deliveries
//! always land at the consumer.
//
// cargo run -p strand-generator

use strand::{current, downcast, value, Fiber, FiberResult};

struct Generator {
    fiber: Fiber,
}

impl Generator {
    fn new<F>(producer: F) -> Self
    where
        F: FnOnce() -> FiberResult + Send + 'static,
    {
        Generator {
            fiber: Fiber::new(producer),
        }
    }
}

impl Iterator for Generator {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        if !self.fiber.is_alive() {
            return None;
        }
        // deliveries follow the consumer
        self.fiber
            .set_parent(&current())
            .expect("consumer is a live fiber on this thread");

        match self.fiber.switch(None) {
            Ok(item) if self.fiber.is_alive() => downcast::<i64>(item),
            _ => None,
        }
    }
}

/// Hand one value to the consumer and wait to be resumed
fn emit(n: i64) -> Result<(), strand::FiberError> {
    let consumer = current().parent().expect("generators have a consumer");
    consumer.switch(value(n))?;
    Ok(())
}

fn main() {
    println!("=== strand generator example ===\n");

    let squares = Generator::new(|| {
        for i in 1i64..=5 {
            emit(i * i)?;
        }
        Ok(None)
    });

    for v in squares {
        println!("square: {}", v);
    }

    let fibs = Generator::new(|| {
        let (mut a, mut b) = (0i64, 1i64);
        while a < 100 {
            emit(a)?;
            (a, b) = (b, a + b);
        }
        Ok(None)
    });

    let collected: Vec<i64> = fibs.collect();
    println!("fibonacci under 100: {:?}", collected);
}
