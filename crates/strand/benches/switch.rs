//! Transfer latency benchmarks
//!
//! Run with: cargo bench -p strand

use criterion::{criterion_group, criterion_main, Criterion};
use strand::{current, Fiber};

fn bench_switch(c: &mut Criterion) {
    c.bench_function("switch_ping_pong", |b| {
        let partner = Fiber::new(|| {
            let parent = current().parent().expect("bench fiber has a parent");
            loop {
                parent.switch(None)?;
            }
        });
        partner.switch(None).unwrap();

        b.iter(|| partner.switch(None).unwrap());
    });

    c.bench_function("spawn_run_finish", |b| {
        b.iter(|| {
            let f = Fiber::new(|| Ok(None));
            f.switch(None).unwrap()
        });
    });
}

criterion_group!(benches, bench_switch);
criterion_main!(benches);
