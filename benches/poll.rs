#[path = "../demos/feeder/lib.rs"]
pub mod feeder;

use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use feeder::FrameFeeder;
use shmframe::{Attachment, BYTES_PER_PIXEL};

fn bench(c: &mut Criterion) {
    let n = 1000;
    let frame_len = 320 * 240 * BYTES_PER_PIXEL;
    let name = format!("/shmframe-bench-{}", std::process::id());

    let mut feeder = FrameFeeder::create(&name, frame_len);
    let mut attachment = Attachment::attach(&name, 320, 240).unwrap();
    let payload = vec![0x7fu8; frame_len];
    let timeout = Duration::from_secs(1);

    let mut group = c.benchmark_group("frame_transport");
    group.throughput(Throughput::Elements(n));
    group.bench_function("publish_poll", |b| {
        b.iter(|| {
            for _ in 0..n {
                feeder.publish(&payload);
                let frame = attachment.poll_frame(timeout).unwrap();
                assert_eq!(frame.pixels.len(), frame_len);
            }
        })
    });
}

criterion_group!(benches, bench);
criterion_main!(benches);
