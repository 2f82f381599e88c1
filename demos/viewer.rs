use std::time::Instant;

use shmframe::{Attachment, DeliveryLoop, Frame, FrameSink, DEFAULT_TICK_INTERVAL};

const REGION: &str = "/shmframe-demo";

/// Stand-in for a texture upload sink: reports frame arrival instead of
/// drawing, and declares its target gone after five idle seconds so the
/// delivery loop winds down once the producer exits.
struct ConsoleSink {
    started: Instant,
    last_frame: Instant,
    frames: u64,
}

impl FrameSink for ConsoleSink {
    fn present(&mut self, frame: Frame) {
        self.last_frame = Instant::now();
        self.frames += 1;
        if self.frames % 30 == 0 {
            let fps = self.frames as f64 / self.started.elapsed().as_secs_f64();
            println!(
                "{} frames ({}x{}, stride {}, {} bytes), {:.1} fps",
                self.frames,
                frame.width,
                frame.height,
                frame.row_stride,
                frame.pixels.len(),
                fps
            );
        }
    }

    fn current_target_size(&self) -> Option<(u32, u32)> {
        (self.last_frame.elapsed().as_secs() < 5).then_some((320, 240))
    }

    fn detached(&mut self) {
        println!("delivery stopped after {} frames", self.frames);
    }
}

fn main() -> shmframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let attachment = Attachment::attach(REGION, 320, 240)?;
    let sink = ConsoleSink {
        started: Instant::now(),
        last_frame: Instant::now(),
        frames: 0,
    };
    DeliveryLoop::new(attachment, sink).run(DEFAULT_TICK_INTERVAL);
    Ok(())
}
