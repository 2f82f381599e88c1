#[path = "feeder/lib.rs"]
pub mod feeder;

use std::time::Duration;

use feeder::FrameFeeder;
use shmframe::BYTES_PER_PIXEL;

const WIDTH: usize = 320;
const HEIGHT: usize = 240;
const REGION: &str = "/shmframe-demo";

/// Publishes a scrolling gradient at ~30 fps. Run the `viewer` example in a
/// second terminal to watch the consumer side.
fn main() {
    let args: Vec<String> = std::env::args().collect();
    let frames: u32 = args.get(1).map(|n| n.parse().unwrap()).unwrap_or(300);

    let mut feeder = FrameFeeder::create(REGION, WIDTH * HEIGHT * BYTES_PER_PIXEL);
    let mut payload = vec![0u8; WIDTH * HEIGHT * BYTES_PER_PIXEL];

    println!("publishing {} frames to {}", frames, REGION);
    for n in 0..frames {
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let px = (y * WIDTH + x) * BYTES_PER_PIXEL;
                payload[px] = ((x + n as usize) % 256) as u8; // B
                payload[px + 1] = ((y + n as usize) % 256) as u8; // G
                payload[px + 2] = 128; // R
                payload[px + 3] = 255; // A
            }
        }
        feeder.publish(&payload);
        std::thread::sleep(Duration::from_millis(33));
    }
}
