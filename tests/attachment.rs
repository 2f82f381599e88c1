#[path = "../demos/feeder/lib.rs"]
mod feeder;

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use feeder::FrameFeeder;
use shmframe::{Attachment, ErrorKind, TickError, BYTES_PER_PIXEL};

static REGION_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Region names must be unique per test and per run; tests in one binary run
/// concurrently and a crashed run may leave stale names behind.
fn region_name(tag: &str) -> String {
    format!(
        "/shmframe-{}-{}-{}",
        tag,
        std::process::id(),
        REGION_COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

const FRAME_LEN: usize = 320 * 240 * BYTES_PER_PIXEL;

#[test]
fn attach_missing_region_is_not_found() {
    let err = Attachment::attach(&region_name("missing"), 320, 240).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotFound(_)));
}

#[test]
fn poll_times_out_without_producer_activity() {
    let name = region_name("idle");
    let _feeder = FrameFeeder::create(&name, FRAME_LEN);
    let mut attachment = Attachment::attach(&name, 320, 240).unwrap();

    let timeout = Duration::from_millis(200);
    let start = Instant::now();
    let err = attachment.poll_frame(timeout).unwrap_err();
    let elapsed = start.elapsed();

    assert!(matches!(err, TickError::TimedOut));
    assert!(elapsed >= timeout, "returned early after {:?}", elapsed);
    assert!(
        elapsed < timeout * 4,
        "blocked too long: {:?} for a {:?} timeout",
        elapsed,
        timeout
    );
}

#[test]
fn generations_are_delivered_at_most_once_in_order() {
    let name = region_name("order");
    let mut feeder = FrameFeeder::create(&name, FRAME_LEN);
    let mut attachment = Attachment::attach(&name, 320, 240).unwrap();
    let timeout = Duration::from_secs(1);

    feeder.publish(&[1u8; 64]);
    let first = attachment.poll_frame(timeout).unwrap();
    assert!(first.pixels.iter().all(|&b| b == 1));

    feeder.publish(&[2u8; 64]);
    let second = attachment.poll_frame(timeout).unwrap();
    assert!(second.pixels.iter().all(|&b| b == 2));

    // No further producer activity: the same generation is never re-delivered.
    let err = attachment
        .poll_frame(Duration::from_millis(100))
        .unwrap_err();
    assert!(matches!(err, TickError::TimedOut));
}

#[test]
fn first_poll_blocks_until_first_publish() {
    let name = region_name("block");
    let feeder = FrameFeeder::create(&name, FRAME_LEN);
    let mut attachment = Attachment::attach(&name, 320, 240).unwrap();

    let publisher = std::thread::spawn(move || {
        let mut feeder = feeder;
        std::thread::sleep(Duration::from_millis(50));
        feeder.publish(&[9u8; 128]);
        feeder
    });

    let start = Instant::now();
    let frame = attachment.poll_frame(Duration::from_secs(1)).unwrap();
    assert!(start.elapsed() >= Duration::from_millis(40));
    assert_eq!(frame.pixels.len(), 128);
    publisher.join().unwrap();
}

#[test]
fn empty_generations_still_carry_dimensions() {
    let name = region_name("empty");
    let mut feeder = FrameFeeder::create(&name, FRAME_LEN);
    let mut attachment = Attachment::attach(&name, 320, 240).unwrap();
    let timeout = Duration::from_secs(1);

    // buffer_size stays 0 while the producer ramps up; the generation still
    // counts and the frame still reports the attach-time geometry.
    feeder.publish(&[]);
    let frame = attachment.poll_frame(timeout).unwrap();
    assert_eq!(frame.pixels.len(), 0);
    assert_eq!((frame.width, frame.height), (320, 240));
    assert_eq!(frame.row_stride, 1280);

    feeder.publish(&[]);
    assert!(attachment.poll_frame(timeout).is_ok());
    assert!(matches!(
        attachment.poll_frame(Duration::from_millis(100)),
        Err(TickError::TimedOut)
    ));
}

#[test]
fn mapping_grows_with_buffer_size() {
    let name = region_name("grow");
    let mut feeder = FrameFeeder::create(&name, 153600);
    let mut attachment = Attachment::attach(&name, 320, 240).unwrap();
    let timeout = Duration::from_secs(1);

    feeder.publish(&[3u8; 76800]);
    let small = attachment.poll_frame(timeout).unwrap();
    assert_eq!(small.pixels.len(), 76800);

    feeder.publish(&[4u8; 153600]);
    let large = attachment.poll_frame(timeout).unwrap();
    assert_eq!(large.pixels.len(), 153600);
    assert!(large.pixels.iter().all(|&b| b == 4));

    // The earlier frame was copied out and is unaffected by the resize.
    assert!(small.pixels.iter().all(|&b| b == 3));
}

#[test]
fn spurious_notification_delivers_nothing() {
    let name = region_name("spurious");
    let feeder = FrameFeeder::create(&name, FRAME_LEN);
    let mut attachment = Attachment::attach(&name, 320, 240).unwrap();

    feeder.notify_without_publish();
    let err = attachment
        .poll_frame(Duration::from_millis(150))
        .unwrap_err();
    assert!(matches!(err, TickError::TimedOut));
}

#[test]
fn resize_failure_detaches_the_attachment() {
    let name = region_name("resizefail");
    let mut feeder = FrameFeeder::create(&name, FRAME_LEN);
    let mut attachment = Attachment::attach(&name, 320, 240).unwrap();

    feeder.publish_unmappable();
    let err = attachment.poll_frame(Duration::from_secs(1)).unwrap_err();
    match err {
        TickError::ResizeFailed { region, requested } => {
            assert_eq!(region, name);
            assert!(requested > FRAME_LEN);
        }
        other => panic!("expected ResizeFailed, got {:?}", other),
    }

    assert!(!attachment.is_attached());
    assert!(matches!(
        attachment.poll_frame(Duration::from_millis(10)),
        Err(TickError::Detached)
    ));
}

#[test]
fn drop_with_undelivered_generation_is_safe() {
    let name = region_name("dropflight");
    let mut feeder = FrameFeeder::create(&name, FRAME_LEN);
    let mut attachment = Attachment::attach(&name, 320, 240).unwrap();
    let timeout = Duration::from_secs(1);

    feeder.publish(&[5u8; 256]);
    attachment.poll_frame(timeout).unwrap();

    // A generation is pending when the attachment goes away mid-stream.
    feeder.publish(&[6u8; 256]);
    drop(attachment);

    // The region survives and a fresh attachment picks the frame up.
    let mut attachment = Attachment::attach(&name, 320, 240).unwrap();
    let frame = attachment.poll_frame(timeout).unwrap();
    assert!(frame.pixels.iter().all(|&b| b == 6));
}

#[test]
fn overflowing_buffer_size_fails_resize() {
    let name = region_name("overflow");
    let mut feeder = FrameFeeder::create(&name, FRAME_LEN);
    let mut attachment = Attachment::attach(&name, 320, 240).unwrap();

    // A size this close to usize::MAX would wrap the header+size sum; the
    // consumer must refuse it rather than read past the mapping.
    feeder.publish_reported_size(usize::MAX);
    let err = attachment.poll_frame(Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, TickError::ResizeFailed { .. }));
    assert!(!attachment.is_attached());
    assert!(matches!(
        attachment.poll_frame(Duration::from_millis(10)),
        Err(TickError::Detached)
    ));
}

#[test]
fn detach_is_idempotent() {
    let name = region_name("detach");
    let _feeder = FrameFeeder::create(&name, FRAME_LEN);
    let mut attachment = Attachment::attach(&name, 320, 240).unwrap();

    assert!(attachment.is_attached());
    attachment.detach();
    attachment.detach();
    assert!(!attachment.is_attached());
    assert!(format!("{:?}", attachment).contains("active: false"));
    assert!(matches!(
        attachment.poll_frame(Duration::from_millis(10)),
        Err(TickError::Detached)
    ));
}
