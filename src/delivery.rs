use std::time::Duration;

use crate::attachment::Attachment;
use crate::error::TickError;
use crate::frame::Frame;
use crate::sync::DEFAULT_WAIT_TIMEOUT;

/// Interval the host scheduler is expected to tick at, absent an override.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(30);

/// External presentation collaborator.
///
/// The sink owns presentation timing and scaling; the loop only passes
/// dimensions through. `current_target_size` doubles as the liveness probe:
/// `None` means the render target is gone and the loop must stop.
pub trait FrameSink {
    fn present(&mut self, frame: Frame);

    fn current_target_size(&self) -> Option<(u32, u32)>;

    /// Called once when the loop tears the attachment down.
    fn detached(&mut self) {}
}

/// Per-tick orchestration of one attachment.
///
/// Drive [`tick`](DeliveryLoop::tick) from a periodic scheduler (a real
/// timer, a test harness, or [`run`](DeliveryLoop::run)). One tick delivers
/// at most one frame; a timeout is the normal idle outcome and keeps the
/// loop alive, while resize failure or detachment stops it for good.
pub struct DeliveryLoop<S: FrameSink> {
    attachment: Attachment,
    sink: S,
    wait_timeout: Duration,
    stopped: bool,
}

impl<S: FrameSink> DeliveryLoop<S> {
    pub fn new(attachment: Attachment, sink: S) -> Self {
        DeliveryLoop {
            attachment,
            sink,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            stopped: false,
        }
    }

    /// Override the per-wait timeout (default 1 second).
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run one delivery tick. Returns `false` once the loop has stopped and
    /// no further ticks should be scheduled.
    pub fn tick(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        if self.sink.current_target_size().is_none() {
            tracing::debug!(
                region = %self.attachment.region_name(),
                "render target gone, stopping delivery"
            );
            return self.teardown();
        }

        match self.attachment.poll_frame(self.wait_timeout) {
            Ok(frame) => {
                self.sink.present(frame);
                true
            }
            // No new frame within the timeout; keep ticking.
            Err(TickError::TimedOut) => true,
            Err(err @ TickError::ResizeFailed { .. }) => {
                tracing::error!(%err, "delivery stopped");
                self.teardown()
            }
            Err(TickError::Detached) => self.teardown(),
        }
    }

    /// Stop ticking and release the attachment. Idempotent.
    pub fn stop(&mut self) {
        self.teardown();
    }

    fn teardown(&mut self) -> bool {
        if !self.stopped {
            self.stopped = true;
            self.attachment.detach();
            self.sink.detached();
        }
        false
    }

    /// Manual scheduler for hosts without a timer: tick, sleep `interval`,
    /// repeat until the loop stops.
    pub fn run(&mut self, interval: Duration) {
        while self.tick() {
            std::thread::sleep(interval);
        }
    }
}

/// Dropping a live loop tears it down like [`stop`](DeliveryLoop::stop), so
/// the sink always hears about the end of delivery exactly once.
impl<S: FrameSink> Drop for DeliveryLoop<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
