use std::slice;
use std::time::Duration;

use crate::error::{Error, ErrorKind, Result, TickError};
use crate::frame::Frame;
use crate::header::{ShmHeader, HEADER_SIZE};
use crate::region::SharedRegion;
use crate::sync;

/// Bound on remaps within a single tick. A producer that keeps reporting
/// ever-growing sizes would otherwise hold the consumer in the resize loop
/// forever.
pub const MAX_RESIZE_ATTEMPTS: u32 = 8;

/// Consumer end of one shared-memory frame transport.
///
/// Opens the region on [`attach`](Attachment::attach), delivers at most one
/// frame per [`poll_frame`](Attachment::poll_frame) call, and releases the
/// region on [`detach`](Attachment::detach) or drop. A generation already
/// delivered is never delivered again.
pub struct Attachment {
    region: SharedRegion,
    width: u32,
    height: u32,
    last_gen: u32,
    active: bool,
}

impl Attachment {
    /// Open and map the region's header. Does not wait for a first frame;
    /// `last_gen` starts at the unpublished generation 0, so the first poll
    /// blocks until the producer has published at least once.
    pub fn attach(name: &str, width: u32, height: u32) -> Result<Attachment> {
        if width == 0 || height == 0 {
            return Err(Error::new(ErrorKind::InvalidDimensions { width, height }));
        }
        let mut region = SharedRegion::open(name)?;
        // If the header mapping fails the region drops here, closing the
        // descriptor: no handle with an fd but no mapping ever escapes.
        region.map(HEADER_SIZE)?;
        Ok(Attachment {
            region,
            width,
            height,
            last_gen: 0,
            active: true,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn region_name(&self) -> &str {
        self.region.name()
    }

    pub fn is_attached(&self) -> bool {
        self.active
    }

    /// Run the wait protocol for one tick: acquire the lock, wait for a
    /// generation newer than the last one delivered, grow the mapping if the
    /// producer grew the buffer, copy the payload out, release the lock.
    ///
    /// `TimedOut` means no new frame within `timeout` and is the expected
    /// idle outcome; retry on the next scheduler tick. `ResizeFailed` is
    /// fatal: the attachment detaches itself before returning.
    pub fn poll_frame(&mut self, timeout: Duration) -> std::result::Result<Frame, TickError> {
        if !self.active {
            return Err(TickError::Detached);
        }
        let hdr = match self.region.header() {
            Some(hdr) => hdr.as_ptr(),
            None => return Err(TickError::Detached),
        };

        unsafe {
            if sync::lock(ShmHeader::mutex(hdr), timeout).is_err() {
                return Err(TickError::TimedOut);
            }

            // Wait for a generation we have not delivered yet. Multiple
            // notifications may have coalesced into one post, and a post can
            // arrive without a visible generation change, so always re-check
            // under the lock instead of trusting the semaphore count.
            while ShmHeader::buffer_gen(hdr) == self.last_gen {
                sync::unlock(ShmHeader::mutex(hdr));
                if sync::wait_notification(ShmHeader::notification(hdr), timeout).is_err() {
                    tracing::trace!(region = %self.region.name(), "no frame this tick");
                    return Err(TickError::TimedOut);
                }
                if !self.active {
                    return Err(TickError::Detached);
                }
                if sync::lock(ShmHeader::mutex(hdr), timeout).is_err() {
                    return Err(TickError::TimedOut);
                }
            }

            // Lock held; the mapping may move from here on.
            let hdr = self.grow_to_fit(hdr, timeout)?;

            let gen = ShmHeader::buffer_gen(hdr);
            let size = ShmHeader::buffer_size(hdr);
            let pixels = slice::from_raw_parts(ShmHeader::data(hdr), size).to_vec();
            // Updated only after the payload is fully consumed, so a
            // re-entrant wait can never deliver this generation twice.
            self.last_gen = gen;
            sync::unlock(ShmHeader::mutex(hdr));

            Ok(Frame::new(pixels, self.width, self.height))
        }
    }

    /// Resize protocol. Entered and (on success) exited with the lock held.
    /// The remap itself runs outside the critical section: unlock, remap,
    /// relock, then re-check, since the producer may have grown the buffer
    /// again in between. On failure the lock is released and the attachment
    /// detached before the error is returned.
    unsafe fn grow_to_fit(
        &mut self,
        mut hdr: *mut ShmHeader,
        timeout: Duration,
    ) -> std::result::Result<*mut ShmHeader, TickError> {
        let mut attempts = 0;
        loop {
            // The producer is not trusted: a reported size near usize::MAX
            // would wrap the addition and fake a satisfied mapping.
            let size = ShmHeader::buffer_size(hdr);
            let requested = match HEADER_SIZE.checked_add(size) {
                Some(requested) => requested,
                None => {
                    sync::unlock(ShmHeader::mutex(hdr));
                    tracing::error!(
                        region = %self.region.name(),
                        size,
                        "reported buffer size overflows the mapping length"
                    );
                    return Err(self.resize_failed(usize::MAX));
                }
            };
            if requested <= self.region.map_len() {
                return Ok(hdr);
            }
            sync::unlock(ShmHeader::mutex(hdr));

            if attempts == MAX_RESIZE_ATTEMPTS {
                tracing::error!(
                    region = %self.region.name(),
                    requested,
                    attempts,
                    "resize attempts exhausted"
                );
                return Err(self.resize_failed(requested));
            }
            attempts += 1;

            if let Err(err) = self.region.remap(requested) {
                tracing::error!(
                    region = %self.region.name(),
                    requested,
                    %err,
                    "could not resize shared memory"
                );
                return Err(self.resize_failed(requested));
            }
            hdr = match self.region.header() {
                Some(ptr) => ptr.as_ptr(),
                None => unreachable!(),
            };

            if sync::lock(ShmHeader::mutex(hdr), timeout).is_err() {
                // The mapping already grew; nothing is lost, the next tick
                // re-checks from a consistent state.
                return Err(TickError::TimedOut);
            }
        }
    }

    fn resize_failed(&mut self, requested: usize) -> TickError {
        let region = self.region.name().to_string();
        self.detach();
        TickError::ResizeFailed { region, requested }
    }

    /// Idempotent teardown: unmaps the region and closes the descriptor.
    /// Subsequent polls return `Detached`.
    pub fn detach(&mut self) {
        if self.active {
            self.active = false;
            self.region.close();
        }
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.detach();
    }
}

// Manual impl: the region holds a raw mapping with nothing useful to print.
impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("region", &self.region.name())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("last_gen", &self.last_gen)
            .field("active", &self.active)
            .finish()
    }
}
