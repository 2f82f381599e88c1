mod attachment;
mod delivery;
mod error;
mod frame;
mod header;
mod region;
mod sync;

pub use attachment::{Attachment, MAX_RESIZE_ATTEMPTS};
pub use delivery::{DeliveryLoop, FrameSink, DEFAULT_TICK_INTERVAL};
pub use error::{Error, ErrorKind, Result, TickError};
pub use frame::{Frame, PixelFormat, BYTES_PER_PIXEL};
pub use header::{ShmHeader, HEADER_SIZE};
pub use region::SharedRegion;
pub use sync::DEFAULT_WAIT_TIMEOUT;
