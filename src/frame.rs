/// Bytes per pixel of the packed 32-bit color format the producer writes.
pub const BYTES_PER_PIXEL: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// 32-bit packed BGRA, 8 bits per channel.
    PackedBgra32,
}

/// One delivered video frame.
///
/// `pixels` is a copy of the payload published for this generation, so it
/// stays valid across later remaps of the region. `row_stride` is derived
/// from the width requested at attach time; the producer may publish fewer
/// bytes than `row_stride * height` while it is still ramping up.
pub struct Frame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub row_stride: u32,
    pub format: PixelFormat,
}

impl Frame {
    pub(crate) fn new(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Frame {
            pixels,
            width,
            height,
            row_stride: width * BYTES_PER_PIXEL as u32,
            format: PixelFormat::PackedBgra32,
        }
    }
}

// Summarizes the payload by length; dumping the pixel bytes would drown any
// assertion message.
impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("row_stride", &self.row_stride)
            .field("format", &self.format)
            .field("pixels", &self.pixels.len())
            .finish()
    }
}
