use nix::libc::sem_t;

/// Fixed-layout metadata at the start of the shared region.
///
/// The layout is owned by the producer and must match it byte for byte: two
/// process-shared POSIX semaphores, the currently required payload size, the
/// generation counter, then the frame payload bytes. The consumer only ever
/// looks at a header through a raw pointer into the live mapping; the
/// producer writes `buffer_size` and `buffer_gen` under `mutex`, so those
/// fields are read volatile.
#[repr(C)]
pub struct ShmHeader {
    /// Guards header fields and payload consistency across processes.
    pub mutex: sem_t,
    /// Posted by the producer once per published frame.
    pub notification: sem_t,
    pub buffer_size: usize,
    pub buffer_gen: u32,
    // Payload follows at HEADER_SIZE.
}

pub const HEADER_SIZE: usize = size_of::<ShmHeader>();

impl ShmHeader {
    pub(crate) unsafe fn mutex(hdr: *mut ShmHeader) -> *mut sem_t {
        &raw mut (*hdr).mutex
    }

    pub(crate) unsafe fn notification(hdr: *mut ShmHeader) -> *mut sem_t {
        &raw mut (*hdr).notification
    }

    pub(crate) unsafe fn buffer_size(hdr: *const ShmHeader) -> usize {
        (&raw const (*hdr).buffer_size).read_volatile()
    }

    pub(crate) unsafe fn buffer_gen(hdr: *const ShmHeader) -> u32 {
        (&raw const (*hdr).buffer_gen).read_volatile()
    }

    /// First payload byte, trailing the fixed fields.
    pub(crate) unsafe fn data(hdr: *const ShmHeader) -> *const u8 {
        (hdr as *const u8).add(HEADER_SIZE)
    }
}
