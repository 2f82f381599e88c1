//! Minimal producer side of the frame transport, used by the demos, tests,
//! and benches. Creates the region, initializes the process-shared
//! semaphores, and publishes tagged payloads the way the real daemon does.

// Each including binary uses a different subset of the feeder.
#![allow(dead_code)]

use std::num::NonZero;
use std::os::fd::OwnedFd;
use std::ptr::NonNull;
use std::slice;

use nix::fcntl::OFlag;
use nix::libc::{c_void, sem_destroy, sem_init, sem_post, sem_trywait, sem_wait};
use nix::sys::mman::{mmap, munmap, shm_open, shm_unlink, MapFlags, ProtFlags};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;

use shmframe::{ShmHeader, HEADER_SIZE};

pub struct FrameFeeder {
    name: String,
    // Kept open so the consumer can remap against a live descriptor.
    _fd: OwnedFd,
    ptr: NonNull<c_void>,
    len: usize,
    capacity: usize,
    gen: u32,
}

// The mapping is ordinary shared memory and the semaphores are
// process-shared, so publishing from another thread is fine.
unsafe impl Send for FrameFeeder {}

impl FrameFeeder {
    /// Create and initialize a region able to hold `capacity` payload bytes.
    pub fn create(name: &str, capacity: usize) -> FrameFeeder {
        let fd = shm_open(
            name,
            OFlag::O_RDWR | OFlag::O_CREAT | OFlag::O_EXCL,
            Mode::from_bits(0o600).unwrap(),
        )
        .expect("create shm region");
        let len = HEADER_SIZE + capacity;
        ftruncate(&fd, len as i64).expect("size shm region");
        let ptr = unsafe {
            mmap(
                None,
                NonZero::new(len).unwrap(),
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &fd,
                0,
            )
        }
        .expect("map shm region");

        let hdr = ptr.as_ptr() as *mut ShmHeader;
        unsafe {
            // pshared = 1: the consumer attaches from another process (or at
            // least another mapping of the same pages).
            assert_eq!(sem_init(&raw mut (*hdr).mutex, 1, 1), 0);
            assert_eq!(sem_init(&raw mut (*hdr).notification, 1, 0), 0);
            (&raw mut (*hdr).buffer_size).write_volatile(0);
            (&raw mut (*hdr).buffer_gen).write_volatile(0);
        }

        FrameFeeder {
            name: name.to_string(),
            _fd: fd,
            ptr,
            len,
            capacity,
            gen: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generation(&self) -> u32 {
        self.gen
    }

    /// Publish one frame: under the mutex, grow `buffer_size` if needed,
    /// copy the payload, bump the generation; then post the notification.
    pub fn publish(&mut self, payload: &[u8]) {
        assert!(payload.len() <= self.capacity, "payload exceeds capacity");
        let hdr = self.header();
        unsafe {
            assert_eq!(sem_wait(&raw mut (*hdr).mutex), 0);
            let size = (&raw const (*hdr).buffer_size).read_volatile();
            if payload.len() > size {
                (&raw mut (*hdr).buffer_size).write_volatile(payload.len());
            }
            let data = (hdr as *mut u8).add(HEADER_SIZE);
            slice::from_raw_parts_mut(data, payload.len()).copy_from_slice(payload);
            self.gen += 1;
            (&raw mut (*hdr).buffer_gen).write_volatile(self.gen);
            assert_eq!(sem_post(&raw mut (*hdr).mutex), 0);
            self.notify();
        }
    }

    /// Publish a generation with a raw reported `buffer_size` and no
    /// payload, the way a misbehaving producer might.
    pub fn publish_reported_size(&mut self, size: usize) {
        let hdr = self.header();
        unsafe {
            assert_eq!(sem_wait(&raw mut (*hdr).mutex), 0);
            (&raw mut (*hdr).buffer_size).write_volatile(size);
            self.gen += 1;
            (&raw mut (*hdr).buffer_gen).write_volatile(self.gen);
            assert_eq!(sem_post(&raw mut (*hdr).mutex), 0);
            self.notify();
        }
    }

    /// Publish a generation whose reported size can never be satisfied, to
    /// exercise the consumer's remap failure path.
    pub fn publish_unmappable(&mut self) {
        self.publish_reported_size(usize::MAX / 2);
    }

    /// Post the notification without publishing anything, as a misbehaving
    /// producer might.
    pub fn notify_without_publish(&self) {
        unsafe { self.notify() }
    }

    fn header(&self) -> *mut ShmHeader {
        self.ptr.as_ptr() as *mut ShmHeader
    }

    /// Keep at most one notification pending; the consumer re-checks the
    /// generation anyway, and an unbounded count would eventually overflow
    /// the semaphore.
    unsafe fn notify(&self) {
        let hdr = self.header();
        while sem_trywait(&raw mut (*hdr).notification) == 0 {}
        assert_eq!(sem_post(&raw mut (*hdr).notification), 0);
    }
}

impl Drop for FrameFeeder {
    fn drop(&mut self) {
        let hdr = self.header();
        unsafe {
            sem_destroy(&raw mut (*hdr).mutex);
            sem_destroy(&raw mut (*hdr).notification);
            let _ = munmap(self.ptr, self.len);
        }
        let _ = shm_unlink(self.name.as_str());
    }
}
