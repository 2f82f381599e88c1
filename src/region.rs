use std::num::NonZero;
use std::os::fd::OwnedFd;
use std::ptr::NonNull;

use nix::fcntl::OFlag;
use nix::libc::c_void;
use nix::sys::mman::{mmap, munmap, shm_open, MapFlags, ProtFlags};
use nix::sys::stat::Mode;

use crate::error::{Error, Result};
use crate::header::{ShmHeader, HEADER_SIZE};

/// One `mmap` of the region. Dropping it releases the pages; an munmap
/// failure at that point is only logged since nothing actionable remains.
#[derive(Debug)]
struct Mapping {
    ptr: NonNull<c_void>,
    len: usize,
}

impl Drop for Mapping {
    fn drop(&mut self) {
        if let Err(errno) = unsafe { munmap(self.ptr, self.len) } {
            tracing::warn!(len = self.len, %errno, "could not unmap shared area");
        }
    }
}

/// Handle on a producer-owned shared memory region.
///
/// Owns the file descriptor and at most one active mapping at a time. Knows
/// only how to open, (re)map, and release; the frame protocol lives above.
#[derive(Debug)]
pub struct SharedRegion {
    name: String,
    fd: Option<OwnedFd>,
    mapping: Option<Mapping>,
}

impl SharedRegion {
    /// Open an existing named region for read/write. Never creates it; the
    /// producer owns creation.
    pub fn open(name: &str) -> Result<Self> {
        let name = prepend_slash(name);
        let fd = shm_open(name.as_str(), OFlag::O_RDWR, Mode::empty()).map_err(|errno| {
            tracing::debug!(name = %name, %errno, "could not open shm region");
            Error::open_failed(&name, errno)
        })?;
        Ok(SharedRegion {
            name,
            fd: Some(fd),
            mapping: None,
        })
    }

    /// Map `len` bytes from offset 0, replacing any prior mapping. The old
    /// mapping is fully released before the new one is established and must
    /// never be touched again.
    pub fn map(&mut self, len: usize) -> Result<()> {
        self.mapping = None;

        // The header always lives at the front, so a mapping is never
        // smaller than the header itself (and never zero).
        let len = len.max(HEADER_SIZE);
        let fd = self.fd.as_ref().ok_or(nix::errno::Errno::EBADF)?;
        let ptr = unsafe {
            mmap(
                None,
                NonZero::new(len).unwrap(),
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                fd,
                0,
            )
        }
        .map_err(|errno| {
            tracing::debug!(name = %self.name, len, %errno, "could not map shm region");
            Error::map_failed(&self.name, len, errno)
        })?;
        self.mapping = Some(Mapping { ptr, len });
        Ok(())
    }

    /// Release the current mapping and map `new_len` bytes instead.
    pub fn remap(&mut self, new_len: usize) -> Result<()> {
        self.map(new_len)
    }

    /// Release mapping and descriptor. Safe to call repeatedly; release
    /// errors are logged, never propagated.
    pub fn close(&mut self) {
        if self.mapping.take().is_some() || self.fd.take().is_some() {
            tracing::trace!(name = %self.name, "closed shm region");
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn map_len(&self) -> usize {
        self.mapping.as_ref().map_or(0, |m| m.len)
    }

    pub(crate) fn header(&self) -> Option<NonNull<ShmHeader>> {
        self.mapping.as_ref().map(|m| m.ptr.cast())
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        self.close();
    }
}

fn prepend_slash(name: &str) -> String {
    if name.starts_with('/') {
        String::from(name)
    } else {
        String::from("/") + name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn open_missing_region_is_not_found() {
        let err = SharedRegion::open("/shmframe-no-such-region").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::NotFound(_)));
    }

    #[test]
    fn slash_is_prepended_once() {
        assert_eq!(prepend_slash("cam0"), "/cam0");
        assert_eq!(prepend_slash("/cam0"), "/cam0");
    }
}
