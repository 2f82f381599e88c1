use std::fmt::{Debug, Display};

use nix::errno::Errno;

pub type Result<T> = std::result::Result<T, Error>;

pub struct Error {
    kind: ErrorKind,
}

pub enum ErrorKind {
    /// The named region does not exist; the producer has not created it yet.
    NotFound(String),
    PermissionDenied(String),
    /// `mmap` refused the requested mapping.
    MapFailed {
        name: String,
        len: usize,
        errno: Errno,
    },
    InvalidDimensions {
        width: u32,
        height: u32,
    },
    Os(Errno),
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Classify an `shm_open` failure for the region `name`.
    pub(crate) fn open_failed(name: &str, errno: Errno) -> Self {
        let kind = match errno {
            Errno::ENOENT => ErrorKind::NotFound(name.to_string()),
            Errno::EACCES => ErrorKind::PermissionDenied(name.to_string()),
            errno => ErrorKind::Os(errno),
        };
        Error::new(kind)
    }

    pub(crate) fn map_failed(name: &str, len: usize, errno: Errno) -> Self {
        Error::new(ErrorKind::MapFailed {
            name: name.to_string(),
            len,
            errno,
        })
    }
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match &self.kind {
            ErrorKind::NotFound(name) => format!("shared region {} does not exist", name),
            ErrorKind::PermissionDenied(name) => {
                format!("no permission to open shared region {}", name)
            }
            ErrorKind::MapFailed { name, len, errno } => {
                format!("could not map {} bytes of region {}: {}", len, name, errno)
            }
            ErrorKind::InvalidDimensions { width, height } => {
                format!("frame dimensions {}x{} are invalid", width, height)
            }
            ErrorKind::Os(errno) => format!("os error: {}", errno),
        };
        write!(f, "{}", msg)
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl From<Errno> for Error {
    fn from(value: Errno) -> Self {
        Error::new(ErrorKind::Os(value))
    }
}

/// Outcome of one delivery tick that produced no frame.
///
/// `TimedOut` is the expected steady-state "no new frame yet" result;
/// `ResizeFailed` and `Detached` are terminal for the attachment.
pub enum TickError {
    TimedOut,
    ResizeFailed { region: String, requested: usize },
    Detached,
}

impl std::error::Error for TickError {}

impl Display for TickError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            TickError::TimedOut => "timed out waiting for a new frame".to_string(),
            TickError::ResizeFailed { region, requested } => {
                format!("could not grow mapping of {} to {} bytes", region, requested)
            }
            TickError::Detached => "attachment is detached".to_string(),
        };
        write!(f, "{}", msg)
    }
}

impl Debug for TickError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}
