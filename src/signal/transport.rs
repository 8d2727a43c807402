//! Fixed-size message transport over a pipe
//!
//! Each message is one `c_int` signal number in native byte order. The
//! size is below `PIPE_BUF`, so every write(2) lands atomically and
//! concurrent writers cannot interleave partial messages.
//!
//! `write_message` is async-signal-safe: raw write(2) on a stack buffer,
//! no allocation, no locks.

use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};

use libc::c_int;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use thiserror::Error;

use crate::error::Result;

/// Size of one relay message in bytes
pub const MESSAGE_SIZE: usize = std::mem::size_of::<c_int>();

const _: () = assert!(MESSAGE_SIZE <= libc::PIPE_BUF);

/// Transfer failure on the relay pipe
///
/// Holds no heap data so it can be produced in signal context.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    #[error("short transfer of {0} bytes")]
    Short(usize),

    #[error("transfer failed: {0}")]
    Errno(Errno),
}

/// Both ends of a freshly created relay pipe
#[derive(Debug)]
pub struct SignalPipe {
    read: OwnedFd,
    write: OwnedFd,
}

impl SignalPipe {
    /// Create the pipe; both ends are close-on-exec
    pub fn new() -> Result<Self> {
        let (read, write) = nix::unistd::pipe2(OFlag::O_CLOEXEC)?;
        Ok(Self { read, write })
    }

    /// Split into `(read, write)`
    pub fn into_parts(self) -> (OwnedFd, OwnedFd) {
        (self.read, self.write)
    }
}

/// Write one message, retrying on EINTR
pub fn write_message(fd: RawFd, signal: c_int) -> std::result::Result<(), TransportError> {
    let bytes = signal.to_ne_bytes();
    loop {
        // SAFETY: `bytes` is a live stack buffer of MESSAGE_SIZE bytes.
        let n = unsafe { libc::write(fd, bytes.as_ptr().cast(), MESSAGE_SIZE) };
        if n < 0 {
            match Errno::last() {
                Errno::EINTR => continue,
                errno => return Err(TransportError::Errno(errno)),
            }
        }
        return if n as usize == MESSAGE_SIZE {
            Ok(())
        } else {
            Err(TransportError::Short(n as usize))
        };
    }
}

/// Read one message, retrying on EINTR
///
/// End of file counts as a short read.
pub fn read_message(fd: BorrowedFd<'_>) -> std::result::Result<c_int, TransportError> {
    let mut bytes = [0u8; MESSAGE_SIZE];
    loop {
        // SAFETY: `bytes` is a live stack buffer of MESSAGE_SIZE bytes.
        let n = unsafe { libc::read(fd.as_raw_fd(), bytes.as_mut_ptr().cast(), MESSAGE_SIZE) };
        if n < 0 {
            match Errno::last() {
                Errno::EINTR => continue,
                errno => return Err(TransportError::Errno(errno)),
            }
        }
        return if n as usize == MESSAGE_SIZE {
            Ok(c_int::from_ne_bytes(bytes))
        } else {
            Err(TransportError::Short(n as usize))
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsFd;

    #[test]
    fn test_message_size_is_int() {
        assert_eq!(MESSAGE_SIZE, 4);
    }

    #[test]
    fn test_messages_arrive_in_write_order() {
        let (read, write) = SignalPipe::new().unwrap().into_parts();

        for signal in [libc::SIGINT, libc::SIGQUIT, libc::SIGTERM, libc::SIGHUP] {
            write_message(write.as_raw_fd(), signal).unwrap();
        }
        for expected in [libc::SIGINT, libc::SIGQUIT, libc::SIGTERM, libc::SIGHUP] {
            assert_eq!(read_message(read.as_fd()).unwrap(), expected);
        }
    }

    #[test]
    fn test_partial_message_is_short_read() {
        let (read, write) = SignalPipe::new().unwrap().into_parts();
        nix::unistd::write(&write, &[1u8, 2]).unwrap();
        assert_eq!(read_message(read.as_fd()), Err(TransportError::Short(2)));
    }

    #[test]
    fn test_closed_writer_is_short_read() {
        let (read, write) = SignalPipe::new().unwrap().into_parts();
        drop(write);
        assert_eq!(read_message(read.as_fd()), Err(TransportError::Short(0)));
    }

    #[test]
    fn test_write_to_closed_descriptor_fails() {
        assert_eq!(
            write_message(-1, libc::SIGHUP),
            Err(TransportError::Errno(Errno::EBADF))
        );
    }
}
