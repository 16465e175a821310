//! Waiting on a single file descriptor with an optional timeout.

use {
    crate::retry_on_eintr,
    std::{io, os::unix::io::{AsRawFd, BorrowedFd}},
};

/// Outcome of [`poll_readable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult
{
    /// The file descriptor became readable before the timeout elapsed.
    Readable,
    /// The timeout elapsed with nothing to read.
    TimedOut,
}

/// Wait for `fd` to become readable, or until `timeout_ms` elapses.
///
/// `timeout_ms`: `None` blocks indefinitely; `Some(0)` polls without
/// blocking, used by the master loop to peek for more immediately
/// available data between drains.
pub fn poll_readable(fd: BorrowedFd, timeout_ms: Option<i32>) -> io::Result<PollResult>
{
    let mut pollfd = libc::pollfd{
        fd: fd.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };

    let timeout = timeout_ms.unwrap_or(-1);

    let n = retry_on_eintr(|| {
        // SAFETY: pollfd is a valid, singleton array.
        let n = unsafe { libc::poll(&mut pollfd, 1, timeout) };
        if n == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(n)
    })?;

    if n == 0 {
        Ok(PollResult::TimedOut)
    } else {
        Ok(PollResult::Readable)
    }
}
