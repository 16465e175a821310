//! Reaping terminated children.

use std::{io, process::ExitStatus, os::unix::process::ExitStatusExt};

/// Outcome of a single [`waitpid`] call.
pub enum WaitResult
{
    /// No child changed state (only possible with `WNOHANG`).
    NoHang,
    /// A child with the given pid terminated, with the given status.
    Exited(libc::pid_t, ExitStatus),
}

/// Call waitpid(2) for any child (`pid` of -1), non-blocking.
///
/// Only termination is reported; stopped/continued children (which require
/// `WUNTRACED`/`WCONTINUED`, neither of which is passed here) are not.
pub fn waitpid_any_nohang() -> io::Result<WaitResult>
{
    let mut wstatus = 0;

    // SAFETY: always safe.
    let pid = unsafe { libc::waitpid(-1, &mut wstatus, libc::WNOHANG) };

    if pid == -1 {
        let err = io::Error::last_os_error();
        // No children at all is not a real error for our caller.
        if err.raw_os_error() == Some(libc::ECHILD) {
            return Ok(WaitResult::NoHang);
        }
        return Err(err);
    }

    if pid == 0 {
        return Ok(WaitResult::NoHang);
    }

    Ok(WaitResult::Exited(pid, ExitStatus::from_raw(wstatus)))
}

/// Block until at least one child terminates, then reap it.
///
/// Used by `wait_pids` once the non-blocking drain finds nothing left; it
/// is the single suspension point the reaper contributes to the core.
pub fn waitpid_any_block() -> io::Result<WaitResult>
{
    let mut wstatus = 0;

    loop {
        // SAFETY: always safe.
        let pid = unsafe { libc::waitpid(-1, &mut wstatus, 0) };

        if pid == -1 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(err);
        }

        return Ok(WaitResult::Exited(pid, ExitStatus::from_raw(wstatus)));
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn nohang_reaps_a_child_that_already_exited()
    {
        // SAFETY: fork() with an immediate _exit in the child is safe in a
        // single-threaded test process.
        let pid = unsafe { libc::fork() };
        if pid == 0 {
            unsafe { libc::_exit(3) };
        }

        let mut result = None;
        for _ in 0 .. 1000 {
            match waitpid_any_nohang().unwrap() {
                WaitResult::Exited(reaped, status) => { result = Some((reaped, status)); break; },
                WaitResult::NoHang => std::thread::yield_now(),
            }
        }
        let (reaped, status) = result.expect("child should have exited by now");
        assert_eq!(reaped, pid);
        assert_eq!(status.code(), Some(3));
    }

    #[test]
    fn block_reaps_a_real_child_with_its_exit_code()
    {
        // SAFETY: fork() with an immediate _exit in the child is safe in a
        // single-threaded test process.
        let pid = unsafe { libc::fork() };
        if pid == 0 {
            unsafe { libc::_exit(5) };
        }
        match waitpid_any_block().unwrap() {
            WaitResult::Exited(reaped, status) => {
                assert_eq!(reaped, pid);
                assert_eq!(status.code(), Some(5));
            },
            WaitResult::NoHang => panic!("expected a terminated child"),
        }
    }
}
