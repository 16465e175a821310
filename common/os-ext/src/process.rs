//! Spawning helper subprocesses.
//!
//! `exec` is fire-and-forget: the parent learns only the pid (or 0 on fork
//! failure) and never waits synchronously for the child to replace its
//! image. Reaping, and discovering whether the replaced image ever ran
//! successfully, is entirely the job of `wait_pids`.

use std::{ffi::CStr, io, ptr::null};

/// Fork the process and replace the child's image with `binary`, passing
/// `arguments` as its argument vector (`arguments[0]` is conventionally
/// equal to `binary`).
///
/// Returns the child's pid, or 0 if the fork itself failed. If the child
/// fails to replace its image (binary missing, not executable, ...), it
/// writes a message to its standard error and exits with status 1; the
/// parent is not informed synchronously; it is only told through the pid's
/// eventual exit status as observed by `wait_pids`.
pub fn exec(binary: &CStr, arguments: &[&CStr]) -> libc::pid_t
{
    let mut argv: Vec<*const libc::c_char> =
        arguments.iter().map(|a| a.as_ptr()).collect();
    argv.push(null());

    // SAFETY: always safe.
    let pid = unsafe { libc::fork() };

    if pid < 0 {
        return 0;
    }

    if pid == 0 {
        // SAFETY: argv is nul-terminated and its pointees outlive this call,
        // since execvp never returns on success.
        unsafe { libc::execvp(binary.as_ptr(), argv.as_ptr()); }

        // Only reached if execvp failed.
        let message = format!(
            "exec: {}: {}\n",
            binary.to_string_lossy(),
            io::Error::last_os_error(),
        );
        // SAFETY: fd 2 is the child's standard error.
        unsafe { libc::write(2, message.as_ptr().cast(), message.len()); }
        unsafe { libc::_exit(1) };
    }

    pid
}
