//! Wrappers around the syslog(3) family, used by the logger's system-log
//! sink.

use std::ffi::CStr;

/// Call openlog(3).
///
/// `ident` must outlive every subsequent `syslog` call: glibc retains the
/// pointer rather than copying it.
pub fn openlog(ident: &'static CStr)
{
    // SAFETY: ident is a NUL-terminated string with 'static lifetime.
    unsafe { libc::openlog(ident.as_ptr(), libc::LOG_PID, libc::LOG_DAEMON) };
}

/// Call syslog(3) with a pre-formatted message at the given priority.
///
/// `%` is not interpreted in `message`: we always pass a constant format
/// string of `"%s"` to avoid format-string injection from caller-supplied
/// text.
pub fn syslog(priority: libc::c_int, message: &CStr)
{
    // SAFETY: format string is a constant "%s"; message is NUL-terminated.
    unsafe { libc::syslog(priority, c"%s".as_ptr(), message.as_ptr()) };
}

/// Call closelog(3).
pub fn closelog()
{
    // SAFETY: always safe.
    unsafe { libc::closelog() };
}
