use std::{
    ffi::CStr,
    io,
    mem::MaybeUninit,
    os::unix::io::{AsRawFd, BorrowedFd},
};

/// Call fstatat(2) with the given arguments.
///
/// If `dirfd` is [`None`], `AT_FDCWD` is passed. Used by `sub_dirs` to
/// determine entry type when the directory stream doesn't report `d_type`.
pub fn fstatat(
    dirfd: Option<BorrowedFd>,
    pathname: &CStr,
    flags: libc::c_int,
) -> io::Result<libc::stat>
{
    let dirfd = dirfd.map(|fd| fd.as_raw_fd()).unwrap_or(libc::AT_FDCWD);

    let mut statbuf = MaybeUninit::uninit();

    // SAFETY: path is NUL-terminated.
    let result = unsafe {
        libc::fstatat(
            dirfd,
            pathname.as_ptr(),
            statbuf.as_mut_ptr(),
            flags,
        )
    };

    if result == -1 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: fstatat initialized statbuf.
    Ok(unsafe { statbuf.assume_init() })
}
