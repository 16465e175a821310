use {
    crate::retry_on_eintr,
    std::{ffi::CString, io, os::unix::ffi::OsStrExt, path::Path},
};

/// Call realpath(3) on `pathname`, resolving every symlink and `.`/`..`
/// component. Used by `real_dir` to canonicalize a watch root.
pub fn realpath(pathname: &Path) -> io::Result<CString>
{
    let pathname = CString::new(pathname.as_os_str().as_bytes())?;

    retry_on_eintr(|| {
        // SAFETY: pathname is NUL-terminated. Passing a null resolved_path
        // asks glibc to malloc a buffer sized to fit the result.
        let resolved = unsafe {
            libc::realpath(pathname.as_ptr(), std::ptr::null_mut())
        };

        if resolved.is_null() {
            return Err(io::Error::last_os_error());
        }

        // SAFETY: resolved is a non-null, NUL-terminated, malloc'd buffer.
        let owned = unsafe { std::ffi::CStr::from_ptr(resolved) }.to_owned();
        unsafe { libc::free(resolved.cast()); }

        Ok(owned)
    })
}
