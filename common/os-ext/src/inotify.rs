//! Thin wrapper around the inotify(7) kernel API.
//!
//! This module owns only the raw syscalls and the wire format of
//! `struct inotify_event`; pairing rename halves into canonical events is
//! not its concern and lives above this crate.

use {
    crate::retry_on_eintr,
    bitflags::bitflags,
    std::{
        ffi::{CString, OsString},
        io,
        mem::size_of,
        os::unix::{
            ffi::OsStrExt,
            io::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd},
        },
        path::Path,
    },
};

bitflags! {
    /// Bits of `struct inotify_event::mask`, both the watch request mask and
    /// the per-event mask the kernel reports.
    pub struct InotifyMask: u32
    {
        /// Metadata changed (permissions, timestamps, link count, ...).
        const ATTRIB        = libc::IN_ATTRIB;
        /// File opened for writing was closed.
        const CLOSE_WRITE   = libc::IN_CLOSE_WRITE;
        /// File or directory created in a watched directory.
        const CREATE        = libc::IN_CREATE;
        /// File or directory deleted from a watched directory.
        const DELETE        = libc::IN_DELETE;
        /// Watched file or directory itself was deleted.
        const DELETE_SELF   = libc::IN_DELETE_SELF;
        /// Source half of a rename.
        const MOVED_FROM    = libc::IN_MOVED_FROM;
        /// Destination half of a rename.
        const MOVED_TO      = libc::IN_MOVED_TO;
        /// Subject of the event is a directory.
        const ISDIR         = libc::IN_ISDIR;
        /// Event queue overflowed; `wd` is -1 and this is the only bit set.
        const Q_OVERFLOW    = libc::IN_Q_OVERFLOW;
        /// Watch was removed, explicitly or because its subject vanished.
        const IGNORED       = libc::IN_IGNORED;
        /// Don't dereference the final path component if it's a symlink.
        const DONT_FOLLOW   = libc::IN_DONT_FOLLOW;
        /// Only watch the path if it is a directory.
        const ONLYDIR       = libc::IN_ONLYDIR;
    }
}

/// The fixed watch mask `watch_add` registers every directory with.
pub fn watch_mask() -> InotifyMask
{
    InotifyMask::ATTRIB
    | InotifyMask::CLOSE_WRITE
    | InotifyMask::CREATE
    | InotifyMask::DELETE
    | InotifyMask::DELETE_SELF
    | InotifyMask::MOVED_FROM
    | InotifyMask::MOVED_TO
    | InotifyMask::DONT_FOLLOW
    | InotifyMask::ONLYDIR
}

/// One decoded `struct inotify_event` record.
#[derive(Debug, Clone)]
pub struct InotifyRecord
{
    /// Watch descriptor the event arrived on, or -1 on `Q_OVERFLOW`.
    pub wd: i32,
    /// Event bits (see [`InotifyMask`]).
    pub mask: InotifyMask,
    /// Opaque pairing key for `MOVED_FROM`/`MOVED_TO` halves of one rename.
    pub cookie: u32,
    /// Basename of the affected entry. Absent for `Q_OVERFLOW`.
    pub name: OsString,
}

/// Call inotify_init1(2).
pub fn inotify_init1() -> io::Result<OwnedFd>
{
    // SAFETY: always safe.
    let fd = unsafe { libc::inotify_init1(libc::IN_CLOEXEC | libc::IN_NONBLOCK) };

    if fd == -1 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: fd is a new, open file descriptor.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Call inotify_add_watch(2) with the given arguments.
pub fn inotify_add_watch(fd: BorrowedFd, pathname: &Path, mask: InotifyMask)
    -> io::Result<i32>
{
    let pathname = CString::new(pathname.as_os_str().as_bytes())?;

    retry_on_eintr(|| {
        // SAFETY: pathname is NUL-terminated.
        let wd = unsafe {
            libc::inotify_add_watch(fd.as_raw_fd(), pathname.as_ptr(), mask.bits())
        };

        if wd == -1 {
            return Err(io::Error::last_os_error());
        }

        Ok(wd)
    })
}

/// Call inotify_rm_watch(2) with the given arguments.
pub fn inotify_rm_watch(fd: BorrowedFd, wd: i32) -> io::Result<()>
{
    // SAFETY: always safe.
    let result = unsafe { libc::inotify_rm_watch(fd.as_raw_fd(), wd) };

    if result == -1 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// Read one batch of raw records from an inotify file descriptor into `buf`,
/// growing `buf` and retrying if the kernel reports `EINVAL` ("buffer too
/// small for the next record").
///
/// Returns the decoded records in kernel emission order, or `Ok(vec![])` on
/// `EAGAIN` (nothing currently available, since the fd is non-blocking).
pub fn inotify_read(fd: BorrowedFd, buf: &mut Vec<u8>)
    -> io::Result<Vec<InotifyRecord>>
{
    buf.clear();

    loop {
        // SAFETY: buf has capacity buf.capacity() bytes available.
        let n = unsafe {
            libc::read(fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.capacity())
        };

        if n == -1 {
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR)  => continue,
                Some(libc::EAGAIN) => return Ok(Vec::new()),
                Some(libc::EINVAL) => {
                    // buf is empty here (cleared above), so reserve's
                    // length-relative guarantee ("at least this many more
                    // than the current length") gives capacity >= want.
                    let want = buf.capacity() * 2;
                    buf.reserve(want);
                    continue;
                },
                _ => return Err(err),
            }
        }

        // SAFETY: read(2) wrote this many bytes into buf's spare capacity.
        unsafe { buf.set_len(n as usize); }

        return Ok(parse_records(buf));
    }
}

/// Decode a byte buffer holding zero or more back-to-back
/// `struct inotify_event` records into [`InotifyRecord`]s.
fn parse_records(buf: &[u8]) -> Vec<InotifyRecord>
{
    const HEADER_LEN: usize = size_of::<libc::inotify_event>();

    let mut records = Vec::new();
    let mut offset = 0;

    while offset + HEADER_LEN <= buf.len() {
        // SAFETY: the kernel writes native-endian, correctly aligned
        // inotify_event records; HEADER_LEN bytes are available.
        let header = unsafe {
            (buf.as_ptr().add(offset) as *const libc::inotify_event).read_unaligned()
        };

        let name_start = offset + HEADER_LEN;
        let name_end = name_start + header.len as usize;
        if name_end > buf.len() {
            break;
        }

        let name_bytes = &buf[name_start .. name_end];
        let name_len = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_bytes.len());
        let name = OsString::from(std::ffi::OsStr::from_bytes(&name_bytes[.. name_len]));

        records.push(InotifyRecord{
            wd: header.wd,
            mask: InotifyMask::from_bits_truncate(header.mask),
            cookie: header.cookie,
            name,
        });

        offset = name_end;
    }

    records
}

#[cfg(test)]
mod tests
{
    use super::*;
    use std::os::unix::io::AsFd;

    fn temp_dir(name: &str) -> std::path::PathBuf
    {
        let path = std::env::temp_dir().join(format!("os-ext-inotify-test-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&path);
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    #[test]
    fn create_and_delete_are_reported_with_the_right_name_and_bits()
    {
        let dir = temp_dir("create-delete");
        let fd = inotify_init1().unwrap();
        let wd = inotify_add_watch(fd.as_fd(), &dir, watch_mask()).unwrap();

        std::fs::write(dir.join("hello.txt"), b"x").unwrap();
        std::fs::remove_file(dir.join("hello.txt")).unwrap();

        let mut buf = Vec::with_capacity(2048);
        let mut records = Vec::new();
        for _ in 0 .. 10 {
            records.extend(inotify_read(fd.as_fd(), &mut buf).unwrap());
            if records.len() >= 2 {
                break;
            }
        }

        assert!(records.iter().any(|r| r.wd == wd && r.mask.contains(InotifyMask::CREATE) && r.name == "hello.txt"));
        assert!(records.iter().any(|r| r.wd == wd && r.mask.contains(InotifyMask::DELETE) && r.name == "hello.txt"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rename_produces_paired_moved_from_and_moved_to_with_a_shared_cookie()
    {
        let dir = temp_dir("rename");
        std::fs::write(dir.join("a"), b"x").unwrap();

        let fd = inotify_init1().unwrap();
        inotify_add_watch(fd.as_fd(), &dir, watch_mask()).unwrap();

        std::fs::rename(dir.join("a"), dir.join("b")).unwrap();

        let mut buf = Vec::with_capacity(2048);
        let mut records = Vec::new();
        for _ in 0 .. 10 {
            records.extend(inotify_read(fd.as_fd(), &mut buf).unwrap());
            if records.len() >= 2 {
                break;
            }
        }

        let from = records.iter().find(|r| r.mask.contains(InotifyMask::MOVED_FROM)).unwrap();
        let to = records.iter().find(|r| r.mask.contains(InotifyMask::MOVED_TO)).unwrap();
        assert_eq!(from.cookie, to.cookie);
        assert_eq!(from.name, "a");
        assert_eq!(to.name, "b");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn reading_with_nothing_pending_returns_an_empty_batch()
    {
        let fd = inotify_init1().unwrap();
        let mut buf = Vec::with_capacity(2048);
        assert!(inotify_read(fd.as_fd(), &mut buf).unwrap().is_empty());
    }

    #[test]
    fn removed_watch_is_rejected_by_a_second_removal()
    {
        let dir = temp_dir("rm-watch");
        let fd = inotify_init1().unwrap();
        let wd = inotify_add_watch(fd.as_fd(), &dir, watch_mask()).unwrap();
        inotify_rm_watch(fd.as_fd(), wd).unwrap();
        assert!(inotify_rm_watch(fd.as_fd(), wd).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn a_record_too_big_for_the_buffer_forces_growth_instead_of_looping_forever()
    {
        // NAME_MAX (255 bytes) keeps any single filename well under 2 KiB, so
        // the growth path is exercised the other way around: start `buf` too
        // small to hold even one header, with a near-NAME_MAX filename, and
        // confirm repeated real EINVALs from the kernel double it past the
        // record's size rather than spinning forever.
        let dir = temp_dir("grow");
        let name = "n".repeat(200);

        let fd = inotify_init1().unwrap();
        inotify_add_watch(fd.as_fd(), &dir, watch_mask()).unwrap();

        std::fs::write(dir.join(&name), b"x").unwrap();

        let mut buf = Vec::with_capacity(8);
        let mut records = Vec::new();
        for _ in 0 .. 10 {
            records.extend(inotify_read(fd.as_fd(), &mut buf).unwrap());
            if records.iter().any(|r| r.mask.contains(InotifyMask::CREATE)) {
                break;
            }
        }

        assert!(buf.capacity() > 8);
        assert!(records.iter().any(|r| r.mask.contains(InotifyMask::CREATE) && r.name == name.as_str()));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
