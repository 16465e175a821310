//! Directory watches, enumeration, and path canonicalization.

use {
    os_ext::{
        dirent, fdopendir, fstatat, inotify_add_watch, inotify_init1, readdir,
        realpath, watch_mask, AT_SYMLINK_NOFOLLOW, O_DIRECTORY, O_RDONLY, S_IFDIR,
    },
    std::{
        ffi::{CString, OsString},
        io,
        os::unix::{
            ffi::{OsStrExt, OsStringExt},
            io::{AsFd, BorrowedFd, OwnedFd},
        },
        path::{Path, PathBuf},
        sync::atomic::{AtomicBool, Ordering},
    },
};

/// Owns the inotify file descriptor and issues watch registrations.
pub struct Watcher
{
    fd: OwnedFd,
}

impl Watcher
{
    /// Create a new inotify instance.
    pub fn new() -> io::Result<Self>
    {
        Ok(Self{fd: inotify_init1()?})
    }

    /// Borrow the underlying file descriptor, for polling.
    pub fn as_fd(&self) -> BorrowedFd
    {
        self.fd.as_fd()
    }

    /// Register `path` for the fixed standard event mask (attribute
    /// changes, close-after-write, create, delete, self-delete, both
    /// rename halves, don't-follow-symlinks, directories only).
    pub fn watch_add(&self, path: &Path) -> io::Result<i32>
    {
        inotify_add_watch(self.fd.as_fd(), path, watch_mask())
    }
}

/// Enumerate `absolute_path`, returning the basenames of entries that are
/// directories, excluding `.` and `..`.
///
/// If the directory stream doesn't report entry type (`d_type ==
/// DT_UNKNOWN`), falls back to `fstatat`. Honors `reset`: on reset mid-scan,
/// returns the partial sequence accumulated so far rather than erroring or
/// panicking.
pub fn sub_dirs(absolute_path: &Path, reset: &AtomicBool) -> Vec<OsString>
{
    let mut result = Vec::new();

    let fd = match os_ext::open(
        &match CString::new(absolute_path.as_os_str().as_bytes()) {
            Ok(c) => c,
            Err(_) => return result,
        },
        O_DIRECTORY | O_RDONLY,
        0,
    ) {
        Ok(fd) => fd,
        Err(_) => return result,
    };

    let mut dir = match fdopendir(fd) {
        Ok(dir) => dir,
        Err(_) => return result,
    };

    loop {
        if reset.load(Ordering::SeqCst) {
            break;
        }

        let entry: dirent = match readdir(&mut dir) {
            Ok(Some(entry)) => entry,
            Ok(None) | Err(_) => break,
        };

        if entry.d_name.as_os_str() == "." || entry.d_name.as_os_str() == ".." {
            continue;
        }

        let is_dir = match entry.d_type {
            libc::DT_DIR => true,
            libc::DT_UNKNOWN => {
                let full = absolute_path.join(&entry.d_name);
                let cpath = match CString::new(full.into_os_string().into_vec()) {
                    Ok(c) => c,
                    Err(_) => continue,
                };
                match fstatat(None, &cpath, AT_SYMLINK_NOFOLLOW) {
                    Ok(st) => (st.st_mode as libc::mode_t & libc::S_IFMT) == S_IFDIR,
                    Err(_) => false,
                }
            },
            _ => false,
        };

        if is_dir {
            result.push(entry.d_name.into_os_string());
        }
    }

    result
}

/// Canonicalize `path`, verify the result is a directory, and append a
/// trailing separator.
///
/// Any failure logs nothing itself (the caller is responsible for logging,
/// per the core's error taxonomy) and returns [`None`] rather than an
/// exception.
pub fn real_dir(path: &Path) -> Option<PathBuf>
{
    let resolved = realpath(path).ok()?;
    let resolved = PathBuf::from(OsString::from_vec(resolved.into_bytes()));

    let cpath = CString::new(resolved.as_os_str().as_bytes()).ok()?;
    let st = fstatat(None, &cpath, 0).ok()?;
    if (st.st_mode as libc::mode_t & libc::S_IFMT) != S_IFDIR {
        return None;
    }

    let mut with_sep = resolved.into_os_string();
    if !with_sep.as_os_str().as_bytes().ends_with(b"/") {
        with_sep.push("/");
    }

    Some(PathBuf::from(with_sep))
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn temp_dir(name: &str) -> PathBuf
    {
        let path = std::env::temp_dir().join(format!("inosyncd-watch-test-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&path);
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    #[test]
    fn real_dir_resolves_and_appends_trailing_separator()
    {
        let dir = temp_dir("real-dir");
        let resolved = real_dir(&dir).unwrap();
        assert!(resolved.as_os_str().as_bytes().ends_with(b"/"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn real_dir_rejects_a_plain_file()
    {
        let dir = temp_dir("real-dir-file");
        let file = dir.join("not-a-directory");
        std::fs::write(&file, b"x").unwrap();
        assert!(real_dir(&file).is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn real_dir_rejects_a_nonexistent_path()
    {
        let dir = temp_dir("real-dir-missing");
        assert!(real_dir(&dir.join("nope")).is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn sub_dirs_lists_only_directory_entries()
    {
        let dir = temp_dir("sub-dirs");
        std::fs::create_dir(dir.join("a")).unwrap();
        std::fs::create_dir(dir.join("b")).unwrap();
        std::fs::write(dir.join("file.txt"), b"x").unwrap();

        let reset = AtomicBool::new(false);
        let mut names: Vec<_> = sub_dirs(&dir, &reset).into_iter().map(|n| n.to_string_lossy().into_owned()).collect();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn sub_dirs_honors_a_preset_reset_flag()
    {
        let dir = temp_dir("sub-dirs-reset");
        std::fs::create_dir(dir.join("a")).unwrap();

        let reset = AtomicBool::new(true);
        let names = sub_dirs(&dir, &reset);
        assert!(names.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn sub_dirs_on_a_nonexistent_path_returns_empty()
    {
        let dir = temp_dir("sub-dirs-missing");
        let reset = AtomicBool::new(false);
        assert!(sub_dirs(&dir.join("nope"), &reset).is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
