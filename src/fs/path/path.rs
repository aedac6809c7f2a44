use std::ffi::{CString, OsStr, OsString};
use std::fmt::{self, Debug, Formatter};
use std::mem::MaybeUninit;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::sync::Arc;

use libc::{O_DIRECTORY, O_NOFOLLOW, O_RDONLY, c_int, gid_t, mode_t, off_t, uid_t};

use super::normalize::{join, normalize};
use crate::fs::dir::DirEntries;
use crate::fs::syscall::{self, GROW_SHIFTS, args, cvt};
use crate::fs::{DirectoryEntry, Handle, OsError, Origin, Result, ScanError, StatFs, Stats};

/// A pathname relative to an [`Origin`], plus whether a trailing symlink should be followed.
///
/// Constructing and deriving paths never touches the filesystem. Every operation is performed
/// relative to the origin's descriptor, so a resolved origin can be moved or renamed without
/// changing what its paths refer to. Cloning is cheap, paths are immutable and shared.
#[derive(Clone)]
pub struct Path(Arc<PathInner>);

struct PathInner {
    origin: Origin,
    pathname: OsString,
    follow: bool,
}

impl Path {
    pub(crate) fn new(origin: Origin, pathname: OsString, follow: bool) -> Path {
        Path(Arc::new(PathInner { origin, pathname, follow }))
    }

    pub fn origin(&self) -> &Origin {
        &self.0.origin
    }

    pub fn pathname(&self) -> &OsStr {
        &self.0.pathname
    }

    pub fn follows(&self) -> bool {
        self.0.follow
    }

    fn c_pathname(&self, op: &'static str) -> std::result::Result<CString, OsError> {
        syscall::c_path(op, &self.0.pathname)
    }

    fn error(&self, op: &'static str, code: c_int) -> OsError {
        OsError::new(op, args!(self), code)
    }

    fn at_flag(&self, follow_flag: c_int, nofollow_flag: c_int) -> c_int {
        if self.0.follow { follow_flag } else { nofollow_flag }
    }

    /// Opens the path relative to its origin, adding `O_NOFOLLOW` unless links are followed.
    pub(crate) fn open_handle(
        &self,
        flags: c_int,
        mode: mode_t,
    ) -> std::result::Result<Handle, OsError> {
        let pathname = self.c_pathname("openat")?;
        self.0.origin.open_handle(&pathname, flags | self.at_flag(0, O_NOFOLLOW), mode)
    }

    pub fn follow(&self, value: bool) -> Path {
        Path::new(self.0.origin.clone(), self.0.pathname.clone(), value)
    }

    /// Derives a new path. An absolute `name` replaces this path entirely and is resolved from the
    /// process root, a relative one is appended.
    pub fn joined<S: AsRef<OsStr>>(&self, name: S) -> Path {
        let name = name.as_ref();
        if name.as_bytes().first() == Some(&b'/') {
            Path::new(self.0.origin.working(), name.to_owned(), self.0.follow)
        } else {
            Path::new(self.0.origin.clone(), join(&self.0.pathname, name), self.0.follow)
        }
    }

    /// Opens this path as a directory, for use as the origin of further paths.
    pub fn resolved(&self) -> std::result::Result<Origin, OsError> {
        self.0.origin.resolved(&self.0.pathname, self.0.follow)
    }

    pub fn stat(&self) -> std::result::Result<Stats, OsError> {
        let pathname = self.c_pathname("fstatat")?;
        let flags = self.at_flag(0, libc::AT_SYMLINK_NOFOLLOW);
        let mut raw: MaybeUninit<libc::stat> = MaybeUninit::uninit();
        // SAFETY: pathname is null-terminated and raw is valid for writes of a stat structure.
        syscall::retry(|| cvt(unsafe {
            libc::fstatat(self.0.origin.dir_fd(), pathname.as_ptr(), raw.as_mut_ptr(), flags)
        }))
        .map_err(|code| self.error("fstatat", code))?;
        // SAFETY: fstatat succeeded, so raw is initialized.
        Ok(Stats::from_stat(unsafe { raw.assume_init() }))
    }

    pub fn chmod(&self, mode: mode_t) -> std::result::Result<(), OsError> {
        let pathname = self.c_pathname("fchmodat")?;
        let flags = self.at_flag(0, libc::AT_SYMLINK_NOFOLLOW);
        // SAFETY: pathname is null-terminated.
        cvt(unsafe { libc::fchmodat(self.0.origin.dir_fd(), pathname.as_ptr(), mode, flags) })
            .map_err(|code| OsError::new("fchmodat", args!(self, mode, flags), code))?;
        Ok(())
    }

    pub fn chown(&self, owner: uid_t, group: gid_t) -> std::result::Result<(), OsError> {
        let pathname = self.c_pathname("fchownat")?;
        let flags = self.at_flag(0, libc::AT_SYMLINK_NOFOLLOW);
        // SAFETY: pathname is null-terminated.
        cvt(unsafe {
            libc::fchownat(self.0.origin.dir_fd(), pathname.as_ptr(), owner, group, flags)
        })
        .map_err(|code| OsError::new("fchownat", args!(self, owner, group, flags), code))?;
        Ok(())
    }

    pub fn mkdir(&self, mode: mode_t) -> std::result::Result<(), OsError> {
        let pathname = self.c_pathname("mkdirat")?;
        // SAFETY: pathname is null-terminated.
        cvt(unsafe { libc::mkdirat(self.0.origin.dir_fd(), pathname.as_ptr(), mode) })
            .map_err(|code| OsError::new("mkdirat", args!(self, mode), code))?;
        Ok(())
    }

    pub fn rmdir(&self) -> std::result::Result<(), OsError> {
        let pathname = self.c_pathname("unlinkat")?;
        // SAFETY: pathname is null-terminated.
        cvt(unsafe {
            libc::unlinkat(self.0.origin.dir_fd(), pathname.as_ptr(), libc::AT_REMOVEDIR)
        })
        .map_err(|code| self.error("unlinkat", code))?;
        Ok(())
    }

    /// Creates `target` as a hard link to this path. With following enabled, a symlink at this
    /// path is dereferenced first.
    pub fn link(&self, target: &Path) -> std::result::Result<(), OsError> {
        let pathname = self.c_pathname("linkat")?;
        let target_pathname = target.c_pathname("linkat")?;
        let flags = self.at_flag(libc::AT_SYMLINK_FOLLOW, 0);
        // SAFETY: Both pathnames are null-terminated.
        cvt(unsafe {
            libc::linkat(
                self.0.origin.dir_fd(),
                pathname.as_ptr(),
                target.0.origin.dir_fd(),
                target_pathname.as_ptr(),
                flags,
            )
        })
        .map_err(|code| OsError::new("linkat", args!(self, target, flags), code))?;
        Ok(())
    }

    pub fn unlink(&self) -> std::result::Result<(), OsError> {
        let pathname = self.c_pathname("unlinkat")?;
        // SAFETY: pathname is null-terminated.
        cvt(unsafe { libc::unlinkat(self.0.origin.dir_fd(), pathname.as_ptr(), 0) })
            .map_err(|code| self.error("unlinkat", code))?;
        Ok(())
    }

    pub fn rename(&self, target: &Path) -> std::result::Result<(), OsError> {
        let pathname = self.c_pathname("renameat")?;
        let target_pathname = target.c_pathname("renameat")?;
        // SAFETY: Both pathnames are null-terminated.
        cvt(unsafe {
            libc::renameat(
                self.0.origin.dir_fd(),
                pathname.as_ptr(),
                target.0.origin.dir_fd(),
                target_pathname.as_ptr(),
            )
        })
        .map_err(|code| OsError::new("renameat", args!(self, target), code))?;
        Ok(())
    }

    /// Reads the target of the symlink at this path, growing the buffer until the target fits.
    pub fn readlink(&self) -> std::result::Result<OsString, OsError> {
        let pathname = self.c_pathname("readlinkat")?;
        for shift in GROW_SHIFTS {
            let mut buf = vec![0_u8; 1 << shift];
            // SAFETY: pathname is null-terminated and readlinkat writes at most buf.len() bytes.
            let count = cvt(unsafe {
                libc::readlinkat(
                    self.0.origin.dir_fd(),
                    pathname.as_ptr(),
                    buf.as_mut_ptr().cast(),
                    buf.len(),
                )
            })
            .map_err(|code| self.error("readlinkat", code))? as usize;
            // A full buffer may mean the target was truncated.
            if count < buf.len() {
                buf.truncate(count);
                return Ok(OsString::from_vec(buf));
            }
        }
        Err(self.error("readlinkat", libc::ENAMETOOLONG))
    }

    /// Creates a symlink at this path, pointing to `value`.
    pub fn symlink<S: AsRef<OsStr>>(&self, value: S) -> std::result::Result<(), OsError> {
        let pathname = self.c_pathname("symlinkat")?;
        let value = value.as_ref();
        let target = syscall::c_path("symlinkat", value)?;
        // SAFETY: Both strings are null-terminated.
        cvt(unsafe { libc::symlinkat(target.as_ptr(), self.0.origin.dir_fd(), pathname.as_ptr()) })
            .map_err(|code| OsError::new("symlinkat", args!(self, value), code))?;
        Ok(())
    }

    fn entries(&self) -> std::result::Result<DirEntries, OsError> {
        Ok(DirEntries::new(self.open_handle(O_RDONLY | O_DIRECTORY, 0)?))
    }

    /// Lists the directory at this path. `.` and `..` are never included.
    pub fn list(&self) -> std::result::Result<Vec<DirectoryEntry>, ScanError> {
        self.entries()?.collect()
    }

    /// Passes each entry of the directory at this path to `visitor` until it returns `true`.
    /// Returns whether the visitor stopped the scan early.
    pub fn list_with<F>(&self, visitor: F) -> std::result::Result<bool, ScanError>
    where
        F: FnMut(DirectoryEntry) -> bool,
    {
        self.entries()?.visit(visitor)
    }

    pub fn statvfs(&self) -> Result<StatFs> {
        let pathname = syscall::c_path("statvfs", &self.absolute()?)?;
        let mut raw: MaybeUninit<libc::statvfs> = MaybeUninit::uninit();
        // SAFETY: pathname is null-terminated and raw is valid for writes of a statvfs structure.
        syscall::retry(|| cvt(unsafe { libc::statvfs(pathname.as_ptr(), raw.as_mut_ptr()) }))
            .map_err(|code| self.error("statvfs", code))?;
        // SAFETY: statvfs succeeded, so raw is initialized.
        Ok(StatFs::from_statvfs(unsafe { raw.assume_init() }))
    }

    pub fn truncate(&self, length: off_t) -> Result<()> {
        let pathname = syscall::c_path("truncate", &self.absolute()?)?;
        // SAFETY: pathname is null-terminated.
        syscall::retry(|| cvt(unsafe { libc::truncate(pathname.as_ptr(), length) }))
            .map_err(|code| OsError::new("truncate", args!(self, length), code))?;
        Ok(())
    }

    /// The normalized absolute pathname of this path, computed through [`Origin::location`] for
    /// relative pathnames. The final component is not resolved.
    pub fn absolute(&self) -> Result<OsString> {
        if self.0.pathname.as_bytes().first() == Some(&b'/') {
            Ok(normalize(&self.0.pathname))
        } else {
            Ok(join(&self.0.origin.location()?, &self.0.pathname))
        }
    }
}

impl Debug for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Path")
            .field("origin", &self.0.origin)
            .field("pathname", &self.0.pathname)
            .field("follow", &self.0.follow)
            .finish()
    }
}
