use std::ffi::{CStr, OsStr};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use libc::{
    O_ACCMODE, O_APPEND, O_CLOEXEC, O_CREAT, O_DIRECTORY, O_EXCL, O_NOATIME, O_NOCTTY, O_NOFOLLOW,
    O_NONBLOCK, O_PATH, O_TMPFILE, O_TRUNC, c_int, c_uint, mode_t,
};

use crate::fs::syscall::{self, args, cvt};
use crate::fs::{Handle, OsError, Origin};
use crate::util::fmt::DebugRaw;

/// Flags that decide what is opened, or how, rather than the descriptor's policy. These can't be
/// forced onto every open of a [`Context`].
pub(crate) const EXTRA_FLAGS_MASK: c_int = !(
    O_ACCMODE | O_APPEND | O_CREAT | O_DIRECTORY | O_EXCL | O_NOFOLLOW | O_PATH | O_TMPFILE | O_TRUNC
);

/// The immutable open-flag policy shared by every [`Origin`], [`Path`](crate::fs::Path) and live
/// resource derived from it.
///
/// Cloning a `Context` is cheap, all clones refer to the same configuration.
#[derive(Clone)]
pub struct Context(Arc<ContextInner>);

struct ContextInner {
    name: String,
    flags: c_int,
    avoid_access_time: bool,
}

impl Context {
    /// Creates a context that adds `O_CLOEXEC | O_NOCTTY | O_NONBLOCK` to every open and leaves
    /// access times alone.
    pub fn new<S: Into<String>>(name: S) -> Context {
        ContextOptions::new().build(name)
    }

    pub fn options() -> ContextOptions {
        ContextOptions::new()
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The flags OR'd into every open made through this context.
    pub fn flags(&self) -> c_int {
        self.0.flags
    }

    pub fn avoids_access_time(&self) -> bool {
        self.0.avoid_access_time
    }

    /// Opens `name` relative to `dir`, or relative to the working directory if `dir` is `None` or
    /// empty.
    pub fn open(
        &self,
        dir: Option<&Handle>,
        name: &OsStr,
        flags: c_int,
        mode: mode_t,
    ) -> Result<Handle, OsError> {
        let dir_fd = dir.map_or(libc::AT_FDCWD, |handle| handle.get_or(libc::AT_FDCWD));
        self.openat(dir_fd, &syscall::c_path("openat", name)?, flags, mode)
    }

    pub(crate) fn openat(
        &self,
        dir_fd: c_int,
        pathname: &CStr,
        flags: c_int,
        mode: mode_t,
    ) -> Result<Handle, OsError> {
        let flags = flags | self.0.flags;
        if self.0.avoid_access_time && flags & O_NOATIME == 0 {
            match raw_openat(dir_fd, pathname, flags | O_NOATIME, mode) {
                Ok(handle) => return Ok(handle),
                // O_NOATIME is only permitted for the owner of the file.
                Err(libc::EPERM) => {
                    tracing::debug!(dir_fd, ?pathname, "retrying open without O_NOATIME");
                },
                Err(code) => {
                    return Err(OsError::new(
                        "openat",
                        args!(dir_fd, pathname, DebugRaw::hex(flags | O_NOATIME)),
                        code,
                    ));
                },
            }
        }
        raw_openat(dir_fd, pathname, flags, mode).map_err(|code| {
            OsError::new(
                "openat",
                args!(dir_fd, pathname, DebugRaw::hex(flags), DebugRaw::octal(mode)),
                code,
            )
        })
    }

    /// Duplicates the descriptor of `handle`, marking the copy close-on-exec if this context does
    /// so for opens.
    pub fn duplicate(&self, handle: &Handle) -> Result<Handle, OsError> {
        let operation = if self.0.flags & O_CLOEXEC != 0 { libc::F_DUPFD_CLOEXEC } else { libc::F_DUPFD };
        // SAFETY: fcntl only reads the descriptor, the result is owned by the new handle.
        match cvt(unsafe { libc::fcntl(handle.get(), operation, 0) }) {
            // SAFETY: fcntl succeeded, the new descriptor is owned by nothing else.
            Ok(fd) => Ok(unsafe { Handle::from_raw(fd) }),
            Err(code) => Err(OsError::new("fcntl", args!(handle, operation), code)),
        }
    }

    /// Creates a pipe, returning the read end followed by the write end.
    pub fn make_pipe(&self) -> Result<(Handle, Handle), OsError> {
        let mut fds: [c_int; 2] = [Handle::EMPTY; 2];
        let flags = self.0.flags & O_CLOEXEC;
        // SAFETY: fds has room for both descriptors written by pipe2.
        cvt(unsafe { libc::pipe2(fds.as_mut_ptr(), flags) })
            .map_err(|code| OsError::new("pipe2", args!(DebugRaw::hex(flags)), code))?;
        // SAFETY: pipe2 succeeded, so both descriptors are new and owned by nothing else.
        Ok(unsafe { (Handle::from_raw(fds[0]), Handle::from_raw(fds[1])) })
    }

    /// An origin for the process's working directory.
    pub fn working(&self) -> Origin {
        Origin::working_of(self.clone())
    }

    /// Resolves `name` (relative to the working directory) into an origin.
    pub fn resolved<S: AsRef<OsStr>>(&self, name: S, follow: bool) -> Result<Origin, OsError> {
        self.working().resolved(name, follow)
    }
}

fn raw_openat(dir_fd: c_int, pathname: &CStr, flags: c_int, mode: mode_t) -> Result<Handle, c_int> {
    // SAFETY: pathname is a valid null-terminated string for the duration of the call.
    let fd = cvt(unsafe { libc::openat(dir_fd, pathname.as_ptr(), flags, mode as c_uint) })?;
    tracing::trace!(dir_fd, ?pathname, fd, "opened descriptor");
    // SAFETY: openat succeeded, the new descriptor is owned by nothing else.
    Ok(unsafe { Handle::from_raw(fd) })
}

impl Debug for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.0.name)
            .field("flags", &DebugRaw::hex(self.0.flags))
            .field("avoid_access_time", &self.0.avoid_access_time)
            .finish()
    }
}

/// A builder for [`Context`]s. Available via [`Context::options`].
#[derive(Clone)]
pub struct ContextOptions {
    pub(crate) flags: c_int,
    pub(crate) avoid_access_time: bool,
}

macro_rules! set_flag {
    ($self:ident, $value:expr, $flag:expr) => {
        if $value {
            $self.flags |= $flag;
        } else {
            $self.flags &= !$flag;
        }
    };
}

macro_rules! get_flag {
    ($self:ident, $flag:expr) => {
        $self.flags & $flag != 0
    };
}

impl ContextOptions {
    pub const fn new() -> ContextOptions {
        ContextOptions {
            flags: O_CLOEXEC | O_NOCTTY | O_NONBLOCK,
            avoid_access_time: false,
        }
    }

    pub const fn close_on_exec(&mut self, value: bool) -> &mut Self {
        set_flag!(self, value, O_CLOEXEC);
        self
    }

    pub const fn non_blocking(&mut self, value: bool) -> &mut Self {
        set_flag!(self, value, O_NONBLOCK);
        self
    }

    pub const fn no_controlling_terminal(&mut self, value: bool) -> &mut Self {
        set_flag!(self, value, O_NOCTTY);
        self
    }

    /// Try to open with `O_NOATIME` first, falling back to a normal open where the kernel refuses
    /// it.
    pub const fn avoid_access_time(&mut self, value: bool) -> &mut Self {
        self.avoid_access_time = value;
        self
    }

    /// Adds raw flags to every open. Flags that change what gets opened (access mode, creation,
    /// truncation, symlink handling) are masked out.
    ///
    /// # Safety
    /// The remaining flags are passed to the kernel unchecked, the caller must make sure they are
    /// valid for every open performed through the resulting context.
    pub const unsafe fn extra_flags(&mut self, value: c_int) -> &mut Self {
        self.flags |= value & EXTRA_FLAGS_MASK;
        self
    }

    pub fn build<S: Into<String>>(&self, name: S) -> Context {
        Context(Arc::new(ContextInner {
            name: name.into(),
            flags: self.flags,
            avoid_access_time: self.avoid_access_time,
        }))
    }
}

impl Default for ContextOptions {
    fn default() -> Self {
        ContextOptions::new()
    }
}

impl Debug for ContextOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let named = O_CLOEXEC | O_NONBLOCK | O_NOCTTY;
        f.debug_struct("ContextOptions")
            .field("close_on_exec", &get_flag!(self, O_CLOEXEC))
            .field("non_blocking", &get_flag!(self, O_NONBLOCK))
            .field("no_controlling_terminal", &get_flag!(self, O_NOCTTY))
            .field("avoid_access_time", &self.avoid_access_time)
            .field("extra_flags", &DebugRaw::hex(self.flags & !named))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags() {
        let context = Context::new("test");
        assert_eq!(context.name(), "test");
        assert_eq!(context.flags(), O_CLOEXEC | O_NOCTTY | O_NONBLOCK);
        assert!(!context.avoids_access_time());
    }

    #[test]
    fn test_options_builder() {
        let mut options = Context::options();
        options.non_blocking(false).avoid_access_time(true);
        // SAFETY: O_SYNC is valid for every open in these tests.
        unsafe { options.extra_flags(libc::O_SYNC | O_CREAT | O_TRUNC) };

        let context = options.build("builder");
        assert_eq!(
            context.flags(),
            O_CLOEXEC | O_NOCTTY | libc::O_SYNC,
            "Creation flags should be masked out of the extra flags."
        );
        assert!(context.avoids_access_time());
    }

    #[test]
    fn test_duplicate_is_independent() {
        let context = Context::new("dup");
        let (read, write) = context.make_pipe().expect("pipe should be created");
        let copy = context.duplicate(&read).expect("descriptor should be duplicated");
        assert_ne!(copy.get(), read.get(), "A duplicate must have its own descriptor number.");

        // SAFETY: fcntl with F_GETFD only inspects the descriptor.
        let fd_flags = unsafe { libc::fcntl(copy.get(), libc::F_GETFD) };
        assert_eq!(fd_flags & libc::FD_CLOEXEC, libc::FD_CLOEXEC);

        let byte = [7_u8];
        // SAFETY: byte is valid for one byte.
        assert_eq!(unsafe { libc::write(write.get(), byte.as_ptr().cast(), 1) }, 1);
        drop(read);
        let mut out = [0_u8];
        // SAFETY: out is valid for one byte.
        assert_eq!(unsafe { libc::read(copy.get(), out.as_mut_ptr().cast(), 1) }, 1);
        assert_eq!(out, byte, "The duplicate should survive the original being closed.");
    }

    #[test]
    fn test_open_missing_reports_arguments() {
        let context = Context::new("missing");
        let err = context
            .open(None, OsStr::new("/definitely/not/here"), libc::O_RDONLY, 0)
            .expect_err("missing file should not open");
        assert_eq!(err.code(), libc::ENOENT);
        assert_eq!(err.op(), "openat");
        assert!(err.args().contains("/definitely/not/here"), "{}", err);
    }

    fn status_flags(handle: &Handle) -> c_int {
        // SAFETY: fcntl with F_GETFL only inspects the descriptor.
        let flags = unsafe { libc::fcntl(handle.get(), libc::F_GETFL) };
        assert_ne!(flags, -1, "F_GETFL should succeed on an open descriptor.");
        flags
    }

    fn access_time_context() -> Context {
        let mut options = Context::options();
        options.avoid_access_time(true);
        options.build("noatime")
    }

    #[test]
    fn test_avoid_access_time_on_owned_file() {
        let temp = tempfile::TempDir::new().expect("temp dir should be created");
        let owned = temp.path().join("owned");
        std::fs::write(&owned, b"x").expect("file should be written");

        let handle = access_time_context()
            .open(None, owned.as_os_str(), libc::O_RDONLY, 0)
            .expect("owned file should open");
        assert_eq!(
            status_flags(&handle) & O_NOATIME,
            O_NOATIME,
            "The owner of a file may open it without updating access times."
        );

        let plain = Context::new("plain")
            .open(None, owned.as_os_str(), libc::O_RDONLY, 0)
            .expect("owned file should open");
        assert_eq!(status_flags(&plain) & O_NOATIME, 0);
    }

    #[test]
    fn test_avoid_access_time_falls_back_for_foreign_file() {
        use std::os::unix::fs::MetadataExt;

        let foreign = std::path::Path::new("/etc/passwd");
        let Ok(metadata) = std::fs::metadata(foreign) else {
            return;
        };
        // SAFETY: geteuid has no preconditions.
        let euid = unsafe { libc::geteuid() };
        // Root may use O_NOATIME on any file, so there is nothing to fall back from.
        if euid == 0 || metadata.uid() == euid {
            return;
        }

        let handle = access_time_context()
            .open(None, foreign.as_os_str(), libc::O_RDONLY, 0)
            .expect("a refused O_NOATIME should be retried without it");
        assert_eq!(
            status_flags(&handle) & O_NOATIME,
            0,
            "The retried open must not carry O_NOATIME."
        );
    }
}
