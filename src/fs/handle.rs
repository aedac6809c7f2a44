use std::fmt::{self, Debug, Formatter};
use std::mem;
use std::os::fd::{AsRawFd, RawFd};

use libc::c_int;

use crate::fs::fatal::{BadClosePanic, Fatal};
use crate::fs::syscall;

/// Exclusive owner of a single OS file descriptor, or empty.
///
/// A `Handle` is never cloned. Sharing a descriptor requires an explicit
/// [`Context::duplicate`](crate::fs::Context::duplicate) or a reopen. The descriptor is closed
/// exactly once, when the handle is dropped, unless ownership is handed back with
/// [`Handle::release`].
///
/// # Aborts
/// If closing the descriptor fails, the process is aborted. A failed close means the descriptor
/// table no longer matches what this handle believed it owned.
pub struct Handle(c_int);

impl Handle {
    pub(crate) const EMPTY: c_int = -1;

    pub const fn empty() -> Handle {
        Handle(Handle::EMPTY)
    }

    /// Takes ownership of a raw descriptor.
    ///
    /// # Safety
    /// The caller must own `fd` and must not close or otherwise use it afterwards.
    pub const unsafe fn from_raw(fd: c_int) -> Handle {
        Handle(fd)
    }

    pub const fn get(&self) -> c_int {
        self.0
    }

    pub const fn get_or(&self, alternate: c_int) -> c_int {
        if self.is_empty() { alternate } else { self.0 }
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == Handle::EMPTY
    }

    /// Hands back the raw descriptor without closing it, leaving the caller responsible for it.
    pub fn release(mut self) -> c_int {
        mem::replace(&mut self.0, Handle::EMPTY)
    }
}

impl AsRawFd for Handle {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.is_empty() {
            return;
        }
        let fd = mem::replace(&mut self.0, Handle::EMPTY);
        tracing::trace!(fd, "closing descriptor");
        // SAFETY: This handle owns fd and nothing refers to it after this point.
        if unsafe { libc::close(fd) } == -1 {
            match syscall::err_no() {
                // Linux releases the descriptor even when close is interrupted.
                libc::EINTR => (),
                code => BadClosePanic { fd, code }.terminate(),
            }
        }
    }
}

impl Debug for Handle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}
