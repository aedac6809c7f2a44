use libc::{LOCK_EX, LOCK_NB, LOCK_SH, LOCK_UN};

use super::File;
use crate::fs::fatal::{BadUnlockPanic, Fatal};
use crate::fs::syscall::{self, args, cvt};
use crate::fs::{LockError, LockedError, OsError};

/// An advisory lock held on a [`File`], released when dropped.
///
/// # Aborts
/// If the lock can't be released, the process is aborted.
#[derive(Debug)]
pub struct Lock<'a> {
    file: &'a File,
    exclusive: bool,
}

impl<'a> Lock<'a> {
    pub(crate) fn acquire(file: &'a File, exclusive: bool, blocking: bool) -> Result<Lock<'a>, LockError> {
        let fd = file.handle.get();
        let operation = (if exclusive { LOCK_EX } else { LOCK_SH }) | (if blocking { 0 } else { LOCK_NB });
        // SAFETY: flock only operates on the descriptor.
        match syscall::retry(|| cvt(unsafe { libc::flock(fd, operation) })) {
            Ok(_) => {
                tracing::trace!(fd, exclusive, "acquired lock");
                Ok(Lock { file, exclusive })
            },
            Err(libc::EWOULDBLOCK) => Err(LockedError { fd }.into()),
            Err(code) => Err(OsError::new("flock", args!(file.handle, operation), code).into()),
        }
    }

    pub fn file(&self) -> &'a File {
        self.file
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }
}

impl Drop for Lock<'_> {
    fn drop(&mut self) {
        let fd = self.file.handle.get();
        // SAFETY: flock only operates on the descriptor.
        match syscall::retry(|| cvt(unsafe { libc::flock(fd, LOCK_UN) })) {
            Ok(_) => tracing::trace!(fd, "released lock"),
            Err(code) => BadUnlockPanic { fd, code }.terminate(),
        }
    }
}
