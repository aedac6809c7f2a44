use std::mem::MaybeUninit;

use libc::{O_RDONLY, gid_t, mode_t, uid_t};

use crate::fs::syscall::{self, args, cvt};
use crate::fs::{Directory, File, Handle, OsError, Path, StatFs, Stats};

/// Operations shared by every open filesystem resource, performed on its descriptor.
pub trait Resource {
    fn handle(&self) -> &Handle;

    fn chmod(&self, mode: mode_t) -> Result<(), OsError> {
        let fd = self.handle().get();
        // SAFETY: fchmod only operates on the descriptor.
        cvt(unsafe { libc::fchmod(fd, mode) })
            .map_err(|code| OsError::new("fchmod", args!(self.handle(), mode), code))?;
        Ok(())
    }

    fn chown(&self, owner: uid_t, group: gid_t) -> Result<(), OsError> {
        let fd = self.handle().get();
        // SAFETY: fchown only operates on the descriptor.
        cvt(unsafe { libc::fchown(fd, owner, group) })
            .map_err(|code| OsError::new("fchown", args!(self.handle(), owner, group), code))?;
        Ok(())
    }

    fn stat(&self) -> Result<Stats, OsError> {
        let fd = self.handle().get();
        let mut raw: MaybeUninit<libc::stat> = MaybeUninit::uninit();
        // SAFETY: raw is valid for writes of a stat structure.
        syscall::retry(|| cvt(unsafe { libc::fstat(fd, raw.as_mut_ptr()) }))
            .map_err(|code| OsError::new("fstat", args!(self.handle()), code))?;
        // SAFETY: fstat succeeded, so raw is initialized.
        Ok(Stats::from_stat(unsafe { raw.assume_init() }))
    }

    fn statvfs(&self) -> Result<StatFs, OsError> {
        let fd = self.handle().get();
        let mut raw: MaybeUninit<libc::statvfs> = MaybeUninit::uninit();
        // SAFETY: raw is valid for writes of a statvfs structure.
        syscall::retry(|| cvt(unsafe { libc::fstatvfs(fd, raw.as_mut_ptr()) }))
            .map_err(|code| OsError::new("fstatvfs", args!(self.handle()), code))?;
        // SAFETY: fstatvfs succeeded, so raw is initialized.
        Ok(StatFs::from_statvfs(unsafe { raw.assume_init() }))
    }

    /// Flushes the resource's data, and only the metadata needed to read it back, to storage.
    fn fdatasync(&self) -> Result<(), OsError> {
        let fd = self.handle().get();
        // SAFETY: fdatasync only operates on the descriptor.
        cvt(unsafe { libc::fdatasync(fd) })
            .map_err(|code| OsError::new("fdatasync", args!(self.handle()), code))?;
        Ok(())
    }

    fn fsync(&self) -> Result<(), OsError> {
        let fd = self.handle().get();
        // SAFETY: fsync only operates on the descriptor.
        cvt(unsafe { libc::fsync(fd) })
            .map_err(|code| OsError::new("fsync", args!(self.handle()), code))?;
        Ok(())
    }
}

/// An open filesystem entity of any kind, supporting only the [`Resource`] operations.
#[derive(Debug)]
pub struct Object {
    pub(crate) handle: Handle,
}

impl Object {
    pub fn open(path: &Path) -> Result<Object, OsError> {
        Ok(Object { handle: path.open_handle(O_RDONLY, 0)? })
    }

    pub fn into_handle(self) -> Handle {
        self.handle
    }
}

impl Resource for Object {
    fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl From<File> for Object {
    fn from(value: File) -> Self {
        Object { handle: value.into_handle() }
    }
}

impl From<Directory> for Object {
    fn from(value: Directory) -> Self {
        Object { handle: value.into_handle() }
    }
}
