use std::io::{IoSlice, IoSliceMut};

use derive_more::Display;
use libc::{c_int, off_t};

use super::{Channel, FileOptions, Lock};
use crate::fs::syscall::{self, args, cvt};
use crate::fs::{Context, Handle, LockError, OsError, Path, Resource};

const READ_CHUNK: usize = 1 << 12;

/// An open file, read and written at explicit offsets.
///
/// None of the I/O methods use or move the descriptor's file position, so a `File` can be shared by
/// reference between readers without coordination.
#[derive(Debug)]
pub struct File {
    pub(crate) handle: Handle,
    pub(crate) context: Context,
}

impl File {
    pub fn open(path: &Path, options: FileOptions) -> Result<File, OsError> {
        Ok(File {
            handle: path.open_handle(options.open_flags(), options.creation_mode())?,
            context: path.origin().context().clone(),
        })
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn into_handle(self) -> Handle {
        self.handle
    }

    /// Reads up to `buf.len()` bytes starting at `offset`, returning how many were read. Zero means
    /// the end of the file.
    pub fn read_some(&self, buf: &mut [u8], offset: off_t) -> Result<usize, OsError> {
        let fd = self.handle.get();
        // SAFETY: buf is valid for writes of buf.len() bytes.
        let count = syscall::retry(|| cvt(unsafe {
            libc::pread(fd, buf.as_mut_ptr().cast(), buf.len(), offset)
        }))
        .map_err(|code| OsError::new("pread", args!(self.handle, buf.len(), offset), code))?;
        Ok(count as usize)
    }

    /// Writes up to `buf.len()` bytes starting at `offset`, returning how many were written.
    pub fn write_some(&self, buf: &[u8], offset: off_t) -> Result<usize, OsError> {
        let fd = self.handle.get();
        // SAFETY: buf is valid for reads of buf.len() bytes.
        let count = syscall::retry(|| cvt(unsafe {
            libc::pwrite(fd, buf.as_ptr().cast(), buf.len(), offset)
        }))
        .map_err(|code| OsError::new("pwrite", args!(self.handle, buf.len(), offset), code))?;
        Ok(count as usize)
    }

    /// Scatter read: fills `bufs` in order from `offset`.
    pub fn read_some_vectored(&self, bufs: &mut [IoSliceMut<'_>], offset: off_t) -> Result<usize, OsError> {
        let fd = self.handle.get();
        let count = bufs.len().min(c_int::MAX as usize) as c_int;
        // SAFETY: IoSliceMut is ABI compatible with iovec and each slice is valid for writes.
        let read = syscall::retry(|| cvt(unsafe {
            libc::preadv(fd, bufs.as_ptr().cast(), count, offset)
        }))
        .map_err(|code| OsError::new("preadv", args!(self.handle, count, offset), code))?;
        Ok(read as usize)
    }

    /// Gather write: writes `bufs` in order from `offset`.
    pub fn write_some_vectored(&self, bufs: &[IoSlice<'_>], offset: off_t) -> Result<usize, OsError> {
        let fd = self.handle.get();
        let count = bufs.len().min(c_int::MAX as usize) as c_int;
        // SAFETY: IoSlice is ABI compatible with iovec and each slice is valid for reads.
        let written = syscall::retry(|| cvt(unsafe {
            libc::pwritev(fd, bufs.as_ptr().cast(), count, offset)
        }))
        .map_err(|code| OsError::new("pwritev", args!(self.handle, count, offset), code))?;
        Ok(written as usize)
    }

    /// Reads the whole file from the start, until a read returns nothing. The reported size isn't
    /// trusted, since proc files report zero.
    pub fn read_to_end(&self) -> Result<Vec<u8>, OsError> {
        let mut content = Vec::new();
        loop {
            let len = content.len();
            content.resize(len + READ_CHUNK, 0);
            let count = self.read_some(&mut content[len..], len as off_t)?;
            content.truncate(len + count);
            if count == 0 {
                return Ok(content);
            }
        }
    }

    /// Ensures storage is allocated for the given range, extending the file if needed.
    pub fn posix_fallocate(&self, offset: off_t, len: off_t) -> Result<(), OsError> {
        loop {
            // SAFETY: posix_fallocate only operates on the descriptor.
            match unsafe { libc::posix_fallocate(self.handle.get(), offset, len) } {
                0 => return Ok(()),
                libc::EINTR => continue,
                code => return Err(OsError::new("posix_fallocate", args!(self.handle, offset, len), code)),
            }
        }
    }

    pub fn posix_fadvise(&self, offset: off_t, len: off_t, advice: Advice) -> Result<(), OsError> {
        // SAFETY: posix_fadvise only operates on the descriptor.
        match unsafe { libc::posix_fadvise(self.handle.get(), offset, len, advice.raw()) } {
            0 => Ok(()),
            code => Err(OsError::new("posix_fadvise", args!(self.handle, offset, len, advice), code)),
        }
    }

    pub fn truncate(&self, len: off_t) -> Result<(), OsError> {
        let fd = self.handle.get();
        // SAFETY: ftruncate only operates on the descriptor.
        syscall::retry(|| cvt(unsafe { libc::ftruncate(fd, len) }))
            .map_err(|code| OsError::new("ftruncate", args!(self.handle, len), code))?;
        Ok(())
    }

    /// Gives the open file a new name at `target`. This also works for files opened with
    /// [`FileOptions::TMPFILE`], as long as they weren't opened exclusively.
    pub fn linkto(&self, target: &Path) -> Result<(), OsError> {
        let source = target.joined(format!("/proc/self/fd/{}", self.handle.get())).follow(true);
        source.link(target)
    }

    /// Takes an advisory `flock` lock on the file, released when the returned [`Lock`] is dropped.
    ///
    /// # Errors
    /// Without `blocking`, a conflicting lock held elsewhere fails with [`LockError::Locked`].
    pub fn acquire_lock(&self, exclusive: bool, blocking: bool) -> Result<Lock<'_>, LockError> {
        Lock::acquire(self, exclusive, blocking)
    }

    /// Creates a pipe for moving data into or out of this file without copying it through user
    /// space.
    pub fn make_channel(&self) -> Result<Channel<'_>, OsError> {
        Channel::new(self)
    }

    /// Duplicates the descriptor. Both files share an offset-independent view of the same open
    /// file, including its locks.
    pub fn try_clone(&self) -> Result<File, OsError> {
        Ok(File {
            handle: self.context.duplicate(&self.handle)?,
            context: self.context.clone(),
        })
    }
}

impl Resource for File {
    fn handle(&self) -> &Handle {
        &self.handle
    }
}

/// Expected access patterns, passed to [`File::posix_fadvise`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Advice {
    Normal,
    Sequential,
    Random,
    NoReuse,
    WillNeed,
    DontNeed,
}

impl Advice {
    pub(crate) const fn raw(self) -> c_int {
        match self {
            Advice::Normal => libc::POSIX_FADV_NORMAL,
            Advice::Sequential => libc::POSIX_FADV_SEQUENTIAL,
            Advice::Random => libc::POSIX_FADV_RANDOM,
            Advice::NoReuse => libc::POSIX_FADV_NOREUSE,
            Advice::WillNeed => libc::POSIX_FADV_WILLNEED,
            Advice::DontNeed => libc::POSIX_FADV_DONTNEED,
        }
    }
}
