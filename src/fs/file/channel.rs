use std::ptr;

use libc::{SPLICE_F_MOVE, loff_t, off_t};

use super::File;
use crate::fs::syscall::{self, args, cvt};
use crate::fs::{Handle, OsError};

/// A pipe attached to a [`File`], for moving data between files inside the kernel.
///
/// Data enters the pipe with [`Channel::fill`] and leaves it into the owning file with
/// [`Channel::drain`]. Both may move fewer bytes than asked, and the pipe only holds so much, so
/// callers alternate between the two until everything has been moved.
#[derive(Debug)]
pub struct Channel<'a> {
    file: &'a File,
    read: Handle,
    write: Handle,
}

impl<'a> Channel<'a> {
    pub(crate) fn new(file: &'a File) -> Result<Channel<'a>, OsError> {
        let (read, write) = file.context.make_pipe()?;
        Ok(Channel { file, read, write })
    }

    pub fn file(&self) -> &'a File {
        self.file
    }

    /// Moves up to `size` bytes from `source`, starting at `offset`, into the pipe.
    pub fn fill(&mut self, source: &File, size: usize, offset: off_t) -> Result<usize, OsError> {
        let (fd_in, fd_out) = (source.handle.get(), self.write.get());
        let mut off_in = offset as loff_t;
        // SAFETY: off_in outlives the call and the output pipe takes no offset.
        let count = syscall::retry(|| cvt(unsafe {
            libc::splice(fd_in, &mut off_in, fd_out, ptr::null_mut(), size, SPLICE_F_MOVE)
        }))
        .map_err(|code| OsError::new("splice", args!(source.handle, offset, self.write, size), code))?;
        Ok(count as usize)
    }

    /// Moves up to `size` bytes out of the pipe into the owning file at `offset`. Blocks while the
    /// pipe is empty.
    pub fn drain(&mut self, size: usize, offset: off_t) -> Result<usize, OsError> {
        let (fd_in, fd_out) = (self.read.get(), self.file.handle.get());
        let mut off_out = offset as loff_t;
        // SAFETY: off_out outlives the call and the input pipe takes no offset.
        let count = syscall::retry(|| cvt(unsafe {
            libc::splice(fd_in, ptr::null_mut(), fd_out, &mut off_out, size, SPLICE_F_MOVE)
        }))
        .map_err(|code| OsError::new("splice", args!(self.read, self.file.handle, offset, size), code))?;
        Ok(count as usize)
    }
}
