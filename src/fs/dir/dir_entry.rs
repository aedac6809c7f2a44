use std::ffi::{OsStr, OsString};
use std::iter::FusedIterator;
use std::os::unix::ffi::OsStrExt;

use crate::fs::syscall::{self, args, cvt};
use crate::fs::{Handle, Kind, OsError, ScanError};

const BUFFER_SIZE: usize = 1 << 12;

// Layout of a linux_dirent64 record: d_ino (8), d_off (8), d_reclen (2), d_type (1), d_name.
const RECLEN_OFFSET: usize = 16;
const TYPE_OFFSET: usize = 18;
const NAME_OFFSET: usize = 19;

/// A single entry of a directory, as reported by the scan itself without a further `stat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub inode: u64,
    pub name: OsString,
    pub kind: Kind,
}

/// A lazy scan over the entries of an open directory. `.` and `..` are skipped.
///
/// The scan owns its descriptor and reads records in batches. After the end of the directory or
/// the first error, it yields nothing more.
pub struct DirEntries {
    handle: Handle,
    buf: Box<[u8]>,
    head: usize,
    len: usize,
    done: bool,
}

impl DirEntries {
    /// Scans the directory open on `handle`, from its current position.
    pub(crate) fn new(handle: Handle) -> DirEntries {
        DirEntries {
            handle,
            buf: vec![0; BUFFER_SIZE].into_boxed_slice(),
            head: 0,
            len: 0,
            done: false,
        }
    }

    /// Passes each entry to `visitor` until it returns `true`. Returns whether the visitor stopped
    /// the scan, rather than the directory running out.
    pub fn visit<F>(self, mut visitor: F) -> Result<bool, ScanError>
    where
        F: FnMut(DirectoryEntry) -> bool,
    {
        for entry in self {
            if visitor(entry?) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Refills the buffer, returning false at the end of the directory.
    fn refill(&mut self) -> Result<bool, OsError> {
        let fd = self.handle.get();
        let buf = &mut self.buf;
        // SAFETY: buf is valid for writes of buf.len() bytes.
        let count = syscall::retry(|| cvt(unsafe {
            syscall::getdents(fd, buf.as_mut_ptr().cast(), buf.len())
        }))
        .map_err(|code| OsError::new("getdents64", args!(self.handle, BUFFER_SIZE), code))?;
        self.head = 0;
        self.len = count as usize;
        Ok(count > 0)
    }

    /// Consumes the record at the head of the buffer. `.` and `..` produce `None`.
    fn take_record(&mut self) -> Result<Option<DirectoryEntry>, ScanError> {
        let record = &self.buf[self.head..self.len];
        let reclen = match record.get(RECLEN_OFFSET..=RECLEN_OFFSET + 1) {
            Some(&[low, high]) => u16::from_ne_bytes([low, high]) as usize,
            _ => 0,
        };
        if reclen <= NAME_OFFSET || reclen > record.len() {
            return Err(OsError::new("getdents64", args!(self.handle, reclen), libc::EIO).into());
        }

        let mut inode = [0_u8; 8];
        inode.copy_from_slice(&record[..8]);
        let d_type = record[TYPE_OFFSET];
        let name = &record[NAME_OFFSET..reclen];
        let name = &name[..name.iter().position(|&ch| ch == 0).unwrap_or(name.len())];
        let name = OsStr::from_bytes(name).to_owned();
        self.head += reclen;

        if name == "." || name == ".." {
            return Ok(None);
        }
        Ok(Some(DirectoryEntry {
            inode: u64::from_ne_bytes(inode),
            name,
            kind: Kind::from_dirent_type(d_type)?,
        }))
    }
}

impl Iterator for DirEntries {
    type Item = Result<DirectoryEntry, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if self.head >= self.len {
                match self.refill() {
                    Ok(true) => (),
                    Ok(false) => self.done = true,
                    Err(err) => {
                        self.done = true;
                        return Some(Err(err.into()));
                    },
                }
                continue;
            }
            match self.take_record() {
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => (),
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                },
            }
        }
        None
    }
}

impl FusedIterator for DirEntries {}

impl std::fmt::Debug for DirEntries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirEntries")
            .field("handle", &self.handle)
            .field("buffered", &(self.len - self.head.min(self.len)))
            .field("done", &self.done)
            .finish()
    }
}
