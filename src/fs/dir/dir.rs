use std::ffi::CStr;
use std::sync::Arc;

use libc::{O_DIRECTORY, O_NOFOLLOW, O_RDONLY};

use super::{DirEntries, DirectoryEntry};
use crate::fs::{Context, Handle, OsError, Path, Resource, ScanError};

const CURRENT: &CStr = c".";

/// An open directory, able to list its own entries.
#[derive(Debug)]
pub struct Directory {
    pub(crate) handle: Handle,
    pub(crate) context: Context,
}

impl Directory {
    pub fn open(path: &Path) -> Result<Directory, OsError> {
        Ok(Directory {
            handle: path.open_handle(O_RDONLY | O_DIRECTORY, 0)?,
            context: path.origin().context().clone(),
        })
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn into_handle(self) -> Handle {
        self.handle
    }

    /// Scans the directory through a fresh descriptor, so this one can be listed again.
    pub fn entries(&self) -> Result<DirEntries, OsError> {
        let flags = O_RDONLY | O_DIRECTORY | O_NOFOLLOW;
        Ok(DirEntries::new(self.context.openat(self.handle.get(), CURRENT, flags, 0)?))
    }

    pub fn list(&self) -> Result<Vec<DirectoryEntry>, ScanError> {
        self.entries()?.collect()
    }

    pub fn list_with<F>(&self, visitor: F) -> Result<bool, ScanError>
    where
        F: FnMut(DirectoryEntry) -> bool,
    {
        self.entries()?.visit(visitor)
    }

    /// Scans the directory using this descriptor, without opening another.
    pub fn into_entries(self) -> DirEntries {
        DirEntries::new(self.handle)
    }

    pub fn into_list(self) -> Result<Vec<DirectoryEntry>, ScanError> {
        self.into_entries().collect()
    }

    pub fn into_list_with<F>(self, visitor: F) -> Result<bool, ScanError>
    where
        F: FnMut(DirectoryEntry) -> bool,
    {
        self.into_entries().visit(visitor)
    }

    /// Scans a shared directory, consuming its descriptor if this is the only reference and
    /// reopening it otherwise.
    pub fn shared_entries(dir: Arc<Directory>) -> Result<DirEntries, OsError> {
        match Arc::try_unwrap(dir) {
            Ok(dir) => Ok(dir.into_entries()),
            Err(shared) => shared.entries(),
        }
    }
}

impl Resource for Directory {
    fn handle(&self) -> &Handle {
        &self.handle
    }
}
