use std::ffi::{CStr, OsStr, OsString};
use std::fmt::{self, Debug, Formatter};
use std::mem::MaybeUninit;
use std::os::unix::ffi::OsStrExt;
use std::sync::Arc;

use libc::{O_DIRECTORY, O_NOFOLLOW, O_PATH, O_RDONLY, c_int, dev_t, ino_t};

use crate::fs::dir::DirEntries;
use crate::fs::mount::{self, Mount};
use crate::fs::path::normalize;
use crate::fs::syscall::{self, args, cvt};
use crate::fs::{Context, Handle, OsError, Path, ResolveError, ResolveReason, Result};

const PARENT: &CStr = c"..";

/// A directory that relative pathnames are resolved against, or the process's working directory.
///
/// Resolved origins hold an `O_PATH` descriptor: it anchors lookups but can't be used to read the
/// directory's contents. Renaming or moving the directory doesn't affect an origin already
/// resolved from it.
#[derive(Clone)]
pub struct Origin(Arc<OriginInner>);

struct OriginInner {
    context: Context,
    handle: Option<Handle>,
}

impl Origin {
    pub(crate) fn working_of(context: Context) -> Origin {
        Origin(Arc::new(OriginInner { context, handle: None }))
    }

    pub fn context(&self) -> &Context {
        &self.0.context
    }

    pub(crate) fn dir_fd(&self) -> c_int {
        self.0.handle.as_ref().map_or(libc::AT_FDCWD, Handle::get)
    }

    pub(crate) fn open_handle(
        &self,
        pathname: &CStr,
        flags: c_int,
        mode: libc::mode_t,
    ) -> std::result::Result<Handle, OsError> {
        self.0.context.openat(self.dir_fd(), pathname, flags, mode)
    }

    /// An origin for the working directory, sharing this origin's context.
    pub fn working(&self) -> Origin {
        Origin::working_of(self.0.context.clone())
    }

    /// Opens the directory `name`, relative to this origin, as a new origin.
    pub fn resolved<S: AsRef<OsStr>>(
        &self,
        name: S,
        follow: bool,
    ) -> std::result::Result<Origin, OsError> {
        let pathname = syscall::c_path("openat", name.as_ref())?;
        let flags = O_RDONLY | O_DIRECTORY | O_PATH | if follow { 0 } else { O_NOFOLLOW };
        let handle = self.open_handle(&pathname, flags, 0)?;
        Ok(Origin(Arc::new(OriginInner {
            context: self.0.context.clone(),
            handle: Some(handle),
        })))
    }

    /// A path to `name` relative to this origin, following symlinks. No syscall is made.
    pub fn path<S: AsRef<OsStr>>(&self, name: S) -> Path {
        Path::new(self.clone(), name.as_ref().to_owned(), true)
    }

    /// Computes the absolute pathname of this origin from its descriptor alone.
    ///
    /// The working directory is answered by the kernel. For a resolved directory, the mount table
    /// is cross-referenced with the directory's device and inode, and the tree is walked upwards
    /// through `..` until a mount root is found. The names recovered on the way are joined onto
    /// the mount point. This never consults `/proc/self/fd`, so the answer always matches the
    /// directory the descriptor refers to now, even under bind mounts.
    ///
    /// # Errors
    /// Fails with a [`ResolveError`] if the directory has been removed from its parent, or if no
    /// mount point for its device can be reached.
    pub fn location(&self) -> Result<OsString> {
        let Some(handle) = &self.0.handle else {
            return Ok(syscall::getcwd()?);
        };
        let dir_fd = handle.get();
        let (device, inode) = identity(dir_fd)?;
        let roots = mount_roots(&mount::find_mounts(&self.0.context)?, device)?;

        if let Some(root) = find_root(&roots, inode) {
            tracing::debug!(dir_fd, ?root, "directory is a mount root");
            return Ok(normalize(root));
        }

        let flags = O_RDONLY | O_DIRECTORY | O_NOFOLLOW;
        let unresolved = |reason| ResolveError { fd: dir_fd, reason };
        let mut names: Vec<OsString> = Vec::new();
        let mut child = inode;
        let mut current = self.0.context.openat(dir_fd, PARENT, flags, 0)?;

        loop {
            let (current_device, current_inode) = identity(current.get())?;
            if current_device != device || current_inode == child {
                return Err(unresolved(ResolveReason::NoMount).into());
            }
            let parent = self.0.context.openat(current.get(), PARENT, flags, 0)?;

            let mut found = None;
            DirEntries::new(current).visit(|entry| {
                let is_dir = entry.kind.is_directory() || entry.kind.is_unknown();
                if is_dir && entry.inode == child as u64 {
                    found = Some(entry.name);
                    true
                } else {
                    false
                }
            })?;
            names.push(found.ok_or_else(|| unresolved(ResolveReason::NotLinked))?);
            tracing::trace!(dir_fd, inode = current_inode, name = ?names.last(), "walked up one level");

            if let Some(root) = find_root(&roots, current_inode) {
                let mut result = root.as_bytes().to_vec();
                for name in names.iter().rev() {
                    result.push(b'/');
                    result.extend_from_slice(name.as_bytes());
                }
                let result = normalize(OsStr::from_bytes(&result));
                tracing::debug!(dir_fd, ?result, "resolved directory location");
                return Ok(result);
            }

            child = current_inode;
            current = parent;
        }
    }
}

fn identity(fd: c_int) -> std::result::Result<(dev_t, ino_t), OsError> {
    let mut raw: MaybeUninit<libc::stat> = MaybeUninit::uninit();
    // SAFETY: raw is valid for writes of a full stat structure.
    syscall::retry(|| cvt(unsafe { libc::fstat(fd, raw.as_mut_ptr()) }))
        .map_err(|code| OsError::new("fstat", args!(fd), code))?;
    // SAFETY: fstat succeeded, so raw is initialized.
    let raw = unsafe { raw.assume_init() };
    Ok((raw.st_dev, raw.st_ino))
}

/// Pairs every mount point of `device` with the inode of its root, ordered by inode. Ties are
/// broken by pathname so the order is total.
fn mount_roots(
    mounts: &[Mount],
    device: dev_t,
) -> std::result::Result<Vec<(ino_t, OsString)>, OsError> {
    let mut roots = Vec::new();
    for mount in mounts.iter().filter(|mount| mount.device == device) {
        let pathname = syscall::c_path("fstatat", &mount.path)?;
        let mut raw: MaybeUninit<libc::stat> = MaybeUninit::uninit();
        // SAFETY: pathname is null-terminated and raw is valid for writes of a stat structure.
        let rv = syscall::retry(|| cvt(unsafe {
            libc::fstatat(libc::AT_FDCWD, pathname.as_ptr(), raw.as_mut_ptr(), libc::AT_SYMLINK_NOFOLLOW)
        }));
        match rv {
            Ok(_) => (),
            Err(libc::ENOENT | libc::EACCES) => {
                tracing::trace!(path = ?mount.path, "skipping unreachable mount point");
                continue;
            },
            Err(code) => return Err(OsError::new("fstatat", args!(mount.path), code)),
        }
        // SAFETY: fstatat succeeded, so raw is initialized.
        let raw = unsafe { raw.assume_init() };
        if raw.st_dev != device {
            tracing::trace!(path = ?mount.path, "skipping shadowed mount point");
            continue;
        }
        roots.push((raw.st_ino, mount.path.clone()));
    }
    roots.sort_by(|(l_ino, l_path), (r_ino, r_path)| {
        (l_ino, l_path.len(), l_path).cmp(&(r_ino, r_path.len(), r_path))
    });
    Ok(roots)
}

fn find_root(roots: &[(ino_t, OsString)], inode: ino_t) -> Option<&OsStr> {
    let index = roots.partition_point(|(root, _)| *root < inode);
    match roots.get(index) {
        Some((root, path)) if *root == inode => Some(path.as_os_str()),
        _ => None,
    }
}

impl Debug for Origin {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Origin")
            .field("context", &self.0.context)
            .field("handle", &self.0.handle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::fs::Error;

    fn canonical(dir: &std::path::Path) -> OsString {
        fs::canonicalize(dir).expect("directory should canonicalize").into_os_string()
    }

    #[test]
    fn test_working_location() {
        let context = Context::new("origin");
        assert_eq!(
            context.working().location().expect("working directory should resolve"),
            std::env::current_dir().expect("std should read the working directory").into_os_string()
        );
    }

    #[test]
    fn test_resolved_location_matches_canonical_path() {
        let temp = TempDir::new().expect("temp dir should be created");
        fs::create_dir_all(temp.path().join("a/b c/d")).expect("nested dirs should be created");

        let context = Context::new("origin");
        let base = context.resolved(temp.path(), true).expect("temp dir should resolve");
        assert_eq!(base.location().expect("temp dir should locate"), canonical(temp.path()));

        let nested = base.path("a/b c/./d").resolved().expect("nested dir should resolve");
        assert_eq!(
            nested.location().expect("nested dir should locate"),
            canonical(&temp.path().join("a/b c/d")),
            "Walking up from a nested directory should recover every name."
        );
    }

    #[test]
    fn test_location_follows_renames() {
        let temp = TempDir::new().expect("temp dir should be created");
        fs::create_dir(temp.path().join("before")).expect("dir should be created");

        let context = Context::new("origin");
        let origin = context.resolved(temp.path().join("before"), true).expect("dir should resolve");
        fs::rename(temp.path().join("before"), temp.path().join("after")).expect("dir should be renamed");

        assert_eq!(
            origin.location().expect("renamed dir should locate"),
            canonical(&temp.path().join("after")),
            "Location is derived from the live descriptor, not the name it was opened with."
        );
    }

    #[test]
    fn test_removed_directory_fails_to_resolve() {
        let temp = TempDir::new().expect("temp dir should be created");
        fs::create_dir(temp.path().join("gone")).expect("dir should be created");

        let context = Context::new("origin");
        let origin = context.resolved(temp.path().join("gone"), true).expect("dir should resolve");
        fs::remove_dir(temp.path().join("gone")).expect("dir should be removed");

        let err = origin.location().expect_err("a removed directory has no location");
        assert!(
            matches!(err, Error::Resolve(ResolveError { reason: ResolveReason::NotLinked, .. })),
            "The walk should report the directory as unlinked: {:?}",
            err
        );
    }

    #[test]
    fn test_root_is_mount_root() {
        let context = Context::new("origin");
        let root = context.resolved("/", true).expect("root should resolve");
        assert_eq!(root.location().expect("root should locate"), OsStr::new("/"));
    }

    #[test]
    fn test_find_root_lower_bound() {
        let roots = vec![
            (2, OsString::from("/")),
            (5, OsString::from("/a")),
            (5, OsString::from("/bb")),
            (9, OsString::from("/c")),
        ];
        assert_eq!(find_root(&roots, 5), Some(OsStr::new("/a")), "The shortest path wins ties.");
        assert_eq!(find_root(&roots, 2), Some(OsStr::new("/")));
        assert_eq!(find_root(&roots, 3), None);
        assert_eq!(find_root(&roots, 10), None);
    }
}
