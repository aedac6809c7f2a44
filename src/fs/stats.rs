use libc::{dev_t, gid_t, mode_t, uid_t};

use crate::fs::Kind;

/// Status information about a filesystem entity, from `stat` or one of its variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub size: i64,            // st_size
    pub kind: Kind,           // st_mode
    pub mode: mode_t,         // st_mode, including the type bits
    pub uid: uid_t,           // st_uid
    pub gid: gid_t,           // st_gid
    pub device: dev_t,        // st_dev
    pub rdev: dev_t,          // st_rdev
    pub accessed: (i64, i64), // st_atime, st_atime_nsec
    pub modified: (i64, i64), // st_mtime, st_mtime_nsec
    pub changed: (i64, i64),  // st_ctime, st_ctime_nsec
    pub links: u64,           // st_nlink
    pub block_size: i64,      // st_blksize
    pub blocks: i64,          // st_blocks
    pub inode: u64,           // st_ino
}

impl Stats {
    #[allow(clippy::unnecessary_cast)]
    pub(crate) const fn from_stat(raw: libc::stat) -> Stats {
        Stats {
            size: raw.st_size as i64,
            kind: Kind::from_stat_mode(raw.st_mode),
            mode: raw.st_mode,
            uid: raw.st_uid,
            gid: raw.st_gid,
            device: raw.st_dev,
            rdev: raw.st_rdev,
            accessed: (raw.st_atime as i64, raw.st_atime_nsec as i64),
            modified: (raw.st_mtime as i64, raw.st_mtime_nsec as i64),
            changed: (raw.st_ctime as i64, raw.st_ctime_nsec as i64),
            links: raw.st_nlink as u64,
            block_size: raw.st_blksize as i64,
            blocks: raw.st_blocks as i64,
            inode: raw.st_ino as u64,
        }
    }

    /// The permission bits of [`Stats::mode`], without the type.
    pub const fn permissions(&self) -> mode_t {
        self.mode & 0o7777
    }

    pub fn is_kind(&self, kind: Kind) -> bool {
        self.kind == kind
    }

    pub const fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    pub const fn is_regular(&self) -> bool {
        self.kind.is_regular()
    }

    pub const fn is_symlink(&self) -> bool {
        self.kind.is_symlink()
    }
}

/// Filesystem-wide statistics, from `statvfs` or `fstatvfs`. Block counts are in units of
/// [`StatFs::fragment_size`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatFs {
    pub block_size: u64,       // f_bsize
    pub fragment_size: u64,    // f_frsize
    pub blocks: u64,           // f_blocks
    pub blocks_free: u64,      // f_bfree
    pub blocks_available: u64, // f_bavail, for unprivileged users
    pub files: u64,            // f_files
    pub files_free: u64,       // f_ffree
    pub files_available: u64,  // f_favail
    pub id: u64,               // f_fsid
    pub flags: u64,            // f_flag
    pub name_max: u64,         // f_namemax
}

impl StatFs {
    #[allow(clippy::unnecessary_cast)]
    pub(crate) const fn from_statvfs(raw: libc::statvfs) -> StatFs {
        StatFs {
            block_size: raw.f_bsize as u64,
            fragment_size: raw.f_frsize as u64,
            blocks: raw.f_blocks as u64,
            blocks_free: raw.f_bfree as u64,
            blocks_available: raw.f_bavail as u64,
            files: raw.f_files as u64,
            files_free: raw.f_ffree as u64,
            files_available: raw.f_favail as u64,
            id: raw.f_fsid as u64,
            flags: raw.f_flag as u64,
            name_max: raw.f_namemax as u64,
        }
    }

    pub const fn bytes_total(&self) -> u64 {
        self.blocks.saturating_mul(self.fragment_size)
    }

    pub const fn bytes_free(&self) -> u64 {
        self.blocks_free.saturating_mul(self.fragment_size)
    }

    pub const fn bytes_available(&self) -> u64 {
        self.blocks_available.saturating_mul(self.fragment_size)
    }

    pub const fn is_read_only(&self) -> bool {
        self.flags & libc::ST_RDONLY as u64 != 0
    }
}
