use derive_more::{Display, IsVariant};
use libc::mode_t;

use crate::fs::BadKindError;

/// The type of a filesystem entity, as reported by `stat` or a directory scan.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, IsVariant)]
pub enum Kind {
    #[display("block device")]
    BlockDevice,
    #[display("character device")]
    CharDevice,
    #[display("directory")]
    Directory,
    #[display("fifo")]
    Fifo,
    #[display("symlink")]
    Symlink,
    #[display("regular file")]
    Regular,
    #[display("socket")]
    Socket,
    /// The filesystem didn't report a type for a directory entry. A `stat` of the entry will.
    #[display("unknown")]
    Unknown,
}

use Kind::*;

impl Kind {
    #[inline(always)]
    pub(crate) const fn from_stat_mode(st_mode: mode_t) -> Kind {
        match st_mode & libc::S_IFMT {
            libc::S_IFBLK => BlockDevice,
            libc::S_IFCHR => CharDevice,
            libc::S_IFDIR => Directory,
            libc::S_IFIFO => Fifo,
            libc::S_IFLNK => Symlink,
            libc::S_IFREG => Regular,
            libc::S_IFSOCK => Socket,
            _ => Unknown,
        }
    }

    pub(crate) const fn from_dirent_type(d_type: u8) -> Result<Kind, BadKindError> {
        Ok(match d_type {
            libc::DT_BLK => BlockDevice,
            libc::DT_CHR => CharDevice,
            libc::DT_DIR => Directory,
            libc::DT_FIFO => Fifo,
            libc::DT_LNK => Symlink,
            libc::DT_REG => Regular,
            libc::DT_SOCK => Socket,
            libc::DT_UNKNOWN => Unknown,
            other => return Err(BadKindError(other)),
        })
    }
}
