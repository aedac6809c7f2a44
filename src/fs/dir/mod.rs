//! Open directories and the scans over their entries.
//!
//! Scans read raw `getdents64` records, so no entry is ever `stat`ed. An entry's [`Kind`] is
//! whatever the filesystem recorded, which may be [`Kind::Unknown`](crate::fs::Kind::Unknown).
//!
//! [`Kind`]: crate::fs::Kind

mod dir;
mod dir_entry;

pub use dir::*;
pub use dir_entry::*;
