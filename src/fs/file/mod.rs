//! Regular files and the advisory locks and splice channels attached to them.
//!
//! A [`File`] is opened from a [`Path`](crate::fs::Path) using declarative [`FileOptions`]. All
//! reads and writes take an explicit offset, there is no cursor to seek.

mod channel;
mod file;
mod lock;
mod options;
mod tests;

pub use channel::*;
pub use file::*;
pub use lock::*;
pub use options::*;
