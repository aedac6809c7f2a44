//! Capability-style access to the Linux filesystem.
//!
//! Every operation is anchored to an [`Origin`]: either the process's working directory, or a
//! directory descriptor resolved earlier. A [`Path`] is just an origin plus a pathname, so nothing
//! touches the filesystem until an operation is performed, and a resolved origin keeps referring
//! to the same directory however it is renamed or moved afterwards.
//!
//! All opens go through a [`Context`], which holds the flags (close-on-exec, non-blocking and so
//! on) applied to every descriptor it creates. Descriptors are owned by exactly one [`Handle`] and
//! are never duplicated behind the caller's back.
//!
//! # Errors
//! Failed calls produce an [`OsError`] naming the call, its arguments and the errno. Operations
//! that can fail in other ways return a union enum (like [`LockError`]), all of which convert into
//! the crate-wide [`Error`]. A descriptor that can't be closed, or a lock that can't be released,
//! aborts the process.
#![cfg(target_os = "linux")]

pub mod dir;
pub mod file;
pub mod path;

mod context;
mod error;
mod fatal;
mod handle;
mod kind;
mod mount;
mod object;
mod origin;
mod stats;
mod syscall;

pub use context::*;
pub use dir::{DirEntries, Directory, DirectoryEntry};
pub use error::*;
pub use file::{Advice, Channel, File, FileOptions, Lock};
pub use handle::*;
pub use kind::*;
pub use mount::{Mount, parse_mountinfo, unmangle};
pub use object::*;
pub use origin::*;
pub use path::{Path, normalize};
pub use stats::*;
