//! A filesystem layer for Linux where every path is relative to a directory you already hold.
//!
//! # Purpose
//! Pathname-based APIs re-walk the whole path on every call, so anything that renames or replaces a
//! directory in between calls changes what the next one operates on. This crate anchors pathnames
//! to open directory descriptors instead, and gives every resource a single owner that closes it.
//! The mount table is used to recover a descriptor's absolute location, rather than trusting
//! `/proc/self/fd` links.
//!
//! # Error Handling
//! Errors are strongly typed: leaf structs implementing [`Error`](std::error::Error) and enums that
//! union the ones an operation can actually produce, with conversions into the crate-wide
//! [`fs::Error`]. Failed OS calls keep the call's name and a rendering of its arguments, because an
//! errno on its own rarely says enough.
//!
//! Conditions that leave the descriptor table in an unknown state, like a failed `close`, abort the
//! process instead of being returned.
//!
//! # Dependencies
//! The [`fs`] module relies on `libc` for its thin syscall wrappers. Logging goes through `tracing`
//! and is silent unless the application installs a subscriber. This crate also depends on some
//! derive macros because they're helpful and remove the need for some very repetitive programming.
#![warn(clippy::missing_safety_doc)]
#![warn(clippy::undocumented_unsafe_blocks)]
#![warn(clippy::missing_panics_doc)]
#![warn(clippy::unwrap_used)]
#![allow(clippy::module_inception)]

#[cfg(feature = "fs")]
pub mod fs;

#[cfg(feature = "fs")]
pub(crate) mod util;
