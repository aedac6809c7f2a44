use std::error::Error;
use std::process;

use derive_more::{Display, Error};
use libc::c_int;

/// Conditions that leave the descriptor or lock table in an unknown state. There is no way to
/// continue safely after one of these, a later open could silently reuse the descriptor number.
pub(crate) trait Fatal: Error {
    fn terminate(&self) -> ! {
        tracing::error!(error = %self, "fatal filesystem invariant violation");
        eprintln!("fatal: {}", self);
        process::abort()
    }
}

#[derive(Debug, Display, Error)]
#[display("failed to close descriptor {fd} (os error {code})")]
pub(crate) struct BadClosePanic {
    pub fd: c_int,
    pub code: c_int,
}
impl Fatal for BadClosePanic {}

#[derive(Debug, Display, Error)]
#[display("failed to release lock on descriptor {fd} (os error {code})")]
pub(crate) struct BadUnlockPanic {
    pub fd: c_int,
    pub code: c_int,
}
impl Fatal for BadUnlockPanic {}
