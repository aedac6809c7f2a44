use std::fmt::{self, Display, Formatter};
use std::io;

use derive_more::{Display, Error, From, IsVariant};
use libc::c_int;

/// A failed OS call. Carries the name of the call, a rendering of the arguments it was given and
/// the captured errno.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsError {
    pub(crate) op: &'static str,
    pub(crate) args: String,
    pub(crate) code: c_int,
}

impl OsError {
    pub(crate) const fn new(op: &'static str, args: String, code: c_int) -> OsError {
        OsError { op, args, code }
    }

    pub const fn op(&self) -> &'static str {
        self.op
    }

    pub fn args(&self) -> &str {
        &self.args
    }

    pub const fn code(&self) -> c_int {
        self.code
    }

    pub fn kind(&self) -> io::ErrorKind {
        io::Error::from_raw_os_error(self.code).kind()
    }
}

impl Display for OsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) failed: {}", self.op, self.args, io::Error::from_raw_os_error(self.code))
    }
}

impl std::error::Error for OsError {}

impl From<OsError> for io::Error {
    fn from(value: OsError) -> Self {
        io::Error::new(value.kind(), value)
    }
}

#[derive(Debug, Display, Clone, PartialEq, Eq, Error)]
#[display("descriptor {fd} is already locked")]
pub struct LockedError {
    pub fd: c_int,
}

#[derive(Debug, Display, Clone, PartialEq, Eq, Error)]
#[display("malformed escape sequence in pathname {pathname:?}")]
pub struct DecodeError {
    pub pathname: String,
}

#[derive(Debug, Display, Clone, PartialEq, Eq, Error)]
#[display("malformed mount table line {line:?}")]
pub struct MountInfoError {
    pub line: String,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum ResolveReason {
    #[display("directory is not linked into its parent")]
    NotLinked,
    #[display("no mount point found above directory")]
    NoMount,
}

#[derive(Debug, Display, Clone, PartialEq, Eq, Error)]
#[display("unable to resolve location of descriptor {fd}: {reason}")]
pub struct ResolveError {
    pub fd: c_int,
    pub reason: ResolveReason,
}

#[derive(Debug, Display, Clone, PartialEq, Eq, Error)]
#[display("unrecognised directory entry type: {_0}")]
pub struct BadKindError(#[error(not(source))] pub u8);

#[derive(Debug, Display, Clone, PartialEq, Eq, From, Error, IsVariant)]
pub enum LockError {
    Os(OsError),
    Locked(LockedError),
}

#[derive(Debug, Display, Clone, PartialEq, Eq, From, Error, IsVariant)]
pub enum ScanError {
    Os(OsError),
    BadKind(BadKindError),
}

#[derive(Debug, Display, Clone, PartialEq, Eq, From, Error, IsVariant)]
pub enum MountError {
    Os(OsError),
    MountInfo(MountInfoError),
    Decode(DecodeError),
}

/// Every non-fatal condition this crate can report.
#[derive(Debug, Display, Clone, PartialEq, Eq, From, Error, IsVariant)]
pub enum Error {
    Os(OsError),
    Locked(LockedError),
    Decode(DecodeError),
    MountInfo(MountInfoError),
    Resolve(ResolveError),
    BadKind(BadKindError),
}

impl From<LockError> for Error {
    fn from(value: LockError) -> Self {
        match value {
            LockError::Os(e) => e.into(),
            LockError::Locked(e) => e.into(),
        }
    }
}

impl From<ScanError> for Error {
    fn from(value: ScanError) -> Self {
        match value {
            ScanError::Os(e) => e.into(),
            ScanError::BadKind(e) => e.into(),
        }
    }
}

impl From<MountError> for Error {
    fn from(value: MountError) -> Self {
        match value {
            MountError::Os(e) => e.into(),
            MountError::MountInfo(e) => e.into(),
            MountError::Decode(e) => e.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
