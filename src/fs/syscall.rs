use std::ffi::{CString, OsStr, OsString};
use std::io;
use std::ops::RangeInclusive;
use std::os::unix::ffi::{OsStrExt, OsStringExt};

use libc::{c_int, c_long, c_void};

use crate::fs::OsError;

/// Buffer sizes tried by growing-buffer queries, as powers of two (256 B up to 64 KiB).
pub(crate) const GROW_SHIFTS: RangeInclusive<u32> = 8..=16;

/// Renders each argument with [`Debug`](std::fmt::Debug) and joins them for an [`OsError`].
macro_rules! args {
    ($($arg:expr),* $(,)?) => {{
        let parts: ::std::vec::Vec<::std::string::String> = ::std::vec![
            $(::std::format!("{:?}", $arg)),*
        ];
        parts.join(", ")
    }};
}

pub(crate) use args;

pub(crate) fn err_no() -> c_int {
    io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO)
}

/// Turns the usual `-1 and errno` convention into a [`Result`] carrying the errno.
pub(crate) fn cvt<T: PartialOrd + Default>(rv: T) -> Result<T, c_int> {
    if rv < T::default() {
        Err(err_no())
    } else {
        Ok(rv)
    }
}

/// Repeats `call` for as long as it fails with `EINTR`.
pub(crate) fn retry<T>(mut call: impl FnMut() -> Result<T, c_int>) -> Result<T, c_int> {
    loop {
        match call() {
            Err(libc::EINTR) => continue,
            other => return other,
        }
    }
}

pub(crate) fn c_path(op: &'static str, pathname: &OsStr) -> Result<CString, OsError> {
    CString::new(pathname.as_bytes()).map_err(|_| OsError::new(op, args!(pathname), libc::EINVAL))
}

pub(crate) fn getcwd() -> Result<OsString, OsError> {
    for shift in GROW_SHIFTS {
        let mut buf = vec![0_u8; 1 << shift];
        // SAFETY: getcwd writes at most buf.len() bytes, including the terminating null.
        if !unsafe { libc::getcwd(buf.as_mut_ptr().cast(), buf.len()) }.is_null() {
            let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
            buf.truncate(len);
            return Ok(OsString::from_vec(buf));
        }
        match err_no() {
            libc::ERANGE => continue,
            code => return Err(OsError::new("getcwd", args!(buf.len()), code)),
        }
    }
    Err(OsError::new("getcwd", args!(1_usize << GROW_SHIFTS.end()), libc::ERANGE))
}

pub(crate) unsafe fn getdents(fd: c_int, dirp: *mut c_void, bytes: usize) -> c_long {
    unsafe { libc::syscall(libc::SYS_getdents64, fd, dirp, bytes) }
}
