use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::{OsStrExt, OsStringExt};

use derive_more::IsVariant;

#[derive(Debug, Clone, Copy, IsVariant)]
enum Seq {
    Slash,
    SlashDot,
    Other,
}

/// Drops empty and `.` segments from a pathname and rejoins the rest with single separators.
///
/// This is purely lexical: `..` segments are kept as they are, because resolving them requires
/// knowing where symlinks lead. Absolute input stays absolute, and an empty result becomes `.` or
/// `/` respectively.
pub fn normalize(value: &OsStr) -> OsString {
    let bytes = value.as_bytes();
    let absolute = bytes.first() == Some(&b'/');
    let mut last_seq = Seq::Slash;
    let mut valid = Vec::with_capacity(bytes.len() + 1);

    if absolute {
        valid.push(b'/');
    }

    // Copying byte by byte keeps this O(n), rather than shifting the buffer for each removal.
    for ch in bytes.iter().copied() {
        match (ch, last_seq) {
            (b'/', Seq::Slash) => (),
            (b'/', Seq::SlashDot) => {
                last_seq = Seq::Slash;
            },
            (b'/', Seq::Other) => {
                last_seq = Seq::Slash;
                valid.push(ch);
            },
            (b'.', Seq::Slash) => {
                last_seq = Seq::SlashDot;
            },
            (_, Seq::Slash) => {
                last_seq = Seq::Other;
                valid.push(ch);
            },
            (_, Seq::SlashDot) => {
                last_seq = Seq::Other;
                valid.push(b'.');
                valid.push(ch);
            },
            (_, Seq::Other) => {
                valid.push(ch);
            },
        }
    }

    if !last_seq.is_other() && valid.len() > 1 && valid.last() == Some(&b'/') {
        valid.pop();
    }
    if valid.is_empty() {
        valid.push(b'.');
    }

    OsString::from_vec(valid)
}

/// Appends `name` to `base` with a separator and normalizes the result.
pub(crate) fn join(base: &OsStr, name: &OsStr) -> OsString {
    let mut joined = Vec::with_capacity(base.len() + name.len() + 1);
    joined.extend_from_slice(base.as_bytes());
    joined.push(b'/');
    joined.extend_from_slice(name.as_bytes());
    normalize(OsStr::from_bytes(&joined))
}
