//! Parsing of the kernel's mount table, as found in `/proc/self/mountinfo`.

use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;

use libc::dev_t;

use crate::fs::{Context, DecodeError, File, FileOptions, MountError, MountInfoError};

pub(crate) const MOUNTINFO: &str = "/proc/self/mountinfo";

/// A single mount point, identified by the device it exposes and where it is mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub device: dev_t,
    pub path: OsString,
}

/// Reads a fresh snapshot of the mount table, using `context` to open it.
pub(crate) fn find_mounts(context: &Context) -> Result<Vec<Mount>, MountError> {
    let file = File::open(&context.working().path(MOUNTINFO), FileOptions::READ)?;
    parse_mountinfo(&file.read_to_end()?)
}

/// Parses records of the form `<id> <parent-id> <major>:<minor> <root> <mount-point> ...`. Only
/// the device and the mount point are kept, the remaining fields are ignored.
pub fn parse_mountinfo(content: &[u8]) -> Result<Vec<Mount>, MountError> {
    content
        .split(|&ch| ch == b'\n')
        .filter(|line| !line.is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &[u8]) -> Result<Mount, MountError> {
    let malformed = || MountInfoError {
        line: String::from_utf8_lossy(line).into_owned(),
    };
    let mut fields = line.split(|&ch| ch == b' ').filter(|field| !field.is_empty());

    let device = fields.nth(2).and_then(parse_device).ok_or_else(malformed)?;
    let path = fields.nth(1).ok_or_else(malformed)?;

    Ok(Mount {
        device,
        path: OsString::from_vec(unmangle(path)?),
    })
}

fn parse_device(field: &[u8]) -> Option<dev_t> {
    let field = std::str::from_utf8(field).ok()?;
    let (major, minor) = field.split_once(':')?;
    Some(libc::makedev(major.parse().ok()?, minor.parse().ok()?))
}

/// Decodes the octal escapes (`\NNN`) the kernel uses for special characters in proc pathnames.
/// Each escape is a single raw byte, so the first digit may only be `0-3`.
pub fn unmangle(pathname: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let malformed = || DecodeError {
        pathname: String::from_utf8_lossy(pathname).into_owned(),
    };
    let mut result = Vec::with_capacity(pathname.len());
    let mut bytes = pathname.iter().copied();

    while let Some(ch) = bytes.next() {
        if ch != b'\\' {
            result.push(ch);
            continue;
        }
        let mut value = 0_u8;
        for max in [b'3', b'7', b'7'] {
            match bytes.next() {
                Some(digit @ b'0'..=b'7') if digit <= max => value = (value << 3) | (digit - b'0'),
                _ => return Err(malformed()),
            }
        }
        result.push(value);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;

    use super::*;

    #[test]
    fn test_unmangle() {
        assert_eq!(unmangle(br"/mnt/my\040disk").as_deref(), Ok(&b"/mnt/my disk"[..]));
        assert_eq!(unmangle(br"/a\134b").as_deref(), Ok(&b"/a\\b"[..]));
        assert_eq!(unmangle(br"\377").as_deref(), Ok(&[0xff_u8][..]), "Escapes decode to raw bytes.");
        assert_eq!(unmangle(b"/plain").as_deref(), Ok(&b"/plain"[..]));
    }

    #[test]
    fn test_unmangle_rejects_malformed() {
        assert!(unmangle(br"/mnt/x\04").is_err(), "A truncated escape is an error.");
        assert!(unmangle(br"/mnt/\089").is_err(), "8 is not an octal digit.");
        assert!(unmangle(br"/mnt/\400").is_err(), "The first digit can't exceed 3.");
        assert!(unmangle(br"/mnt/\n").is_err(), "Backslash must start an octal escape.");
        assert!(unmangle(br"\").is_err());
    }

    #[test]
    fn test_parse_mountinfo() {
        let content = b"\
22 1 8:1 / / rw,relatime shared:1 - ext4 /dev/sda1 rw
36 22 0:32 / /mnt/my\\040disk rw - tmpfs tmpfs rw
40 22 8:1 /srv /srv/bind rw - ext4 /dev/sda1 rw
";
        let mounts = parse_mountinfo(content).expect("mountinfo should parse");
        assert_eq!(mounts.len(), 3);
        assert_eq!(mounts[0], Mount { device: libc::makedev(8, 1), path: OsString::from("/") });
        assert_eq!(mounts[1].device, libc::makedev(0, 32));
        assert_eq!(mounts[1].path, OsStr::new("/mnt/my disk"));
        assert_eq!(
            mounts[2].path,
            OsStr::new("/srv/bind"),
            "The mount point is the fifth field, not the mount root."
        );
    }

    #[test]
    fn test_parse_mountinfo_blank_and_unterminated_lines() {
        let content = b"\n22 1 8:1 / / rw - ext4 /dev/sda1 rw\n\n36 22 0:32 / /tmp rw - tmpfs tmpfs rw";
        let mounts = parse_mountinfo(content).expect("mountinfo should parse");
        assert_eq!(mounts.len(), 2, "Blank lines are skipped.");
        assert_eq!(
            mounts[1],
            Mount { device: libc::makedev(0, 32), path: OsString::from("/tmp") },
            "A final record without a newline is still parsed."
        );
    }

    #[test]
    fn test_parse_mountinfo_rejects_short_lines() {
        assert!(matches!(
            parse_mountinfo(b"22 1 8:1 /\n"),
            Err(MountError::MountInfo(_))
        ));
        assert!(matches!(
            parse_mountinfo(b"22 1 eight:one / /\n"),
            Err(MountError::MountInfo(_))
        ));
        assert!(matches!(
            parse_mountinfo(b"22 1 8:1 / /bad\\9\n"),
            Err(MountError::Decode(_))
        ));
    }

    #[test]
    fn test_find_mounts_includes_root() {
        let mounts = find_mounts(&Context::new("mounts")).expect("mount table should be readable");
        assert!(
            mounts.iter().any(|mount| mount.path == OsStr::new("/")),
            "The root of the mount namespace is always a mount point."
        );
    }
}
