use libc::{
    O_APPEND, O_CREAT, O_EXCL, O_RDONLY, O_RDWR, O_TMPFILE, O_TRUNC, O_WRONLY, S_IRGRP, S_IROTH,
    S_IRUSR, S_IWGRP, S_IWOTH, S_IWUSR, S_IXGRP, S_IXOTH, S_IXUSR, c_int, mode_t,
};

bitflags::bitflags! {
    /// Declarative options for opening a [`File`](crate::fs::File). Access flags decide the
    /// access mode, the permission flags only matter when the open creates a file.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FileOptions: u16 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const APPEND = 1 << 2;
        const CREATE = 1 << 3;
        /// Fail if the file already exists. Only meaningful with `CREATE`.
        const EXCLUSIVE = 1 << 4;
        /// Create an unnamed file in the directory at the path. It can be linked in later with
        /// [`File::linkto`](crate::fs::File::linkto).
        const TMPFILE = 1 << 5;
        const TRUNCATE = 1 << 6;
        const EXECUTABLE = 1 << 7;
        /// Grant the group the same access as the owner.
        const GROUP = 1 << 8;
        /// Grant everyone else the same access as the owner.
        const OTHERS = 1 << 9;
    }
}

impl FileOptions {
    pub const fn open_flags(self) -> c_int {
        let mut flags = match (self.contains(Self::READ), self.contains(Self::WRITE)) {
            (true, true) => O_RDWR,
            (false, true) => O_WRONLY,
            _ => O_RDONLY,
        };
        if self.contains(Self::APPEND) {
            flags |= O_APPEND;
        }
        if self.contains(Self::CREATE) {
            flags |= O_CREAT;
        }
        if self.contains(Self::EXCLUSIVE) {
            flags |= O_EXCL;
        }
        if self.contains(Self::TMPFILE) {
            flags |= O_TMPFILE;
        }
        if self.contains(Self::TRUNCATE) {
            flags |= O_TRUNC;
        }
        flags
    }

    /// The permissions given to a newly created file, before the umask is applied.
    pub const fn creation_mode(self) -> mode_t {
        let executable = self.contains(Self::EXECUTABLE);
        let mut mode = S_IRUSR | S_IWUSR;
        if executable {
            mode |= S_IXUSR;
        }
        if self.contains(Self::GROUP) {
            mode |= S_IRGRP | S_IWGRP;
            if executable {
                mode |= S_IXGRP;
            }
        }
        if self.contains(Self::OTHERS) {
            mode |= S_IROTH | S_IWOTH;
            if executable {
                mode |= S_IXOTH;
            }
        }
        mode
    }
}
