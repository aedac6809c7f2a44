use std::fmt::{self, Debug, Formatter, LowerHex, Octal};

/// Writes its contents verbatim as [`Debug`] output, for fields that read better in another base.
pub struct DebugRaw(pub String);

impl DebugRaw {
    pub fn hex<T: LowerHex>(value: T) -> DebugRaw {
        DebugRaw(format!("0x{:x}", value))
    }

    pub fn octal<T: Octal>(value: T) -> DebugRaw {
        DebugRaw(format!("0o{:o}", value))
    }
}

impl Debug for DebugRaw {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_raw() {
        assert_eq!(format!("{:?}", DebugRaw::hex(0x80_000_i32)), "0x80000");
        assert_eq!(format!("{:?}", DebugRaw::octal(0o644_u32)), "0o644");
    }
}
