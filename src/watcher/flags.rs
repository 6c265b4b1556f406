//! Coarse per-descriptor change flags.
//!
//! The bit values match the BSD `NOTE_*` vnode filter flags so a kernel
//! `fflags` word converts without a lookup table.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Changes the kernel reports for one open descriptor.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct VnodeFlags: u32 {
        /// The file was unlinked.
        const DELETE = 0x0000_0001;
        /// The contents changed.
        const WRITE = 0x0000_0002;
        /// The size grew.
        const EXTEND = 0x0000_0004;
        /// Attributes changed.
        const ATTRIB = 0x0000_0008;
        /// The link count changed.
        const LINK = 0x0000_0010;
        /// The file was renamed.
        const RENAME = 0x0000_0020;
        /// Access was revoked or the filesystem unmounted.
        const REVOKE = 0x0000_0040;
    }
}

impl VnodeFlags {
    /// Interest requested for every tracked file.
    pub const FILE_INTEREST: Self = Self::DELETE
        .union(Self::EXTEND)
        .union(Self::WRITE)
        .union(Self::ATTRIB)
        .union(Self::RENAME)
        .union(Self::LINK)
        .union(Self::REVOKE);

    /// Interest requested for the watched directory itself.
    pub const DIRECTORY_INTEREST: Self = Self::DELETE
        .union(Self::EXTEND)
        .union(Self::WRITE)
        .union(Self::ATTRIB);

    /// Flags that may mean directory membership changed.
    pub const STRUCTURAL: Self = Self::DELETE.union(Self::RENAME).union(Self::REVOKE);

    /// True when the event cannot be handled without a rescan.
    pub fn is_structural(self) -> bool {
        self.intersects(Self::STRUCTURAL)
    }
}

impl fmt::Display for VnodeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let mut first = true;
        for (name, _) in self.iter_names() {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_names() {
        let flags = VnodeFlags::WRITE | VnodeFlags::EXTEND;
        assert_eq!(flags.to_string(), "WRITE|EXTEND");
        assert_eq!(VnodeFlags::empty().to_string(), "NONE");
    }

    #[test]
    fn test_structural_classification() {
        assert!(VnodeFlags::RENAME.is_structural());
        assert!((VnodeFlags::DELETE | VnodeFlags::WRITE).is_structural());
        assert!(!(VnodeFlags::WRITE | VnodeFlags::ATTRIB).is_structural());
        assert!(!VnodeFlags::LINK.is_structural());
    }

    #[test]
    fn test_directory_interest_excludes_rename() {
        assert!(!VnodeFlags::DIRECTORY_INTEREST.contains(VnodeFlags::RENAME));
        assert!(VnodeFlags::FILE_INTEREST.contains(VnodeFlags::REVOKE));
    }
}
