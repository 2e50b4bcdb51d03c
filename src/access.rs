//! Read/write access capability sets for media transports.
//!
//! An [`AccessType`] is the set of channel capabilities a client requests on
//! `Acquire` or holds as an owner. The wire form is a string over `{"r", "w",
//! "rw"}`; any character other than `r` and `w` is ignored, so an empty or
//! unrecognized string parses to the empty set (which `Acquire` rejects).

/// The read/write capability set requested or held on a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, defmt::Format)]
pub struct AccessType {
    read: bool,
    write: bool,
}

impl AccessType {
    /// Read-only access
    pub const READ: Self = Self {
        read: true,
        write: false,
    };

    /// Write-only access
    pub const WRITE: Self = Self {
        read: false,
        write: true,
    };

    /// Read and write access
    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
    };

    /// Parse an access-type string; unknown characters are ignored
    #[must_use]
    pub fn parse(accesstype: &str) -> Self {
        Self {
            read: accesstype.contains('r'),
            write: accesstype.contains('w'),
        }
    }

    /// True if neither read nor write is requested
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.read && !self.write
    }

    /// True if read access is part of this set
    #[must_use]
    pub const fn read(&self) -> bool {
        self.read
    }

    /// True if write access is part of this set
    #[must_use]
    pub const fn write(&self) -> bool {
        self.write
    }

    /// True if every capability in `other` is also in this set
    #[must_use]
    pub const fn contains(&self, other: Self) -> bool {
        (self.read || !other.read) && (self.write || !other.write)
    }

    /// The capabilities of this set that are not in `other`
    #[must_use]
    pub const fn remove(&self, other: Self) -> Self {
        Self {
            read: self.read && !other.read,
            write: self.write && !other.write,
        }
    }

    /// Canonical string form (`""`, `"r"`, `"w"` or `"rw"`)
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match (self.read, self.write) {
            (true, true) => "rw",
            (true, false) => "r",
            (false, true) => "w",
            (false, false) => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_recognizes_read_and_write() {
        assert_eq!(AccessType::parse("r"), AccessType::READ);
        assert_eq!(AccessType::parse("w"), AccessType::WRITE);
        assert_eq!(AccessType::parse("rw"), AccessType::READ_WRITE);
        assert_eq!(AccessType::parse("wr"), AccessType::READ_WRITE);
    }

    #[test]
    fn parse_ignores_unknown_characters() {
        assert!(AccessType::parse("").is_empty());
        assert!(AccessType::parse("xyz").is_empty());
        assert_eq!(AccessType::parse("rx"), AccessType::READ);
    }

    #[test]
    fn contains_is_superset() {
        assert!(AccessType::READ_WRITE.contains(AccessType::READ));
        assert!(AccessType::READ_WRITE.contains(AccessType::WRITE));
        assert!(AccessType::READ.contains(AccessType::READ));
        assert!(!AccessType::READ.contains(AccessType::WRITE));
        assert!(!AccessType::WRITE.contains(AccessType::READ_WRITE));
        // The empty set is a subset of everything.
        assert!(AccessType::READ.contains(AccessType::default()));
    }

    #[test]
    fn remove_clears_matching_capabilities() {
        assert_eq!(
            AccessType::READ_WRITE.remove(AccessType::READ),
            AccessType::WRITE
        );
        assert_eq!(
            AccessType::READ_WRITE.remove(AccessType::WRITE),
            AccessType::READ
        );
        assert!(AccessType::READ.remove(AccessType::READ).is_empty());
        assert_eq!(AccessType::READ.remove(AccessType::WRITE), AccessType::READ);
    }

    #[test]
    fn canonical_string_form() {
        assert_eq!(AccessType::READ.as_str(), "r");
        assert_eq!(AccessType::WRITE.as_str(), "w");
        assert_eq!(AccessType::READ_WRITE.as_str(), "rw");
        assert_eq!(AccessType::default().as_str(), "");
    }
}
