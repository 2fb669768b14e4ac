//! Per-forum permission bitmask.
//!
//! Permissions combine from two sources: group grants (for every group the
//! user is an approved member of) and direct per-user forum grants. Sources
//! accumulate with bitwise OR; a grant from one source is never taken away
//! by another. Administrators bypass the mask entirely at check time.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// What a user may do inside one forum.
    ///
    /// ```
    /// use tribune_core::Permissions;
    ///
    /// let perms = Permissions::READ | Permissions::REPLY;
    /// assert!(perms.grants(Permissions::READ));
    /// assert!(!perms.grants(Permissions::READ | Permissions::EDIT));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Permissions: u32 {
        /// Read messages.
        const READ              = 0x0000_0001;
        /// Reply to existing threads.
        const REPLY             = 0x0000_0002;
        /// Edit own messages after posting.
        const EDIT              = 0x0000_0004;
        /// Start new threads.
        const NEW_TOPIC         = 0x0000_0008;
        // 0x10 is historically unassigned; keep it reserved so stored masks
        // from older installations keep their meaning.
        /// Attach files to messages.
        const ATTACH            = 0x0000_0020;
        /// Moderate messages (approve, delete, move).
        const MODERATE_MESSAGES = 0x0000_0040;
        /// Moderate users (approve signups, edit profiles).
        const MODERATE_USERS    = 0x0000_0080;
    }
}

impl Permissions {
    /// True when every bit of `mask` is present.
    pub fn grants(&self, mask: Permissions) -> bool {
        self.contains(mask)
    }

    /// Names of the flags that are set, for diagnostics and logging.
    pub fn names(&self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_requires_all_bits() {
        let perms = Permissions::READ | Permissions::REPLY;
        assert!(perms.grants(Permissions::READ));
        assert!(perms.grants(Permissions::READ | Permissions::REPLY));
        assert!(!perms.grants(Permissions::READ | Permissions::NEW_TOPIC));
    }

    #[test]
    fn empty_mask_is_always_granted() {
        assert!(Permissions::empty().grants(Permissions::empty()));
        assert!(Permissions::READ.grants(Permissions::empty()));
    }

    #[test]
    fn sources_accumulate_with_or() {
        let from_group = Permissions::READ;
        let direct = Permissions::REPLY;
        let effective = from_group | direct;
        assert!(effective.grants(Permissions::READ | Permissions::REPLY));
    }

    #[test]
    fn reserved_bit_survives_round_trip() {
        // 0x10 is not a named flag but must not be silently dropped for
        // masks persisted by older installations.
        let raw = 0x31u32;
        let perms = Permissions::from_bits_retain(raw);
        assert_eq!(perms.bits(), raw);
        assert!(perms.grants(Permissions::READ | Permissions::ATTACH));
    }

    #[test]
    fn names_reports_set_flags() {
        let perms = Permissions::READ | Permissions::MODERATE_USERS;
        let names = perms.names();
        assert!(names.contains(&"READ"));
        assert!(names.contains(&"MODERATE_USERS"));
        assert_eq!(names.len(), 2);
    }
}
