//! User groups and membership levels.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::{ForumId, GroupId};
use crate::permissions::Permissions;

/// Membership level of a user inside one group.
///
/// Levels are ordered; an access check for level `L` passes when the user's
/// level is `>= L`. `Suspended` sorts below everything and never grants.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum GroupLevel {
    /// Member is suspended; the membership grants nothing.
    Suspended,
    /// Member applied but has not been approved yet.
    #[default]
    Unapproved,
    /// Regular, approved member.
    Approved,
    /// Group moderator (may approve and remove members).
    Moderator,
}

impl GroupLevel {
    /// Numeric wire value, kept compatible with stored membership rows
    /// (-1 suspended, 0 unapproved, 1 approved, 2 moderator).
    pub const fn as_i8(&self) -> i8 {
        match self {
            GroupLevel::Suspended => -1,
            GroupLevel::Unapproved => 0,
            GroupLevel::Approved => 1,
            GroupLevel::Moderator => 2,
        }
    }

    pub const fn from_i8(raw: i8) -> Option<GroupLevel> {
        match raw {
            -1 => Some(GroupLevel::Suspended),
            0 => Some(GroupLevel::Unapproved),
            1 => Some(GroupLevel::Approved),
            2 => Some(GroupLevel::Moderator),
            _ => None,
        }
    }
}

/// How a group accepts new members.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GroupOpenState {
    /// Members are added by moderators only.
    #[default]
    Closed,
    /// Anyone may join without approval.
    Open,
    /// Anyone may apply; a group moderator approves.
    Moderated,
}

/// A user group as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub group_id: GroupId,
    pub name: String,
    pub open: GroupOpenState,
    /// Per-forum permissions this group grants to its approved members.
    #[serde(default)]
    pub forum_permissions: BTreeMap<ForumId, Permissions>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(GroupLevel::Suspended < GroupLevel::Unapproved);
        assert!(GroupLevel::Unapproved < GroupLevel::Approved);
        assert!(GroupLevel::Approved < GroupLevel::Moderator);
    }

    #[test]
    fn level_check_is_at_least() {
        let required = GroupLevel::Approved;
        assert!(GroupLevel::Moderator >= required);
        assert!(GroupLevel::Approved >= required);
        assert!(!(GroupLevel::Unapproved >= required));
    }

    #[test]
    fn wire_values_round_trip() {
        for level in [
            GroupLevel::Suspended,
            GroupLevel::Unapproved,
            GroupLevel::Approved,
            GroupLevel::Moderator,
        ] {
            assert_eq!(GroupLevel::from_i8(level.as_i8()), Some(level));
        }
        assert_eq!(GroupLevel::from_i8(5), None);
    }
}
