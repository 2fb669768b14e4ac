//! Value types exchanged with the storage layer.

use serde::{Deserialize, Serialize};

use tribune_core::{ForumId, Permissions, UserId};

/// Default permission masks of one forum.
///
/// These apply when a user holds no explicit permissions for the forum:
/// `public_permissions` for anonymous visitors, `registered_permissions` for
/// signed-in users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForumDefaults {
    pub forum_id: ForumId,
    pub public_permissions: Permissions,
    pub registered_permissions: Permissions,
}

/// Stored login material for one username.
///
/// Password hashes are salted PHC strings, so the store cannot compare them;
/// it hands the stored material to the authenticator, which verifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredentials {
    pub user_id: UserId,
    pub password: String,
    pub password_temp: Option<String>,
}

/// Partial user update for the trusted high-frequency write path.
///
/// Only fields that are `Some` are written. The whole patch must land
/// atomically within the user's row (two concurrent logins must not
/// interleave their session-identifier writes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFieldPatch {
    pub user_id: UserId,
    pub sessid_lt: Option<String>,
    pub sessid_st: Option<String>,
    pub sessid_st_timeout: Option<i64>,
    pub date_last_active: Option<i64>,
    pub last_active_forum: Option<ForumId>,
    pub posts: Option<i64>,
}

impl UserFieldPatch {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    /// True when the patch touches nothing beyond activity tracking.
    /// Activity-only patches skip cache invalidation (bounded staleness is
    /// acceptable for those fields).
    pub fn is_activity_only(&self) -> bool {
        self.sessid_lt.is_none()
            && self.sessid_st.is_none()
            && self.sessid_st_timeout.is_none()
            && self.posts.is_none()
    }

    /// True when no field is set at all.
    pub fn is_empty(&self) -> bool {
        self.is_activity_only() && self.date_last_active.is_none() && self.last_active_forum.is_none()
    }
}

/// Fields whose cached copies may go stale and get re-read on cache hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolatileField {
    DateLastActive,
    LastActiveForum,
    Posts,
}

/// All volatile fields, in the order cache freshening reads them.
pub const VOLATILE_FIELDS: [VolatileField; 3] = [
    VolatileField::DateLastActive,
    VolatileField::LastActiveForum,
    VolatileField::Posts,
];

/// Current values of the requested volatile fields for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VolatileValues {
    pub date_last_active: Option<i64>,
    pub last_active_forum: Option<ForumId>,
    pub posts: Option<i64>,
}

/// Selection for user listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserListFilter {
    All,
    Active,
    Inactive,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_only_patch_is_detected() {
        let mut patch = UserFieldPatch::new(UserId::new(3));
        patch.date_last_active = Some(1000);
        patch.last_active_forum = Some(ForumId::new(2));
        assert!(patch.is_activity_only());
        assert!(!patch.is_empty());

        patch.sessid_lt = Some("abc".to_owned());
        assert!(!patch.is_activity_only());
    }

    #[test]
    fn fresh_patch_is_empty() {
        assert!(UserFieldPatch::new(UserId::new(1)).is_empty());
    }
}
