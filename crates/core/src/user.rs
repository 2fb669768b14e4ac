//! The stored user record and its typed field values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::group::GroupLevel;
use crate::id::{ForumId, GroupId, UserId};
use crate::permissions::Permissions;

/// Free-form JSON maps (module settings, custom profile fields).
pub type JsonMap = BTreeMap<String, serde_json::Value>;

/// Stored hash sentinel for accounts without a usable password.
///
/// The value is not a valid PHC string, so password verification can never
/// succeed against it.
pub const PASSWORD_UNSET: &str = "*";

/// Account activation state.
///
/// Only `Active` accounts may authenticate or hold sessions. The pending
/// states describe which confirmation is still outstanding after signup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserActive {
    #[default]
    Inactive,
    Active,
    /// Waiting for both email confirmation and moderator approval.
    PendingBoth,
    /// Waiting for email confirmation.
    PendingEmail,
    /// Waiting for moderator approval.
    PendingModerator,
}

impl UserActive {
    pub const fn is_active(&self) -> bool {
        matches!(self, UserActive::Active)
    }
}

/// Mail notification mode for followed threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmailNotify {
    #[default]
    Off,
    On,
    /// Notification mails include the full message body.
    OnWithBody,
}

/// A user account as the storage layer hands it out.
///
/// Scalar fields are always populated. The membership and permission maps at
/// the bottom are filled on *detailed* fetches only and stay empty otherwise;
/// `effective_permissions` additionally stays empty for administrators, who
/// are granted everything at check time instead of at assembly time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: UserId,
    pub username: String,
    pub real_name: String,
    /// Name shown next to posts; derived or custom, see
    /// [`SiteSettings::custom_display_name`](crate::SiteSettings).
    pub display_name: String,
    pub email: String,
    pub email_temp: Option<String>,
    pub hide_email: bool,
    pub active: UserActive,
    pub admin: bool,

    /// PHC password hash, or [`PASSWORD_UNSET`].
    pub password: String,
    /// One-shot PHC hash, set by password-reset flows.
    pub password_temp: Option<String>,
    /// Long-term session identifier (32 hex chars, empty until first login).
    pub sessid_lt: String,
    /// Short-term session identifier, used with tight security only.
    pub sessid_st: String,
    /// Expiry of the short-term identifier (epoch seconds).
    pub sessid_st_timeout: i64,

    pub signature: String,
    pub posts: i64,
    pub date_added: i64,
    pub date_last_active: i64,
    pub last_active_forum: ForumId,
    pub threaded_list: bool,
    pub threaded_read: bool,
    pub hide_activity: bool,
    pub show_signature: bool,
    pub email_notify: EmailNotify,
    pub pm_email_notify: bool,
    pub tz_offset: f32,
    pub is_dst: bool,
    pub user_language: String,
    pub user_template: String,
    pub moderation_email: bool,

    /// Per-moderator bookkeeping, opaque to this layer.
    #[serde(default)]
    pub moderator_data: JsonMap,
    /// Per-user module settings, opaque to this layer.
    #[serde(default)]
    pub settings_data: JsonMap,
    /// Custom profile fields, keyed by field name.
    #[serde(default)]
    pub profile: JsonMap,

    /// Group memberships (detailed fetches only).
    #[serde(default)]
    pub group_memberships: BTreeMap<GroupId, GroupLevel>,
    /// Direct per-forum grants (detailed fetches only).
    #[serde(default)]
    pub forum_permissions: BTreeMap<ForumId, Permissions>,
    /// Merged group + direct permissions (detailed fetches, non-admins only).
    #[serde(default)]
    pub effective_permissions: BTreeMap<ForumId, Permissions>,
}

impl Default for UserRecord {
    fn default() -> Self {
        Self {
            user_id: UserId::ANONYMOUS,
            username: String::new(),
            real_name: String::new(),
            display_name: String::new(),
            email: String::new(),
            email_temp: None,
            hide_email: true,
            active: UserActive::Inactive,
            admin: false,
            password: PASSWORD_UNSET.to_owned(),
            password_temp: None,
            sessid_lt: String::new(),
            sessid_st: String::new(),
            sessid_st_timeout: 0,
            signature: String::new(),
            posts: 0,
            date_added: 0,
            date_last_active: 0,
            last_active_forum: ForumId::NONE,
            threaded_list: false,
            threaded_read: false,
            hide_activity: false,
            show_signature: false,
            email_notify: EmailNotify::Off,
            pm_email_notify: true,
            tz_offset: 0.0,
            is_dst: false,
            user_language: String::new(),
            user_template: String::new(),
            moderation_email: true,
            moderator_data: JsonMap::new(),
            settings_data: JsonMap::new(),
            profile: JsonMap::new(),
            group_memberships: BTreeMap::new(),
            forum_permissions: BTreeMap::new(),
            effective_permissions: BTreeMap::new(),
        }
    }
}

impl UserRecord {
    /// The record installed in a request context while nobody is signed in.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_anonymous()
    }

    /// Effective permission mask for one forum, without admin bypass or
    /// forum-default fallback (those live in the access-control layer).
    pub fn permissions_for(&self, forum: ForumId) -> Option<Permissions> {
        self.effective_permissions.get(&forum).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_record_has_reserved_id() {
        let anon = UserRecord::anonymous();
        assert!(anon.is_anonymous());
        assert_eq!(anon.user_id, UserId::ANONYMOUS);
        assert!(!anon.active.is_active());
    }

    #[test]
    fn default_password_is_the_unusable_sentinel() {
        assert_eq!(UserRecord::default().password, PASSWORD_UNSET);
    }

    #[test]
    fn permissions_for_reads_the_merged_map_only() {
        let mut user = UserRecord::default();
        let forum = ForumId::new(4);
        user.forum_permissions.insert(forum, Permissions::READ);
        assert_eq!(user.permissions_for(forum), None);

        user.effective_permissions
            .insert(forum, Permissions::READ | Permissions::REPLY);
        assert_eq!(
            user.permissions_for(forum),
            Some(Permissions::READ | Permissions::REPLY)
        );
    }
}
