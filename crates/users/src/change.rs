//! Partial user updates, as callers hand them to [`crate::UserRepo::save`].

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use tribune_core::{
    ApiError, ApiResult, EmailNotify, ForumId, JsonMap, Permissions, SiteSettings, UserActive,
    UserId, UserRecord,
};

/// Flags adjusting how a save treats its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Store the password fields exactly as given instead of hashing them.
    /// For trusted callers that already hold finished hashes (imports,
    /// password-reset flows re-submitting a stored temporary hash).
    pub raw_password: bool,
}

/// A set of field changes for one user.
///
/// `None` fields are left untouched on the stored record. `user_id` selects
/// the account to update; without it the save creates a new account.
///
/// Session identifiers are absent on purpose. Those travel through the raw
/// field patch ([`crate::UserRepo::save_raw`]), which skips the full-save
/// pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChange {
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    pub real_name: Option<String>,
    /// Explicit display name. Only honored when the installation runs with
    /// module-supplied display names; otherwise the save derives the name.
    pub display_name: Option<String>,
    pub email: Option<String>,
    /// Unconfirmed new address. An empty string clears it.
    pub email_temp: Option<String>,
    pub hide_email: Option<bool>,
    pub active: Option<UserActive>,
    pub admin: Option<bool>,
    /// Plaintext password (hashed on save), or a finished hash with
    /// [`SaveOptions::raw_password`]. An empty string stores the unusable
    /// sentinel.
    pub password: Option<String>,
    /// One-shot password for reset flows. An empty string clears it.
    pub password_temp: Option<String>,
    pub signature: Option<String>,
    pub posts: Option<i64>,
    pub date_added: Option<i64>,
    pub date_last_active: Option<i64>,
    pub last_active_forum: Option<ForumId>,
    pub threaded_list: Option<bool>,
    pub threaded_read: Option<bool>,
    pub hide_activity: Option<bool>,
    pub show_signature: Option<bool>,
    pub email_notify: Option<EmailNotify>,
    pub pm_email_notify: Option<bool>,
    pub tz_offset: Option<f32>,
    pub is_dst: Option<bool>,
    pub user_language: Option<String>,
    pub user_template: Option<String>,
    pub moderation_email: Option<bool>,
    pub moderator_data: Option<JsonMap>,
    pub settings_data: Option<JsonMap>,
    /// Direct per-forum permission grants, replaced wholesale when given.
    pub forum_permissions: Option<BTreeMap<ForumId, Permissions>>,
    /// Custom profile field values. Keys must be declared in
    /// [`SiteSettings::custom_profile_fields`]; a `null` value deletes the
    /// field from the profile.
    pub profile: JsonMap,
}

impl UserChange {
    /// Change set for creating a new account.
    pub fn new_user(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            email: Some(email.into()),
            ..Self::default()
        }
    }

    /// Change set addressing an existing account.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    /// Apply every field except the password pair onto `record`.
    ///
    /// String fields that identify the user are whitespace-trimmed. Custom
    /// profile values are validated against the declared fields and string
    /// values truncated to the declared maximum length.
    pub(crate) fn merge_into(
        &self,
        record: &mut UserRecord,
        settings: &SiteSettings,
    ) -> ApiResult<()> {
        if let Some(v) = &self.username {
            record.username = v.trim().to_owned();
        }
        if let Some(v) = &self.real_name {
            record.real_name = v.trim().to_owned();
        }
        if let Some(v) = &self.display_name {
            record.display_name = v.trim().to_owned();
        }
        if let Some(v) = &self.email {
            record.email = v.trim().to_owned();
        }
        if let Some(v) = &self.email_temp {
            let trimmed = v.trim();
            record.email_temp = (!trimmed.is_empty()).then(|| trimmed.to_owned());
        }
        if let Some(v) = self.hide_email {
            record.hide_email = v;
        }
        if let Some(v) = self.active {
            record.active = v;
        }
        if let Some(v) = self.admin {
            record.admin = v;
        }
        if let Some(v) = &self.signature {
            record.signature = v.clone();
        }
        if let Some(v) = self.posts {
            record.posts = v;
        }
        if let Some(v) = self.date_added {
            record.date_added = v;
        }
        if let Some(v) = self.date_last_active {
            record.date_last_active = v;
        }
        if let Some(v) = self.last_active_forum {
            record.last_active_forum = v;
        }
        if let Some(v) = self.threaded_list {
            record.threaded_list = v;
        }
        if let Some(v) = self.threaded_read {
            record.threaded_read = v;
        }
        if let Some(v) = self.hide_activity {
            record.hide_activity = v;
        }
        if let Some(v) = self.show_signature {
            record.show_signature = v;
        }
        if let Some(v) = self.email_notify {
            record.email_notify = v;
        }
        if let Some(v) = self.pm_email_notify {
            record.pm_email_notify = v;
        }
        if let Some(v) = self.tz_offset {
            record.tz_offset = v;
        }
        if let Some(v) = self.is_dst {
            record.is_dst = v;
        }
        if let Some(v) = &self.user_language {
            record.user_language = v.trim().to_owned();
        }
        if let Some(v) = &self.user_template {
            record.user_template = v.trim().to_owned();
        }
        if let Some(v) = self.moderation_email {
            record.moderation_email = v;
        }
        if let Some(v) = &self.moderator_data {
            record.moderator_data = v.clone();
        }
        if let Some(v) = &self.settings_data {
            record.settings_data = v.clone();
        }
        if let Some(v) = &self.forum_permissions {
            record.forum_permissions = v.clone();
        }

        for (name, value) in &self.profile {
            let Some(field) = settings.custom_profile_fields.get(name) else {
                return Err(ApiError::validation(format!(
                    "unknown custom profile field: {name}"
                )));
            };
            if value.is_null() {
                record.profile.remove(name);
                continue;
            }
            let stored = match value {
                JsonValue::String(s) => JsonValue::String(truncate_chars(s, field.max_length)),
                other => other.clone(),
            };
            record.profile.insert(name.clone(), stored);
        }

        Ok(())
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_owned()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tribune_core::CustomProfileField;

    fn settings_with_field(name: &str, max_length: usize) -> SiteSettings {
        let mut settings = SiteSettings::default();
        settings.custom_profile_fields.insert(
            name.to_owned(),
            CustomProfileField {
                id: 1,
                name: name.to_owned(),
                max_length,
            },
        );
        settings
    }

    #[test]
    fn identifying_fields_are_trimmed() {
        let mut change = UserChange::new_user("  alice ", " alice@example.net  ");
        change.real_name = Some(" Alice A. ".to_owned());

        let mut record = UserRecord::default();
        change.merge_into(&mut record, &SiteSettings::default()).unwrap();
        assert_eq!(record.username, "alice");
        assert_eq!(record.email, "alice@example.net");
        assert_eq!(record.real_name, "Alice A.");
    }

    #[test]
    fn empty_email_temp_clears_the_stored_value() {
        let mut record = UserRecord {
            email_temp: Some("new@example.net".to_owned()),
            ..UserRecord::default()
        };

        let mut change = UserChange::for_user(UserId::new(1));
        change.email_temp = Some("  ".to_owned());
        change.merge_into(&mut record, &SiteSettings::default()).unwrap();
        assert_eq!(record.email_temp, None);
    }

    #[test]
    fn unknown_profile_field_is_rejected() {
        let mut change = UserChange::for_user(UserId::new(1));
        change.profile.insert("favorite_color".to_owned(), json!("teal"));

        let mut record = UserRecord::default();
        let err = change
            .merge_into(&mut record, &SiteSettings::default())
            .unwrap_err();
        assert!(err.to_string().contains("favorite_color"));
    }

    #[test]
    fn profile_strings_are_truncated_and_null_deletes() {
        let settings = settings_with_field("motto", 5);

        let mut record = UserRecord::default();
        let mut change = UserChange::for_user(UserId::new(1));
        change.profile.insert("motto".to_owned(), json!("carpe diem"));
        change.merge_into(&mut record, &settings).unwrap();
        assert_eq!(record.profile.get("motto"), Some(&json!("carpe")));

        let mut clear = UserChange::for_user(UserId::new(1));
        clear.profile.insert("motto".to_owned(), JsonValue::Null);
        clear.merge_into(&mut record, &settings).unwrap();
        assert!(record.profile.is_empty());
    }

    #[test]
    fn untouched_fields_keep_their_values() {
        let mut record = UserRecord {
            username: "alice".to_owned(),
            posts: 41,
            hide_email: false,
            ..UserRecord::default()
        };

        let mut change = UserChange::for_user(UserId::new(1));
        change.posts = Some(42);
        change.merge_into(&mut record, &SiteSettings::default()).unwrap();
        assert_eq!(record.posts, 42);
        assert_eq!(record.username, "alice");
        assert!(!record.hide_email);
    }
}
