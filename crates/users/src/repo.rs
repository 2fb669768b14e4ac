//! The user repository.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use tribune_core::{
    ApiError, ApiResult, ForumId, Group, GroupId, GroupLevel, JsonMap, PASSWORD_UNSET,
    Permissions, RequestContext, SessionKind, SiteSettings, UserId, UserRecord, unix_now,
};
use tribune_store::{CACHE_USERS, Cache, Store, UserFieldPatch, UserListFilter, VOLATILE_FIELDS};

use crate::change::{SaveOptions, UserChange};
use crate::hooks::UserHooks;
use crate::names::{ANONYMOUS_DISPLAY_NAME, NameFormat, derived_display_name, escape_html, strip_tags};
use crate::password;

/// Selector for [`UserRepo::set_active_user`].
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveUser {
    /// Nobody is signed in for this request.
    Anonymous,
    /// Activate the account with this id.
    Id(UserId),
    /// Activate an already fetched record without hitting the store again.
    /// The caller is trusted to pass a detailed record.
    Record(UserRecord),
}

/// One row of a user listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserListEntry {
    pub user_id: UserId,
    pub username: String,
    pub display_name: String,
}

/// Every read and write of user accounts flows through the repository.
///
/// ## Caching
///
/// With `cache_users` enabled and a cache attached, detailed records are
/// cached after permission assembly and evicted on every non-volatile write.
/// The high-churn fields (activity timestamp, active forum, post count) are
/// re-read from the store on every cache hit, so writers of those fields may
/// skip eviction.
///
/// ## Permission assembly
///
/// Detailed fetches fill `effective_permissions`: per forum, the OR of the
/// masks granted by the user's approved group memberships and the user's
/// direct grants. Administrators skip assembly; every access check
/// short-circuits for them anyway.
///
/// ## Hooks
///
/// Modules can adjust fetched records, veto saves and filter listings
/// through [`UserHooks`].
pub struct UserRepo {
    store: Arc<dyn Store>,
    cache: Option<Arc<dyn Cache>>,
    settings: Arc<SiteSettings>,
    hooks: UserHooks,
}

impl UserRepo {
    pub fn new(store: Arc<dyn Store>, settings: Arc<SiteSettings>) -> Self {
        Self {
            store,
            cache: None,
            settings,
            hooks: UserHooks::default(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_hooks(mut self, hooks: UserHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn settings(&self) -> &SiteSettings {
        &self.settings
    }

    pub(crate) fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// The cache, when both attached and enabled by configuration.
    fn active_cache(&self) -> Option<&Arc<dyn Cache>> {
        if self.settings.cache_users {
            self.cache.as_ref()
        } else {
            None
        }
    }

    fn invalidate(&self, user_id: UserId) {
        if let Some(cache) = self.active_cache() {
            cache.remove(CACHE_USERS, &user_id.to_string());
        }
    }

    /// Fetch users by id. Unknown ids are omitted from the result map.
    ///
    /// Detailed fetches additionally carry memberships, direct grants and the
    /// assembled `effective_permissions`.
    pub fn get(&self, ids: &[UserId], detailed: bool) -> ApiResult<BTreeMap<UserId, UserRecord>> {
        let mut users: BTreeMap<UserId, UserRecord> = BTreeMap::new();

        if let Some(cache) = self.active_cache() {
            for &id in ids {
                if users.contains_key(&id) {
                    continue;
                }
                let Some(value) = cache.get(CACHE_USERS, &id.to_string()) else {
                    continue;
                };
                match serde_json::from_value::<UserRecord>(value) {
                    Ok(record) => {
                        users.insert(id, record);
                    }
                    Err(e) => {
                        tracing::warn!(user_id = %id, error = %e, "evicting undecodable cached user");
                        cache.remove(CACHE_USERS, &id.to_string());
                    }
                }
            }
            if !users.is_empty() {
                let cached_ids: Vec<UserId> = users.keys().copied().collect();
                let fresh = self.store.get_user_fields(&cached_ids, &VOLATILE_FIELDS)?;
                for (id, values) in fresh {
                    let Some(user) = users.get_mut(&id) else { continue };
                    if let Some(v) = values.date_last_active {
                        user.date_last_active = v;
                    }
                    if let Some(v) = values.last_active_forum {
                        user.last_active_forum = v;
                    }
                    if let Some(v) = values.posts {
                        user.posts = v;
                    }
                }
            }
        }

        let missing: Vec<UserId> = {
            let mut seen = BTreeSet::new();
            ids.iter()
                .copied()
                .filter(|id| !users.contains_key(id) && seen.insert(*id))
                .collect()
        };
        if self.active_cache().is_some() {
            tracing::debug!(hits = users.len(), misses = missing.len(), "user cache lookup");
        }

        if !missing.is_empty() {
            let mut fetched = self.store.get_users(&missing, detailed)?;
            if detailed {
                let group_ids: Vec<GroupId> = fetched
                    .values()
                    .flat_map(|u| u.group_memberships.keys().copied())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                let groups = if group_ids.is_empty() {
                    BTreeMap::new()
                } else {
                    self.store.groups(Some(&group_ids))?
                };
                for user in fetched.values_mut() {
                    if user.admin {
                        continue;
                    }
                    user.effective_permissions = merge_effective_permissions(user, &groups);
                }
                if let Some(cache) = self.active_cache() {
                    for (id, record) in &fetched {
                        match serde_json::to_value(record) {
                            Ok(value) => cache.put(CACHE_USERS, &id.to_string(), value),
                            Err(e) => {
                                tracing::warn!(user_id = %id, error = %e, "user record not cacheable");
                            }
                        }
                    }
                }
            }
            users.append(&mut fetched);
        }

        if let Some(hook) = &self.hooks.fetch {
            hook.after_fetch(&mut users, detailed);
        }
        Ok(users)
    }

    /// Fetch one user, `None` when the id is unknown.
    pub fn get_one(&self, id: UserId, detailed: bool) -> ApiResult<Option<UserRecord>> {
        Ok(self.get(&[id], detailed)?.remove(&id))
    }

    /// Create or update a user account. Returns the account's id.
    ///
    /// Updates merge the change onto the current stored record, so untouched
    /// fields keep their values. The save pipeline enforces the username and
    /// email requirements, hashes password input, recomputes the display
    /// name, runs the save hook, persists, fans a changed display name out
    /// to denormalized content, evicts the cached record and refreshes the
    /// request's active user when it was the one saved.
    pub fn save(
        &self,
        ctx: &mut RequestContext,
        change: &UserChange,
        options: SaveOptions,
    ) -> ApiResult<UserId> {
        let existing = match change.user_id {
            Some(user_id) => Some(self.get_one(user_id, true)?.ok_or_else(|| {
                ApiError::validation(format!("cannot update unknown user {user_id}"))
            })?),
            None => None,
        };

        let mut record = existing.clone().unwrap_or_default();
        change.merge_into(&mut record, &self.settings)?;

        if record.username.is_empty() {
            return Err(ApiError::validation("username must not be empty"));
        }
        if record.email.is_empty() {
            return Err(ApiError::validation("email address must not be empty"));
        }

        if existing.is_none() {
            let now = unix_now();
            if change.date_added.is_none() {
                record.date_added = now;
            }
            if change.date_last_active.is_none() {
                record.date_last_active = now;
            }
        }

        if let Some(pw) = &change.password {
            record.password = if pw.is_empty() {
                PASSWORD_UNSET.to_owned()
            } else if options.raw_password
                || existing.as_ref().is_some_and(|e| &e.password == pw)
            {
                // a stored hash passed back in must not be hashed again
                pw.clone()
            } else {
                password::hash_password(pw)?
            };
        }
        if let Some(pw) = &change.password_temp {
            record.password_temp = if pw.is_empty() {
                None
            } else if options.raw_password
                || existing
                    .as_ref()
                    .is_some_and(|e| e.password_temp.as_deref() == Some(pw.as_str()))
            {
                Some(pw.clone())
            } else {
                Some(password::hash_password(pw)?)
            };
        }

        if !self.settings.custom_display_name || record.display_name.trim().is_empty() {
            record.display_name =
                derived_display_name(&self.settings, &record.username, &record.real_name);
        }

        if let Some(hook) = &self.hooks.save {
            hook.before_save(&mut record)?;
        }

        let user_id = match &existing {
            Some(_) => {
                self.store.update_user(&record)?;
                record.user_id
            }
            None => {
                let id = self.store.insert_user(&record)?;
                record.user_id = id;
                tracing::info!(user_id = %id, username = %record.username, "created user account");
                id
            }
        };

        if let Some(old) = existing.as_ref().map(|e| e.display_name.as_str())
            && old != record.display_name
        {
            tracing::info!(
                user_id = %user_id,
                display_name = %record.display_name,
                "display name changed; updating stored references"
            );
            self.store
                .update_display_name_references(user_id, &record.display_name)?;
        }

        self.invalidate(user_id);

        if !ctx.user().is_anonymous() && ctx.user().user_id == user_id {
            if let Some(fresh) = self.get_one(user_id, true)? {
                *ctx.user_mut() = fresh;
            }
        }

        Ok(user_id)
    }

    /// Apply a raw field patch, bypassing the full save pipeline.
    ///
    /// This is the trusted write path for session identifiers and activity
    /// tracking. The cached record is only evicted when the patch touches
    /// fields beyond the volatile ones, and the request's active user is
    /// updated in place when it is the patched account.
    pub fn save_raw(&self, ctx: &mut RequestContext, patch: UserFieldPatch) -> ApiResult<()> {
        let mut patch = patch;
        if let Some(hook) = &self.hooks.save {
            hook.before_save_raw(&mut patch)?;
        }
        if patch.is_empty() {
            return Ok(());
        }

        self.store.update_user_fields(&patch)?;
        if !patch.is_activity_only() {
            self.invalidate(patch.user_id);
        }

        if !ctx.user().is_anonymous() && ctx.user().user_id == patch.user_id {
            let user = ctx.user_mut();
            if let Some(v) = patch.sessid_lt {
                user.sessid_lt = v;
            }
            if let Some(v) = patch.sessid_st {
                user.sessid_st = v;
            }
            if let Some(v) = patch.sessid_st_timeout {
                user.sessid_st_timeout = v;
            }
            if let Some(v) = patch.date_last_active {
                user.date_last_active = v;
            }
            if let Some(v) = patch.last_active_forum {
                user.last_active_forum = v;
            }
            if let Some(v) = patch.posts {
                user.posts = v;
            }
        }
        Ok(())
    }

    /// Merge key/value pairs into the active user's module settings. A `null`
    /// value deletes the key. Without an active user this is a no-op.
    pub fn save_settings(&self, ctx: &mut RequestContext, updates: &JsonMap) -> ApiResult<()> {
        if ctx.user().is_anonymous() {
            return Ok(());
        }
        let user_id = ctx.user().user_id;
        let Some(mut record) = self.get_one(user_id, true)? else {
            return Ok(());
        };

        for (key, value) in updates {
            if value.is_null() {
                record.settings_data.remove(key);
            } else {
                record.settings_data.insert(key.clone(), value.clone());
            }
        }

        self.store.update_user(&record)?;
        self.invalidate(user_id);
        ctx.user_mut().settings_data = record.settings_data;
        Ok(())
    }

    /// One module setting of the active user, `None` when unset or nobody is
    /// signed in.
    pub fn get_setting(&self, ctx: &RequestContext, key: &str) -> Option<JsonValue> {
        if ctx.user().is_anonymous() {
            return None;
        }
        ctx.user().settings_data.get(key).cloned()
    }

    /// Display names for a set of users, in the requested output format.
    /// Unknown ids resolve to the anonymous fallback name.
    pub fn display_names(
        &self,
        ids: &[UserId],
        format: NameFormat,
    ) -> ApiResult<BTreeMap<UserId, String>> {
        let users = self.get(ids, false)?;
        let mut out = BTreeMap::new();
        for &id in ids {
            let name = match users.get(&id) {
                Some(user) => self.format_name(&user.display_name, format),
                None => ANONYMOUS_DISPLAY_NAME.to_owned(),
            };
            out.insert(id, name);
        }
        Ok(out)
    }

    /// Display name of one user, see [`display_names`](Self::display_names).
    pub fn display_name(&self, id: UserId, format: NameFormat) -> ApiResult<String> {
        Ok(self
            .display_names(&[id], format)?
            .remove(&id)
            .unwrap_or_else(|| ANONYMOUS_DISPLAY_NAME.to_owned()))
    }

    /// Stored display names are plain text unless a module supplies ready
    /// made HTML names, so the conversion direction depends on configuration.
    fn format_name(&self, stored: &str, format: NameFormat) -> String {
        if self.settings.custom_display_name {
            match format {
                NameFormat::Html => stored.to_owned(),
                NameFormat::Plain => strip_tags(stored).trim().to_owned(),
            }
        } else {
            match format {
                NameFormat::Html => escape_html(stored),
                NameFormat::Plain => stored.to_owned(),
            }
        }
    }

    /// Minimal user listing, optionally restricted by activation state.
    pub fn list(&self, filter: UserListFilter) -> ApiResult<BTreeMap<UserId, UserListEntry>> {
        let ids = self.store.list_user_ids(filter)?;
        let users = self.store.get_users(&ids, false)?;
        let mut entries: BTreeMap<UserId, UserListEntry> = users
            .into_iter()
            .map(|(id, user)| {
                (
                    id,
                    UserListEntry {
                        user_id: id,
                        username: user.username,
                        display_name: user.display_name,
                    },
                )
            })
            .collect();
        if let Some(hook) = &self.hooks.list {
            hook.filter_list(&mut entries);
        }
        Ok(entries)
    }

    /// Users whose display name starts with `prefix`, case-insensitively.
    pub fn search_display_name(&self, prefix: &str) -> ApiResult<Vec<(UserId, String)>> {
        Ok(self.store.search_display_name(prefix)?)
    }

    /// Stored login material for a username, for the authentication layer.
    pub fn credentials_for(
        &self,
        username: &str,
    ) -> ApiResult<Option<tribune_store::StoredCredentials>> {
        Ok(self.store.credentials_for(username.trim())?)
    }

    /// Install the active user for the current request.
    ///
    /// The context's user and login flags are reset first, so a failed
    /// activation always leaves the request anonymous. Activation fails
    /// (returning `Ok(false)`) for unknown accounts, accounts that are not
    /// in the `Active` state, and non-admin accounts when an admin-kind
    /// activation is requested.
    ///
    /// For [`SessionKind::Forum`] the request counts as logged in, and as
    /// fully logged in unless tight security demands a short-term session
    /// that is not there. An admin-kind activation on its own is not a
    /// front-end login; only the administrator flag is derived.
    ///
    /// When activity tracking is configured, the stored activity fields are
    /// refreshed at most once per tracking interval.
    pub fn set_active_user(
        &self,
        ctx: &mut RequestContext,
        target: ActiveUser,
        kind: SessionKind,
        short_term_active: bool,
    ) -> ApiResult<bool> {
        ctx.clear_user();

        let user = match target {
            ActiveUser::Anonymous => return Ok(false),
            ActiveUser::Id(id) if id.is_anonymous() => return Ok(false),
            ActiveUser::Id(id) => {
                let Some(user) = self.get_one(id, true)? else {
                    tracing::warn!(user_id = %id, "cannot activate unknown user");
                    return Ok(false);
                };
                user
            }
            ActiveUser::Record(record) if record.is_anonymous() => return Ok(false),
            ActiveUser::Record(record) => record,
        };
        let user_id = user.user_id;

        if !user.active.is_active() {
            tracing::warn!(user_id = %user_id, "refusing to activate a non-active account");
            return Ok(false);
        }
        if kind == SessionKind::Admin && !user.admin {
            tracing::warn!(
                user_id = %user_id,
                "refusing admin activation for a non-admin account"
            );
            return Ok(false);
        }

        let fully = match kind {
            SessionKind::Forum => !self.settings.tight_security || short_term_active,
            SessionKind::Admin => false,
        };
        let date_last_active = user.date_last_active;
        ctx.install_user(user, kind, fully);

        if self.settings.track_user_activity > 0 {
            let now = unix_now();
            if date_last_active == 0 || date_last_active < now - self.settings.track_user_activity
            {
                let mut patch = UserFieldPatch::new(user_id);
                patch.date_last_active = Some(now);
                patch.last_active_forum = Some(ctx.current_forum.unwrap_or(ForumId::NONE));
                self.save_raw(ctx, patch)?;
            }
        }

        Ok(true)
    }
}

/// OR-merge of all permission sources into one per-forum mask table.
///
/// Group masks contribute for memberships at `Approved` level or above;
/// direct grants accumulate on top instead of replacing the group result.
fn merge_effective_permissions(
    user: &UserRecord,
    groups: &BTreeMap<GroupId, Group>,
) -> BTreeMap<ForumId, Permissions> {
    let mut merged: BTreeMap<ForumId, Permissions> = BTreeMap::new();
    for (group_id, level) in &user.group_memberships {
        if *level < GroupLevel::Approved {
            continue;
        }
        let Some(group) = groups.get(group_id) else { continue };
        for (&forum, &perm) in &group.forum_permissions {
            merged.entry(forum).and_modify(|p| *p |= perm).or_insert(perm);
        }
    }
    for (&forum, &perm) in &user.forum_permissions {
        merged.entry(forum).and_modify(|p| *p |= perm).or_insert(perm);
    }
    merged
}
