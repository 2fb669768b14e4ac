//! In-memory store implementation.
//!
//! Intended for tests/dev. Not optimized for performance.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use tribune_core::{ForumId, Group, GroupId, GroupLevel, Permissions, UserId, UserRecord};

use crate::store::{Store, StoreError};
use crate::types::{
    ForumDefaults, StoredCredentials, UserFieldPatch, UserListFilter, VolatileField,
    VolatileValues,
};

#[derive(Debug, Default)]
struct Inner {
    next_user_id: u32,
    users: HashMap<UserId, UserRecord>,
    by_username: HashMap<String, UserId>,
    forum_grants: HashMap<UserId, BTreeMap<ForumId, Permissions>>,
    memberships: HashMap<UserId, BTreeMap<GroupId, GroupLevel>>,
    forums: BTreeMap<ForumId, ForumDefaults>,
    groups: BTreeMap<GroupId, Group>,
    display_name_rewrites: Vec<(UserId, String)>,
}

/// In-memory forum store.
///
/// A single `RwLock` guards all tables, which trivially satisfies the
/// per-row atomicity contract of [`Store::update_user_fields`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a forum with its default permission masks.
    pub fn seed_forum(&self, defaults: ForumDefaults) {
        if let Ok(mut inner) = self.inner.write() {
            inner.forums.insert(defaults.forum_id, defaults);
        }
    }

    /// Register a group.
    pub fn seed_group(&self, group: Group) {
        if let Ok(mut inner) = self.inner.write() {
            inner.groups.insert(group.group_id, group);
        }
    }

    /// Register a group membership.
    pub fn seed_membership(&self, user_id: UserId, group_id: GroupId, level: GroupLevel) {
        if let Ok(mut inner) = self.inner.write() {
            inner
                .memberships
                .entry(user_id)
                .or_default()
                .insert(group_id, level);
        }
    }

    /// Display-name rewrites recorded so far (the in-memory stand-in for the
    /// denormalized-content fan-out), for tests.
    pub fn display_name_rewrites(&self) -> Vec<(UserId, String)> {
        self.inner
            .read()
            .map(|inner| inner.display_name_rewrites.clone())
            .unwrap_or_default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_owned()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_owned()))
    }
}

/// A stored record never carries assembled maps; detailed fetches fill them
/// from the side tables.
fn strip_detail(mut record: UserRecord) -> UserRecord {
    record.group_memberships = BTreeMap::new();
    record.forum_permissions = BTreeMap::new();
    record.effective_permissions = BTreeMap::new();
    record
}

impl Store for MemoryStore {
    fn get_users(
        &self,
        ids: &[UserId],
        detailed: bool,
    ) -> Result<BTreeMap<UserId, UserRecord>, StoreError> {
        let inner = self.read()?;
        let mut out = BTreeMap::new();
        for id in ids {
            let Some(record) = inner.users.get(id) else {
                continue;
            };
            let mut record = record.clone();
            if detailed {
                record.group_memberships =
                    inner.memberships.get(id).cloned().unwrap_or_default();
                record.forum_permissions =
                    inner.forum_grants.get(id).cloned().unwrap_or_default();
            }
            out.insert(*id, record);
        }
        Ok(out)
    }

    fn get_user_fields(
        &self,
        ids: &[UserId],
        fields: &[VolatileField],
    ) -> Result<BTreeMap<UserId, VolatileValues>, StoreError> {
        let inner = self.read()?;
        let mut out = BTreeMap::new();
        for id in ids {
            let Some(record) = inner.users.get(id) else {
                continue;
            };
            let mut values = VolatileValues::default();
            for field in fields {
                match field {
                    VolatileField::DateLastActive => {
                        values.date_last_active = Some(record.date_last_active);
                    }
                    VolatileField::LastActiveForum => {
                        values.last_active_forum = Some(record.last_active_forum);
                    }
                    VolatileField::Posts => values.posts = Some(record.posts),
                }
            }
            out.insert(*id, values);
        }
        Ok(out)
    }

    fn insert_user(&self, record: &UserRecord) -> Result<UserId, StoreError> {
        let mut inner = self.write()?;
        if inner.by_username.contains_key(&record.username) {
            return Err(StoreError::Conflict(format!(
                "username '{}' is taken",
                record.username
            )));
        }

        inner.next_user_id += 1;
        let user_id = UserId::new(inner.next_user_id);

        let mut stored = strip_detail(record.clone());
        stored.user_id = user_id;

        inner.by_username.insert(stored.username.clone(), user_id);
        if !record.forum_permissions.is_empty() {
            inner
                .forum_grants
                .insert(user_id, record.forum_permissions.clone());
        }
        inner.users.insert(user_id, stored);
        Ok(user_id)
    }

    fn update_user(&self, record: &UserRecord) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let Some(existing) = inner.users.get(&record.user_id) else {
            return Err(StoreError::NotFound(format!("user {}", record.user_id)));
        };

        let old_username = existing.username.clone();
        if old_username != record.username {
            if let Some(other) = inner.by_username.get(&record.username)
                && *other != record.user_id
            {
                return Err(StoreError::Conflict(format!(
                    "username '{}' is taken",
                    record.username
                )));
            }
            inner.by_username.remove(&old_username);
            inner
                .by_username
                .insert(record.username.clone(), record.user_id);
        }

        inner
            .forum_grants
            .insert(record.user_id, record.forum_permissions.clone());
        inner
            .users
            .insert(record.user_id, strip_detail(record.clone()));
        Ok(())
    }

    fn update_user_fields(&self, patch: &UserFieldPatch) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let Some(record) = inner.users.get_mut(&patch.user_id) else {
            return Err(StoreError::NotFound(format!("user {}", patch.user_id)));
        };

        if let Some(sessid_lt) = &patch.sessid_lt {
            record.sessid_lt = sessid_lt.clone();
        }
        if let Some(sessid_st) = &patch.sessid_st {
            record.sessid_st = sessid_st.clone();
        }
        if let Some(timeout) = patch.sessid_st_timeout {
            record.sessid_st_timeout = timeout;
        }
        if let Some(date_last_active) = patch.date_last_active {
            record.date_last_active = date_last_active;
        }
        if let Some(forum) = patch.last_active_forum {
            record.last_active_forum = forum;
        }
        if let Some(posts) = patch.posts {
            record.posts = posts;
        }
        Ok(())
    }

    fn credentials_for(&self, username: &str) -> Result<Option<StoredCredentials>, StoreError> {
        let inner = self.read()?;
        let Some(user_id) = inner.by_username.get(username) else {
            return Ok(None);
        };
        let record = inner.users.get(user_id).ok_or_else(|| {
            StoreError::Backend(format!("username index points at missing user {user_id}"))
        })?;
        Ok(Some(StoredCredentials {
            user_id: *user_id,
            password: record.password.clone(),
            password_temp: record.password_temp.clone(),
        }))
    }

    fn forums(
        &self,
        ids: Option<&[ForumId]>,
    ) -> Result<BTreeMap<ForumId, ForumDefaults>, StoreError> {
        let inner = self.read()?;
        Ok(match ids {
            None => inner.forums.clone(),
            Some(ids) => ids
                .iter()
                .filter_map(|id| inner.forums.get(id).map(|f| (*id, *f)))
                .collect(),
        })
    }

    fn groups(&self, ids: Option<&[GroupId]>) -> Result<BTreeMap<GroupId, Group>, StoreError> {
        let inner = self.read()?;
        Ok(match ids {
            None => inner.groups.clone(),
            Some(ids) => ids
                .iter()
                .filter_map(|id| inner.groups.get(id).map(|g| (*id, g.clone())))
                .collect(),
        })
    }

    fn group_memberships(
        &self,
        user_id: UserId,
    ) -> Result<BTreeMap<GroupId, GroupLevel>, StoreError> {
        let inner = self.read()?;
        Ok(inner.memberships.get(&user_id).cloned().unwrap_or_default())
    }

    fn update_display_name_references(
        &self,
        user_id: UserId,
        display_name: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner
            .display_name_rewrites
            .push((user_id, display_name.to_owned()));
        Ok(())
    }

    fn list_user_ids(&self, filter: UserListFilter) -> Result<Vec<UserId>, StoreError> {
        let inner = self.read()?;
        let mut ids: Vec<UserId> = inner
            .users
            .values()
            .filter(|u| match filter {
                UserListFilter::All => true,
                UserListFilter::Active => u.active.is_active(),
                UserListFilter::Inactive => !u.active.is_active(),
            })
            .map(|u| u.user_id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn search_display_name(&self, prefix: &str) -> Result<Vec<(UserId, String)>, StoreError> {
        let inner = self.read()?;
        let needle = prefix.to_lowercase();
        let mut hits: Vec<(UserId, String)> = inner
            .users
            .values()
            .filter(|u| u.display_name.to_lowercase().starts_with(&needle))
            .map(|u| (u.user_id, u.display_name.clone()))
            .collect();
        hits.sort_by(|a, b| a.1.to_lowercase().cmp(&b.1.to_lowercase()).then(a.0.cmp(&b.0)));
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tribune_core::UserActive;

    fn user(name: &str) -> UserRecord {
        UserRecord {
            username: name.to_owned(),
            display_name: name.to_owned(),
            email: format!("{name}@example.net"),
            active: UserActive::Active,
            ..UserRecord::default()
        }
    }

    #[test]
    fn insert_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let a = store.insert_user(&user("alice")).unwrap();
        let b = store.insert_user(&user("bob")).unwrap();
        assert_eq!(a, UserId::new(1));
        assert_eq!(b, UserId::new(2));
    }

    #[test]
    fn duplicate_username_conflicts() {
        let store = MemoryStore::new();
        store.insert_user(&user("alice")).unwrap();
        let err = store.insert_user(&user("alice")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn absent_ids_are_omitted_not_errors() {
        let store = MemoryStore::new();
        let id = store.insert_user(&user("alice")).unwrap();
        let got = store
            .get_users(&[id, UserId::new(999)], false)
            .unwrap();
        assert_eq!(got.len(), 1);
        assert!(got.contains_key(&id));
    }

    #[test]
    fn detailed_fetch_fills_membership_and_grants() {
        let store = MemoryStore::new();
        let id = store.insert_user(&user("alice")).unwrap();
        let gid = GroupId::new(10);
        store.seed_membership(id, gid, GroupLevel::Approved);

        let mut record = store.get_users(&[id], true).unwrap().remove(&id).unwrap();
        assert_eq!(record.group_memberships.get(&gid), Some(&GroupLevel::Approved));

        // Plain fetches keep the maps empty.
        record = store.get_users(&[id], false).unwrap().remove(&id).unwrap();
        assert!(record.group_memberships.is_empty());
    }

    #[test]
    fn field_patch_updates_only_given_fields() {
        let store = MemoryStore::new();
        let id = store.insert_user(&user("alice")).unwrap();

        let mut patch = UserFieldPatch::new(id);
        patch.sessid_lt = Some("deadbeef".to_owned());
        patch.date_last_active = Some(5000);
        store.update_user_fields(&patch).unwrap();

        let record = store.get_users(&[id], false).unwrap().remove(&id).unwrap();
        assert_eq!(record.sessid_lt, "deadbeef");
        assert_eq!(record.date_last_active, 5000);
        assert_eq!(record.sessid_st, "");
    }

    #[test]
    fn patch_for_unknown_user_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_user_fields(&UserFieldPatch::new(UserId::new(42)))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn rename_updates_credentials_lookup() {
        let store = MemoryStore::new();
        let id = store.insert_user(&user("alice")).unwrap();

        let mut record = store.get_users(&[id], true).unwrap().remove(&id).unwrap();
        record.username = "alicia".to_owned();
        store.update_user(&record).unwrap();

        assert!(store.credentials_for("alice").unwrap().is_none());
        let creds = store.credentials_for("alicia").unwrap().unwrap();
        assert_eq!(creds.user_id, id);
    }

    #[test]
    fn list_filters_by_activation() {
        let store = MemoryStore::new();
        let a = store.insert_user(&user("alice")).unwrap();
        let mut sleeper = user("bob");
        sleeper.active = UserActive::Inactive;
        let b = store.insert_user(&sleeper).unwrap();

        assert_eq!(store.list_user_ids(UserListFilter::Active).unwrap(), vec![a]);
        assert_eq!(store.list_user_ids(UserListFilter::Inactive).unwrap(), vec![b]);
        assert_eq!(store.list_user_ids(UserListFilter::All).unwrap(), vec![a, b]);
    }

    #[test]
    fn display_name_search_is_prefix_and_case_insensitive() {
        let store = MemoryStore::new();
        let mut a = user("alice");
        a.display_name = "Alice A.".to_owned();
        let a = store.insert_user(&a).unwrap();
        store.insert_user(&user("bob")).unwrap();

        let hits = store.search_display_name("ali").unwrap();
        assert_eq!(hits, vec![(a, "Alice A.".to_owned())]);
    }
}
