//! The storage abstraction behind the user and session layers.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use tribune_core::{ApiError, ForumId, Group, GroupId, GroupLevel, UserId, UserRecord};

use crate::types::{
    ForumDefaults, StoredCredentials, UserFieldPatch, UserListFilter, VolatileField,
    VolatileValues,
};

/// Storage operation error.
///
/// These are **infrastructure errors**; domain decisions (validation, access)
/// are taken above the store and never pass through here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The addressed row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backend itself failed (I/O, poisoned lock, ...).
    #[error("backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e.to_string())
    }
}

/// Forum data store.
///
/// Implementations make **no storage assumptions** beyond these contracts:
///
/// - Reads are batch-oriented; ids without a row are silently omitted from
///   result maps (an absent user is not an error).
/// - A *detailed* user fetch additionally fills `group_memberships` and the
///   direct `forum_permissions` grants on each record.
///   `effective_permissions` is never stored; the repository computes it.
/// - `update_user` persists a record that was assembled from a detailed
///   fetch; direct per-forum grants are written as given.
/// - `update_user_fields` applies its patch atomically within the user's
///   row. Session-identifier writes ride on this, so two concurrent logins
///   cannot interleave half-written identifiers.
pub trait Store: Send + Sync {
    /// Fetch users by id. Absent ids are omitted from the result.
    fn get_users(
        &self,
        ids: &[UserId],
        detailed: bool,
    ) -> Result<BTreeMap<UserId, UserRecord>, StoreError>;

    /// Fetch only the requested volatile fields (cache freshening).
    fn get_user_fields(
        &self,
        ids: &[UserId],
        fields: &[VolatileField],
    ) -> Result<BTreeMap<UserId, VolatileValues>, StoreError>;

    /// Insert a new user and assign its id. Fails with `Conflict` when the
    /// username is already taken.
    fn insert_user(&self, record: &UserRecord) -> Result<UserId, StoreError>;

    /// Write a full user record (including direct per-forum grants).
    fn update_user(&self, record: &UserRecord) -> Result<(), StoreError>;

    /// Apply a partial update atomically within the user's row.
    fn update_user_fields(&self, patch: &UserFieldPatch) -> Result<(), StoreError>;

    /// Stored login material for a username, if the account exists.
    fn credentials_for(&self, username: &str) -> Result<Option<StoredCredentials>, StoreError>;

    /// Default permission masks per forum. `None` selects all forums.
    fn forums(
        &self,
        ids: Option<&[ForumId]>,
    ) -> Result<BTreeMap<ForumId, ForumDefaults>, StoreError>;

    /// Group records. `None` selects all groups.
    fn groups(&self, ids: Option<&[GroupId]>) -> Result<BTreeMap<GroupId, Group>, StoreError>;

    /// Group memberships of one user with their levels.
    fn group_memberships(
        &self,
        user_id: UserId,
    ) -> Result<BTreeMap<GroupId, GroupLevel>, StoreError>;

    /// Rewrite denormalized display names in stored content after a user's
    /// display name changed.
    fn update_display_name_references(
        &self,
        user_id: UserId,
        display_name: &str,
    ) -> Result<(), StoreError>;

    /// Ids of users matching the filter, ascending.
    fn list_user_ids(&self, filter: UserListFilter) -> Result<Vec<UserId>, StoreError>;

    /// Users whose display name starts with `prefix` (case-insensitive).
    fn search_display_name(&self, prefix: &str) -> Result<Vec<(UserId, String)>, StoreError>;
}

impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    fn get_users(
        &self,
        ids: &[UserId],
        detailed: bool,
    ) -> Result<BTreeMap<UserId, UserRecord>, StoreError> {
        (**self).get_users(ids, detailed)
    }

    fn get_user_fields(
        &self,
        ids: &[UserId],
        fields: &[VolatileField],
    ) -> Result<BTreeMap<UserId, VolatileValues>, StoreError> {
        (**self).get_user_fields(ids, fields)
    }

    fn insert_user(&self, record: &UserRecord) -> Result<UserId, StoreError> {
        (**self).insert_user(record)
    }

    fn update_user(&self, record: &UserRecord) -> Result<(), StoreError> {
        (**self).update_user(record)
    }

    fn update_user_fields(&self, patch: &UserFieldPatch) -> Result<(), StoreError> {
        (**self).update_user_fields(patch)
    }

    fn credentials_for(&self, username: &str) -> Result<Option<StoredCredentials>, StoreError> {
        (**self).credentials_for(username)
    }

    fn forums(
        &self,
        ids: Option<&[ForumId]>,
    ) -> Result<BTreeMap<ForumId, ForumDefaults>, StoreError> {
        (**self).forums(ids)
    }

    fn groups(&self, ids: Option<&[GroupId]>) -> Result<BTreeMap<GroupId, Group>, StoreError> {
        (**self).groups(ids)
    }

    fn group_memberships(
        &self,
        user_id: UserId,
    ) -> Result<BTreeMap<GroupId, GroupLevel>, StoreError> {
        (**self).group_memberships(user_id)
    }

    fn update_display_name_references(
        &self,
        user_id: UserId,
        display_name: &str,
    ) -> Result<(), StoreError> {
        (**self).update_display_name_references(user_id, display_name)
    }

    fn list_user_ids(&self, filter: UserListFilter) -> Result<Vec<UserId>, StoreError> {
        (**self).list_user_ids(filter)
    }

    fn search_display_name(&self, prefix: &str) -> Result<Vec<(UserId, String)>, StoreError> {
        (**self).search_display_name(prefix)
    }
}
