//! Extension points for modules that need to observe or adjust user data.
//!
//! Hooks are optional. A repository without hooks behaves exactly like
//! one whose hooks accept everything unchanged.

use std::collections::BTreeMap;
use std::sync::Arc;

use tribune_core::{ApiResult, UserId, UserRecord};
use tribune_store::UserFieldPatch;

use crate::repo::UserListEntry;

/// Runs before user data is written to the store.
pub trait UserSaveHook: Send + Sync {
    /// Inspect or adjust a full record before a save. Returning an error
    /// aborts the save.
    fn before_save(&self, user: &mut UserRecord) -> ApiResult<()>;

    /// Inspect or adjust a raw field patch before it is applied.
    fn before_save_raw(&self, _patch: &mut UserFieldPatch) -> ApiResult<()> {
        Ok(())
    }
}

/// Runs after user records are read from the store or cache.
pub trait UserFetchHook: Send + Sync {
    /// Adjust fetched records in place. `detailed` tells the hook whether
    /// group and permission data is present on the records.
    fn after_fetch(&self, users: &mut BTreeMap<UserId, UserRecord>, detailed: bool);
}

/// Runs after a user listing has been assembled.
pub trait UserListHook: Send + Sync {
    /// Adjust or filter listing entries in place.
    fn filter_list(&self, users: &mut BTreeMap<UserId, UserListEntry>);
}

/// Hook registrations for a [`crate::UserRepo`].
#[derive(Default, Clone)]
pub struct UserHooks {
    pub save: Option<Arc<dyn UserSaveHook>>,
    pub fetch: Option<Arc<dyn UserFetchHook>>,
    pub list: Option<Arc<dyn UserListHook>>,
}

impl UserHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_save(mut self, hook: Arc<dyn UserSaveHook>) -> Self {
        self.save = Some(hook);
        self
    }

    pub fn on_fetch(mut self, hook: Arc<dyn UserFetchHook>) -> Self {
        self.fetch = Some(hook);
        self
    }

    pub fn on_list(mut self, hook: Arc<dyn UserListHook>) -> Self {
        self.list = Some(hook);
        self
    }
}
