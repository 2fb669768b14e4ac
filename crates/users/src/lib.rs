//! `tribune-users` — user accounts, profiles and access control.
//!
//! The [`UserRepo`] is the single gateway to user data: reads assemble
//! permission tables and go through the optional cache, writes run the save
//! pipeline (validation, password hashing, display-name derivation, hooks,
//! cache eviction). The access-control checks in [`access`] and the
//! active-user handling build on top of it.

pub mod access;
pub mod change;
pub mod hooks;
pub mod names;
pub mod password;
pub mod repo;

pub use access::{AccessUser, ForumListScope, ForumScope, GroupAccess};
pub use change::{SaveOptions, UserChange};
pub use hooks::{UserFetchHook, UserHooks, UserListHook, UserSaveHook};
pub use names::{ANONYMOUS_DISPLAY_NAME, NameFormat, escape_html, strip_tags};
pub use password::{hash_password, verify_password};
pub use repo::{ActiveUser, UserListEntry, UserRepo};
