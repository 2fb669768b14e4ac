//! `tribune-core` — domain foundation for the forum user and session layers.
//!
//! This crate contains the **pure domain** vocabulary (identifiers, the user
//! record, permission bits, settings, the request-scoped context and the
//! error taxonomy). No storage or transport concerns live here.

pub mod error;
pub mod group;
pub mod id;
pub mod observability;
pub mod permissions;
pub mod request;
pub mod settings;
pub mod time;
pub mod user;

pub use error::{ApiError, ApiResult};
pub use group::{Group, GroupLevel, GroupOpenState};
pub use id::{ForumId, GroupId, UserId};
pub use permissions::Permissions;
pub use request::{
    COOKIE_ADMIN, COOKIE_LONG_TERM, COOKIE_SHORT_TERM, CookieWrite, RequestContext, SessionKind,
};
pub use settings::{CookieMode, CustomProfileField, DisplayNameSource, SiteSettings};
pub use time::unix_now;
pub use user::{EmailNotify, JsonMap, PASSWORD_UNSET, UserActive, UserRecord};
