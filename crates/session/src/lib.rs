//! `tribune-session` — login sessions for the forum and its admin interface.
//!
//! [`SessionManager`] drives the session lifecycle on top of the user
//! repository: credential checks, issuing and restoring the cookie- or
//! URI-carried session tickets, and tearing sessions down. The [`csrf`]
//! module guards form submissions with a per-page posting token.

mod authenticate;
pub mod csrf;
pub mod hooks;
pub mod manager;
mod token;


pub use hooks::{
    AuthDecision, AuthenticateHook, HandleDecision, RestoreOverride, SessionCreateHook,
    SessionDestroyHook, SessionHooks, SessionRestoreHook, SlotDecision,
};
pub use manager::{ResetPolicy, SessionManager};
