//! Extension points for modules that plug into the session lifecycle.
//!
//! Every hook is optional and defaults to deferring, so a manager without
//! hooks runs the built-in behavior unchanged.

use std::sync::Arc;

use tribune_core::{ApiResult, SessionKind, UserId, UserRecord};

/// Outcome of an authentication hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// Authentication succeeds as the given user; the stored credentials
    /// are not consulted.
    Accept(UserId),
    /// Authentication fails regardless of the stored credentials.
    Reject,
    /// The hook has no opinion; run the built-in credential check.
    Defer,
}

/// Whether a lifecycle hook took over the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleDecision {
    /// The hook performed the work itself; skip the built-in behavior.
    Handled,
    /// Run the built-in behavior.
    Defer,
}

/// Hook verdict for one session identifier during restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotDecision {
    /// Treat the identifier as validated for the given user, without
    /// looking at the request (single sign-on, inherited sessions).
    Accept(UserId),
    /// Treat the identifier as failed without looking at the request.
    Invalid,
    /// No opinion; examine the request's own evidence.
    #[default]
    Defer,
}

/// Per-identifier restore verdicts. The default defers every identifier to
/// the built-in evidence checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestoreOverride {
    pub long_term: SlotDecision,
    pub short_term: SlotDecision,
    pub admin: SlotDecision,
}

/// Replaces or augments the credential check.
pub trait AuthenticateHook: Send + Sync {
    fn authenticate(
        &self,
        kind: SessionKind,
        username: &str,
        password: &str,
    ) -> ApiResult<AuthDecision>;
}

/// Observes or takes over session issuance.
pub trait SessionCreateHook: Send + Sync {
    fn before_create(&self, user: &UserRecord, kind: SessionKind) -> ApiResult<HandleDecision>;
}

/// Supplies restore verdicts ahead of the request-evidence checks.
pub trait SessionRestoreHook: Send + Sync {
    fn restore_override(&self, kind: SessionKind) -> ApiResult<RestoreOverride>;
}

/// Observes or takes over session teardown.
pub trait SessionDestroyHook: Send + Sync {
    fn before_destroy(&self, kind: SessionKind) -> ApiResult<HandleDecision>;
}

/// Hook registrations for a [`crate::SessionManager`].
#[derive(Default, Clone)]
pub struct SessionHooks {
    pub authenticate: Option<Arc<dyn AuthenticateHook>>,
    pub create: Option<Arc<dyn SessionCreateHook>>,
    pub restore: Option<Arc<dyn SessionRestoreHook>>,
    pub destroy: Option<Arc<dyn SessionDestroyHook>>,
}

impl SessionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_authenticate(mut self, hook: Arc<dyn AuthenticateHook>) -> Self {
        self.authenticate = Some(hook);
        self
    }

    pub fn on_create(mut self, hook: Arc<dyn SessionCreateHook>) -> Self {
        self.create = Some(hook);
        self
    }

    pub fn on_restore(mut self, hook: Arc<dyn SessionRestoreHook>) -> Self {
        self.restore = Some(hook);
        self
    }

    pub fn on_destroy(mut self, hook: Arc<dyn SessionDestroyHook>) -> Self {
        self.destroy = Some(hook);
        self
    }
}
