//! Session lifecycle: issuing, restoring and destroying sessions.

use std::sync::Arc;

use tribune_core::{
    ApiError, ApiResult, COOKIE_ADMIN, COOKIE_LONG_TERM, COOKIE_SHORT_TERM, CookieMode,
    RequestContext, SessionKind, SiteSettings, UserRecord, unix_now,
};
use tribune_store::UserFieldPatch;
use tribune_users::{ActiveUser, UserRepo};

use crate::hooks::{HandleDecision, RestoreOverride, SessionHooks, SlotDecision};
use crate::token::{admin_token, generate_session_id, parse_session_ticket, session_ticket};

/// How much stored session state a [`SessionManager::create`] call replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetPolicy {
    /// Keep existing identifiers where they are still usable.
    Reuse,
    /// Fresh short-term identifier. The long-term identifier is also
    /// replaced for cookieless clients, where the old value is embedded in
    /// circulated page links.
    OnLogin,
    /// Replace every identifier, signing the user out everywhere else.
    All,
}

/// The three identifier slots a request may carry session evidence in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    LongTerm = 0,
    ShortTerm = 1,
    Admin = 2,
}

impl Slot {
    const ALL: [Slot; 3] = [Slot::LongTerm, Slot::ShortTerm, Slot::Admin];

    fn index(self) -> usize {
        self as usize
    }

    fn cookie_name(self) -> &'static str {
        match self {
            Slot::LongTerm => COOKIE_LONG_TERM,
            Slot::ShortTerm => COOKIE_SHORT_TERM,
            Slot::Admin => COOKIE_ADMIN,
        }
    }
}

/// Check progress of one slot while a restore runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    /// Not relevant for the requested session kind.
    Skip,
    /// Must be checked; a slot still here after the checks has failed.
    Check,
    /// Evidence checked out.
    Valid,
}

/// Issues, restores and destroys the two session kinds.
///
/// ## Session model
///
/// A forum session rides on a durable long-term identifier plus, under
/// tight security, a short-lived second identifier that proves recent
/// authentication. An admin session is a separate cookie whose value is
/// derived from the long-term identifier and an installation salt; it is
/// never stored and dies with the browser.
///
/// ## Transport
///
/// Identifiers travel as `"<user id>:<token>"` tickets. Cookie transport is
/// preferred; when a request proves its client runs without cookies, the
/// long-term ticket is registered for URI and form propagation instead and
/// the short-term tier is disabled for that request.
pub struct SessionManager {
    users: Arc<UserRepo>,
    settings: Arc<SiteSettings>,
    hooks: SessionHooks,
}

impl SessionManager {
    pub fn new(users: Arc<UserRepo>, settings: Arc<SiteSettings>) -> Self {
        Self {
            users,
            settings,
            hooks: SessionHooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: SessionHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub(crate) fn users(&self) -> &UserRepo {
        &self.users
    }

    pub(crate) fn hooks(&self) -> &SessionHooks {
        &self.hooks
    }

    /// Issue or refresh the session identifiers for the active user and
    /// hand them to the client.
    ///
    /// Requires an active user in `ctx`; the user must be activated, and an
    /// admin session additionally requires the admin flag. The short-term
    /// identifier is only maintained under tight security for cookie
    /// clients: minted fresh when absent, reset or expired, and otherwise
    /// renewed once less than half its lifetime window remains.
    pub fn create(
        &self,
        ctx: &mut RequestContext,
        kind: SessionKind,
        reset: ResetPolicy,
    ) -> ApiResult<()> {
        if let Some(hook) = &self.hooks.create
            && hook.before_create(ctx.user(), kind)? == HandleDecision::Handled
        {
            return Ok(());
        }

        if ctx.user().is_anonymous() {
            return Err(ApiError::validation("session create requires an active user"));
        }
        let user_id = ctx.user().user_id;
        if !ctx.user().active.is_active() {
            return Err(ApiError::access_denied(format!(
                "user {user_id} is not activated"
            )));
        }
        if kind == SessionKind::Admin && !ctx.user().admin {
            return Err(ApiError::access_denied(format!(
                "user {user_id} is not an administrator"
            )));
        }

        let use_cookies = ctx.cookies_available > CookieMode::Disabled;

        // The long-term identifier serves both session kinds.
        let refresh_lt = ctx.user().sessid_lt.is_empty()
            || (!use_cookies && reset == ResetPolicy::OnLogin)
            || reset == ResetPolicy::All;
        if refresh_lt {
            let mut patch = UserFieldPatch::new(user_id);
            patch.sessid_lt = Some(generate_session_id(
                &ctx.user().username,
                &ctx.user().password,
            )?);
            self.users.save_raw(ctx, patch)?;
        }

        let mut issued_st = false;
        if kind == SessionKind::Forum && self.settings.tight_security && use_cookies {
            let now = unix_now();
            let window = self.settings.short_session_window();

            let mut patch = UserFieldPatch::new(user_id);
            if ctx.user().sessid_st.is_empty()
                || reset != ResetPolicy::Reuse
                || ctx.user().sessid_st_timeout <= now
            {
                patch.sessid_st = Some(generate_session_id(
                    &ctx.user().username,
                    &ctx.user().password,
                )?);
                patch.sessid_st_timeout = Some(now + window);
            } else if ctx.user().sessid_st_timeout < now + window / 2 {
                // Sliding renewal: keep the identifier, extend the window.
                tracing::debug!(user_id = %user_id, "renewing the short-term session window");
                patch.sessid_st_timeout = Some(now + window);
            }
            if !patch.is_empty() {
                issued_st = true;
                self.users.save_raw(ctx, patch)?;
            }
        }

        match kind {
            SessionKind::Forum => {
                let ticket = session_ticket(user_id, &ctx.user().sessid_lt);
                if use_cookies {
                    let expires = if self.settings.long_session_days == 0 {
                        None
                    } else {
                        Some(unix_now() + 86400 * self.settings.long_session_days)
                    };
                    ctx.push_cookie(COOKIE_LONG_TERM, ticket, expires);

                    if issued_st {
                        let st_ticket = session_ticket(user_id, &ctx.user().sessid_st);
                        let st_expires = Some(ctx.user().sessid_st_timeout);
                        ctx.push_cookie(COOKIE_SHORT_TERM, st_ticket, st_expires);
                    }
                } else {
                    ctx.register_uri_arg(COOKIE_LONG_TERM, ticket.clone());
                    ctx.register_form_field(COOKIE_LONG_TERM, ticket);
                }
            }
            SessionKind::Admin => {
                let token = admin_token(&ctx.user().sessid_lt, &self.settings.admin_session_salt);
                ctx.push_cookie(COOKIE_ADMIN, session_ticket(user_id, &token), None);
            }
        }

        Ok(())
    }

    /// Try to pick up a session from the evidence the request carries.
    ///
    /// `Ok(true)` means a user was installed in `ctx`; on `Ok(false)` the
    /// session (if any) was destroyed and the context is anonymous. A forum
    /// restore succeeds on a valid long-term identifier; the short-term
    /// identifier, where tight security demands one, only decides the
    /// fully-logged-in flag. An admin restore succeeds on the admin
    /// identifier alone.
    ///
    /// A long-term ticket arriving over URI or form data marks the client
    /// as cookieless for the rest of the request: the short-term check is
    /// dropped (that identifier never travels in URIs) and
    /// `ctx.cookies_available` is downgraded.
    pub fn restore(&self, ctx: &mut RequestContext, kind: SessionKind) -> ApiResult<bool> {
        let mut states = [SlotState::Skip; 3];
        match kind {
            SessionKind::Forum => {
                states[Slot::LongTerm.index()] = SlotState::Check;
                if self.settings.tight_security {
                    states[Slot::ShortTerm.index()] = SlotState::Check;
                }
            }
            SessionKind::Admin => {
                states[Slot::Admin.index()] = SlotState::Check;
            }
        }

        let overrides = match &self.hooks.restore {
            Some(hook) => hook.restore_override(kind)?,
            None => RestoreOverride::default(),
        };

        let mut real_cookie = false;
        let mut session_user: Option<UserRecord> = None;

        for slot in Slot::ALL {
            if states[slot.index()] != SlotState::Check {
                continue;
            }

            let verdict = match slot {
                Slot::LongTerm => overrides.long_term,
                Slot::ShortTerm => overrides.short_term,
                Slot::Admin => overrides.admin,
            };

            // Resolve this slot's evidence to a user id plus, unless a hook
            // already vouched for the slot, the token to validate.
            let (user_id, token) = match verdict {
                SlotDecision::Invalid => continue,
                SlotDecision::Accept(user_id) => {
                    // Externally validated slots count as cookie-sourced,
                    // so they never downgrade the request to URI transport.
                    real_cookie = true;
                    (user_id, None)
                }
                SlotDecision::Defer => {
                    let Some((raw, from_cookie)) = slot_evidence(ctx, slot) else {
                        continue;
                    };
                    if from_cookie {
                        real_cookie = true;
                    }
                    let Some((user_id, token)) = parse_session_ticket(raw) else {
                        continue;
                    };
                    (user_id, Some(token.to_owned()))
                }
            };

            // The first usable slot determines the session user. Later
            // slots must name the same account; anything else is a stale
            // cookie and is ignored.
            let resolved = session_user.as_ref().map(|user| user.user_id);
            match resolved {
                None => match self.users.get_one(user_id, true)? {
                    Some(user) if user.active.is_active() => session_user = Some(user),
                    _ => {
                        tracing::warn!(
                            user_id = %user_id,
                            "session evidence names a missing or deactivated account; destroying session"
                        );
                        self.destroy(ctx, kind)?;
                        return Ok(false);
                    }
                },
                Some(resolved) if resolved != user_id => continue,
                Some(_) => {}
            }
            let Some(user) = &session_user else { continue };

            let valid = match (slot, token.as_deref()) {
                (_, None) => true,
                (Slot::LongTerm, Some(token)) => {
                    !user.sessid_lt.is_empty() && user.sessid_lt == token
                }
                (Slot::ShortTerm, Some(token)) => {
                    !user.sessid_st.is_empty()
                        && user.sessid_st == token
                        && user.sessid_st_timeout > unix_now()
                }
                (Slot::Admin, Some(token)) => {
                    !user.sessid_lt.is_empty()
                        && admin_token(&user.sessid_lt, &self.settings.admin_session_salt) == token
                }
            };
            if valid {
                states[slot.index()] = SlotState::Valid;
            }
        }

        // A long-term session satisfied over URI or form data means the
        // client runs without cookies: drop the cookie-only short-term
        // check and keep the rest of the request on cookieless transport.
        if states[Slot::LongTerm.index()] == SlotState::Valid && !real_cookie {
            states[Slot::ShortTerm.index()] = SlotState::Skip;
            ctx.cookies_available = CookieMode::Disabled;
        }

        let (restorable, short_term_active) = match kind {
            SessionKind::Forum => (
                states[Slot::LongTerm.index()] == SlotState::Valid,
                // Only a checked-and-failed short-term slot blocks the
                // full login.
                states[Slot::ShortTerm.index()] != SlotState::Check,
            ),
            SessionKind::Admin => (states[Slot::Admin.index()] == SlotState::Valid, false),
        };

        let Some(user) = session_user.filter(|_| restorable) else {
            self.destroy(ctx, kind)?;
            return Ok(false);
        };

        let user_id = user.user_id;
        if !self
            .users
            .set_active_user(ctx, ActiveUser::Record(user), kind, short_term_active)?
        {
            // The evidence checked out but the account can no longer hold
            // this session kind (admin rights revoked since the cookie was
            // issued).
            tracing::warn!(
                user_id = %user_id,
                "restored session user can no longer be activated; destroying session"
            );
            self.destroy(ctx, kind)?;
            return Ok(false);
        }

        // Keep the session alive: re-issue transport, apply sliding renewal.
        self.create(ctx, kind, ResetPolicy::Reuse)?;
        Ok(true)
    }

    /// Tear down the session of one kind and drop to the anonymous user.
    ///
    /// Client-side cookies are expired even when cookie transport is off;
    /// whatever the client still holds gets cleaned out. On a cookieless
    /// forum logout the stored long-term identifier is rotated as well, so
    /// tickets embedded in circulated page links stop working.
    pub fn destroy(&self, ctx: &mut RequestContext, kind: SessionKind) -> ApiResult<()> {
        let handled = match &self.hooks.destroy {
            Some(hook) => hook.before_destroy(kind)? == HandleDecision::Handled,
            None => false,
        };

        if !handled {
            let now = unix_now();
            match kind {
                SessionKind::Forum => {
                    ctx.expire_cookie(COOKIE_SHORT_TERM, now);
                    ctx.expire_cookie(COOKIE_LONG_TERM, now);
                }
                SessionKind::Admin => ctx.expire_cookie(COOKIE_ADMIN, now),
            }

            if ctx.cookies_available == CookieMode::Disabled
                && kind == SessionKind::Forum
                && !ctx.user().is_anonymous()
            {
                let mut patch = UserFieldPatch::new(ctx.user().user_id);
                patch.sessid_lt = Some(generate_session_id(
                    &ctx.user().username,
                    &ctx.user().password,
                )?);
                self.users.save_raw(ctx, patch)?;
            }
        }

        if !ctx.user().is_anonymous() {
            tracing::info!(user_id = %ctx.user().user_id, "user logged out");
        }
        self.users
            .set_active_user(ctx, ActiveUser::Anonymous, SessionKind::Forum, false)?;
        Ok(())
    }
}

/// Locate the raw ticket for one slot, in evidence priority order.
///
/// Cookies are honored for every slot (the short-term and admin tickets
/// only ever travel as cookies, and an arriving long-term cookie is trusted
/// whenever cookie transport is on). The URI, POST and GET fallbacks apply
/// to the long-term slot alone, and only while cookies are not mandatory.
fn slot_evidence(ctx: &RequestContext, slot: Slot) -> Option<(&str, bool)> {
    let name = slot.cookie_name();

    let cookie_allowed = slot != Slot::LongTerm || ctx.cookies_available > CookieMode::Disabled;
    if cookie_allowed && let Some(value) = ctx.cookies.get(name) {
        return Some((value, true));
    }

    if slot == Slot::LongTerm && ctx.cookies_available < CookieMode::Required {
        for source in [&ctx.uri_args, &ctx.post_vars, &ctx.get_vars] {
            if let Some(value) = source.get(name) {
                return Some((value, false));
            }
        }
    }

    None
}
