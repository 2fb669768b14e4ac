//! Credential verification and the combined login flows.

use tribune_core::{ApiResult, RequestContext, SessionKind, UserId};
use tribune_users::{ActiveUser, SaveOptions, UserChange, verify_password};

use crate::hooks::AuthDecision;
use crate::manager::{ResetPolicy, SessionManager};

impl SessionManager {
    /// Verify a username/password pair. `None` means rejected.
    ///
    /// The primary password hash is tried first. A match against the
    /// account's temporary password (set by password-reset flows) also
    /// authenticates, and as a side effect promotes the presented password
    /// to the primary one; the temporary password itself is left in place.
    /// Authentication never touches session state; login flows combine it
    /// with activation and session issue themselves.
    pub fn authenticate(
        &self,
        ctx: &mut RequestContext,
        kind: SessionKind,
        username: &str,
        password: &str,
    ) -> ApiResult<Option<UserId>> {
        if let Some(hook) = &self.hooks().authenticate {
            match hook.authenticate(kind, username, password)? {
                AuthDecision::Accept(user_id) => return Ok(Some(user_id)),
                AuthDecision::Reject => return Ok(None),
                AuthDecision::Defer => {}
            }
        }

        let Some(creds) = self.users().credentials_for(username)? else {
            return Ok(None);
        };

        if verify_password(password, &creds.password) {
            return Ok(Some(creds.user_id));
        }

        if let Some(temp) = &creds.password_temp
            && verify_password(password, temp)
        {
            let mut change = UserChange::for_user(creds.user_id);
            change.password = Some(password.to_owned());
            self.users().save(ctx, &change, SaveOptions::default())?;
            tracing::info!(
                user_id = %creds.user_id,
                "temporary password used; promoted to primary password"
            );
            return Ok(Some(creds.user_id));
        }

        Ok(None)
    }

    /// Front-end login: verify credentials, activate the user and issue a
    /// forum session. `None` when the credentials are rejected or the
    /// account cannot be activated.
    pub fn login(
        &self,
        ctx: &mut RequestContext,
        username: &str,
        password: &str,
    ) -> ApiResult<Option<UserId>> {
        let Some(user_id) = self.authenticate(ctx, SessionKind::Forum, username, password)? else {
            return Ok(None);
        };
        if !self
            .users()
            .set_active_user(ctx, ActiveUser::Id(user_id), SessionKind::Forum, true)?
        {
            return Ok(None);
        }
        self.create(ctx, SessionKind::Forum, ResetPolicy::OnLogin)?;
        tracing::info!(user_id = %user_id, "user logged in");
        Ok(Some(user_id))
    }

    /// Admin interface login. On success the admin session cookie is
    /// issued; the front-end login flags are left alone. Non-admin
    /// accounts are rejected even with correct credentials.
    pub fn admin_login(
        &self,
        ctx: &mut RequestContext,
        username: &str,
        password: &str,
    ) -> ApiResult<Option<UserId>> {
        let Some(user_id) = self.authenticate(ctx, SessionKind::Admin, username, password)? else {
            return Ok(None);
        };
        if !self
            .users()
            .set_active_user(ctx, ActiveUser::Id(user_id), SessionKind::Admin, false)?
        {
            return Ok(None);
        }
        self.create(ctx, SessionKind::Admin, ResetPolicy::Reuse)?;
        tracing::info!(user_id = %user_id, "administrator logged in");
        Ok(Some(user_id))
    }
}
