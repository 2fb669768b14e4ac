//! Posting-token guard for form submissions.
//!
//! Every rendered form carries a hidden token bound to the target page and
//! the requester's session secrets. A form submission whose token does not
//! match is rejected outright, so forged cross-site posts die before any
//! processing happens.

use tribune_core::{ApiError, ApiResult, RequestContext, SiteSettings};

use crate::token::SESSION_ID_LEN;

/// Form field prefix under which the posting token travels; the full field
/// name is `"posting_token:<page>"`.
pub const POSTING_TOKEN_FIELD_PREFIX: &str = "posting_token";

/// Domain separation string for the posting-token MAC key.
const POSTING_TOKEN_CONTEXT: &str = "tribune posting token v1";

/// Compute the posting token for a page, `ctx.page` unless overridden.
///
/// The token is a MAC keyed by the installation's private key over the page
/// name and a requester-bound secret: password hash plus long-term session
/// id for signed-in users, the client's user agent otherwise. Password
/// changes and session rotation invalidate outstanding tokens.
pub fn token_for(ctx: &RequestContext, settings: &SiteSettings, page: Option<&str>) -> String {
    let page = page.unwrap_or(&ctx.page);
    let secret = if ctx.user().is_anonymous() {
        ctx.user_agent.as_deref().unwrap_or("unknown").to_owned()
    } else {
        format!("{}:{}", ctx.user().password, ctx.user().sessid_lt)
    };

    let key = blake3::derive_key(POSTING_TOKEN_CONTEXT, settings.private_key.as_bytes());
    let mut hasher = blake3::Hasher::new_keyed(&key);
    hasher.update(page.as_bytes());
    hasher.update(&[0]);
    hasher.update(secret.as_bytes());
    hasher.finalize().to_hex().as_str()[..SESSION_ID_LEN].to_owned()
}

/// Compute the expected token for the request's page and register it as a
/// hidden form field for the response. Returns the token.
pub fn register(ctx: &mut RequestContext, settings: &SiteSettings) -> String {
    let token = token_for(ctx, settings, None);
    let field = field_name(&ctx.page);
    ctx.register_form_field(&field, token.clone());
    token
}

/// Guard a request against forged form submissions.
///
/// The expected token is always registered for the response. A request
/// without posted data has nothing to prove. One with posted data must
/// carry the exact expected token under the page's field name; anything
/// else aborts with [`ApiError::TamperDetected`].
pub fn check(ctx: &mut RequestContext, settings: &SiteSettings) -> ApiResult<String> {
    let token = register(ctx, settings);

    if ctx.post_vars.is_empty() {
        return Ok(token);
    }

    let field = field_name(&ctx.page);
    match ctx.post_vars.get(&field) {
        Some(posted) if *posted == token => Ok(token),
        _ => {
            tracing::warn!(page = %ctx.page, "posting token missing or mismatched");
            Err(ApiError::TamperDetected)
        }
    }
}

fn field_name(page: &str) -> String {
    format!("{POSTING_TOKEN_FIELD_PREFIX}:{page}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tribune_core::{SessionKind, UserActive, UserId, UserRecord};

    fn settings() -> SiteSettings {
        SiteSettings::default()
    }

    fn member(id: u32, password: &str, sessid_lt: &str) -> UserRecord {
        UserRecord {
            user_id: UserId::new(id),
            username: format!("user{id}"),
            active: UserActive::Active,
            password: password.to_owned(),
            sessid_lt: sessid_lt.to_owned(),
            ..UserRecord::default()
        }
    }

    fn ctx_for(user: Option<UserRecord>, page: &str) -> RequestContext {
        let mut ctx = RequestContext::new(&settings());
        ctx.page = page.to_owned();
        if let Some(user) = user {
            ctx.install_user(user, SessionKind::Forum, true);
        }
        ctx
    }

    #[test]
    fn token_is_bound_to_the_page() {
        let ctx = ctx_for(Some(member(3, "$hash$", "aaaa")), "read");
        let on_read = token_for(&ctx, &settings(), None);
        let on_post = token_for(&ctx, &settings(), Some("post"));
        assert_eq!(on_read.len(), 32);
        assert_ne!(on_read, on_post);
        assert_eq!(on_read, token_for(&ctx, &settings(), Some("read")));
    }

    #[test]
    fn token_is_bound_to_the_session() {
        let s = settings();
        let a = token_for(&ctx_for(Some(member(3, "$hash$", "aaaa")), "read"), &s, None);
        let b = token_for(&ctx_for(Some(member(3, "$hash$", "bbbb")), "read"), &s, None);
        let c = token_for(&ctx_for(Some(member(3, "$other$", "aaaa")), "read"), &s, None);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn token_is_bound_to_the_installation_key() {
        let ctx = ctx_for(Some(member(3, "$hash$", "aaaa")), "read");
        let other = SiteSettings {
            private_key: "a different installation".to_owned(),
            ..settings()
        };
        assert_ne!(token_for(&ctx, &settings(), None), token_for(&ctx, &other, None));
    }

    #[test]
    fn anonymous_tokens_key_on_the_user_agent() {
        let s = settings();
        let mut ctx = ctx_for(None, "read");
        ctx.user_agent = Some("browser/1.0".to_owned());
        let a = token_for(&ctx, &s, None);
        ctx.user_agent = Some("browser/2.0".to_owned());
        let b = token_for(&ctx, &s, None);
        ctx.user_agent = None;
        let unknown = token_for(&ctx, &s, None);
        assert_ne!(a, b);
        assert_ne!(a, unknown);
    }

    #[test]
    fn register_emits_the_hidden_field() {
        let s = settings();
        let mut ctx = ctx_for(Some(member(3, "$hash$", "aaaa")), "read");
        let token = register(&mut ctx, &s);
        assert_eq!(ctx.form_out.get("posting_token:read"), Some(&token));
    }

    #[test]
    fn requests_without_posted_data_pass() {
        let s = settings();
        let mut ctx = ctx_for(Some(member(3, "$hash$", "aaaa")), "read");
        let token = check(&mut ctx, &s).unwrap();
        // The field is registered even when there was nothing to check.
        assert_eq!(ctx.form_out.get("posting_token:read"), Some(&token));
    }

    #[test]
    fn matching_posted_token_passes() {
        let s = settings();
        let mut ctx = ctx_for(Some(member(3, "$hash$", "aaaa")), "read");
        let expected = token_for(&ctx, &s, None);
        ctx.post_vars
            .insert("posting_token:read".to_owned(), expected.clone());
        ctx.post_vars.insert("body".to_owned(), "hello".to_owned());
        assert_eq!(check(&mut ctx, &s).unwrap(), expected);
    }

    #[test]
    fn missing_or_wrong_posted_token_is_tampering() {
        let s = settings();

        let mut ctx = ctx_for(Some(member(3, "$hash$", "aaaa")), "read");
        ctx.post_vars.insert("body".to_owned(), "hello".to_owned());
        assert_eq!(check(&mut ctx, &s), Err(ApiError::TamperDetected));

        let mut ctx = ctx_for(Some(member(3, "$hash$", "aaaa")), "read");
        ctx.post_vars
            .insert("posting_token:read".to_owned(), "0".repeat(32));
        assert_eq!(check(&mut ctx, &s), Err(ApiError::TamperDetected));
    }

    #[test]
    fn token_replayed_against_another_session_fails() {
        let s = settings();
        let victim = ctx_for(Some(member(3, "$hash$", "aaaa")), "post");
        let stolen = token_for(&victim, &s, None);

        let mut attacker = ctx_for(Some(member(4, "$hash2$", "cccc")), "post");
        attacker
            .post_vars
            .insert("posting_token:post".to_owned(), stolen);
        assert_eq!(check(&mut attacker, &s), Err(ApiError::TamperDetected));
    }

    #[test]
    fn token_for_one_page_fails_on_another() {
        let s = settings();
        let mut ctx = ctx_for(Some(member(3, "$hash$", "aaaa")), "read");
        let for_read = token_for(&ctx, &s, None);
        ctx.page = "post".to_owned();
        ctx.post_vars
            .insert("posting_token:post".to_owned(), for_read);
        assert_eq!(check(&mut ctx, &s), Err(ApiError::TamperDetected));
    }
}
