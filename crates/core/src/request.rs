//! Request-scoped state: who is acting, what came in, what must go back out.
//!
//! One [`RequestContext`] is built per incoming request and passed by
//! reference into every user/session call. It replaces ambient global state:
//! the active user, the derived login flags and the transport registries all
//! live here and die with the request.

use std::collections::BTreeMap;

use crate::id::ForumId;
use crate::settings::{CookieMode, SiteSettings};
use crate::user::UserRecord;

/// Cookie (and URI/form field) name of the long-term session identifier.
pub const COOKIE_LONG_TERM: &str = "tribune_session";
/// Cookie name of the short-term session identifier.
pub const COOKIE_SHORT_TERM: &str = "tribune_session_st";
/// Cookie name of the admin session identifier.
pub const COOKIE_ADMIN: &str = "tribune_admin_session";

/// The two session flavors.
///
/// Admin sessions are fully separate from front-end forum sessions: they are
/// cookie-only, carry no timeout and do not survive closing the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Forum,
    Admin,
}

/// One outbound cookie instruction.
///
/// `expires: None` issues a browser-session cookie; a timestamp in the past
/// deletes the cookie client-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieWrite {
    pub name: String,
    pub value: String,
    pub expires: Option<i64>,
    pub path: String,
    pub domain: String,
}

/// State of one request against the user/session layer.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Symbolic name of the page handling the request (feeds the
    /// posting-token derivation).
    pub page: String,
    pub current_forum: Option<ForumId>,
    pub user_agent: Option<String>,

    /// Cookies presented by the client.
    pub cookies: BTreeMap<String, String>,
    /// Arguments carried in the request URI path.
    pub uri_args: BTreeMap<String, String>,
    /// Posted form fields.
    pub post_vars: BTreeMap<String, String>,
    /// Query-string parameters.
    pub get_vars: BTreeMap<String, String>,

    /// Cookie policy effective for this request. Starts at the site-wide
    /// setting; session restore downgrades it to `Disabled` when long-term
    /// evidence arrives over a non-cookie channel.
    pub cookies_available: CookieMode,

    /// Cookies to send with the response.
    pub cookie_writes: Vec<CookieWrite>,
    /// Values every generated URI must carry (cookieless session transport).
    pub uri_out: BTreeMap<String, String>,
    /// Hidden form fields every rendered form must carry.
    pub form_out: BTreeMap<String, String>,

    cookie_path: String,
    cookie_domain: String,
    user: UserRecord,
    logged_in: bool,
    fully_logged_in: bool,
    administrator: bool,
}

impl RequestContext {
    /// Fresh anonymous context for one request.
    pub fn new(settings: &SiteSettings) -> Self {
        Self {
            page: String::new(),
            current_forum: None,
            user_agent: None,
            cookies: BTreeMap::new(),
            uri_args: BTreeMap::new(),
            post_vars: BTreeMap::new(),
            get_vars: BTreeMap::new(),
            cookies_available: settings.cookie_mode,
            cookie_writes: Vec::new(),
            uri_out: BTreeMap::new(),
            form_out: BTreeMap::new(),
            cookie_path: settings.session_path.clone(),
            cookie_domain: settings.session_domain.clone(),
            user: UserRecord::anonymous(),
            logged_in: false,
            fully_logged_in: false,
            administrator: false,
        }
    }

    pub fn user(&self) -> &UserRecord {
        &self.user
    }

    /// Mutable access to the live user record, for trusted field refreshes
    /// after raw saves. Does not touch the derived flags.
    pub fn user_mut(&mut self) -> &mut UserRecord {
        &mut self.user
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn is_fully_logged_in(&self) -> bool {
        self.fully_logged_in
    }

    pub fn is_administrator(&self) -> bool {
        self.administrator
    }

    /// Install `record` as the active user and re-derive the login flags.
    ///
    /// Only Forum-kind activation marks the front-end session as logged in;
    /// an admin session on its own leaves `logged_in` false. The
    /// administrator flag follows the record's admin bit for either kind.
    pub fn install_user(&mut self, record: UserRecord, kind: SessionKind, fully: bool) {
        self.administrator = record.admin;
        match kind {
            SessionKind::Forum => {
                self.logged_in = true;
                self.fully_logged_in = fully;
            }
            SessionKind::Admin => {
                self.logged_in = false;
                self.fully_logged_in = false;
            }
        }
        self.user = record;
    }

    /// Drop back to the anonymous user and clear every derived flag.
    pub fn clear_user(&mut self) {
        self.user = UserRecord::anonymous();
        self.logged_in = false;
        self.fully_logged_in = false;
        self.administrator = false;
    }

    /// Queue a cookie write with the configured path/domain attributes.
    pub fn push_cookie(&mut self, name: &str, value: impl Into<String>, expires: Option<i64>) {
        self.cookie_writes.push(CookieWrite {
            name: name.to_owned(),
            value: value.into(),
            expires,
            path: self.cookie_path.clone(),
            domain: self.cookie_domain.clone(),
        });
    }

    /// Queue deletion of a client-side cookie (expiry one day in the past).
    pub fn expire_cookie(&mut self, name: &str, now: i64) {
        self.push_cookie(name, "", Some(now - 86400));
    }

    /// Register a value that generated URIs must carry.
    pub fn register_uri_arg(&mut self, name: &str, value: impl Into<String>) {
        self.uri_out.insert(name.to_owned(), value.into());
    }

    /// Register a hidden field that rendered forms must carry.
    pub fn register_form_field(&mut self, name: &str, value: impl Into<String>) {
        self.form_out.insert(name.to_owned(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::UserId;
    use crate::user::UserActive;

    fn member(id: u32, admin: bool) -> UserRecord {
        UserRecord {
            user_id: UserId::new(id),
            username: format!("user{id}"),
            active: UserActive::Active,
            admin,
            ..UserRecord::default()
        }
    }

    #[test]
    fn forum_install_sets_login_flags() {
        let mut ctx = RequestContext::new(&SiteSettings::default());
        ctx.install_user(member(3, false), SessionKind::Forum, true);
        assert!(ctx.is_logged_in());
        assert!(ctx.is_fully_logged_in());
        assert!(!ctx.is_administrator());
        assert_eq!(ctx.user().user_id, UserId::new(3));
    }

    #[test]
    fn admin_install_alone_is_not_a_forum_login() {
        let mut ctx = RequestContext::new(&SiteSettings::default());
        ctx.install_user(member(1, true), SessionKind::Admin, false);
        assert!(!ctx.is_logged_in());
        assert!(ctx.is_administrator());
    }

    #[test]
    fn admin_bit_is_reflected_for_forum_installs_too() {
        let mut ctx = RequestContext::new(&SiteSettings::default());
        ctx.install_user(member(1, true), SessionKind::Forum, false);
        assert!(ctx.is_logged_in());
        assert!(!ctx.is_fully_logged_in());
        assert!(ctx.is_administrator());
    }

    #[test]
    fn clear_user_resets_everything() {
        let mut ctx = RequestContext::new(&SiteSettings::default());
        ctx.install_user(member(9, true), SessionKind::Forum, true);
        ctx.clear_user();
        assert!(ctx.user().is_anonymous());
        assert!(!ctx.is_logged_in());
        assert!(!ctx.is_fully_logged_in());
        assert!(!ctx.is_administrator());
    }

    #[test]
    fn expire_cookie_writes_a_past_expiry() {
        let mut ctx = RequestContext::new(&SiteSettings::default());
        ctx.expire_cookie(COOKIE_LONG_TERM, 1_000_000);
        let write = &ctx.cookie_writes[0];
        assert_eq!(write.name, COOKIE_LONG_TERM);
        assert_eq!(write.value, "");
        assert_eq!(write.expires, Some(1_000_000 - 86400));
    }

    #[test]
    fn cookie_writes_carry_configured_attributes() {
        let settings = SiteSettings {
            session_path: "/forum".to_owned(),
            session_domain: "example.net".to_owned(),
            ..SiteSettings::default()
        };
        let mut ctx = RequestContext::new(&settings);
        ctx.push_cookie(COOKIE_ADMIN, "1:abc", None);
        let write = &ctx.cookie_writes[0];
        assert_eq!(write.path, "/forum");
        assert_eq!(write.domain, "example.net");
        assert_eq!(write.expires, None);
    }
}
