//! Installation-wide settings consumed by the user and session layers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Site-wide cookie policy.
///
/// Ordered: `Disabled < Allowed < Required`. A request context starts at the
/// site-wide value and may be downgraded to `Disabled` for the remainder of
/// one request when session evidence arrives over a non-cookie channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CookieMode {
    /// Never use cookies; sessions ride on URI and form data.
    Disabled,
    /// Use cookies when the client presents them, fall back otherwise.
    #[default]
    Allowed,
    /// Cookies are mandatory; URI/form fallback is never consulted.
    Required,
}

/// Which stored field feeds derived display names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisplayNameSource {
    #[default]
    Username,
    RealName,
}

/// Declaration of one pluggable custom profile field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomProfileField {
    pub id: u32,
    pub name: String,
    /// String values are truncated to this many characters on save.
    pub max_length: usize,
}

/// Installation-wide configuration.
///
/// `Default` yields a working single-machine dev setup; [`from_env`]
/// overrides from the environment and warns when the secrets keep their
/// insecure defaults.
///
/// [`from_env`]: SiteSettings::from_env
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSettings {
    pub cookie_mode: CookieMode,
    /// Require a valid short-term session for sensitive actions.
    pub tight_security: bool,
    /// Lifetime window of the short-term session, in minutes.
    pub short_session_minutes: i64,
    /// Lifetime of the long-term session cookie, in days. 0 means the cookie
    /// never expires server-side (it is issued as a browser-session cookie).
    pub long_session_days: i64,
    pub session_path: String,
    pub session_domain: String,
    /// Installation secret mixed into the derived admin session identifier.
    pub admin_session_salt: String,
    /// Site key for the posting-token MAC.
    pub private_key: String,
    pub display_name_source: DisplayNameSource,
    /// A trusted module supplies ready-made (HTML) display names.
    pub custom_display_name: bool,
    pub cache_users: bool,
    /// Minimum seconds between activity-tracking writes. 0 disables tracking.
    pub track_user_activity: i64,
    pub custom_profile_fields: BTreeMap<String, CustomProfileField>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            cookie_mode: CookieMode::Allowed,
            tight_security: false,
            short_session_minutes: 30,
            long_session_days: 30,
            session_path: "/".to_owned(),
            session_domain: String::new(),
            admin_session_salt: DEV_ADMIN_SALT.to_owned(),
            private_key: DEV_PRIVATE_KEY.to_owned(),
            display_name_source: DisplayNameSource::Username,
            custom_display_name: false,
            cache_users: false,
            track_user_activity: 0,
            custom_profile_fields: BTreeMap::new(),
        }
    }
}

const DEV_ADMIN_SALT: &str = "dev-admin-salt-change-me";
const DEV_PRIVATE_KEY: &str = "dev-private-key-change-me";

impl SiteSettings {
    /// Build settings from `TRIBUNE_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Some(raw) = env_var("TRIBUNE_COOKIE_MODE") {
            settings.cookie_mode = match raw.as_str() {
                "0" | "disabled" => CookieMode::Disabled,
                "1" | "allowed" => CookieMode::Allowed,
                "2" | "required" => CookieMode::Required,
                other => {
                    tracing::warn!(value = other, "unknown TRIBUNE_COOKIE_MODE; keeping default");
                    settings.cookie_mode
                }
            };
        }
        if let Some(raw) = env_var("TRIBUNE_TIGHT_SECURITY") {
            settings.tight_security = is_truthy(&raw);
        }
        if let Some(minutes) = env_i64("TRIBUNE_SHORT_SESSION_MINUTES") {
            settings.short_session_minutes = minutes;
        }
        if let Some(days) = env_i64("TRIBUNE_LONG_SESSION_DAYS") {
            settings.long_session_days = days;
        }
        if let Some(path) = env_var("TRIBUNE_SESSION_PATH") {
            settings.session_path = path;
        }
        if let Some(domain) = env_var("TRIBUNE_SESSION_DOMAIN") {
            settings.session_domain = domain;
        }
        if let Some(raw) = env_var("TRIBUNE_DISPLAY_NAME_SOURCE") {
            settings.display_name_source = match raw.as_str() {
                "username" => DisplayNameSource::Username,
                "real_name" => DisplayNameSource::RealName,
                other => {
                    tracing::warn!(
                        value = other,
                        "unknown TRIBUNE_DISPLAY_NAME_SOURCE; keeping default"
                    );
                    settings.display_name_source
                }
            };
        }
        if let Some(raw) = env_var("TRIBUNE_CUSTOM_DISPLAY_NAME") {
            settings.custom_display_name = is_truthy(&raw);
        }
        if let Some(raw) = env_var("TRIBUNE_CACHE_USERS") {
            settings.cache_users = is_truthy(&raw);
        }
        if let Some(seconds) = env_i64("TRIBUNE_TRACK_USER_ACTIVITY") {
            settings.track_user_activity = seconds;
        }

        settings.admin_session_salt = env_var("TRIBUNE_ADMIN_SESSION_SALT").unwrap_or_else(|| {
            tracing::warn!("TRIBUNE_ADMIN_SESSION_SALT not set; using insecure dev default");
            DEV_ADMIN_SALT.to_owned()
        });
        settings.private_key = env_var("TRIBUNE_PRIVATE_KEY").unwrap_or_else(|| {
            tracing::warn!("TRIBUNE_PRIVATE_KEY not set; using insecure dev default");
            DEV_PRIVATE_KEY.to_owned()
        });

        settings
    }

    /// Seconds in the short-term session lifetime window.
    pub fn short_session_window(&self) -> i64 {
        self.short_session_minutes * 60
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_i64(name: &str) -> Option<i64> {
    let raw = env_var(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = raw, "not a number; keeping default");
            None
        }
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(raw, "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_a_workable_dev_setup() {
        let settings = SiteSettings::default();
        assert_eq!(settings.cookie_mode, CookieMode::Allowed);
        assert!(!settings.tight_security);
        assert_eq!(settings.short_session_window(), 30 * 60);
        assert_eq!(settings.session_path, "/");
    }

    #[test]
    fn cookie_modes_are_ordered() {
        assert!(CookieMode::Disabled < CookieMode::Allowed);
        assert!(CookieMode::Allowed < CookieMode::Required);
    }
}
