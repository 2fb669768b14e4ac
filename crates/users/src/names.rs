//! Display-name derivation and text format helpers.

use tribune_core::{DisplayNameSource, SiteSettings};

/// Fallback shown for users that cannot be resolved.
pub const ANONYMOUS_DISPLAY_NAME: &str = "Anonymous user";

/// Output format for display names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameFormat {
    /// HTML-safe output (escaped, unless a trusted module supplied the name).
    Html,
    /// Plain text output (tags stripped from trusted names).
    Plain,
}

/// The display name derived from stored fields, as used when no trusted
/// module supplies custom display names.
pub(crate) fn derived_display_name(
    settings: &SiteSettings,
    username: &str,
    real_name: &str,
) -> String {
    match settings.display_name_source {
        DisplayNameSource::RealName if !real_name.trim().is_empty() => real_name.to_owned(),
        _ => username.to_owned(),
    }
}

/// Escape text for embedding into HTML. Double quotes are escaped, single
/// quotes are left alone (attribute values are expected in double quotes).
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Remove HTML tags. An unterminated tag swallows the remainder of the
/// string.
pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
