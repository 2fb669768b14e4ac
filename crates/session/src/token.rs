//! Session identifier and ticket primitives.
//!
//! Stored session identifiers are 32 lowercase hex characters. What travels
//! to the client is a *ticket*, `"<user id>:<identifier>"`, so restore can
//! look the account up before comparing tokens.

use chrono::Utc;
use tribune_core::{ApiError, ApiResult, UserId};

/// Length of a session identifier in hex characters.
pub(crate) const SESSION_ID_LEN: usize = 32;

/// Domain separation string for the derived admin session identifier.
const ADMIN_TOKEN_CONTEXT: &str = "tribune admin session v1";

/// Generate a fresh, unpredictable session identifier.
///
/// The account's username and stored password hash are mixed in alongside
/// the random nonce, so identifiers are bound to the account they were
/// minted for even if the random source misbehaves.
pub(crate) fn generate_session_id(username: &str, password_hash: &str) -> ApiResult<String> {
    let mut nonce = [0u8; 16];
    getrandom::getrandom(&mut nonce)
        .map_err(|e| ApiError::store(format!("random nonce generation failed: {e}")))?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(username.as_bytes());
    hasher.update(
        &Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_le_bytes(),
    );
    hasher.update(password_hash.as_bytes());
    hasher.update(&nonce);
    Ok(hasher.finalize().to_hex().as_str()[..SESSION_ID_LEN].to_owned())
}

/// Admin session identifier, derived from the long-term identifier and the
/// installation salt. Never stored; recomputed on every check, so rotating
/// the long-term identifier invalidates it as well.
pub(crate) fn admin_token(sessid_lt: &str, salt: &str) -> String {
    let key = blake3::derive_key(ADMIN_TOKEN_CONTEXT, salt.as_bytes());
    blake3::keyed_hash(&key, sessid_lt.as_bytes()).to_hex().as_str()[..SESSION_ID_LEN].to_owned()
}

/// Client-side ticket for one session slot.
pub(crate) fn session_ticket(user_id: UserId, token: &str) -> String {
    format!("{user_id}:{token}")
}

/// Split a ticket back into user id and token. `None` for anything that does
/// not look like `"<digits>:<token>"`.
pub(crate) fn parse_session_ticket(raw: &str) -> Option<(UserId, &str)> {
    let (uid, token) = raw.split_once(':')?;
    if uid.is_empty() || !uid.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let uid = uid.parse::<u32>().ok()?;
    Some((UserId::new(uid), token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn generated_ids_are_hex_and_unique() {
        let a = generate_session_id("alice", "$argon2id$...").unwrap();
        let b = generate_session_id("alice", "$argon2id$...").unwrap();
        assert_eq!(a.len(), SESSION_ID_LEN);
        assert!(a.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
        assert_ne!(a, b);
    }

    #[test]
    fn admin_token_is_deterministic_per_salt() {
        let a = admin_token("aaaa", "salt-one");
        assert_eq!(a, admin_token("aaaa", "salt-one"));
        assert_ne!(a, admin_token("aaaa", "salt-two"));
        assert_ne!(a, admin_token("bbbb", "salt-one"));
        assert_eq!(a.len(), SESSION_ID_LEN);
    }

    #[test]
    fn tickets_round_trip() {
        let ticket = session_ticket(UserId::new(1234), "deadbeef");
        assert_eq!(ticket, "1234:deadbeef");
        let (uid, token) = parse_session_ticket(&ticket).unwrap();
        assert_eq!(uid, UserId::new(1234));
        assert_eq!(token, "deadbeef");
    }

    #[test]
    fn malformed_tickets_are_rejected() {
        assert_eq!(parse_session_ticket(""), None);
        assert_eq!(parse_session_ticket("no-colon"), None);
        assert_eq!(parse_session_ticket(":token"), None);
        assert_eq!(parse_session_ticket("12a:token"), None);
        assert_eq!(parse_session_ticket("-3:token"), None);
        assert_eq!(parse_session_ticket("99999999999:token"), None);
    }

    #[test]
    fn token_after_first_colon_may_contain_colons() {
        let (uid, token) = parse_session_ticket("7:ab:cd").unwrap();
        assert_eq!(uid, UserId::new(7));
        assert_eq!(token, "ab:cd");
    }

    proptest! {
        #[test]
        fn any_valid_ticket_round_trips(uid in 0u32..=u32::MAX, token in "[0-9a-f]{32}") {
            let ticket = session_ticket(UserId::new(uid), &token);
            let (parsed_uid, parsed_token) = parse_session_ticket(&ticket).unwrap();
            prop_assert_eq!(parsed_uid, UserId::new(uid));
            prop_assert_eq!(parsed_token, token.as_str());
        }

        #[test]
        fn junk_never_panics(raw in "\\PC*") {
            let _ = parse_session_ticket(&raw);
        }

        #[test]
        fn generated_ids_are_well_formed(name in "\\PC{0,40}", hash in "\\PC{0,80}") {
            let id = generate_session_id(&name, &hash).unwrap();
            prop_assert_eq!(id.len(), SESSION_ID_LEN);
            prop_assert!(id.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
        }
    }
}
