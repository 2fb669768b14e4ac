//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Identifier of a user account.
///
/// Id `0` is reserved for the anonymous user and never refers to a stored
/// account.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(u32);

/// Identifier of a forum.
///
/// Id `0` means "no specific forum" (e.g. activity recorded outside any
/// forum).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForumId(u32);

/// Identifier of a user group.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(u32);

macro_rules! impl_id_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            pub const fn as_u32(&self) -> u32 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<u32> for $t {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl From<$t> for u32 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = ApiError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s
                    .parse::<u32>()
                    .map_err(|e| ApiError::validation(format!("{}: {}", $name, e)))?;
                Ok(Self(raw))
            }
        }
    };
}

impl_id_newtype!(UserId, "UserId");
impl_id_newtype!(ForumId, "ForumId");
impl_id_newtype!(GroupId, "GroupId");

impl UserId {
    /// The anonymous (not signed in) user.
    pub const ANONYMOUS: UserId = UserId(0);

    pub const fn is_anonymous(&self) -> bool {
        self.0 == 0
    }
}

impl ForumId {
    /// Sentinel for "no specific forum".
    pub const NONE: ForumId = ForumId(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_zero_is_anonymous() {
        assert!(UserId::ANONYMOUS.is_anonymous());
        assert!(!UserId::new(7).is_anonymous());
    }

    #[test]
    fn ids_parse_from_decimal_strings() {
        assert_eq!("42".parse::<UserId>().unwrap(), UserId::new(42));
        assert!("not-a-number".parse::<UserId>().is_err());
        assert!("-1".parse::<ForumId>().is_err());
    }

    #[test]
    fn ids_round_trip_display() {
        let id = GroupId::new(1234);
        assert_eq!(id.to_string().parse::<GroupId>().unwrap(), id);
    }
}
