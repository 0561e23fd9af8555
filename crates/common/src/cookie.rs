//! Cart cookie codec.
//!
//! The cart cookie is the opaque token every cart and checkout endpoint
//! consumes. Wire format: `"<session-uuid>:<epoch-seconds-expiry>"`. The
//! trailing expiry is regenerated whenever the session is extended.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::types::SessionId;

/// Name of the cart cookie.
pub const CART_COOKIE_NAME: &str = "cart";

/// Parsed cart cookie value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartCookie {
    /// The shopping session this cookie points at.
    pub session_id: SessionId,
    /// Advisory expiry baked into the token.
    pub expires_at: DateTime<Utc>,
}

/// Errors from decoding a cart cookie token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CookieError {
    /// The token did not match `"<uuid>:<epoch-seconds>"`.
    #[error("malformed cart cookie")]
    Malformed,
}

impl CartCookie {
    /// Creates a cookie for a session with the given expiry.
    pub fn new(session_id: SessionId, expires_at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            expires_at,
        }
    }

    /// Parses a cookie token.
    pub fn parse(token: &str) -> Result<Self, CookieError> {
        let (id_part, expiry_part) = token.split_once(':').ok_or(CookieError::Malformed)?;

        let uuid = Uuid::parse_str(id_part).map_err(|_| CookieError::Malformed)?;
        let epoch: i64 = expiry_part.parse().map_err(|_| CookieError::Malformed)?;
        let expires_at = DateTime::from_timestamp(epoch, 0).ok_or(CookieError::Malformed)?;

        Ok(Self {
            session_id: SessionId::from_uuid(uuid),
            expires_at,
        })
    }

    /// Renders the wire token.
    pub fn to_token(&self) -> String {
        format!("{}:{}", self.session_id, self.expires_at.timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let cookie = CartCookie::new(
            SessionId::new(),
            DateTime::from_timestamp(1_900_000_000, 0).unwrap(),
        );
        let parsed = CartCookie::parse(&cookie.to_token()).unwrap();
        assert_eq!(parsed, cookie);
    }

    #[test]
    fn rejects_missing_separator() {
        assert_eq!(CartCookie::parse("not-a-cookie"), Err(CookieError::Malformed));
    }

    #[test]
    fn rejects_bad_uuid() {
        assert_eq!(
            CartCookie::parse("xyz:1900000000"),
            Err(CookieError::Malformed)
        );
    }

    #[test]
    fn rejects_bad_epoch() {
        let id = SessionId::new();
        assert_eq!(
            CartCookie::parse(&format!("{id}:tomorrow")),
            Err(CookieError::Malformed)
        );
    }

    #[test]
    fn token_ends_with_epoch_seconds() {
        let cookie = CartCookie::new(
            SessionId::new(),
            DateTime::from_timestamp(1_900_000_000, 0).unwrap(),
        );
        assert!(cookie.to_token().ends_with(":1900000000"));
    }
}
