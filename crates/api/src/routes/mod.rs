//! Route handlers.

pub mod cart;
pub mod health;
pub mod metrics;
pub mod quote;
pub mod webhook;

use axum::http::{HeaderMap, header};

use common::{CART_COOKIE_NAME, CartCookie};

/// Extracts the cart cookie token from request headers.
pub(crate) fn cart_cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == CART_COOKIE_NAME)
        .map(|(_, token)| token.to_string())
}

/// Renders the `Set-Cookie` value for a refreshed cart cookie.
pub(crate) fn cart_cookie_header(cookie: &CartCookie) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        CART_COOKIE_NAME,
        cookie.to_token()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::DateTime;
    use common::SessionId;

    #[test]
    fn test_token_extracted_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; cart=abc:123; lang=en"),
        );
        assert_eq!(cart_cookie_token(&headers), Some("abc:123".to_string()));
    }

    #[test]
    fn test_missing_cookie_is_none() {
        let headers = HeaderMap::new();
        assert_eq!(cart_cookie_token(&headers), None);
    }

    #[test]
    fn test_set_cookie_value_roundtrips() {
        let cookie = CartCookie::new(
            SessionId::new(),
            DateTime::from_timestamp(1_900_000_000, 0).unwrap(),
        );
        let header_value = cart_cookie_header(&cookie);
        let token = header_value
            .strip_prefix("cart=")
            .unwrap()
            .split(';')
            .next()
            .unwrap();
        assert_eq!(CartCookie::parse(token).unwrap(), cookie);
    }
}
