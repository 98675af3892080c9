//! Authenticated principal extraction.
//!
//! Reads the bearer access token, verifies it offline, and returns the
//! principal downstream handlers act on. No database work happens here.

use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use uuid::Uuid;

use super::state::AuthState;

/// Authenticated user context derived from the access token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
}

/// Resolve the bearer token into a principal, or return 401.
pub fn require_auth(headers: &HeaderMap, auth_state: &AuthState) -> Result<Principal, StatusCode> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    match auth_state.decode_access_token(&token) {
        Ok(claims) => Ok(Principal {
            user_id: claims.sub,
            email: claims.email,
        }),
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::super::state::AuthConfig;
    use super::*;
    use axum::http::HeaderValue;
    use secrecy::SecretString;

    fn auth_state() -> AuthState {
        AuthState::new(
            AuthConfig::new("https://blockbustre.com".to_string()),
            &SecretString::from("test-secret".to_string()),
        )
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let state = auth_state();
        let result = require_auth(&HeaderMap::new(), &state);
        assert_eq!(result.err(), Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn garbage_token_is_unauthorized() {
        let state = auth_state();
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer junk"));
        let result = require_auth(&headers, &state);
        assert_eq!(result.err(), Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn valid_token_yields_principal() -> anyhow::Result<()> {
        let state = auth_state();
        let user_id = Uuid::new_v4();
        let token = state.issue_access_token(user_id, "alice@example.com")?;
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );
        let principal = require_auth(&headers, &state).expect("principal");
        assert_eq!(principal.user_id, user_id);
        assert_eq!(principal.email, "alice@example.com");
        Ok(())
    }

    #[test]
    fn refresh_token_is_not_accepted() -> anyhow::Result<()> {
        let state = auth_state();
        let (refresh, _) = state.issue_refresh_token(Uuid::new_v4())?;
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {refresh}"))?,
        );
        let result = require_auth(&headers, &state);
        assert_eq!(result.err(), Some(StatusCode::UNAUTHORIZED));
        Ok(())
    }

    #[test]
    fn extract_bearer_token_variants() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer abc"));
        assert_eq!(extract_bearer_token(&headers), Some("abc".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert_eq!(extract_bearer_token(&headers), None);
    }
}
