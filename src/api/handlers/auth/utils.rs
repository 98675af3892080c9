//! Small helpers for credential validation, token handling and client metadata.

use anyhow::{Context, Result};
use axum::http::{header::COOKIE, HeaderMap};
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;

pub(crate) const SESSION_COOKIE_NAME: &str = "blockbustre_session";
pub(crate) const SESSION_KEY_HEADER: &str = "x-session-key";

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Validate a candidate password against the strength policy.
///
/// Returns the list of violated rules; an empty list means the password is
/// acceptable.
pub(crate) fn password_issues(password: &str, email: &str, min_length: usize) -> Vec<String> {
    let mut issues = Vec::new();
    if password.chars().count() < min_length {
        issues.push(format!(
            "Password must be at least {min_length} characters long."
        ));
    }
    if !password.chars().any(char::is_alphabetic) {
        issues.push("Password must contain at least one letter.".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        issues.push("Password must contain at least one digit.".to_string());
    }
    let local_part = email.split('@').next().unwrap_or_default();
    if !local_part.is_empty() && password.eq_ignore_ascii_case(local_part) {
        issues.push("Password is too similar to the email address.".to_string());
    }
    issues
}

/// Create a new account-action token for email links.
///
/// The returned token is only sent to the user; we store a hash in the
/// database.
pub(crate) fn generate_account_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate account token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Create a new session key when the client did not present one.
pub(crate) fn generate_session_key() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session key")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a token so the raw value never touches the database.
pub(crate) fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Build the frontend verification link included in outbound emails.
pub(crate) fn build_verify_url(frontend_base_url: &str, user_id: &str, token: &str) -> String {
    let base = frontend_base_url.trim_end_matches('/');
    format!("{base}/verify-email/{user_id}/{token}/")
}

/// Build the frontend password-reset link included in outbound emails.
pub(crate) fn build_reset_url(frontend_base_url: &str, user_id: &str, token: &str) -> String {
    let base = frontend_base_url.trim_end_matches('/');
    format!("{base}/reset-password/{user_id}/{token}/")
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Resolve the client IP: forwarding headers first, then the peer address.
pub(crate) fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }
    peer.map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string())
}

/// Extract the client session key from the `X-Session-Key` header or the
/// session cookie.
pub(crate) fn extract_session_key(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(SESSION_KEY_HEADER) {
        if let Ok(key) = value.to_str() {
            let trimmed = key.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

/// Build the `Set-Cookie` value carrying the session key back to the client.
pub(crate) fn session_cookie(key: &str, secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE_NAME}={key}; Path=/; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn password_issues_accepts_strong_password() {
        assert!(password_issues("Str0ngPass!", "alice@example.com", 8).is_empty());
    }

    #[test]
    fn password_issues_rejects_short() {
        let issues = password_issues("a1", "alice@example.com", 8);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("at least 8 characters"));
    }

    #[test]
    fn password_issues_rejects_no_digit_or_letter() {
        assert!(!password_issues("passwordonly", "a@example.com", 8).is_empty());
        assert!(!password_issues("1234567890", "a@example.com", 8).is_empty());
    }

    #[test]
    fn password_issues_rejects_email_local_part() {
        let issues = password_issues("alice1234", "Alice1234@example.com", 8);
        assert!(issues
            .iter()
            .any(|issue| issue.contains("similar to the email")));
    }

    #[test]
    fn generate_account_token_round_trip() {
        let decoded_len = generate_account_token()
            .ok()
            .and_then(|token| URL_SAFE_NO_PAD.decode(token.as_bytes()).ok())
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(32));
    }

    #[test]
    fn hash_token_stable() {
        let first = hash_token("token");
        let second = hash_token("token");
        let different = hash_token("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
    }

    #[test]
    fn build_verify_url_trims_trailing_slash() {
        let url = build_verify_url("https://blockbustre.com/", "uid", "token");
        assert_eq!(url, "https://blockbustre.com/verify-email/uid/token/");
    }

    #[test]
    fn build_reset_url_includes_parts() {
        let url = build_reset_url("https://blockbustre.com", "uid", "token");
        assert_eq!(url, "https://blockbustre.com/reset-password/uid/token/");
    }

    #[test]
    fn client_ip_prefers_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 5.6.7.8"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_ip(&headers, None), "1.2.3.4");
    }

    #[test]
    fn client_ip_falls_back_to_peer() {
        let headers = HeaderMap::new();
        let peer = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)), 4321);
        assert_eq!(client_ip(&headers, Some(peer)), "10.0.0.7");
    }

    #[test]
    fn extract_session_key_from_header_and_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_KEY_HEADER, HeaderValue::from_static("abc"));
        assert_eq!(extract_session_key(&headers), Some("abc".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("other=1; blockbustre_session=xyz"),
        );
        assert_eq!(extract_session_key(&headers), Some("xyz".to_string()));

        assert_eq!(extract_session_key(&HeaderMap::new()), None);
    }

    #[test]
    fn session_cookie_secure_flag() {
        assert!(!session_cookie("key", false).contains("Secure"));
        assert!(session_cookie("key", true).ends_with("; Secure"));
    }

    #[test]
    fn is_unique_violation_ignores_row_not_found() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
