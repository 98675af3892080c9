//! Access and refresh JWT issuance and verification.
//!
//! Access tokens authorize API calls; refresh tokens carry a `jti` that the
//! denylist checks at refresh/logout time. Both are HS256-signed with the
//! shared service secret.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub(crate) const TOKEN_TYPE_ACCESS: &str = "access";
pub(crate) const TOKEN_TYPE_REFRESH: &str = "refresh";

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AccessClaims {
    pub sub: Uuid,
    pub email: String,
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RefreshClaims {
    pub sub: Uuid,
    pub jti: Uuid,
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

pub(crate) fn issue_access_token(
    key: &EncodingKey,
    user_id: Uuid,
    email: &str,
    ttl_seconds: i64,
) -> Result<String> {
    let now = Utc::now().timestamp();
    let claims = AccessClaims {
        sub: user_id,
        email: email.to_string(),
        token_type: TOKEN_TYPE_ACCESS.to_string(),
        iat: now,
        exp: now + ttl_seconds,
    };
    encode(&Header::default(), &claims, key).context("failed to sign access token")
}

pub(crate) fn issue_refresh_token(
    key: &EncodingKey,
    user_id: Uuid,
    ttl_seconds: i64,
) -> Result<(String, RefreshClaims)> {
    let now = Utc::now().timestamp();
    let claims = RefreshClaims {
        sub: user_id,
        jti: Uuid::new_v4(),
        token_type: TOKEN_TYPE_REFRESH.to_string(),
        iat: now,
        exp: now + ttl_seconds,
    };
    let token = encode(&Header::default(), &claims, key).context("failed to sign refresh token")?;
    Ok((token, claims))
}

pub(crate) fn decode_access_token(key: &DecodingKey, token: &str) -> Result<AccessClaims> {
    let data = decode::<AccessClaims>(token, key, &Validation::default())
        .context("invalid access token")?;
    if data.claims.token_type != TOKEN_TYPE_ACCESS {
        return Err(anyhow!("wrong token type: {}", data.claims.token_type));
    }
    Ok(data.claims)
}

pub(crate) fn decode_refresh_token(key: &DecodingKey, token: &str) -> Result<RefreshClaims> {
    let data = decode::<RefreshClaims>(token, key, &Validation::default())
        .context("invalid refresh token")?;
    if data.claims.token_type != TOKEN_TYPE_REFRESH {
        return Err(anyhow!("wrong token type: {}", data.claims.token_type));
    }
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> (EncodingKey, DecodingKey) {
        (
            EncodingKey::from_secret(b"test-secret"),
            DecodingKey::from_secret(b"test-secret"),
        )
    }

    #[test]
    fn access_token_round_trip() -> Result<()> {
        let (encoding, decoding) = keys();
        let user_id = Uuid::new_v4();
        let token = issue_access_token(&encoding, user_id, "alice@example.com", 900)?;
        let claims = decode_access_token(&decoding, &token)?;
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.token_type, TOKEN_TYPE_ACCESS);
        assert!(claims.exp > claims.iat);
        Ok(())
    }

    #[test]
    fn refresh_token_round_trip() -> Result<()> {
        let (encoding, decoding) = keys();
        let user_id = Uuid::new_v4();
        let (token, issued) = issue_refresh_token(&encoding, user_id, 3600)?;
        let claims = decode_refresh_token(&decoding, &token)?;
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.jti, issued.jti);
        assert_eq!(claims.token_type, TOKEN_TYPE_REFRESH);
        Ok(())
    }

    #[test]
    fn access_token_rejected_as_refresh() -> Result<()> {
        let (encoding, decoding) = keys();
        let token = issue_access_token(&encoding, Uuid::new_v4(), "a@example.com", 900)?;
        assert!(decode_refresh_token(&decoding, &token).is_err());
        Ok(())
    }

    #[test]
    fn refresh_token_rejected_as_access() -> Result<()> {
        let (encoding, decoding) = keys();
        let (token, _) = issue_refresh_token(&encoding, Uuid::new_v4(), 3600)?;
        assert!(decode_access_token(&decoding, &token).is_err());
        Ok(())
    }

    #[test]
    fn expired_token_rejected() -> Result<()> {
        let (encoding, decoding) = keys();
        // Issued well past the default validation leeway.
        let token = issue_access_token(&encoding, Uuid::new_v4(), "a@example.com", -600)?;
        assert!(decode_access_token(&decoding, &token).is_err());
        Ok(())
    }

    #[test]
    fn wrong_secret_rejected() -> Result<()> {
        let (encoding, _) = keys();
        let other = DecodingKey::from_secret(b"other-secret");
        let token = issue_access_token(&encoding, Uuid::new_v4(), "a@example.com", 900)?;
        assert!(decode_access_token(&other, &token).is_err());
        Ok(())
    }
}
