//! Auth state and configuration.

use jsonwebtoken::{DecodingKey, EncodingKey};
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use super::tokens::{self, AccessClaims, RefreshClaims};

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_VERIFY_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_RESET_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_PASSWORD_MIN_LENGTH: usize = 8;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
    verify_token_ttl_seconds: i64,
    reset_token_ttl_seconds: i64,
    password_min_length: usize,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            access_token_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            verify_token_ttl_seconds: DEFAULT_VERIFY_TOKEN_TTL_SECONDS,
            reset_token_ttl_seconds: DEFAULT_RESET_TOKEN_TTL_SECONDS,
            password_min_length: DEFAULT_PASSWORD_MIN_LENGTH,
        }
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_verify_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.verify_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_password_min_length(mut self, length: usize) -> Self {
        self.password_min_length = length;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(crate) fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    pub(crate) fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_token_ttl_seconds
    }

    pub(crate) fn verify_token_ttl_seconds(&self) -> i64 {
        self.verify_token_ttl_seconds
    }

    pub(crate) fn reset_token_ttl_seconds(&self) -> i64 {
        self.reset_token_ttl_seconds
    }

    pub(crate) fn password_min_length(&self) -> usize {
        self.password_min_length
    }

    /// Only mark cookies secure when the frontend is served over HTTPS.
    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

pub struct AuthState {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, jwt_secret: &SecretString) -> Self {
        let secret = jwt_secret.expose_secret().as_bytes();
        Self {
            config,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn issue_access_token(&self, user_id: Uuid, email: &str) -> anyhow::Result<String> {
        tokens::issue_access_token(
            &self.encoding_key,
            user_id,
            email,
            self.config.access_token_ttl_seconds(),
        )
    }

    pub(crate) fn issue_refresh_token(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<(String, RefreshClaims)> {
        tokens::issue_refresh_token(
            &self.encoding_key,
            user_id,
            self.config.refresh_token_ttl_seconds(),
        )
    }

    pub(crate) fn decode_access_token(&self, token: &str) -> anyhow::Result<AccessClaims> {
        tokens::decode_access_token(&self.decoding_key, token)
    }

    pub(crate) fn decode_refresh_token(&self, token: &str) -> anyhow::Result<RefreshClaims> {
        tokens::decode_refresh_token(&self.decoding_key, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AuthState {
        let config = AuthConfig::new("https://blockbustre.com".to_string());
        AuthState::new(config, &SecretString::from("test-secret".to_string()))
    }

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("https://blockbustre.com".to_string());

        assert_eq!(config.frontend_base_url(), "https://blockbustre.com");
        assert_eq!(
            config.access_token_ttl_seconds(),
            super::DEFAULT_ACCESS_TTL_SECONDS
        );
        assert_eq!(
            config.refresh_token_ttl_seconds(),
            super::DEFAULT_REFRESH_TTL_SECONDS
        );
        assert_eq!(
            config.verify_token_ttl_seconds(),
            super::DEFAULT_VERIFY_TOKEN_TTL_SECONDS
        );
        assert_eq!(
            config.password_min_length(),
            super::DEFAULT_PASSWORD_MIN_LENGTH
        );
        assert!(config.session_cookie_secure());

        let config = config
            .with_access_token_ttl_seconds(60)
            .with_refresh_token_ttl_seconds(120)
            .with_verify_token_ttl_seconds(180)
            .with_reset_token_ttl_seconds(240)
            .with_password_min_length(12);

        assert_eq!(config.access_token_ttl_seconds(), 60);
        assert_eq!(config.refresh_token_ttl_seconds(), 120);
        assert_eq!(config.verify_token_ttl_seconds(), 180);
        assert_eq!(config.reset_token_ttl_seconds(), 240);
        assert_eq!(config.password_min_length(), 12);
    }

    #[test]
    fn insecure_frontend_disables_secure_cookie() {
        let config = AuthConfig::new("http://localhost:3000".to_string());
        assert!(!config.session_cookie_secure());
    }

    #[test]
    fn state_issues_and_decodes_tokens() -> anyhow::Result<()> {
        let state = test_state();
        let user_id = Uuid::new_v4();

        let access = state.issue_access_token(user_id, "alice@example.com")?;
        let claims = state.decode_access_token(&access)?;
        assert_eq!(claims.sub, user_id);

        let (refresh, issued) = state.issue_refresh_token(user_id)?;
        let claims = state.decode_refresh_token(&refresh)?;
        assert_eq!(claims.jti, issued.jti);
        Ok(())
    }
}
