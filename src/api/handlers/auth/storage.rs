//! Database helpers for credentials, sessions, audit rows and token state.

use anyhow::{anyhow, Context, Result};
use argon2::password_hash::{rand_core::OsRng as PasswordRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::api::handlers::users::types::ProfileInput;

use super::utils::{generate_account_token, hash_token, is_unique_violation};

/// Outcome when attempting to create a new user + profile pair.
#[derive(Debug)]
pub(super) enum SignupOutcome {
    Created(Uuid),
    Conflict,
}

/// Distinct token spaces for account email links.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum TokenPurpose {
    VerifyEmail,
    ResetPassword,
}

impl TokenPurpose {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            Self::VerifyEmail => "verify_email",
            Self::ResetPassword => "reset_password",
        }
    }
}

/// Minimal fields needed to check a login.
pub(super) struct CredentialRecord {
    pub(super) user_id: Uuid,
    pub(super) email: String,
    pub(super) password_hash: String,
    pub(super) is_active: bool,
}

/// Fields collected from a validated registration payload.
pub(super) struct NewUser {
    pub(super) email: String,
    pub(super) password_hash: String,
    pub(super) first_name: String,
    pub(super) last_name: String,
    pub(super) phone_number: String,
    pub(super) date_of_birth: Option<NaiveDate>,
    pub(super) country: String,
    pub(super) language: String,
}

pub(super) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut PasswordRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

pub(super) fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Look up credential data by email for the login flow.
pub(super) async fn lookup_credentials(
    pool: &PgPool,
    email: &str,
) -> Result<Option<CredentialRecord>> {
    let query = "SELECT id, email, password_hash, is_active FROM users WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup credentials")?;

    Ok(row.map(|row| CredentialRecord {
        user_id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_active: row.get("is_active"),
    }))
}

/// Insert the user and its profile; both rows land or neither does.
pub(super) async fn insert_user_and_profile(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user: &NewUser,
    profile: &ProfileInput,
) -> Result<SignupOutcome> {
    let query = r"
        INSERT INTO users
            (email, password_hash, first_name, last_name, phone_number,
             date_of_birth, country, language)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone_number)
        .bind(user.date_of_birth)
        .bind(&user.country)
        .bind(&user.language)
        .fetch_one(&mut **tx)
        .instrument(span)
        .await;

    let user_id: Uuid = match row {
        Ok(row) => row.get("id"),
        Err(err) => {
            if is_unique_violation(&err) {
                return Ok(SignupOutcome::Conflict);
            }
            return Err(err).context("failed to insert user");
        }
    };

    let query = r"
        INSERT INTO user_profiles
            (user_id, company_name, job_title, industry, address_line_1,
             address_line_2, city, state_province, postal_code, website,
             linkedin_profile, twitter_handle, bio, timezone,
             profile_public, show_email, show_phone)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(profile.company_name.as_deref().unwrap_or_default())
        .bind(profile.job_title.as_deref().unwrap_or_default())
        .bind(profile.industry.as_deref().unwrap_or_default())
        .bind(profile.address_line_1.as_deref().unwrap_or_default())
        .bind(profile.address_line_2.as_deref().unwrap_or_default())
        .bind(profile.city.as_deref().unwrap_or_default())
        .bind(profile.state_province.as_deref().unwrap_or_default())
        .bind(profile.postal_code.as_deref().unwrap_or_default())
        .bind(profile.website.as_deref().unwrap_or_default())
        .bind(profile.linkedin_profile.as_deref().unwrap_or_default())
        .bind(profile.twitter_handle.as_deref().unwrap_or_default())
        .bind(profile.bio.as_deref().unwrap_or_default())
        .bind(profile.timezone.as_deref().unwrap_or("UTC"))
        .bind(profile.profile_public.unwrap_or(false))
        .bind(profile.show_email.unwrap_or(false))
        .bind(profile.show_phone.unwrap_or(false))
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to insert user profile")?;

    Ok(SignupOutcome::Created(user_id))
}

/// Generate a raw token for an email link and store only its hash.
pub(super) async fn insert_account_token(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    purpose: TokenPurpose,
    ttl_seconds: i64,
) -> Result<String> {
    let token = generate_account_token()?;
    let token_hash = hash_token(&token);

    let query = r"
        INSERT INTO account_tokens (user_id, purpose, token_hash, expires_at)
        VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(purpose.as_str())
        .bind(token_hash)
        .bind(ttl_seconds)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to insert account token")?;

    Ok(token)
}

/// Consume an unexpired token bound to the user and purpose.
/// Returns false (and leaves state untouched) when no such token exists.
pub(super) async fn consume_account_token(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    purpose: TokenPurpose,
    token_hash: &[u8],
) -> Result<bool> {
    let query = r"
        UPDATE account_tokens
        SET consumed_at = NOW()
        WHERE user_id = $1
          AND purpose = $2
          AND token_hash = $3
          AND consumed_at IS NULL
          AND expires_at > NOW()
        RETURNING user_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(purpose.as_str())
        .bind(token_hash)
        .fetch_optional(&mut **tx)
        .instrument(span)
        .await
        .context("failed to consume account token")?;

    Ok(row.is_some())
}

pub(super) async fn mark_email_verified(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
) -> Result<()> {
    let query = r"
        UPDATE users
        SET is_verified = TRUE,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to mark email verified")?;
    Ok(())
}

pub(super) async fn set_password_hash(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    password_hash: &str,
) -> Result<()> {
    let query = r"
        UPDATE users
        SET password_hash = $2,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(password_hash)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to update password hash")?;
    Ok(())
}

/// Append a login attempt row; the audit log is append-only.
pub(super) async fn insert_login_attempt(
    pool: &PgPool,
    email: &str,
    ip_address: &str,
    user_agent: &str,
    success: bool,
    failure_reason: &str,
) -> Result<()> {
    let query = r"
        INSERT INTO login_attempts (email, ip_address, user_agent, success, failure_reason)
        VALUES ($1, $2, $3, $4, $5)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind(ip_address)
        .bind(user_agent)
        .bind(success)
        .bind(failure_reason)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert login attempt")?;
    Ok(())
}

/// Create or refresh the session row for this client session key.
pub(super) async fn upsert_session(
    pool: &PgPool,
    user_id: Uuid,
    session_key_hash: &[u8],
    ip_address: &str,
    user_agent: &str,
) -> Result<()> {
    let query = r"
        INSERT INTO user_sessions (user_id, session_key_hash, ip_address, user_agent)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (session_key_hash) DO UPDATE
        SET user_id = EXCLUDED.user_id,
            ip_address = EXCLUDED.ip_address,
            user_agent = EXCLUDED.user_agent,
            last_activity = NOW(),
            is_active = TRUE
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(session_key_hash)
        .bind(ip_address)
        .bind(user_agent)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to upsert session")?;
    Ok(())
}

/// Logout is idempotent; sessions are deactivated, never deleted.
pub(super) async fn deactivate_session(pool: &PgPool, session_key_hash: &[u8]) -> Result<()> {
    let query = r"
        UPDATE user_sessions
        SET is_active = FALSE,
            last_activity = NOW()
        WHERE session_key_hash = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(session_key_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to deactivate session")?;
    Ok(())
}

/// Deny a refresh token's jti; repeated denials are a no-op.
pub(super) async fn deny_refresh_token(
    pool: &PgPool,
    jti: Uuid,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    let query = r"
        INSERT INTO refresh_token_denylist (jti, user_id, expires_at)
        VALUES ($1, $2, $3)
        ON CONFLICT DO NOTHING
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(jti)
        .bind(user_id)
        .bind(expires_at)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to deny refresh token")?;
    Ok(())
}

pub(super) async fn is_refresh_token_denied(pool: &PgPool, jti: Uuid) -> Result<bool> {
    let query = "SELECT 1 FROM refresh_token_denylist WHERE jti = $1 LIMIT 1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(jti)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to check refresh token denylist")?;
    Ok(row.is_some())
}

/// Look up an active user by email for the password-reset flow.
pub(super) async fn lookup_active_user(
    pool: &PgPool,
    email: &str,
) -> Result<Option<(Uuid, String)>> {
    let query = r"
        SELECT id, first_name
        FROM users
        WHERE email = $1 AND is_active
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user for reset")?;
    Ok(row.map(|row| (row.get("id"), row.get("first_name"))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_outcome_debug_names() {
        assert_eq!(
            format!("{:?}", SignupOutcome::Created(Uuid::nil())),
            format!("Created({})", Uuid::nil())
        );
        assert_eq!(format!("{:?}", SignupOutcome::Conflict), "Conflict");
    }

    #[test]
    fn token_purpose_strings() {
        assert_eq!(TokenPurpose::VerifyEmail.as_str(), "verify_email");
        assert_eq!(TokenPurpose::ResetPassword.as_str(), "reset_password");
    }

    #[test]
    fn password_hash_round_trip() -> Result<()> {
        let hash = hash_password("Str0ngPass!")?;
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("Str0ngPass!", &hash));
        assert!(!verify_password("WrongPass1", &hash));
        Ok(())
    }

    #[test]
    fn verify_password_rejects_malformed_hash() {
        assert!(!verify_password("whatever", "not-a-phc-string"));
    }

    #[test]
    fn credential_record_holds_values() {
        let record = CredentialRecord {
            user_id: Uuid::nil(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$...".to_string(),
            is_active: true,
        };
        assert_eq!(record.user_id, Uuid::nil());
        assert!(record.is_active);
        assert_eq!(record.email, "alice@example.com");
    }
}
