//! User registration endpoint.
//!
//! User, profile and verification token are created in one transaction; the
//! verification email is sent before the commit so a delivery failure rolls
//! the whole registration back.

use axum::{
    extract::Extension, http::StatusCode, response::IntoResponse, Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::api::email::{verification_email, EmailSender};
use crate::api::handlers::field_errors;
use crate::api::handlers::users::storage::fetch_user_response;
use crate::api::handlers::users::types::ProfileInput;

use super::state::AuthState;
use super::storage::{
    hash_password, insert_account_token, insert_user_and_profile, NewUser, SignupOutcome,
    TokenPurpose,
};
use super::types::{RegisterRequest, RegisterResponse};
use super::utils::{build_verify_url, normalize_email, password_issues, valid_email};

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created, verification email sent", body = RegisterResponse),
        (status = 400, description = "Validation errors, field-keyed"),
        (status = 500, description = "Registration failed", body = String)
    ),
    tag = "auth"
)]
pub async fn register(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    email_sender: Extension<Arc<dyn EmailSender>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);

    let mut errors: Vec<(String, String)> = Vec::new();
    if !valid_email(&email) {
        errors.push(("email".to_string(), "Enter a valid email address.".to_string()));
    }
    if request.password != request.password_confirm {
        errors.push((
            "password_confirm".to_string(),
            "Passwords don't match.".to_string(),
        ));
    }
    for issue in password_issues(
        &request.password,
        &email,
        auth_state.config().password_min_length(),
    ) {
        errors.push(("password".to_string(), issue));
    }
    if request.first_name.trim().is_empty() {
        errors.push(("first_name".to_string(), "This field is required.".to_string()));
    }
    if request.last_name.trim().is_empty() {
        errors.push(("last_name".to_string(), "This field is required.".to_string()));
    }
    if !errors.is_empty() {
        return (StatusCode::BAD_REQUEST, field_errors(&errors)).into_response();
    }

    let password_hash = match hash_password(&request.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed".to_string(),
            )
                .into_response();
        }
    };

    let new_user = NewUser {
        email: email.clone(),
        password_hash,
        first_name: request.first_name.trim().to_string(),
        last_name: request.last_name.trim().to_string(),
        phone_number: request.phone_number.unwrap_or_default(),
        date_of_birth: request.date_of_birth,
        country: request.country.unwrap_or_default(),
        language: request.language.unwrap_or_else(|| "en".to_string()),
    };
    let profile = request.profile.unwrap_or_else(ProfileInput::default);

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(err) => {
            error!("Failed to start registration transaction: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed".to_string(),
            )
                .into_response();
        }
    };

    let user_id = match insert_user_and_profile(&mut tx, &new_user, &profile).await {
        Ok(SignupOutcome::Created(user_id)) => user_id,
        Ok(SignupOutcome::Conflict) => {
            let _ = tx.rollback().await;
            let errors = vec![(
                "email".to_string(),
                "A user with this email already exists.".to_string(),
            )];
            return (StatusCode::BAD_REQUEST, field_errors(&errors)).into_response();
        }
        Err(err) => {
            error!("Failed to create user: {err}");
            let _ = tx.rollback().await;
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed".to_string(),
            )
                .into_response();
        }
    };

    let token = match insert_account_token(
        &mut tx,
        user_id,
        TokenPurpose::VerifyEmail,
        auth_state.config().verify_token_ttl_seconds(),
    )
    .await
    {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to create verification token: {err}");
            let _ = tx.rollback().await;
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed".to_string(),
            )
                .into_response();
        }
    };

    // Delivery failure is fatal to the request; the rollback undoes the user.
    let verify_url = build_verify_url(
        auth_state.config().frontend_base_url(),
        &user_id.to_string(),
        &token,
    );
    let message = verification_email(&email, &new_user.first_name, &verify_url);
    if let Err(err) = email_sender.send(&message).await {
        error!("Failed to send verification email: {err}");
        let _ = tx.rollback().await;
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to send verification email".to_string(),
        )
            .into_response();
    }

    if let Err(err) = tx.commit().await {
        error!("Failed to commit registration: {err}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Registration failed".to_string(),
        )
            .into_response();
    }

    match fetch_user_response(&pool, user_id).await {
        Ok(Some(user)) => (
            StatusCode::CREATED,
            Json(RegisterResponse {
                message: "User created successfully. Please check your email for verification."
                    .to_string(),
                user,
            }),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Registration failed".to_string(),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to load user after registration: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed".to_string(),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::state::AuthConfig;
    use super::*;
    use crate::api::email::LogEmailSender;
    use anyhow::Result;
    use axum::body::to_bytes;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    fn auth_state() -> Arc<AuthState> {
        Arc::new(AuthState::new(
            AuthConfig::new("https://blockbustre.com".to_string()),
            &SecretString::from("test-secret".to_string()),
        ))
    }

    fn email_sender() -> Arc<dyn EmailSender> {
        Arc::new(LogEmailSender)
    }

    fn request(email: &str, password: &str, confirm: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            password_confirm: confirm.to_string(),
            first_name: "Alice".to_string(),
            last_name: "Smith".to_string(),
            phone_number: None,
            date_of_birth: None,
            country: None,
            language: None,
            profile: None,
        }
    }

    #[tokio::test]
    async fn register_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = register(
            Extension(pool),
            Extension(auth_state()),
            Extension(email_sender()),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_password_mismatch() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = register(
            Extension(pool),
            Extension(auth_state()),
            Extension(email_sender()),
            Some(Json(request("alice@example.com", "Str0ngPass!", "Other1pass"))),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let value: serde_json::Value = serde_json::from_slice(&body)?;
        assert!(value.get("password_confirm").is_some());
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_invalid_email_and_weak_password() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = register(
            Extension(pool),
            Extension(auth_state()),
            Extension(email_sender()),
            Some(Json(request("not-an-email", "short", "short"))),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let value: serde_json::Value = serde_json::from_slice(&body)?;
        assert!(value.get("email").is_some());
        assert!(value.get("password").is_some());
        Ok(())
    }
}
