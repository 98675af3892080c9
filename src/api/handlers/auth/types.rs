//! Request/response types for auth endpoints.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::handlers::users::types::{ProfileInput, UserResponse};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: UserResponse,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct RefreshResponse {
    pub access: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LogoutRequest {
    pub refresh: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub profile: Option<ProfileInput>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserResponse,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct PasswordChangeRequest {
    pub old_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct PasswordResetConfirmRequest {
    pub new_password: String,
    pub new_password_confirm: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn login_request_round_trips() -> Result<()> {
        let request = LoginRequest {
            email: "alice@example.com".to_string(),
            password: "Str0ngPass!".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let email = value
            .get("email")
            .and_then(serde_json::Value::as_str)
            .context("missing email")?;
        assert_eq!(email, "alice@example.com");
        let decoded: LoginRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.password, "Str0ngPass!");
        Ok(())
    }

    #[test]
    fn register_request_accepts_minimal_payload() -> Result<()> {
        let decoded: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "bob@example.com",
            "password": "Str0ngPass!",
            "password_confirm": "Str0ngPass!",
            "first_name": "Bob",
            "last_name": "Jones"
        }))?;
        assert_eq!(decoded.email, "bob@example.com");
        assert!(decoded.profile.is_none());
        assert!(decoded.date_of_birth.is_none());
        Ok(())
    }

    #[test]
    fn register_request_accepts_profile() -> Result<()> {
        let decoded: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "bob@example.com",
            "password": "Str0ngPass!",
            "password_confirm": "Str0ngPass!",
            "first_name": "Bob",
            "last_name": "Jones",
            "profile": {"company_name": "Acme", "timezone": "Europe/Berlin"}
        }))?;
        let profile = decoded.profile.expect("profile");
        assert_eq!(profile.company_name.as_deref(), Some("Acme"));
        assert_eq!(profile.timezone.as_deref(), Some("Europe/Berlin"));
        Ok(())
    }
}
