//! Email verification endpoint.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use super::storage::{consume_account_token, mark_email_verified, TokenPurpose};
use super::utils::hash_token;

/// Consume the emailed token and flip the user's verified flag.
/// Invalid or expired links report an error without mutating state.
#[utoipa::path(
    post,
    path = "/api/v1/auth/verify-email/{uid}/{token}",
    params(
        ("uid" = String, Path, description = "User id from the verification link"),
        ("token" = String, Path, description = "Verification token")
    ),
    responses(
        (status = 200, description = "Email verified"),
        (status = 400, description = "Invalid or expired verification link")
    ),
    tag = "auth"
)]
pub async fn verify_email(
    Path((uid, token)): Path<(String, String)>,
    pool: Extension<PgPool>,
) -> impl IntoResponse {
    let Ok(user_id) = Uuid::parse_str(uid.trim()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid verification link."})),
        )
            .into_response();
    };
    let token = token.trim();
    if token.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid verification link."})),
        )
            .into_response();
    }

    let token_hash = hash_token(token);
    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(err) => {
            error!("Failed to start verify-email transaction: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Verification failed".to_string(),
            )
                .into_response();
        }
    };

    match consume_account_token(&mut tx, user_id, TokenPurpose::VerifyEmail, &token_hash).await {
        Ok(true) => {}
        Ok(false) => {
            let _ = tx.rollback().await;
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid verification token."})),
            )
                .into_response();
        }
        Err(err) => {
            error!("Failed to consume verification token: {err}");
            let _ = tx.rollback().await;
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Verification failed".to_string(),
            )
                .into_response();
        }
    }

    if let Err(err) = mark_email_verified(&mut tx, user_id).await {
        error!("Failed to mark email verified: {err}");
        let _ = tx.rollback().await;
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Verification failed".to_string(),
        )
            .into_response();
    }

    if let Err(err) = tx.commit().await {
        error!("Failed to commit verify-email transaction: {err}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Verification failed".to_string(),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        Json(json!({"message": "Email verified successfully."})),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn verify_email_rejects_bad_uid() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_email(
            Path(("not-a-uuid".to_string(), "token".to_string())),
            Extension(pool),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn verify_email_rejects_empty_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_email(
            Path((Uuid::nil().to_string(), "  ".to_string())),
            Extension(pool),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
