//! Authenticated self-service endpoints: profile, dashboard, KYC, admin status.

pub mod storage;
pub mod types;

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::auth::principal::require_auth;
use super::auth::AuthState;
use types::{
    AdminStatusResponse, DashboardResponse, DashboardStats, KycRequestResponse, UserUpdateRequest,
};

/// Current user with embedded profile and computed subscription fields.
#[utoipa::path(
    get,
    path = "/api/v1/auth/profile",
    responses(
        (status = 200, description = "Authenticated user", body = types::UserResponse),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "users"
)]
pub async fn profile(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match storage::fetch_user_response(&pool, principal.user_id).await {
        Ok(Some(user)) => (StatusCode::OK, Json(user)).into_response(),
        Ok(None) => StatusCode::UNAUTHORIZED.into_response(),
        Err(err) => {
            error!("Failed to fetch profile: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Update allow-listed user and profile fields.
#[utoipa::path(
    patch,
    path = "/api/v1/auth/profile/update",
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "Updated user", body = types::UserResponse),
        (status = 400, description = "Missing payload"),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "users"
)]
pub async fn update_profile(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<UserUpdateRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let update: UserUpdateRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    if let Err(err) = storage::update_user_and_profile(&pool, principal.user_id, &update).await {
        error!("Failed to update profile: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    match storage::fetch_user_response(&pool, principal.user_id).await {
        Ok(Some(user)) => (StatusCode::OK, Json(user)).into_response(),
        Ok(None) => StatusCode::UNAUTHORIZED.into_response(),
        Err(err) => {
            error!("Failed to reload profile: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Aggregated user data and bookkeeping counts.
#[utoipa::path(
    get,
    path = "/api/v1/auth/dashboard",
    responses(
        (status = 200, description = "Dashboard payload", body = DashboardResponse),
        (status = 401, description = "Missing or invalid access token"),
        (status = 500, description = "Aggregation failed")
    ),
    tag = "users"
)]
pub async fn dashboard(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let user = match storage::fetch_user_response(&pool, principal.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return StatusCode::UNAUTHORIZED.into_response(),
        Err(err) => {
            error!("Dashboard data error: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Dashboard data error".to_string(),
            )
                .into_response();
        }
    };

    let total_contracts = storage::count_user_contracts(&pool, principal.user_id).await;
    let total_transactions = storage::count_user_transactions(&pool, principal.user_id).await;
    let (total_contracts, total_transactions) = match (total_contracts, total_transactions) {
        (Ok(contracts), Ok(transactions)) => (contracts, transactions),
        (Err(err), _) | (_, Err(err)) => {
            error!("Dashboard data error: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Dashboard data error".to_string(),
            )
                .into_response();
        }
    };

    let stats = DashboardStats {
        total_contracts,
        total_transactions,
        kyc_verified: user.is_kyc_verified,
        subscription_active: user.is_subscriber,
        service_fee_percentage: user.service_fee_percentage,
    };

    (StatusCode::OK, Json(DashboardResponse { user, stats })).into_response()
}

/// Acknowledge a KYC verification request. Provider integration pending;
/// the request is recorded client-side as submitted.
#[utoipa::path(
    post,
    path = "/api/v1/auth/kyc/request",
    responses(
        (status = 200, description = "KYC request acknowledged", body = KycRequestResponse),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "users"
)]
pub async fn kyc_request(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &auth_state) {
        return status.into_response();
    }

    let response = KycRequestResponse {
        message: "KYC verification requested. You will be contacted for document submission."
            .to_string(),
        status: "pending".to_string(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Report whether the caller is staff/superuser.
#[utoipa::path(
    get,
    path = "/api/v1/auth/admin-status",
    responses(
        (status = 200, description = "Admin flags", body = AdminStatusResponse),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "users"
)]
pub async fn admin_status(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match storage::fetch_user_record(&pool, principal.user_id).await {
        Ok(Some(user)) => {
            let response = AdminStatusResponse {
                is_superuser: user.is_superuser,
                is_staff: user.is_staff,
                is_admin: user.is_admin(),
                email: user.email,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(None) => StatusCode::UNAUTHORIZED.into_response(),
        Err(err) => {
            error!("Failed to check admin status: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::auth::{AuthConfig, AuthState};
    use super::*;
    use anyhow::Result;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    fn auth_state() -> Arc<AuthState> {
        Arc::new(AuthState::new(
            AuthConfig::new("https://blockbustre.com".to_string()),
            &SecretString::from("test-secret".to_string()),
        ))
    }

    #[tokio::test]
    async fn profile_requires_auth() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = profile(HeaderMap::new(), Extension(pool), Extension(auth_state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn update_profile_requires_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = auth_state();
        let token = state.issue_access_token(uuid::Uuid::new_v4(), "a@example.com")?;
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {token}").parse()?,
        );
        let response = update_profile(headers, Extension(pool), Extension(state), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn kyc_request_requires_auth() {
        let response = kyc_request(HeaderMap::new(), Extension(auth_state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn kyc_request_acknowledges() -> Result<()> {
        let state = auth_state();
        let token = state.issue_access_token(uuid::Uuid::new_v4(), "a@example.com")?;
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {token}").parse()?,
        );
        let response = kyc_request(headers, Extension(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }
}
