//! Login, token refresh and logout endpoints.

use axum::{
    extract::{ConnectInfo, Extension},
    http::{
        header::{SET_COOKIE, USER_AGENT},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::error;

use crate::api::handlers::users::storage::{fetch_user_record, fetch_user_response};

use super::state::AuthState;
use super::storage::{
    deactivate_session, deny_refresh_token, insert_login_attempt, is_refresh_token_denied,
    lookup_credentials, upsert_session, verify_password,
};
use super::types::{
    LoginRequest, LoginResponse, LogoutRequest, MessageResponse, RefreshRequest, RefreshResponse,
};
use super::utils::{
    client_ip, extract_session_key, generate_session_key, hash_token, normalize_email,
    session_cookie,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password.";

/// Log the failed attempt and answer with the undifferentiated credential
/// error; the reason is only recorded in the audit log.
async fn fail_login(
    pool: &PgPool,
    email: &str,
    ip_address: &str,
    user_agent: &str,
    reason: &str,
) -> Response {
    if let Err(err) = insert_login_attempt(pool, email, ip_address, user_agent, false, reason).await
    {
        error!("Failed to record login attempt: {err}");
    }
    (StatusCode::BAD_REQUEST, INVALID_CREDENTIALS.to_string()).into_response()
}

/// Verify credentials, audit the attempt, refresh the session row, and issue
/// the token pair.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Invalid credentials", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    let ip_address = client_ip(&headers, Some(peer));
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let record = match lookup_credentials(&pool, &email).await {
        Ok(record) => record,
        Err(err) => {
            error!("Login lookup failed: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login failed".to_string(),
            )
                .into_response();
        }
    };

    let Some(record) = record else {
        return fail_login(&pool, &email, &ip_address, &user_agent, "unknown_email").await;
    };
    if !verify_password(&request.password, &record.password_hash) {
        return fail_login(&pool, &email, &ip_address, &user_agent, "invalid_password").await;
    }
    if !record.is_active {
        return fail_login(&pool, &email, &ip_address, &user_agent, "inactive_account").await;
    }

    // The audit row is part of the login contract, not best-effort.
    if let Err(err) =
        insert_login_attempt(&pool, &email, &ip_address, &user_agent, true, "").await
    {
        error!("Failed to record login attempt: {err}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Login failed".to_string(),
        )
            .into_response();
    }

    let session_key = match extract_session_key(&headers) {
        Some(key) => key,
        None => match generate_session_key() {
            Ok(key) => key,
            Err(err) => {
                error!("Failed to generate session key: {err}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Login failed".to_string(),
                )
                    .into_response();
            }
        },
    };

    let session_key_hash = hash_token(&session_key);
    if let Err(err) = upsert_session(
        &pool,
        record.user_id,
        &session_key_hash,
        &ip_address,
        &user_agent,
    )
    .await
    {
        error!("Failed to upsert session: {err}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Login failed".to_string(),
        )
            .into_response();
    }

    let access = auth_state.issue_access_token(record.user_id, &record.email);
    let refresh = auth_state.issue_refresh_token(record.user_id);
    let (access, (refresh, _)) = match (access, refresh) {
        (Ok(access), Ok(refresh)) => (access, refresh),
        (Err(err), _) | (_, Err(err)) => {
            error!("Failed to issue tokens: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login failed".to_string(),
            )
                .into_response();
        }
    };

    let user = match fetch_user_response(&pool, record.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login failed".to_string(),
            )
                .into_response()
        }
        Err(err) => {
            error!("Failed to load user after login: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login failed".to_string(),
            )
                .into_response();
        }
    };

    let mut response_headers = HeaderMap::new();
    let cookie = session_cookie(&session_key, auth_state.config().session_cookie_secure());
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response_headers.insert(SET_COOKIE, value);
    }

    (
        StatusCode::OK,
        response_headers,
        Json(LoginResponse {
            access,
            refresh,
            user,
        }),
    )
        .into_response()
}

/// Trade a valid, non-denylisted refresh token for a new access token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/token/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 401, description = "Invalid, expired or denylisted refresh token", body = String)
    ),
    tag = "auth"
)]
pub async fn refresh(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshRequest>>,
) -> impl IntoResponse {
    let request: RefreshRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let Ok(claims) = auth_state.decode_refresh_token(&request.refresh) else {
        return (
            StatusCode::UNAUTHORIZED,
            "Token is invalid or expired".to_string(),
        )
            .into_response();
    };

    match is_refresh_token_denied(&pool, claims.jti).await {
        Ok(false) => {}
        Ok(true) => {
            return (
                StatusCode::UNAUTHORIZED,
                "Token is invalid or expired".to_string(),
            )
                .into_response()
        }
        Err(err) => {
            error!("Failed to check refresh denylist: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    let user = match fetch_user_record(&pool, claims.sub).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                "Token is invalid or expired".to_string(),
            )
                .into_response()
        }
        Err(err) => {
            error!("Failed to load user for refresh: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if !user.is_active {
        return (
            StatusCode::UNAUTHORIZED,
            "Token is invalid or expired".to_string(),
        )
            .into_response();
    }

    match auth_state.issue_access_token(user.id, &user.email) {
        Ok(access) => (StatusCode::OK, Json(RefreshResponse { access })).into_response(),
        Err(err) => {
            error!("Failed to issue access token: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Denylist the presented refresh token and deactivate the caller's session.
/// Idempotent if already logged out.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Logout successful", body = MessageResponse),
        (status = 400, description = "Invalid token", body = String),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LogoutRequest>>,
) -> impl IntoResponse {
    if let Err(status) = super::principal::require_auth(&headers, &auth_state) {
        return status.into_response();
    }

    let request: LogoutRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let Ok(claims) = auth_state.decode_refresh_token(&request.refresh) else {
        return (StatusCode::BAD_REQUEST, "Invalid token.".to_string()).into_response();
    };

    let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);
    if let Err(err) = deny_refresh_token(&pool, claims.jti, claims.sub, expires_at).await {
        error!("Failed to denylist refresh token: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    if let Some(session_key) = extract_session_key(&headers) {
        let session_key_hash = hash_token(&session_key);
        if let Err(err) = deactivate_session(&pool, &session_key_hash).await {
            error!("Failed to deactivate session: {err}");
        }
    }

    (
        StatusCode::OK,
        Json(MessageResponse {
            message: "Logout successful.".to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::super::state::AuthConfig;
    use super::*;
    use anyhow::Result;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use std::net::{IpAddr, Ipv4Addr};

    fn auth_state() -> Arc<AuthState> {
        Arc::new(AuthState::new(
            AuthConfig::new("https://blockbustre.com".to_string()),
            &SecretString::from("test-secret".to_string()),
        ))
    }

    fn peer() -> ConnectInfo<SocketAddr> {
        ConnectInfo(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 45678))
    }

    #[tokio::test]
    async fn login_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = login(
            HeaderMap::new(),
            peer(),
            Extension(pool),
            Extension(auth_state()),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = refresh(Extension(pool), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_rejects_garbage_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = refresh(
            Extension(pool),
            Extension(auth_state()),
            Some(Json(RefreshRequest {
                refresh: "garbage".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_rejects_access_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = auth_state();
        let access = state.issue_access_token(uuid::Uuid::new_v4(), "a@example.com")?;
        let response = refresh(
            Extension(pool),
            Extension(state),
            Some(Json(RefreshRequest { refresh: access })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn logout_requires_auth() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = logout(HeaderMap::new(), Extension(pool), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn logout_rejects_garbage_refresh() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = auth_state();
        let access = state.issue_access_token(uuid::Uuid::new_v4(), "a@example.com")?;
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {access}").parse()?,
        );
        let response = logout(
            headers,
            Extension(pool),
            Extension(state),
            Some(Json(LogoutRequest {
                refresh: "garbage".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
