//! Transaction, payment method and subscription endpoints, owner-scoped.

pub mod storage;
pub mod types;

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use super::auth::principal::require_auth;
use super::auth::AuthState;
use types::{
    CreatePaymentMethodRequest, CreateTransactionRequest, PaymentMethodResponse,
    SubscriptionResponse, TransactionResponse,
};

/// List the caller's transactions, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    responses(
        (status = 200, description = "Transactions owned by the caller", body = [TransactionResponse]),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "transactions"
)]
pub async fn list_transactions(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match storage::list_transactions(&pool, principal.user_id).await {
        Ok(transactions) => (StatusCode::OK, Json(transactions)).into_response(),
        Err(err) => {
            error!("Failed to list transactions: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Record a pending transaction.
#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    request_body = CreateTransactionRequest,
    responses(
        (status = 201, description = "Transaction recorded", body = TransactionResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "transactions"
)]
pub async fn create_transaction(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<CreateTransactionRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let request: CreateTransactionRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    if request.amount < Decimal::ZERO {
        return (
            StatusCode::BAD_REQUEST,
            "Amount must not be negative".to_string(),
        )
            .into_response();
    }

    if let Some(contract_id) = request.contract_id {
        match storage::contract_owned_by(&pool, principal.user_id, contract_id).await {
            Ok(true) => {}
            Ok(false) => {
                return (StatusCode::BAD_REQUEST, "Unknown contract".to_string()).into_response()
            }
            Err(err) => {
                error!("Failed to check contract ownership: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    match storage::insert_transaction(
        &pool,
        principal.user_id,
        request.contract_id,
        request.transaction_type,
        request.payment_method,
        request.amount,
        request.currency.as_deref().unwrap_or("USD"),
        request.description.as_deref().unwrap_or_default(),
        &request.metadata.unwrap_or_else(|| serde_json::json!({})),
    )
    .await
    {
        Ok(transaction) => (StatusCode::CREATED, Json(transaction)).into_response(),
        Err(err) => {
            error!("Failed to create transaction: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Fetch one transaction by key.
#[utoipa::path(
    get,
    path = "/api/v1/transactions/{id}",
    params(("id" = Uuid, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Transaction", body = TransactionResponse),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Not found")
    ),
    tag = "transactions"
)]
pub async fn get_transaction(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match storage::fetch_transaction(&pool, principal.user_id, id).await {
        Ok(Some(transaction)) => (StatusCode::OK, Json(transaction)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to fetch transaction: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Active payment methods, default first.
#[utoipa::path(
    get,
    path = "/api/v1/transactions/payment-methods",
    responses(
        (status = 200, description = "Payment methods", body = [PaymentMethodResponse]),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "transactions"
)]
pub async fn list_payment_methods(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match storage::list_payment_methods(&pool, principal.user_id).await {
        Ok(methods) => (StatusCode::OK, Json(methods)).into_response(),
        Err(err) => {
            error!("Failed to list payment methods: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Store a payment method; marking it default clears the previous default.
#[utoipa::path(
    post,
    path = "/api/v1/transactions/payment-methods",
    request_body = CreatePaymentMethodRequest,
    responses(
        (status = 201, description = "Payment method stored", body = PaymentMethodResponse),
        (status = 400, description = "Missing payload"),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "transactions"
)]
pub async fn create_payment_method(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<CreatePaymentMethodRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let request: CreatePaymentMethodRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    match storage::insert_payment_method(
        &pool,
        principal.user_id,
        request.payment_type,
        request.is_default.unwrap_or(false),
        request.stripe_payment_method_id.as_deref().unwrap_or_default(),
        request.card_last_four.as_deref().unwrap_or_default(),
        request.card_brand.as_deref().unwrap_or_default(),
        request.card_exp_month,
        request.card_exp_year,
        request.wallet_address.as_deref().unwrap_or_default(),
        request.wallet_type.as_deref().unwrap_or_default(),
    )
    .await
    {
        Ok(method) => (StatusCode::CREATED, Json(method)).into_response(),
        Err(err) => {
            error!("Failed to create payment method: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Deactivate a stored payment method.
#[utoipa::path(
    delete,
    path = "/api/v1/transactions/payment-methods/{id}",
    params(("id" = Uuid, Path, description = "Payment method id")),
    responses(
        (status = 204, description = "Payment method deactivated"),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Not found")
    ),
    tag = "transactions"
)]
pub async fn delete_payment_method(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match storage::deactivate_payment_method(&pool, principal.user_id, id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to deactivate payment method: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// The caller's subscriptions, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/transactions/subscriptions",
    responses(
        (status = 200, description = "Subscriptions", body = [SubscriptionResponse]),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "transactions"
)]
pub async fn list_subscriptions(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match storage::list_subscriptions(&pool, principal.user_id).await {
        Ok(subscriptions) => (StatusCode::OK, Json(subscriptions)).into_response(),
        Err(err) => {
            error!("Failed to list subscriptions: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Cancel an active subscription at the end of its billing period.
#[utoipa::path(
    post,
    path = "/api/v1/transactions/subscriptions/{id}/cancel",
    params(("id" = Uuid, Path, description = "Subscription id")),
    responses(
        (status = 200, description = "Subscription flagged for cancellation", body = SubscriptionResponse),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "No active subscription with this id")
    ),
    tag = "transactions"
)]
pub async fn cancel_subscription(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match storage::cancel_subscription(&pool, principal.user_id, id).await {
        Ok(Some(subscription)) => (StatusCode::OK, Json(subscription)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to cancel subscription: {err}");
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
    async fn list_transactions_requires_auth() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response =
            list_transactions(HeaderMap::new(), Extension(pool), Extension(auth_state()))
                .await
                .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn create_transaction_rejects_negative_amount() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = auth_state();
        let token = state.issue_access_token(Uuid::new_v4(), "a@example.com")?;
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {token}").parse()?,
        );
        let response = create_transaction(
            headers,
            Extension(pool),
            Extension(state),
            Some(Json(CreateTransactionRequest {
                transaction_type: types::TransactionType::GasPayment,
                payment_method: types::PaymentRail::Ethereum,
                amount: Decimal::from(-5),
                currency: None,
                contract_id: None,
                description: None,
                metadata: None,
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
