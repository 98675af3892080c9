//! Contract bookkeeping endpoints, owner-scoped.

pub mod storage;
pub mod types;

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use super::auth::principal::require_auth;
use super::auth::AuthState;
use super::users::storage::fetch_user_record;
use storage::DeployOutcome;
use types::{
    BlockchainNetwork, ContractResponse, CreateContractRequest, EstimateRequest,
};

/// List the caller's contracts; soft-deleted records are hidden.
#[utoipa::path(
    get,
    path = "/api/v1/contracts",
    responses(
        (status = 200, description = "Contracts owned by the caller", body = [ContractResponse]),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "contracts"
)]
pub async fn list_contracts(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match storage::list_contracts(&pool, principal.user_id).await {
        Ok(records) => {
            let contracts: Vec<ContractResponse> =
                records.into_iter().map(ContractResponse::from).collect();
            (StatusCode::OK, Json(contracts)).into_response()
        }
        Err(err) => {
            error!("Failed to list contracts: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Create a draft contract record.
#[utoipa::path(
    post,
    path = "/api/v1/contracts",
    request_body = CreateContractRequest,
    responses(
        (status = 201, description = "Draft created", body = ContractResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "contracts"
)]
pub async fn create_contract(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<CreateContractRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let request: CreateContractRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let title = request.title.trim();
    if title.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing title".to_string()).into_response();
    }

    match storage::category_exists(&pool, request.category_id).await {
        Ok(true) => {}
        Ok(false) => {
            return (StatusCode::BAD_REQUEST, "Unknown category".to_string()).into_response()
        }
        Err(err) => {
            error!("Failed to check category: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    let network = request
        .blockchain_network
        .unwrap_or(BlockchainNetwork::EthereumSepolia);
    let metadata = request
        .document_metadata
        .unwrap_or_else(|| serde_json::json!({}));

    match storage::insert_contract(
        &pool,
        principal.user_id,
        request.category_id,
        title,
        request.description.as_deref().unwrap_or_default(),
        request.document_hash.as_deref().unwrap_or_default(),
        &metadata,
        network.as_str(),
    )
    .await
    {
        Ok(record) => {
            (StatusCode::CREATED, Json(ContractResponse::from(record))).into_response()
        }
        Err(err) => {
            error!("Failed to create contract: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Fetch one contract by key; soft-deleted records stay reachable here.
#[utoipa::path(
    get,
    path = "/api/v1/contracts/{id}",
    params(("id" = Uuid, Path, description = "Contract id")),
    responses(
        (status = 200, description = "Contract", body = ContractResponse),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Not found")
    ),
    tag = "contracts"
)]
pub async fn get_contract(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match storage::fetch_contract(&pool, principal.user_id, id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(ContractResponse::from(record))).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to fetch contract: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Soft-delete: flags the record and stamps the deletion time.
#[utoipa::path(
    delete,
    path = "/api/v1/contracts/{id}",
    params(("id" = Uuid, Path, description = "Contract id")),
    responses(
        (status = 204, description = "Contract soft-deleted"),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Not found")
    ),
    tag = "contracts"
)]
pub async fn delete_contract(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match storage::soft_delete_contract(&pool, principal.user_id, id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to soft delete contract: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Clear the deletion flag and timestamp.
#[utoipa::path(
    post,
    path = "/api/v1/contracts/{id}/restore",
    params(("id" = Uuid, Path, description = "Contract id")),
    responses(
        (status = 200, description = "Contract restored", body = ContractResponse),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Not found")
    ),
    tag = "contracts"
)]
pub async fn restore_contract(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match storage::restore_contract(&pool, principal.user_id, id).await {
        Ok(true) => match storage::fetch_contract(&pool, principal.user_id, id).await {
            Ok(Some(record)) => {
                (StatusCode::OK, Json(ContractResponse::from(record))).into_response()
            }
            Ok(None) => StatusCode::NOT_FOUND.into_response(),
            Err(err) => {
                error!("Failed to reload restored contract: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to restore contract: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Record the gas estimate and persist the derived fee and total cost using
/// the caller's current service-fee percentage.
#[utoipa::path(
    post,
    path = "/api/v1/contracts/{id}/estimate",
    params(("id" = Uuid, Path, description = "Contract id")),
    request_body = EstimateRequest,
    responses(
        (status = 200, description = "Costs updated", body = ContractResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Not found")
    ),
    tag = "contracts"
)]
pub async fn estimate_contract(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<EstimateRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let request: EstimateRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };
    if request.gas_fee_estimate.is_sign_negative() {
        return (
            StatusCode::BAD_REQUEST,
            "Gas estimate must not be negative".to_string(),
        )
            .into_response();
    }

    let user = match fetch_user_record(&pool, principal.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return StatusCode::UNAUTHORIZED.into_response(),
        Err(err) => {
            error!("Failed to load user for estimate: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let fee_percent = user.service_fee_percentage(Utc::now());

    match storage::set_gas_estimate(
        &pool,
        principal.user_id,
        id,
        request.gas_fee_estimate,
        fee_percent,
    )
    .await
    {
        Ok(Some(record)) => (StatusCode::OK, Json(ContractResponse::from(record))).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to set gas estimate: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Queue a deployment attempt: draft/failed records move to pending and a
/// deployment log row is appended.
#[utoipa::path(
    post,
    path = "/api/v1/contracts/{id}/deploy",
    params(("id" = Uuid, Path, description = "Contract id")),
    responses(
        (status = 202, description = "Deployment queued", body = ContractResponse),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Record is not deployable in its current status", body = String)
    ),
    tag = "contracts"
)]
pub async fn deploy_contract(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match storage::start_deployment(&pool, principal.user_id, id).await {
        Ok(DeployOutcome::Queued(record)) => {
            (StatusCode::ACCEPTED, Json(ContractResponse::from(record))).into_response()
        }
        Ok(DeployOutcome::InvalidStatus(status)) => (
            StatusCode::CONFLICT,
            format!("Cannot deploy a contract in status {}", status.as_str()),
        )
            .into_response(),
        Ok(DeployOutcome::NotFound) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to queue deployment: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Append-only deployment history for one contract.
#[utoipa::path(
    get,
    path = "/api/v1/contracts/{id}/logs",
    params(("id" = Uuid, Path, description = "Contract id")),
    responses(
        (status = 200, description = "Deployment attempts", body = [types::DeploymentLogResponse]),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Not found")
    ),
    tag = "contracts"
)]
pub async fn contract_logs(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match storage::list_deployment_logs(&pool, principal.user_id, id).await {
        Ok(Some(logs)) => (StatusCode::OK, Json(logs)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to list deployment logs: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Active categories, ordered for display.
#[utoipa::path(
    get,
    path = "/api/v1/contracts/categories",
    responses(
        (status = 200, description = "Active categories", body = [types::CategoryResponse]),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "contracts"
)]
pub async fn list_categories(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &auth_state) {
        return status.into_response();
    }

    match storage::list_categories(&pool).await {
        Ok(categories) => (StatusCode::OK, Json(categories)).into_response(),
        Err(err) => {
            error!("Failed to list categories: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Active templates.
#[utoipa::path(
    get,
    path = "/api/v1/contracts/templates",
    responses(
        (status = 200, description = "Active templates", body = [types::TemplateResponse]),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "contracts"
)]
pub async fn list_templates(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &auth_state) {
        return status.into_response();
    }

    match storage::list_templates(&pool).await {
        Ok(templates) => (StatusCode::OK, Json(templates)).into_response(),
        Err(err) => {
            error!("Failed to list templates: {err}");
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
    async fn list_contracts_requires_auth() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = list_contracts(HeaderMap::new(), Extension(pool), Extension(auth_state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn create_contract_requires_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = auth_state();
        let token = state.issue_access_token(Uuid::new_v4(), "a@example.com")?;
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {token}").parse()?,
        );
        let response = create_contract(headers, Extension(pool), Extension(state), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn estimate_rejects_negative_gas() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = auth_state();
        let token = state.issue_access_token(Uuid::new_v4(), "a@example.com")?;
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {token}").parse()?,
        );
        let response = estimate_contract(
            Path(Uuid::new_v4()),
            headers,
            Extension(pool),
            Extension(state),
            Some(Json(EstimateRequest {
                gas_fee_estimate: rust_decimal::Decimal::from(-1),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
