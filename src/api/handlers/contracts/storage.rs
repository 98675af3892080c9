//! Database helpers for contract records, reference data and deployment logs.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::types::{
    compute_costs, CategoryResponse, ContractRecord, ContractStatus, DeletionState,
    DeploymentLogResponse, TemplateResponse,
};

const CONTRACT_COLUMNS: &str = r"
    id, user_id, category_id, title, description, document_hash,
    document_metadata, blockchain_network, contract_address, transaction_hash,
    block_number, gas_used, gas_price, status, gas_fee_estimate, service_fee,
    total_cost, verification_status, verification_timestamp, contract_metadata,
    error_message, retry_count, is_deleted, deleted_at, created_at, updated_at
";

fn contract_from_row(row: &PgRow) -> ContractRecord {
    let status: String = row.get("status");
    ContractRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        category_id: row.get("category_id"),
        title: row.get("title"),
        description: row.get("description"),
        document_hash: row.get("document_hash"),
        document_metadata: row.get("document_metadata"),
        blockchain_network: row.get("blockchain_network"),
        contract_address: row.get("contract_address"),
        transaction_hash: row.get("transaction_hash"),
        block_number: row.get("block_number"),
        gas_used: row.get("gas_used"),
        gas_price: row.get("gas_price"),
        status: ContractStatus::parse(&status).unwrap_or(ContractStatus::Draft),
        gas_fee_estimate: row.get("gas_fee_estimate"),
        service_fee: row.get("service_fee"),
        total_cost: row.get("total_cost"),
        verification_status: row.get("verification_status"),
        verification_timestamp: row.get("verification_timestamp"),
        contract_metadata: row.get("contract_metadata"),
        error_message: row.get("error_message"),
        retry_count: row.get("retry_count"),
        deletion: DeletionState::from_flags(row.get("is_deleted"), row.get("deleted_at")),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(super) async fn category_exists(pool: &PgPool, category_id: Uuid) -> Result<bool> {
    let query = "SELECT 1 FROM contract_categories WHERE id = $1 AND is_active LIMIT 1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(category_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to check category")?;
    Ok(row.is_some())
}

pub(super) async fn insert_contract(
    pool: &PgPool,
    user_id: Uuid,
    category_id: Uuid,
    title: &str,
    description: &str,
    document_hash: &str,
    document_metadata: &serde_json::Value,
    blockchain_network: &str,
) -> Result<ContractRecord> {
    let query = format!(
        r"
        INSERT INTO smart_contracts
            (user_id, category_id, title, description, document_hash,
             document_metadata, blockchain_network)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {CONTRACT_COLUMNS}
        "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .bind(category_id)
        .bind(title)
        .bind(description)
        .bind(document_hash)
        .bind(document_metadata)
        .bind(blockchain_network)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to insert contract")?;
    Ok(contract_from_row(&row))
}

/// Owner-scoped listing; soft-deleted rows are hidden here.
pub(super) async fn list_contracts(pool: &PgPool, user_id: Uuid) -> Result<Vec<ContractRecord>> {
    let query = format!(
        r"
        SELECT {CONTRACT_COLUMNS}
        FROM smart_contracts
        WHERE user_id = $1 AND NOT is_deleted
        ORDER BY created_at DESC
        "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query)
        .bind(user_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list contracts")?;
    Ok(rows.iter().map(contract_from_row).collect())
}

/// Direct key lookup; soft-deleted rows stay reachable here.
pub(super) async fn fetch_contract(
    pool: &PgPool,
    user_id: Uuid,
    contract_id: Uuid,
) -> Result<Option<ContractRecord>> {
    let query = format!(
        r"
        SELECT {CONTRACT_COLUMNS}
        FROM smart_contracts
        WHERE id = $1 AND user_id = $2
        LIMIT 1
        "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(contract_id)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch contract")?;
    Ok(row.map(|row| contract_from_row(&row)))
}

/// Mark deleted without removing the row; direct lookups still find it.
pub(super) async fn soft_delete_contract(
    pool: &PgPool,
    user_id: Uuid,
    contract_id: Uuid,
) -> Result<bool> {
    let query = r"
        UPDATE smart_contracts
        SET is_deleted = TRUE,
            deleted_at = NOW(),
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(contract_id)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to soft delete contract")?;
    Ok(result.rows_affected() > 0)
}

pub(super) async fn restore_contract(
    pool: &PgPool,
    user_id: Uuid,
    contract_id: Uuid,
) -> Result<bool> {
    let query = r"
        UPDATE smart_contracts
        SET is_deleted = FALSE,
            deleted_at = NULL,
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(contract_id)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to restore contract")?;
    Ok(result.rows_affected() > 0)
}

/// Persist the gas estimate and the derived service fee / total cost.
pub(super) async fn set_gas_estimate(
    pool: &PgPool,
    user_id: Uuid,
    contract_id: Uuid,
    gas_fee_estimate: Decimal,
    fee_percent: u8,
) -> Result<Option<ContractRecord>> {
    let (service_fee, total_cost) = compute_costs(gas_fee_estimate, fee_percent);
    let query = format!(
        r"
        UPDATE smart_contracts
        SET gas_fee_estimate = $3,
            service_fee = $4,
            total_cost = $5,
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING {CONTRACT_COLUMNS}
        "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(contract_id)
        .bind(user_id)
        .bind(gas_fee_estimate)
        .bind(service_fee)
        .bind(total_cost)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to set gas estimate")?;
    Ok(row.map(|row| contract_from_row(&row)))
}

#[derive(Debug)]
pub(super) enum DeployOutcome {
    Queued(ContractRecord),
    InvalidStatus(ContractStatus),
    NotFound,
}

/// Move the record into the deployment pipeline and append a log row.
/// On-chain submission happens out of band; this only tracks the attempt.
pub(super) async fn start_deployment(
    pool: &PgPool,
    user_id: Uuid,
    contract_id: Uuid,
) -> Result<DeployOutcome> {
    let mut tx = pool.begin().await.context("begin deploy transaction")?;

    let query = format!(
        r"
        SELECT {CONTRACT_COLUMNS}
        FROM smart_contracts
        WHERE id = $1 AND user_id = $2 AND NOT is_deleted
        FOR UPDATE
        "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(contract_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to lock contract for deploy")?;

    let Some(row) = row else {
        let _ = tx.rollback().await;
        return Ok(DeployOutcome::NotFound);
    };
    let record = contract_from_row(&row);
    if !record.status.can_deploy() {
        let _ = tx.rollback().await;
        return Ok(DeployOutcome::InvalidStatus(record.status));
    }

    let attempt = record.retry_count + 1;
    let query = format!(
        r"
        UPDATE smart_contracts
        SET status = 'pending',
            retry_count = $3,
            error_message = '',
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING {CONTRACT_COLUMNS}
        "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(contract_id)
        .bind(user_id)
        .bind(attempt)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await
        .context("failed to queue deployment")?;
    let updated = contract_from_row(&row);

    let query = r"
        INSERT INTO contract_deployment_logs
            (contract_id, deployment_attempt, status, message)
        VALUES ($1, $2, 'queued', 'Deployment queued')
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(contract_id)
        .bind(attempt)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to append deployment log")?;

    tx.commit().await.context("commit deploy transaction")?;
    Ok(DeployOutcome::Queued(updated))
}

pub(super) async fn list_deployment_logs(
    pool: &PgPool,
    user_id: Uuid,
    contract_id: Uuid,
) -> Result<Option<Vec<DeploymentLogResponse>>> {
    // Ownership check first so unknown ids read as 404, not an empty list.
    if fetch_contract(pool, user_id, contract_id).await?.is_none() {
        return Ok(None);
    }

    let query = r"
        SELECT id, contract_id, deployment_attempt, status, message,
               transaction_hash, gas_used, error_details, created_at
        FROM contract_deployment_logs
        WHERE contract_id = $1
        ORDER BY created_at DESC
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(contract_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list deployment logs")?;
    Ok(Some(
        rows.into_iter()
            .map(|row| DeploymentLogResponse {
                id: row.get("id"),
                contract_id: row.get("contract_id"),
                deployment_attempt: row.get("deployment_attempt"),
                status: row.get("status"),
                message: row.get("message"),
                transaction_hash: row.get("transaction_hash"),
                gas_used: row.get("gas_used"),
                error_details: row.get("error_details"),
                created_at: row.get("created_at"),
            })
            .collect(),
    ))
}

pub(super) async fn list_categories(pool: &PgPool) -> Result<Vec<CategoryResponse>> {
    let query = r"
        SELECT id, name, description, icon, is_active, sort_order, created_at
        FROM contract_categories
        WHERE is_active
        ORDER BY sort_order, name
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list categories")?;
    Ok(rows
        .into_iter()
        .map(|row| CategoryResponse {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
            icon: row.get("icon"),
            is_active: row.get("is_active"),
            sort_order: row.get("sort_order"),
            created_at: row.get("created_at"),
        })
        .collect())
}

pub(super) async fn list_templates(pool: &PgPool) -> Result<Vec<TemplateResponse>> {
    let query = r"
        SELECT id, name, category_id, description, template_code, variables,
               is_active, created_at, updated_at
        FROM contract_templates
        WHERE is_active
        ORDER BY name
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list templates")?;
    Ok(rows
        .into_iter()
        .map(|row| TemplateResponse {
            id: row.get("id"),
            name: row.get("name"),
            category_id: row.get("category_id"),
            description: row.get("description"),
            template_code: row.get("template_code"),
            variables: row.get("variables"),
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
        .collect())
}
