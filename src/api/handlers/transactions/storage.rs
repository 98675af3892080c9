//! Database helpers for transactions, payment methods and subscriptions.

use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::types::{
    days_remaining, PaymentMethodResponse, PaymentMethodType, PaymentRail, SubscriptionResponse,
    SubscriptionStatus, TransactionResponse, TransactionStatus, TransactionType,
};

const TRANSACTION_COLUMNS: &str = r"
    id, user_id, contract_id, transaction_type, status, payment_method, amount,
    currency, exchange_rate, external_transaction_id,
    blockchain_transaction_hash, payment_intent_id, description, metadata,
    error_message, processed_at, failed_at, created_at, updated_at
";

fn transaction_from_row(row: &PgRow) -> TransactionResponse {
    let transaction_type: String = row.get("transaction_type");
    let status: String = row.get("status");
    let payment_method: String = row.get("payment_method");
    let status = TransactionStatus::parse(&status).unwrap_or(TransactionStatus::Pending);
    TransactionResponse {
        id: row.get("id"),
        user_id: row.get("user_id"),
        contract_id: row.get("contract_id"),
        transaction_type: TransactionType::parse(&transaction_type)
            .unwrap_or(TransactionType::GasPayment),
        status,
        payment_method: match payment_method.as_str() {
            "stripe" => PaymentRail::Stripe,
            "usdc" => PaymentRail::Usdc,
            "usdt" => PaymentRail::Usdt,
            "bitcoin" => PaymentRail::Bitcoin,
            _ => PaymentRail::Ethereum,
        },
        amount: row.get("amount"),
        currency: row.get("currency"),
        exchange_rate: row.get("exchange_rate"),
        external_transaction_id: row.get("external_transaction_id"),
        blockchain_transaction_hash: row.get("blockchain_transaction_hash"),
        payment_intent_id: row.get("payment_intent_id"),
        description: row.get("description"),
        metadata: row.get("metadata"),
        error_message: row.get("error_message"),
        is_completed: status == TransactionStatus::Completed,
        is_failed: status == TransactionStatus::Failed,
        is_pending: status == TransactionStatus::Pending,
        processed_at: row.get("processed_at"),
        failed_at: row.get("failed_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Contract references must point at a record the caller owns.
pub(super) async fn contract_owned_by(
    pool: &PgPool,
    user_id: Uuid,
    contract_id: Uuid,
) -> Result<bool> {
    let query = "SELECT 1 FROM smart_contracts WHERE id = $1 AND user_id = $2 LIMIT 1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(contract_id)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to check contract ownership")?;
    Ok(row.is_some())
}

#[allow(clippy::too_many_arguments)]
pub(super) async fn insert_transaction(
    pool: &PgPool,
    user_id: Uuid,
    contract_id: Option<Uuid>,
    transaction_type: TransactionType,
    payment_method: PaymentRail,
    amount: Decimal,
    currency: &str,
    description: &str,
    metadata: &serde_json::Value,
) -> Result<TransactionResponse> {
    let query = format!(
        r"
        INSERT INTO transactions
            (user_id, contract_id, transaction_type, payment_method, amount,
             currency, description, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {TRANSACTION_COLUMNS}
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
        .bind(contract_id)
        .bind(transaction_type.as_str())
        .bind(payment_method.as_str())
        .bind(amount)
        .bind(currency)
        .bind(description)
        .bind(metadata)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to insert transaction")?;
    Ok(transaction_from_row(&row))
}

pub(super) async fn list_transactions(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<TransactionResponse>> {
    let query = format!(
        r"
        SELECT {TRANSACTION_COLUMNS}
        FROM transactions
        WHERE user_id = $1
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
        .context("failed to list transactions")?;
    Ok(rows.iter().map(transaction_from_row).collect())
}

pub(super) async fn fetch_transaction(
    pool: &PgPool,
    user_id: Uuid,
    transaction_id: Uuid,
) -> Result<Option<TransactionResponse>> {
    let query = format!(
        r"
        SELECT {TRANSACTION_COLUMNS}
        FROM transactions
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
        .bind(transaction_id)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch transaction")?;
    Ok(row.map(|row| transaction_from_row(&row)))
}

fn payment_method_from_row(row: &PgRow) -> PaymentMethodResponse {
    let payment_type: String = row.get("payment_type");
    PaymentMethodResponse {
        id: row.get("id"),
        user_id: row.get("user_id"),
        payment_type: if payment_type == "stripe_card" {
            PaymentMethodType::StripeCard
        } else {
            PaymentMethodType::CryptoWallet
        },
        is_default: row.get("is_default"),
        is_active: row.get("is_active"),
        stripe_payment_method_id: row.get("stripe_payment_method_id"),
        card_last_four: row.get("card_last_four"),
        card_brand: row.get("card_brand"),
        card_exp_month: row.get("card_exp_month"),
        card_exp_year: row.get("card_exp_year"),
        wallet_address: row.get("wallet_address"),
        wallet_type: row.get("wallet_type"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const PAYMENT_METHOD_COLUMNS: &str = r"
    id, user_id, payment_type, is_default, is_active, stripe_payment_method_id,
    card_last_four, card_brand, card_exp_month, card_exp_year, wallet_address,
    wallet_type, created_at, updated_at
";

#[allow(clippy::too_many_arguments)]
pub(super) async fn insert_payment_method(
    pool: &PgPool,
    user_id: Uuid,
    payment_type: PaymentMethodType,
    is_default: bool,
    stripe_payment_method_id: &str,
    card_last_four: &str,
    card_brand: &str,
    card_exp_month: Option<i32>,
    card_exp_year: Option<i32>,
    wallet_address: &str,
    wallet_type: &str,
) -> Result<PaymentMethodResponse> {
    let mut tx = pool.begin().await.context("begin payment method insert")?;

    if is_default {
        // A single default per user.
        let query = "UPDATE payment_methods SET is_default = FALSE WHERE user_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to clear default payment methods")?;
    }

    let query = format!(
        r"
        INSERT INTO payment_methods
            (user_id, payment_type, is_default, stripe_payment_method_id,
             card_last_four, card_brand, card_exp_month, card_exp_year,
             wallet_address, wallet_type)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {PAYMENT_METHOD_COLUMNS}
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
        .bind(payment_type.as_str())
        .bind(is_default)
        .bind(stripe_payment_method_id)
        .bind(card_last_four)
        .bind(card_brand)
        .bind(card_exp_month)
        .bind(card_exp_year)
        .bind(wallet_address)
        .bind(wallet_type)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert payment method")?;

    tx.commit().await.context("commit payment method insert")?;
    Ok(payment_method_from_row(&row))
}

pub(super) async fn list_payment_methods(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<PaymentMethodResponse>> {
    let query = format!(
        r"
        SELECT {PAYMENT_METHOD_COLUMNS}
        FROM payment_methods
        WHERE user_id = $1 AND is_active
        ORDER BY is_default DESC, created_at DESC
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
        .context("failed to list payment methods")?;
    Ok(rows.iter().map(payment_method_from_row).collect())
}

/// Payment methods referenced by subscriptions are deactivated, not removed.
pub(super) async fn deactivate_payment_method(
    pool: &PgPool,
    user_id: Uuid,
    payment_method_id: Uuid,
) -> Result<bool> {
    let query = r"
        UPDATE payment_methods
        SET is_active = FALSE,
            is_default = FALSE,
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
        .bind(payment_method_id)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to deactivate payment method")?;
    Ok(result.rows_affected() > 0)
}

fn subscription_from_row(row: &PgRow) -> SubscriptionResponse {
    let status: String = row.get("status");
    let status = SubscriptionStatus::parse(&status).unwrap_or(SubscriptionStatus::Expired);
    let current_period_end = row.get("current_period_end");
    let now = Utc::now();
    SubscriptionResponse {
        id: row.get("id"),
        user_id: row.get("user_id"),
        stripe_subscription_id: row.get("stripe_subscription_id"),
        status,
        price_id: row.get("price_id"),
        amount: row.get("amount"),
        currency: row.get("currency"),
        billing_interval: row.get("billing_interval"),
        current_period_start: row.get("current_period_start"),
        current_period_end,
        cancel_at_period_end: row.get("cancel_at_period_end"),
        cancelled_at: row.get("cancelled_at"),
        payment_method_id: row.get("payment_method_id"),
        is_active: status == SubscriptionStatus::Active,
        days_remaining: days_remaining(current_period_end, now),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SUBSCRIPTION_COLUMNS: &str = r"
    id, user_id, stripe_subscription_id, status, price_id, amount, currency,
    billing_interval, current_period_start, current_period_end,
    cancel_at_period_end, cancelled_at, payment_method_id, created_at,
    updated_at
";

pub(super) async fn list_subscriptions(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<SubscriptionResponse>> {
    let query = format!(
        r"
        SELECT {SUBSCRIPTION_COLUMNS}
        FROM subscriptions
        WHERE user_id = $1
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
        .context("failed to list subscriptions")?;
    Ok(rows.iter().map(subscription_from_row).collect())
}

/// Flag an active subscription to lapse at the end of the current period.
pub(super) async fn cancel_subscription(
    pool: &PgPool,
    user_id: Uuid,
    subscription_id: Uuid,
) -> Result<Option<SubscriptionResponse>> {
    let query = format!(
        r"
        UPDATE subscriptions
        SET cancel_at_period_end = TRUE,
            cancelled_at = NOW(),
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2 AND status = 'active'
        RETURNING {SUBSCRIPTION_COLUMNS}
        "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(subscription_id)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to cancel subscription")?;
    Ok(row.map(|row| subscription_from_row(&row)))
}
