//! Payment and transaction record types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    ContractDeployment,
    GasPayment,
    ServiceFee,
    Subscription,
    Refund,
}

impl TransactionType {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::ContractDeployment => "contract_deployment",
            Self::GasPayment => "gas_payment",
            Self::ServiceFee => "service_fee",
            Self::Subscription => "subscription",
            Self::Refund => "refund",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "contract_deployment" => Some(Self::ContractDeployment),
            "gas_payment" => Some(Self::GasPayment),
            "service_fee" => Some(Self::ServiceFee),
            "subscription" => Some(Self::Subscription),
            "refund" => Some(Self::Refund),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl TransactionStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }
}

/// Rail the payment moved on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRail {
    Stripe,
    Ethereum,
    Usdc,
    Usdt,
    Bitcoin,
}

impl PaymentRail {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Stripe => "stripe",
            Self::Ethereum => "ethereum",
            Self::Usdc => "usdc",
            Self::Usdt => "usdt",
            Self::Bitcoin => "bitcoin",
        }
    }
}

/// Stored payment instrument kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodType {
    StripeCard,
    CryptoWallet,
}

impl PaymentMethodType {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::StripeCard => "stripe_card",
            Self::CryptoWallet => "crypto_wallet",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
    PastDue,
}

impl SubscriptionStatus {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "cancelled" => Some(Self::Cancelled),
            "expired" => Some(Self::Expired),
            "past_due" => Some(Self::PastDue),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub contract_id: Option<Uuid>,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub payment_method: PaymentRail,
    pub amount: Decimal,
    pub currency: String,
    pub exchange_rate: Option<Decimal>,
    pub external_transaction_id: String,
    pub blockchain_transaction_hash: String,
    pub payment_intent_id: String,
    pub description: String,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub error_message: String,
    pub is_completed: bool,
    pub is_failed: bool,
    pub is_pending: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTransactionRequest {
    pub transaction_type: TransactionType,
    pub payment_method: PaymentRail,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub contract_id: Option<Uuid>,
    pub description: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentMethodResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payment_type: PaymentMethodType,
    pub is_default: bool,
    pub is_active: bool,
    pub stripe_payment_method_id: String,
    pub card_last_four: String,
    pub card_brand: String,
    pub card_exp_month: Option<i32>,
    pub card_exp_year: Option<i32>,
    pub wallet_address: String,
    pub wallet_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentMethodRequest {
    pub payment_type: PaymentMethodType,
    pub is_default: Option<bool>,
    pub stripe_payment_method_id: Option<String>,
    pub card_last_four: Option<String>,
    pub card_brand: Option<String>,
    pub card_exp_month: Option<i32>,
    pub card_exp_year: Option<i32>,
    pub wallet_address: Option<String>,
    pub wallet_type: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stripe_subscription_id: String,
    pub status: SubscriptionStatus,
    pub price_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub billing_interval: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub payment_method_id: Option<Uuid>,
    pub is_active: bool,
    pub days_remaining: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Whole days until the period ends; never negative.
pub(crate) fn days_remaining(period_end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (period_end - now).num_days().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn transaction_type_round_trip() {
        for kind in [
            TransactionType::ContractDeployment,
            TransactionType::GasPayment,
            TransactionType::ServiceFee,
            TransactionType::Subscription,
            TransactionType::Refund,
        ] {
            assert_eq!(TransactionType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TransactionType::parse("barter"), None);
    }

    #[test]
    fn transaction_status_round_trip() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Processing,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
            TransactionStatus::Cancelled,
            TransactionStatus::Refunded,
        ] {
            assert_eq!(TransactionStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn subscription_status_parse() {
        assert_eq!(
            SubscriptionStatus::parse("past_due"),
            Some(SubscriptionStatus::PastDue)
        );
        assert_eq!(SubscriptionStatus::parse("paused"), None);
    }

    #[test]
    fn days_remaining_floors_at_zero() {
        let now = Utc::now();
        assert_eq!(days_remaining(now - Duration::days(3), now), 0);
        assert_eq!(days_remaining(now + Duration::days(3), now), 3);
        assert_eq!(days_remaining(now + Duration::hours(12), now), 0);
    }
}
