//! Smart contract record types and cost computation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Registration lifecycle of a contract record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Draft,
    Pending,
    Processing,
    Deployed,
    Verified,
    Failed,
    Cancelled,
}

impl ContractStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Deployed => "deployed",
            Self::Verified => "verified",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "deployed" => Some(Self::Deployed),
            "verified" => Some(Self::Verified),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Deployment may be requested from these states only.
    pub(crate) fn can_deploy(self) -> bool {
        matches!(self, Self::Draft | Self::Failed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BlockchainNetwork {
    EthereumMainnet,
    EthereumSepolia,
    PolygonMainnet,
    PolygonMumbai,
    BscMainnet,
    BscTestnet,
}

impl BlockchainNetwork {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::EthereumMainnet => "ethereum_mainnet",
            Self::EthereumSepolia => "ethereum_sepolia",
            Self::PolygonMainnet => "polygon_mainnet",
            Self::PolygonMumbai => "polygon_mumbai",
            Self::BscMainnet => "bsc_mainnet",
            Self::BscTestnet => "bsc_testnet",
        }
    }
}

/// Deletion lifecycle as a tagged state instead of a raw flag pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeletionState {
    Active,
    Deleted { at: DateTime<Utc> },
}

impl DeletionState {
    /// Interpret the stored flag + timestamp pair. A deleted row without a
    /// timestamp is treated as deleted now rather than silently active.
    pub(crate) fn from_flags(is_deleted: bool, deleted_at: Option<DateTime<Utc>>) -> Self {
        if is_deleted {
            Self::Deleted {
                at: deleted_at.unwrap_or_else(Utc::now),
            }
        } else {
            Self::Active
        }
    }

    pub(crate) fn is_deleted(self) -> bool {
        matches!(self, Self::Deleted { .. })
    }

    pub(crate) fn deleted_at(self) -> Option<DateTime<Utc>> {
        match self {
            Self::Active => None,
            Self::Deleted { at } => Some(at),
        }
    }
}

/// A `smart_contracts` row.
#[derive(Clone, Debug)]
pub struct ContractRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub description: String,
    pub document_hash: String,
    pub document_metadata: serde_json::Value,
    pub blockchain_network: String,
    pub contract_address: String,
    pub transaction_hash: String,
    pub block_number: Option<i64>,
    pub gas_used: Option<i64>,
    pub gas_price: Option<i64>,
    pub status: ContractStatus,
    pub gas_fee_estimate: Option<Decimal>,
    pub service_fee: Option<Decimal>,
    pub total_cost: Option<Decimal>,
    pub verification_status: bool,
    pub verification_timestamp: Option<DateTime<Utc>>,
    pub contract_metadata: serde_json::Value,
    pub error_message: String,
    pub retry_count: i32,
    pub deletion: DeletionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContractRecord {
    pub(crate) fn is_deployed(&self) -> bool {
        self.status == ContractStatus::Deployed && !self.contract_address.is_empty()
    }

    pub(crate) fn is_verified(&self) -> bool {
        self.verification_status && self.verification_timestamp.is_some()
    }
}

/// Split a gas estimate into (service fee, total cost) for a fee percentage.
pub(crate) fn compute_costs(gas_fee_estimate: Decimal, fee_percent: u8) -> (Decimal, Decimal) {
    let service_fee = gas_fee_estimate * Decimal::from(fee_percent) / Decimal::from(100u8);
    let total_cost = gas_fee_estimate + service_fee;
    (service_fee, total_cost)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ContractResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub description: String,
    pub document_hash: String,
    #[schema(value_type = Object)]
    pub document_metadata: serde_json::Value,
    pub blockchain_network: String,
    pub contract_address: String,
    pub transaction_hash: String,
    pub block_number: Option<i64>,
    pub gas_used: Option<i64>,
    pub gas_price: Option<i64>,
    pub status: ContractStatus,
    pub gas_fee_estimate: Option<Decimal>,
    pub service_fee: Option<Decimal>,
    pub total_cost: Option<Decimal>,
    pub verification_status: bool,
    pub verification_timestamp: Option<DateTime<Utc>>,
    #[schema(value_type = Object)]
    pub contract_metadata: serde_json::Value,
    pub error_message: String,
    pub retry_count: i32,
    pub is_deployed: bool,
    pub is_verified: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ContractRecord> for ContractResponse {
    fn from(record: ContractRecord) -> Self {
        let is_deployed = record.is_deployed();
        let is_verified = record.is_verified();
        Self {
            id: record.id,
            user_id: record.user_id,
            category_id: record.category_id,
            title: record.title,
            description: record.description,
            document_hash: record.document_hash,
            document_metadata: record.document_metadata,
            blockchain_network: record.blockchain_network,
            contract_address: record.contract_address,
            transaction_hash: record.transaction_hash,
            block_number: record.block_number,
            gas_used: record.gas_used,
            gas_price: record.gas_price,
            status: record.status,
            gas_fee_estimate: record.gas_fee_estimate,
            service_fee: record.service_fee,
            total_cost: record.total_cost,
            verification_status: record.verification_status,
            verification_timestamp: record.verification_timestamp,
            contract_metadata: record.contract_metadata,
            error_message: record.error_message,
            retry_count: record.retry_count,
            is_deployed,
            is_verified,
            is_deleted: record.deletion.is_deleted(),
            deleted_at: record.deletion.deleted_at(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateContractRequest {
    pub title: String,
    pub description: Option<String>,
    pub category_id: Uuid,
    pub document_hash: Option<String>,
    #[schema(value_type = Object)]
    pub document_metadata: Option<serde_json::Value>,
    pub blockchain_network: Option<BlockchainNetwork>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EstimateRequest {
    pub gas_fee_estimate: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TemplateResponse {
    pub id: Uuid,
    pub name: String,
    pub category_id: Uuid,
    pub description: String,
    pub template_code: String,
    #[schema(value_type = Object)]
    pub variables: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeploymentLogResponse {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub deployment_attempt: i32,
    pub status: String,
    pub message: String,
    pub transaction_hash: String,
    pub gas_used: Option<i64>,
    #[schema(value_type = Object)]
    pub error_details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trip() {
        for status in [
            ContractStatus::Draft,
            ContractStatus::Pending,
            ContractStatus::Processing,
            ContractStatus::Deployed,
            ContractStatus::Verified,
            ContractStatus::Failed,
            ContractStatus::Cancelled,
        ] {
            assert_eq!(ContractStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ContractStatus::parse("unknown"), None);
    }

    #[test]
    fn deploy_allowed_from_draft_and_failed_only() {
        assert!(ContractStatus::Draft.can_deploy());
        assert!(ContractStatus::Failed.can_deploy());
        assert!(!ContractStatus::Pending.can_deploy());
        assert!(!ContractStatus::Deployed.can_deploy());
        assert!(!ContractStatus::Cancelled.can_deploy());
    }

    #[test]
    fn deletion_state_from_flags() {
        assert_eq!(DeletionState::from_flags(false, None), DeletionState::Active);

        let at = Utc::now();
        let state = DeletionState::from_flags(true, Some(at));
        assert!(state.is_deleted());
        assert_eq!(state.deleted_at(), Some(at));

        // Deleted without timestamp still reads as deleted.
        assert!(DeletionState::from_flags(true, None).is_deleted());
        assert!(!DeletionState::Active.is_deleted());
        assert_eq!(DeletionState::Active.deleted_at(), None);
    }

    #[test]
    fn compute_costs_subscriber_and_default_rates() {
        let gas = Decimal::from_str("100").expect("decimal");

        let (fee, total) = compute_costs(gas, 15);
        assert_eq!(fee, Decimal::from_str("15").expect("decimal"));
        assert_eq!(total, Decimal::from_str("115").expect("decimal"));

        let (fee, total) = compute_costs(gas, 10);
        assert_eq!(fee, Decimal::from_str("10").expect("decimal"));
        assert_eq!(total, Decimal::from_str("110").expect("decimal"));
    }

    #[test]
    fn compute_costs_fractional_estimate() {
        let gas = Decimal::from_str("0.5").expect("decimal");
        let (fee, total) = compute_costs(gas, 10);
        assert_eq!(fee, Decimal::from_str("0.05").expect("decimal"));
        assert_eq!(total, Decimal::from_str("0.55").expect("decimal"));
    }

    #[test]
    fn network_names() {
        assert_eq!(
            BlockchainNetwork::EthereumSepolia.as_str(),
            "ethereum_sepolia"
        );
        assert_eq!(BlockchainNetwork::BscTestnet.as_str(), "bsc_testnet");
    }
}
