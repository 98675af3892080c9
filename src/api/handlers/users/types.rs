//! User domain model and request/response types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::handlers::roles::RoleSummary;

/// Fee charged to active subscribers, percent of the gas estimate.
pub(crate) const SUBSCRIBER_FEE_PERCENT: u8 = 10;
/// Fee charged on the pay-as-you-go plan.
pub(crate) const PAY_AS_YOU_GO_FEE_PERCENT: u8 = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionType {
    PayAsYouGo,
    Subscription,
}

impl SubscriptionType {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::PayAsYouGo => "pay_as_you_go",
            Self::Subscription => "subscription",
        }
    }

    pub(crate) fn parse(value: &str) -> Self {
        match value {
            "subscription" => Self::Subscription,
            _ => Self::PayAsYouGo,
        }
    }
}

/// A `users` row as read from the database.
#[derive(Clone, Debug)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub date_of_birth: Option<NaiveDate>,
    pub country: String,
    pub language: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_kyc_verified: bool,
    pub kyc_verified_at: Option<DateTime<Utc>>,
    pub wallet_address: String,
    pub wallet_type: String,
    pub subscription_type: SubscriptionType,
    pub subscription_active: bool,
    pub subscription_start_date: Option<DateTime<Utc>>,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub role_id: Option<Uuid>,
    pub email_notifications: bool,
    pub sms_notifications: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub(crate) fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// A user is a subscriber only while a recurring subscription is active
    /// and its end date lies strictly in the future.
    pub(crate) fn is_subscriber(&self, now: DateTime<Utc>) -> bool {
        self.subscription_type == SubscriptionType::Subscription
            && self.subscription_active
            && self.subscription_end_date.is_some_and(|end| end > now)
    }

    pub(crate) fn service_fee_percentage(&self, now: DateTime<Utc>) -> u8 {
        if self.is_subscriber(now) {
            SUBSCRIBER_FEE_PERCENT
        } else {
            PAY_AS_YOU_GO_FEE_PERCENT
        }
    }

    pub(crate) fn is_admin(&self) -> bool {
        self.is_superuser || self.is_staff
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub company_name: String,
    pub job_title: String,
    pub industry: String,
    pub address_line_1: String,
    pub address_line_2: String,
    pub city: String,
    pub state_province: String,
    pub postal_code: String,
    pub website: String,
    pub linkedin_profile: String,
    pub twitter_handle: String,
    pub bio: String,
    pub timezone: String,
    pub profile_public: bool,
    pub show_email: bool,
    pub show_phone: bool,
}

/// Optional profile fields accepted at registration and on profile update.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProfileInput {
    pub company_name: Option<String>,
    pub job_title: Option<String>,
    pub industry: Option<String>,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub city: Option<String>,
    pub state_province: Option<String>,
    pub postal_code: Option<String>,
    pub website: Option<String>,
    pub linkedin_profile: Option<String>,
    pub twitter_handle: Option<String>,
    pub bio: Option<String>,
    pub timezone: Option<String>,
    pub profile_public: Option<bool>,
    pub show_email: Option<bool>,
    pub show_phone: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub phone_number: String,
    pub date_of_birth: Option<NaiveDate>,
    pub country: String,
    pub language: String,
    pub is_kyc_verified: bool,
    pub kyc_verified_at: Option<DateTime<Utc>>,
    pub wallet_address: String,
    pub wallet_type: String,
    pub subscription_type: SubscriptionType,
    pub subscription_active: bool,
    pub subscription_start_date: Option<DateTime<Utc>>,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub role: Option<RoleSummary>,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub email_notifications: bool,
    pub sms_notifications: bool,
    pub profile: Option<ProfileResponse>,
    pub is_subscriber: bool,
    pub service_fee_percentage: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Allow-listed user fields accepted by the profile update endpoint.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UserUpdateRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub wallet_address: Option<String>,
    pub wallet_type: Option<String>,
    pub email_notifications: Option<bool>,
    pub sms_notifications: Option<bool>,
    pub profile: Option<ProfileInput>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_contracts: i64,
    pub total_transactions: i64,
    pub kyc_verified: bool,
    pub subscription_active: bool,
    pub service_fee_percentage: u8,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub user: UserResponse,
    pub stats: DashboardStats,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminStatusResponse {
    pub is_superuser: bool,
    pub is_staff: bool,
    pub is_admin: bool,
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct KycRequestResponse {
    pub message: String,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base_user() -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Smith".to_string(),
            phone_number: String::new(),
            date_of_birth: None,
            country: String::new(),
            language: "en".to_string(),
            is_active: true,
            is_verified: false,
            is_staff: false,
            is_superuser: false,
            is_kyc_verified: false,
            kyc_verified_at: None,
            wallet_address: String::new(),
            wallet_type: "ethereum".to_string(),
            subscription_type: SubscriptionType::PayAsYouGo,
            subscription_active: false,
            subscription_start_date: None,
            subscription_end_date: None,
            role_id: None,
            email_notifications: true,
            sms_notifications: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn full_name_joins_parts() {
        assert_eq!(base_user().full_name(), "Alice Smith");
    }

    #[test]
    fn subscriber_requires_all_three_conditions() {
        let now = Utc::now();
        let future = Some(now + Duration::days(30));
        let past = Some(now - Duration::days(1));

        let mut user = base_user();
        assert!(!user.is_subscriber(now));

        user.subscription_type = SubscriptionType::Subscription;
        assert!(!user.is_subscriber(now), "missing active flag");

        user.subscription_active = true;
        assert!(!user.is_subscriber(now), "missing end date");

        user.subscription_end_date = past;
        assert!(!user.is_subscriber(now), "end date in the past");

        user.subscription_end_date = Some(now);
        assert!(!user.is_subscriber(now), "end date must be strictly future");

        user.subscription_end_date = future;
        assert!(user.is_subscriber(now));

        user.subscription_active = false;
        assert!(!user.is_subscriber(now));

        user.subscription_active = true;
        user.subscription_type = SubscriptionType::PayAsYouGo;
        assert!(!user.is_subscriber(now));
    }

    #[test]
    fn service_fee_has_exactly_two_values() {
        let now = Utc::now();
        let mut user = base_user();
        assert_eq!(user.service_fee_percentage(now), PAY_AS_YOU_GO_FEE_PERCENT);

        user.subscription_type = SubscriptionType::Subscription;
        user.subscription_active = true;
        user.subscription_end_date = Some(now + Duration::days(1));
        assert_eq!(user.service_fee_percentage(now), SUBSCRIBER_FEE_PERCENT);
    }

    #[test]
    fn subscription_type_parse_defaults_to_pay_as_you_go() {
        assert_eq!(
            SubscriptionType::parse("subscription"),
            SubscriptionType::Subscription
        );
        assert_eq!(
            SubscriptionType::parse("pay_as_you_go"),
            SubscriptionType::PayAsYouGo
        );
        assert_eq!(
            SubscriptionType::parse("unknown"),
            SubscriptionType::PayAsYouGo
        );
        assert_eq!(SubscriptionType::Subscription.as_str(), "subscription");
    }

    #[test]
    fn is_admin_for_staff_or_superuser() {
        let mut user = base_user();
        assert!(!user.is_admin());
        user.is_staff = true;
        assert!(user.is_admin());
        user.is_staff = false;
        user.is_superuser = true;
        assert!(user.is_admin());
    }
}
