//! Database helpers for user rows, profiles and dashboard counts.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::api::handlers::roles::fetch_role_summary;

use super::types::{
    ProfileResponse, SubscriptionType, UserRecord, UserResponse, UserUpdateRequest,
};

fn user_record_from_row(row: &PgRow) -> UserRecord {
    let subscription_type: String = row.get("subscription_type");
    UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        phone_number: row.get("phone_number"),
        date_of_birth: row.get("date_of_birth"),
        country: row.get("country"),
        language: row.get("language"),
        is_active: row.get("is_active"),
        is_verified: row.get("is_verified"),
        is_staff: row.get("is_staff"),
        is_superuser: row.get("is_superuser"),
        is_kyc_verified: row.get("is_kyc_verified"),
        kyc_verified_at: row.get("kyc_verified_at"),
        wallet_address: row.get("wallet_address"),
        wallet_type: row.get("wallet_type"),
        subscription_type: SubscriptionType::parse(&subscription_type),
        subscription_active: row.get("subscription_active"),
        subscription_start_date: row.get("subscription_start_date"),
        subscription_end_date: row.get("subscription_end_date"),
        role_id: row.get("role_id"),
        email_notifications: row.get("email_notifications"),
        sms_notifications: row.get("sms_notifications"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const USER_COLUMNS: &str = r"
    id, email, first_name, last_name, phone_number, date_of_birth, country,
    language, is_active, is_verified, is_staff, is_superuser, is_kyc_verified,
    kyc_verified_at, wallet_address, wallet_type, subscription_type,
    subscription_active, subscription_start_date, subscription_end_date,
    role_id, email_notifications, sms_notifications, created_at, updated_at
";

pub(crate) async fn fetch_user_record(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<UserRecord>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 LIMIT 1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch user")?;
    Ok(row.map(|row| user_record_from_row(&row)))
}

pub(crate) async fn fetch_profile(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<ProfileResponse>> {
    let query = r"
        SELECT company_name, job_title, industry, address_line_1, address_line_2,
               city, state_province, postal_code, website, linkedin_profile,
               twitter_handle, bio, timezone, profile_public, show_email, show_phone
        FROM user_profiles
        WHERE user_id = $1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch user profile")?;
    Ok(row.map(|row| ProfileResponse {
        company_name: row.get("company_name"),
        job_title: row.get("job_title"),
        industry: row.get("industry"),
        address_line_1: row.get("address_line_1"),
        address_line_2: row.get("address_line_2"),
        city: row.get("city"),
        state_province: row.get("state_province"),
        postal_code: row.get("postal_code"),
        website: row.get("website"),
        linkedin_profile: row.get("linkedin_profile"),
        twitter_handle: row.get("twitter_handle"),
        bio: row.get("bio"),
        timezone: row.get("timezone"),
        profile_public: row.get("profile_public"),
        show_email: row.get("show_email"),
        show_phone: row.get("show_phone"),
    }))
}

/// Assemble the full user payload returned by profile/login/dashboard.
pub(crate) async fn fetch_user_response(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<UserResponse>> {
    let Some(record) = fetch_user_record(pool, user_id).await? else {
        return Ok(None);
    };
    let profile = fetch_profile(pool, user_id).await?;
    let role = match record.role_id {
        Some(role_id) => fetch_role_summary(pool, role_id).await?,
        None => None,
    };

    let now = Utc::now();
    Ok(Some(UserResponse {
        id: record.id,
        email: record.email.clone(),
        first_name: record.first_name.clone(),
        last_name: record.last_name.clone(),
        full_name: record.full_name(),
        phone_number: record.phone_number.clone(),
        date_of_birth: record.date_of_birth,
        country: record.country.clone(),
        language: record.language.clone(),
        is_kyc_verified: record.is_kyc_verified,
        kyc_verified_at: record.kyc_verified_at,
        wallet_address: record.wallet_address.clone(),
        wallet_type: record.wallet_type.clone(),
        subscription_type: record.subscription_type,
        subscription_active: record.subscription_active,
        subscription_start_date: record.subscription_start_date,
        subscription_end_date: record.subscription_end_date,
        role,
        is_active: record.is_active,
        is_verified: record.is_verified,
        is_staff: record.is_staff,
        is_superuser: record.is_superuser,
        email_notifications: record.email_notifications,
        sms_notifications: record.sms_notifications,
        profile,
        is_subscriber: record.is_subscriber(now),
        service_fee_percentage: record.service_fee_percentage(now),
        created_at: record.created_at,
        updated_at: record.updated_at,
    }))
}

/// Apply allow-listed updates to the user row and its profile.
pub(crate) async fn update_user_and_profile(
    pool: &PgPool,
    user_id: Uuid,
    update: &UserUpdateRequest,
) -> Result<()> {
    let query = r"
        UPDATE users
        SET first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            phone_number = COALESCE($4, phone_number),
            date_of_birth = COALESCE($5, date_of_birth),
            country = COALESCE($6, country),
            language = COALESCE($7, language),
            wallet_address = COALESCE($8, wallet_address),
            wallet_type = COALESCE($9, wallet_type),
            email_notifications = COALESCE($10, email_notifications),
            sms_notifications = COALESCE($11, sms_notifications),
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(update.first_name.as_deref())
        .bind(update.last_name.as_deref())
        .bind(update.phone_number.as_deref())
        .bind(update.date_of_birth)
        .bind(update.country.as_deref())
        .bind(update.language.as_deref())
        .bind(update.wallet_address.as_deref())
        .bind(update.wallet_type.as_deref())
        .bind(update.email_notifications)
        .bind(update.sms_notifications)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update user")?;

    let Some(profile) = &update.profile else {
        return Ok(());
    };

    let query = r"
        UPDATE user_profiles
        SET company_name = COALESCE($2, company_name),
            job_title = COALESCE($3, job_title),
            industry = COALESCE($4, industry),
            address_line_1 = COALESCE($5, address_line_1),
            address_line_2 = COALESCE($6, address_line_2),
            city = COALESCE($7, city),
            state_province = COALESCE($8, state_province),
            postal_code = COALESCE($9, postal_code),
            website = COALESCE($10, website),
            linkedin_profile = COALESCE($11, linkedin_profile),
            twitter_handle = COALESCE($12, twitter_handle),
            bio = COALESCE($13, bio),
            timezone = COALESCE($14, timezone),
            profile_public = COALESCE($15, profile_public),
            show_email = COALESCE($16, show_email),
            show_phone = COALESCE($17, show_phone),
            updated_at = NOW()
        WHERE user_id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(profile.company_name.as_deref())
        .bind(profile.job_title.as_deref())
        .bind(profile.industry.as_deref())
        .bind(profile.address_line_1.as_deref())
        .bind(profile.address_line_2.as_deref())
        .bind(profile.city.as_deref())
        .bind(profile.state_province.as_deref())
        .bind(profile.postal_code.as_deref())
        .bind(profile.website.as_deref())
        .bind(profile.linkedin_profile.as_deref())
        .bind(profile.twitter_handle.as_deref())
        .bind(profile.bio.as_deref())
        .bind(profile.timezone.as_deref())
        .bind(profile.profile_public)
        .bind(profile.show_email)
        .bind(profile.show_phone)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update user profile")?;

    Ok(())
}

pub(crate) async fn count_user_contracts(pool: &PgPool, user_id: Uuid) -> Result<i64> {
    let query = r"
        SELECT COUNT(*) AS total
        FROM smart_contracts
        WHERE user_id = $1 AND NOT is_deleted
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to count contracts")?;
    Ok(row.get("total"))
}

pub(crate) async fn count_user_transactions(pool: &PgPool, user_id: Uuid) -> Result<i64> {
    let query = "SELECT COUNT(*) AS total FROM transactions WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to count transactions")?;
    Ok(row.get("total"))
}
