//! Role and permission model.
//!
//! Permissions are a closed, enumerated set; each role maps to a subset via
//! the `role_permissions` table. Re-adding a permission to a role is a no-op.

use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{error, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::auth::principal::require_auth;
use super::auth::AuthState;
use super::users::storage::fetch_user_record;

/// Every permission codename known to the system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    AddUser,
    ChangeUser,
    DeleteUser,
    ViewUser,
    AddRole,
    ChangeRole,
    DeleteRole,
    ViewRole,
    AddSmartContract,
    ChangeSmartContract,
    DeleteSmartContract,
    ViewSmartContract,
    AddTransaction,
    ChangeTransaction,
    DeleteTransaction,
    ViewTransaction,
}

impl Permission {
    pub const ALL: [Self; 16] = [
        Self::AddUser,
        Self::ChangeUser,
        Self::DeleteUser,
        Self::ViewUser,
        Self::AddRole,
        Self::ChangeRole,
        Self::DeleteRole,
        Self::ViewRole,
        Self::AddSmartContract,
        Self::ChangeSmartContract,
        Self::DeleteSmartContract,
        Self::ViewSmartContract,
        Self::AddTransaction,
        Self::ChangeTransaction,
        Self::DeleteTransaction,
        Self::ViewTransaction,
    ];

    #[must_use]
    pub fn codename(self) -> &'static str {
        match self {
            Self::AddUser => "add_user",
            Self::ChangeUser => "change_user",
            Self::DeleteUser => "delete_user",
            Self::ViewUser => "view_user",
            Self::AddRole => "add_role",
            Self::ChangeRole => "change_role",
            Self::DeleteRole => "delete_role",
            Self::ViewRole => "view_role",
            Self::AddSmartContract => "add_smartcontract",
            Self::ChangeSmartContract => "change_smartcontract",
            Self::DeleteSmartContract => "delete_smartcontract",
            Self::ViewSmartContract => "view_smartcontract",
            Self::AddTransaction => "add_transaction",
            Self::ChangeTransaction => "change_transaction",
            Self::DeleteTransaction => "delete_transaction",
            Self::ViewTransaction => "view_transaction",
        }
    }

    #[must_use]
    pub fn from_codename(codename: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|permission| permission.codename() == codename)
    }
}

/// Default roles created by `seed-roles`.
fn default_roles() -> Vec<(&'static str, &'static str, Vec<Permission>)> {
    vec![
        (
            "Admin",
            "Full system access",
            Permission::ALL.to_vec(),
        ),
        (
            "Manager",
            "Management access with limited admin capabilities",
            vec![
                Permission::ViewUser,
                Permission::ChangeUser,
                Permission::ViewSmartContract,
                Permission::ChangeSmartContract,
                Permission::ViewTransaction,
                Permission::ChangeTransaction,
            ],
        ),
        (
            "User",
            "Standard user access",
            vec![
                Permission::ViewSmartContract,
                Permission::AddSmartContract,
                Permission::ViewTransaction,
                Permission::AddTransaction,
            ],
        ),
        (
            "Guest",
            "Limited guest access",
            vec![Permission::ViewSmartContract],
        ),
    ]
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleSummary {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub permissions_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionCheckResponse {
    pub permission: String,
    pub allowed: bool,
}

/// Create or refresh the default roles; each role's permission set is reset
/// to the defaults. Returns (role name, permission count) pairs.
pub async fn seed_default_roles(pool: &PgPool) -> Result<Vec<(String, usize)>> {
    let mut seeded = Vec::new();
    for (name, description, permissions) in default_roles() {
        let query = r"
            INSERT INTO roles (name, description, is_active)
            VALUES ($1, $2, TRUE)
            ON CONFLICT (name) DO UPDATE
            SET description = EXCLUDED.description,
                is_active = TRUE,
                updated_at = NOW()
            RETURNING id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(name)
            .bind(description)
            .fetch_one(pool)
            .instrument(span)
            .await
            .context("failed to upsert role")?;
        let role_id: Uuid = row.get("id");

        let query = "DELETE FROM role_permissions WHERE role_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(role_id)
            .execute(pool)
            .instrument(span)
            .await
            .context("failed to clear role permissions")?;

        for permission in &permissions {
            add_role_permission(pool, role_id, *permission).await?;
        }

        seeded.push((name.to_string(), permissions.len()));
    }
    Ok(seeded)
}

/// Grant a permission to a role; idempotent on repeated grants.
pub async fn add_role_permission(
    pool: &PgPool,
    role_id: Uuid,
    permission: Permission,
) -> Result<()> {
    let query = r"
        INSERT INTO role_permissions (role_id, permission)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(role_id)
        .bind(permission.codename())
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to grant role permission")?;
    Ok(())
}

/// True iff the user has a role and that role holds the permission.
/// Users without a role never hold permissions; this is not an error.
pub async fn has_role_permission(
    pool: &PgPool,
    user_id: Uuid,
    codename: &str,
) -> Result<bool> {
    let query = r"
        SELECT 1
        FROM users
        JOIN role_permissions ON role_permissions.role_id = users.role_id
        WHERE users.id = $1
          AND role_permissions.permission = $2
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
        .bind(codename)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to check role permission")?;
    Ok(row.is_some())
}

pub(crate) async fn fetch_role_summary(
    pool: &PgPool,
    role_id: Uuid,
) -> Result<Option<RoleSummary>> {
    let query = r"
        SELECT roles.id, roles.name, roles.description, roles.is_active,
               roles.created_at, roles.updated_at,
               (SELECT COUNT(*) FROM role_permissions
                WHERE role_permissions.role_id = roles.id) AS permissions_count
        FROM roles
        WHERE roles.id = $1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(role_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch role")?;
    Ok(row.map(|row| RoleSummary {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        permissions_count: row.get("permissions_count"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}

async fn fetch_active_roles(pool: &PgPool) -> Result<Vec<RoleSummary>> {
    let query = r"
        SELECT roles.id, roles.name, roles.description, roles.is_active,
               roles.created_at, roles.updated_at,
               (SELECT COUNT(*) FROM role_permissions
                WHERE role_permissions.role_id = roles.id) AS permissions_count
        FROM roles
        WHERE roles.is_active
        ORDER BY roles.name
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
        .context("failed to list roles")?;
    Ok(rows
        .into_iter()
        .map(|row| RoleSummary {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
            permissions_count: row.get("permissions_count"),
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
        .collect())
}

/// List active roles; staff only.
#[utoipa::path(
    get,
    path = "/api/v1/auth/roles",
    responses(
        (status = 200, description = "Active roles", body = [RoleSummary]),
        (status = 401, description = "Missing or invalid access token"),
        (status = 403, description = "Caller is not staff")
    ),
    tag = "roles"
)]
pub async fn list_roles(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let user = match fetch_user_record(&pool, principal.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return StatusCode::UNAUTHORIZED.into_response(),
        Err(err) => {
            error!("Failed to load user for role listing: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if !user.is_admin() {
        return (
            StatusCode::FORBIDDEN,
            "You do not have permission to perform this action.".to_string(),
        )
            .into_response();
    }

    match fetch_active_roles(&pool).await {
        Ok(roles) => (StatusCode::OK, Json(roles)).into_response(),
        Err(err) => {
            error!("Failed to list roles: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Check whether the caller's role grants a permission codename.
#[utoipa::path(
    get,
    path = "/api/v1/auth/permissions/{codename}",
    params(("codename" = String, Path, description = "Permission codename")),
    responses(
        (status = 200, description = "Permission check result", body = PermissionCheckResponse),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "roles"
)]
pub async fn check_permission(
    Path(codename): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    // Unknown codenames are simply not granted; this endpoint never errors
    // on the permission name itself.
    if Permission::from_codename(&codename).is_none() {
        let response = PermissionCheckResponse {
            permission: codename,
            allowed: false,
        };
        return (StatusCode::OK, Json(response)).into_response();
    }

    match has_role_permission(&pool, principal.user_id, &codename).await {
        Ok(allowed) => {
            let response = PermissionCheckResponse {
                permission: codename,
                allowed,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => {
            error!("Failed to check permission: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codename_round_trip_for_all_permissions() {
        for permission in Permission::ALL {
            let codename = permission.codename();
            assert_eq!(Permission::from_codename(codename), Some(permission));
        }
    }

    #[test]
    fn from_codename_rejects_unknown() {
        assert_eq!(Permission::from_codename("launch_rocket"), None);
        assert_eq!(Permission::from_codename(""), None);
    }

    #[test]
    fn default_roles_shapes() {
        let roles = default_roles();
        assert_eq!(roles.len(), 4);

        let admin = &roles[0];
        assert_eq!(admin.0, "Admin");
        assert_eq!(admin.2.len(), Permission::ALL.len());

        let guest = &roles[3];
        assert_eq!(guest.0, "Guest");
        assert_eq!(guest.2, vec![Permission::ViewSmartContract]);
    }

    #[test]
    fn manager_cannot_delete() {
        let roles = default_roles();
        let manager = roles
            .iter()
            .find(|(name, _, _)| *name == "Manager")
            .expect("manager role");
        assert!(!manager.2.contains(&Permission::DeleteUser));
        assert!(!manager.2.contains(&Permission::DeleteSmartContract));
    }
}
