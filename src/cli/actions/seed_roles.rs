use crate::api::handlers::roles;
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// Execute the seed-roles action: create the default roles and reset their
/// permission sets. Safe to re-run; membership updates are idempotent.
/// # Errors
/// Returns an error if the database is unreachable or a statement fails.
pub async fn handle(dsn: String) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(2)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let seeded = roles::seed_default_roles(&pool).await?;
    for (name, permissions) in seeded {
        info!("Seeded role {name} with {permissions} permissions");
    }

    Ok(())
}
