use crate::{
    api,
    api::{
        email::{EmailSender, HttpEmailSender, LogEmailSender},
        handlers::auth::{AuthConfig, AuthState},
    },
    cli::globals::GlobalArgs,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub frontend_base_url: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub verify_token_ttl_seconds: i64,
    pub reset_token_ttl_seconds: i64,
    pub password_min_length: usize,
    pub globals: GlobalArgs,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn handle(args: Args) -> Result<()> {
    let config = AuthConfig::new(args.frontend_base_url)
        .with_access_token_ttl_seconds(args.access_token_ttl_seconds)
        .with_refresh_token_ttl_seconds(args.refresh_token_ttl_seconds)
        .with_verify_token_ttl_seconds(args.verify_token_ttl_seconds)
        .with_reset_token_ttl_seconds(args.reset_token_ttl_seconds)
        .with_password_min_length(args.password_min_length);

    let auth_state = Arc::new(AuthState::new(config, &args.globals.jwt_secret));

    let email: Arc<dyn EmailSender> = match &args.globals.email_api_url {
        Some(url) => {
            info!("Using HTTP email delivery: {url}");
            Arc::new(HttpEmailSender::new(
                url.clone(),
                args.globals.email_from.clone(),
                args.globals.email_api_token.clone(),
            )?)
        }
        None => {
            info!("No email API configured, logging outbound email instead");
            Arc::new(LogEmailSender)
        }
    };

    api::new(args.port, args.dsn, auth_state, email).await
}
