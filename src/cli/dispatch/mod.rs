//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action the binary should execute:
//! either the API server with its full configuration, or a one-shot
//! maintenance task like seeding the default roles.

use crate::cli::{
    actions::{server::Args, Action},
    globals::GlobalArgs,
};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    if matches.subcommand_matches("seed-roles").is_some() {
        return Ok(Action::SeedRoles { dsn });
    }

    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let jwt_secret = matches
        .get_one::<String>("jwt-secret")
        .cloned()
        .context("missing required argument: --jwt-secret")?;

    let mut globals = GlobalArgs::new(
        matches
            .get_one::<String>("email-from")
            .cloned()
            .unwrap_or_else(|| "no-reply@blockbustre.com".to_string()),
    );
    globals.set_jwt_secret(SecretString::from(jwt_secret));
    globals.set_email_api(
        matches.get_one::<String>("email-api-url").cloned(),
        matches
            .get_one::<String>("email-api-token")
            .cloned()
            .map(SecretString::from)
            .unwrap_or_default(),
    );

    Ok(Action::Server(Args {
        port,
        dsn,
        frontend_base_url: matches
            .get_one::<String>("frontend-base-url")
            .cloned()
            .unwrap_or_else(|| "https://blockbustre.com".to_string()),
        access_token_ttl_seconds: matches
            .get_one::<i64>("access-token-ttl-seconds")
            .copied()
            .unwrap_or(900),
        refresh_token_ttl_seconds: matches
            .get_one::<i64>("refresh-token-ttl-seconds")
            .copied()
            .unwrap_or(604_800),
        verify_token_ttl_seconds: matches
            .get_one::<i64>("verify-token-ttl-seconds")
            .copied()
            .unwrap_or(86_400),
        reset_token_ttl_seconds: matches
            .get_one::<i64>("reset-token-ttl-seconds")
            .copied()
            .unwrap_or(86_400),
        password_min_length: matches
            .get_one::<usize>("password-min-length")
            .copied()
            .unwrap_or(8),
        globals,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn base_args() -> Vec<&'static str> {
        vec![
            "blockbustre",
            "--dsn",
            "postgres://user@localhost:5432/blockbustre",
            "--jwt-secret",
            "sekret",
        ]
    }

    #[test]
    fn server_action_defaults() {
        temp_env::with_vars([("BLOCKBUSTRE_PORT", None::<&str>)], || {
            let command = crate::cli::commands::new();
            let matches = command.get_matches_from(base_args());
            let action = handler(&matches).expect("server action");
            match action {
                Action::Server(args) => {
                    assert_eq!(args.port, 8080);
                    assert_eq!(args.access_token_ttl_seconds, 900);
                    assert_eq!(args.password_min_length, 8);
                    assert_eq!(args.globals.jwt_secret.expose_secret(), "sekret");
                }
                Action::SeedRoles { .. } => panic!("expected server action"),
            }
        });
    }

    #[test]
    fn seed_roles_action() {
        let command = crate::cli::commands::new();
        let mut args = base_args();
        args.push("seed-roles");
        let matches = command.get_matches_from(args);
        let action = handler(&matches).expect("seed-roles action");
        match action {
            Action::SeedRoles { dsn } => {
                assert_eq!(dsn, "postgres://user@localhost:5432/blockbustre");
            }
            Action::Server(_) => panic!("expected seed-roles action"),
        }
    }
}
