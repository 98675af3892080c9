//! # Blockbustre (Blockchain Document Registration API)
//!
//! `blockbustre` is the backend for the BlockBustre document-registration
//! service. It owns user accounts with role-based access control, smart
//! contract registration records, and payment/subscription bookkeeping.
//!
//! ## Accounts & RBAC
//!
//! Users are identified by email. Each user may carry one role; roles hold an
//! explicit, enumerated permission set (no auto-generated permission catalog).
//! Deleting a role detaches it from its users without deleting them.
//!
//! ## Authentication
//!
//! Login issues a short-lived access JWT and a longer-lived refresh JWT.
//! Every login call appends a `login_attempts` audit row and upserts a
//! `user_sessions` row keyed by the client session key. Logout denylists the
//! refresh token and deactivates the session without deleting it.
//!
//! ## Registration records
//!
//! Smart contracts are status-tracked bookkeeping rows
//! (draft → pending → processing → deployed → verified, or failed/cancelled)
//! with soft deletion and an append-only deployment log. On-chain submission
//! happens elsewhere; this service only tracks its lifecycle and costs.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
