//! Auth handlers and supporting modules.
//!
//! Credential checks, JWT issuance, session/audit bookkeeping, registration
//! with email verification, and password change/reset flows live here.
//!
//! Every login call writes a `login_attempts` row regardless of outcome; the
//! response never discloses which credential factor failed. Raw session keys
//! and account-action tokens are hashed before they reach the database.

pub(crate) mod login;
pub(crate) mod password;
pub(crate) mod principal;
pub(crate) mod register;
mod state;
mod storage;
mod tokens;
pub(crate) mod types;
mod utils;
pub(crate) mod verification;

pub use state::{AuthConfig, AuthState};
