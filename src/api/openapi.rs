use crate::api::handlers::{auth, contracts, health, roles, transactions, users};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec.
/// Routes added outside (like `OPTIONS /health`) are intentionally not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut tags = Vec::new();
    for (name, description) in [
        ("auth", "Authentication, registration and password flows"),
        ("users", "Profile, dashboard and account status"),
        ("roles", "RBAC roles and permission checks"),
        ("contracts", "Smart contract registration records"),
        ("transactions", "Payments, payment methods and subscriptions"),
        ("health", "Service health"),
    ] {
        let mut tag = Tag::new(name);
        tag.description = Some(description.to_string());
        tags.push(tag);
    }

    let mut base = cargo_openapi();
    base.tags = Some(tags);

    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.
    let router = OpenApiRouter::with_openapi(base)
        .routes(routes!(health::health))
        .routes(routes!(auth::login::login))
        .routes(routes!(auth::login::refresh))
        .routes(routes!(auth::login::logout))
        .routes(routes!(auth::register::register))
        .routes(routes!(auth::verification::verify_email))
        .routes(routes!(auth::password::password_change))
        .routes(routes!(auth::password::password_reset))
        .routes(routes!(auth::password::password_reset_confirm))
        .routes(routes!(users::profile))
        .routes(routes!(users::update_profile))
        .routes(routes!(users::dashboard))
        .routes(routes!(users::kyc_request))
        .routes(routes!(users::admin_status))
        .routes(routes!(roles::list_roles))
        .routes(routes!(roles::check_permission))
        .routes(routes!(
            contracts::list_contracts,
            contracts::create_contract
        ))
        .routes(routes!(contracts::list_categories))
        .routes(routes!(contracts::list_templates))
        .routes(routes!(contracts::get_contract, contracts::delete_contract))
        .routes(routes!(contracts::restore_contract))
        .routes(routes!(contracts::estimate_contract))
        .routes(routes!(contracts::deploy_contract))
        .routes(routes!(contracts::contract_logs))
        .routes(routes!(
            transactions::list_transactions,
            transactions::create_transaction
        ))
        .routes(routes!(
            transactions::list_payment_methods,
            transactions::create_payment_method
        ))
        .routes(routes!(transactions::delete_payment_method))
        .routes(routes!(transactions::list_subscriptions))
        .routes(routes!(transactions::get_transaction))
        .routes(routes!(transactions::cancel_subscription));

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    if let Some(start) = author.find('<') {
        let name = author[..start].trim();
        let email = author[start + 1..].trim_end_matches('>').trim();
        let name = if name.is_empty() { None } else { Some(name) };
        let email = if email.is_empty() { None } else { Some(email) };
        (name, email)
    } else {
        let name = author.trim();
        (if name.is_empty() { None } else { Some(name) }, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_has_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn openapi_documents_core_paths() {
        let spec = openapi();
        let paths = &spec.paths.paths;
        assert!(paths.contains_key("/api/v1/auth/login"));
        assert!(paths.contains_key("/api/v1/auth/register"));
        assert!(paths.contains_key("/api/v1/auth/verify-email/{uid}/{token}"));
        assert!(paths.contains_key("/api/v1/contracts"));
        assert!(paths.contains_key("/api/v1/transactions"));
        assert!(paths.contains_key("/health"));
    }

    #[test]
    fn parse_author_variants() {
        assert_eq!(
            parse_author("Team BlockBustre <team@blockbustre.com>"),
            (Some("Team BlockBustre"), Some("team@blockbustre.com"))
        );
        assert_eq!(parse_author("Solo Dev"), (Some("Solo Dev"), None));
    }
}
