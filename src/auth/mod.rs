//! Authentication and authorization core.
//!
//! Every request flows through the same pipeline:
//! 1. Identity resolution: bearer token -> verified [`Identity`] (or none).
//! 2. Role guards: fixed three-tier hierarchy (USER < CONSULTOR < ADMIN).
//! 3. Company scoping: membership / legacy ownership checks.
//! 4. Entitlement gate: FULL-content access, orthogonal to role.
//!
//! Guards take a resolved `Identity` by value, never an `Option` -- a route
//! cannot consult a role guard without having gone through authentication
//! first.

mod claims;
mod entitlement;
mod guards;
mod identity;
mod jwks;
mod lookup;
mod role;
mod verify;

pub use claims::{Claims, RoleMetadata};
pub use entitlement::EntitlementPolicy;
pub use guards::{
    block_consultor_on_mutation, company_access_decision, ensure_company_access, parse_company_id,
    require_any_of, require_at_least, CompanyScope,
};
pub use identity::{authenticate, resolve_identity, AuthFailure, CurrentUser, Identity, OptionalUser};
pub use jwks::JwksKeys;
pub use lookup::{AdminApiLookup, NoopLookup, RoleLookupPort};
pub use role::Role;
pub use verify::{JwksVerifier, TokenVerifier};

use std::sync::Arc;
use std::time::Duration;

use crate::errors::AppError;

const DEFAULT_AUDIENCE: &str = "authenticated";
const DEFAULT_JWKS_TTL_SECS: u64 = 600;

/// Outcome of an access check that may need the data layer. Infrastructure
/// failures are kept distinct so callers can fail closed while logging the
/// real cause.
#[derive(Debug)]
pub enum AccessDecision {
    Allowed,
    Denied(&'static str),
    Infrastructure(sqlx::Error),
}

/// Injected authentication capabilities. Production wires the JWKS verifier
/// and the identity-admin lookup from env; tests substitute fakes.
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Option<Arc<dyn TokenVerifier>>,
    pub role_lookup: Arc<dyn RoleLookupPort>,
}

impl AuthState {
    pub fn from_env() -> Result<Self, AppError> {
        let http = reqwest::Client::new();

        let verifier: Option<Arc<dyn TokenVerifier>> = match std::env::var("AUTH_ISSUER") {
            Ok(issuer) if !issuer.trim().is_empty() => {
                let audience = std::env::var("AUTH_AUDIENCE")
                    .unwrap_or_else(|_| DEFAULT_AUDIENCE.to_string());
                let ttl_secs = std::env::var("JWKS_TTL_SECS")
                    .map(|value| value.parse::<u64>())
                    .unwrap_or(Ok(DEFAULT_JWKS_TTL_SECS))
                    .map_err(|_| AppError::configuration("JWKS_TTL_SECS must be a valid integer"))?;

                Some(Arc::new(JwksVerifier::new(
                    http.clone(),
                    issuer.trim().to_string(),
                    audience,
                    Duration::from_secs(ttl_secs),
                )))
            }
            _ => {
                tracing::warn!("AUTH_ISSUER not set; all requests are treated as anonymous");
                None
            }
        };

        let role_lookup: Arc<dyn RoleLookupPort> = match (
            std::env::var("ADMIN_API_URL"),
            std::env::var("ADMIN_API_KEY"),
        ) {
            (Ok(url), Ok(key)) if !url.trim().is_empty() => {
                Arc::new(AdminApiLookup::new(http, url.trim().to_string(), key))
            }
            _ => Arc::new(NoopLookup),
        };

        Ok(Self {
            verifier,
            role_lookup,
        })
    }

    /// State with no verifier and no lookup: every request is anonymous.
    pub fn disabled() -> Self {
        Self {
            verifier: None,
            role_lookup: Arc::new(NoopLookup),
        }
    }
}
