use std::collections::HashSet;

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::entitlement::{Plan, SubscriptionStatus};

use super::identity::Identity;
use super::AccessDecision;

/// FULL-content gate, orthogonal to role. Decision order: global bypass,
/// email allowlist, persisted company subscription. An admin without a
/// matching record and outside the allowlist is NOT granted.
#[derive(Debug, Clone)]
pub struct EntitlementPolicy {
    bypass: bool,
    allowlist: HashSet<String>,
}

impl EntitlementPolicy {
    pub fn new(bypass: bool, allowlist: impl IntoIterator<Item = String>) -> Self {
        Self {
            bypass,
            allowlist: allowlist
                .into_iter()
                .map(|email| email.trim().to_ascii_lowercase())
                .filter(|email| !email.is_empty())
                .collect(),
        }
    }

    /// Build from env. Fails when the bypass flag is set while the
    /// environment is marked production: the process must abort at startup
    /// rather than carry a runtime bypass into production.
    pub fn from_env() -> Result<Self, AppError> {
        let bypass = env_flag("ENTITLEMENT_BYPASS");
        let production = std::env::var("APP_ENV")
            .map(|value| value.trim().eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        if bypass && production {
            return Err(AppError::configuration(
                "ENTITLEMENT_BYPASS must not be enabled when APP_ENV=production",
            ));
        }

        if bypass {
            tracing::warn!("entitlement bypass is active; all FULL content checks pass");
        }

        let allowlist = std::env::var("FULL_ACCESS_ALLOWLIST").unwrap_or_default();

        Ok(Self::new(bypass, allowlist.split(',').map(String::from)))
    }

    pub fn is_allowlisted(&self, email: Option<&str>) -> bool {
        email
            .map(|email| self.allowlist.contains(&email.trim().to_ascii_lowercase()))
            .unwrap_or(false)
    }

    /// Tagged decision for FULL-content access. First match wins: bypass,
    /// allowlist, persisted FULL/ACTIVE subscription.
    pub async fn full_access_decision(
        &self,
        pool: &SqlitePool,
        identity: &Identity,
        company_id: Uuid,
    ) -> AccessDecision {
        if self.bypass {
            return AccessDecision::Allowed;
        }

        if self.is_allowlisted(identity.email.as_deref()) {
            return AccessDecision::Allowed;
        }

        let record = sqlx::query_as::<_, (String, String)>(
            "SELECT plan, status FROM company_entitlements WHERE company_id = ?",
        )
        .bind(company_id.to_string())
        .fetch_optional(pool)
        .await;

        match record {
            Ok(Some((plan, status))) => {
                let full = Plan::parse(&plan) == Some(Plan::Full)
                    && SubscriptionStatus::parse(&status) == Some(SubscriptionStatus::Active);
                if full {
                    AccessDecision::Allowed
                } else {
                    AccessDecision::Denied("no active FULL subscription")
                }
            }
            Ok(None) => AccessDecision::Denied("no subscription record"),
            Err(err) => AccessDecision::Infrastructure(err),
        }
    }

    /// Boolean form used by FULL-content endpoints. Never errors: an
    /// infrastructure failure is a firm reject, with the cause logged.
    pub async fn can_access_full(
        &self,
        pool: &SqlitePool,
        identity: &Identity,
        company_id: Uuid,
    ) -> bool {
        match self.full_access_decision(pool, identity, company_id).await {
            AccessDecision::Allowed => true,
            AccessDecision::Denied(reason) => {
                tracing::debug!(company_id = %company_id, reason, "full content denied");
                false
            }
            AccessDecision::Infrastructure(err) => {
                tracing::error!(error = %err, company_id = %company_id, "entitlement lookup failed, denying");
                false
            }
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| {
            let value = value.trim();
            value.eq_ignore_ascii_case("true")
                || value.eq_ignore_ascii_case("yes")
                || value == "1"
        })
        .unwrap_or(false)
}
