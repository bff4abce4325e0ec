use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Plan {
    Light,
    Full,
}

impl Plan {
    pub fn parse(raw: &str) -> Option<Plan> {
        match raw {
            "LIGHT" => Some(Plan::Light),
            "FULL" => Some(Plan::Full),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Light => "LIGHT",
            Plan::Full => "FULL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    pub fn parse(raw: &str) -> Option<SubscriptionStatus> {
        match raw {
            "ACTIVE" => Some(SubscriptionStatus::Active),
            "PAST_DUE" => Some(SubscriptionStatus::PastDue),
            "CANCELED" => Some(SubscriptionStatus::Canceled),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "ACTIVE",
            SubscriptionStatus::PastDue => "PAST_DUE",
            SubscriptionStatus::Canceled => "CANCELED",
        }
    }
}

/// Persisted per-company subscription record. Read by the entitlement gate,
/// written by company management (here: the admin surface).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CompanyEntitlement {
    pub company_id: Uuid,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    /// Informational flag on the record. Grants nothing by itself: ops
    /// access goes through the email allowlist.
    pub is_admin: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbCompanyEntitlement {
    pub company_id: String,
    pub plan: String,
    pub status: String,
    pub is_admin: bool,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbCompanyEntitlement> for CompanyEntitlement {
    type Error = AppError;

    fn try_from(value: DbCompanyEntitlement) -> Result<Self, Self::Error> {
        Ok(CompanyEntitlement {
            company_id: Uuid::parse_str(&value.company_id)
                .map_err(|_| AppError::internal("corrupt company id in database"))?,
            plan: Plan::parse(&value.plan)
                .ok_or_else(|| AppError::internal("corrupt plan in database"))?,
            status: SubscriptionStatus::parse(&value.status)
                .ok_or_else(|| AppError::internal("corrupt subscription status in database"))?,
            is_admin: value.is_admin,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EntitlementUpdateRequest {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub is_admin: bool,
}
