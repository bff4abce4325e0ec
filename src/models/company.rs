use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    /// Legacy ownership relation, set for companies created before the
    /// membership table existed and still honored by the access check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbCompany {
    pub id: String,
    pub name: String,
    pub owner_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbCompany> for Company {
    type Error = AppError;

    fn try_from(value: DbCompany) -> Result<Self, Self::Error> {
        Ok(Company {
            id: Uuid::parse_str(&value.id)
                .map_err(|_| AppError::internal("corrupt company id in database"))?,
            name: value.name,
            owner_user_id: value.owner_user_id,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CompanyCreateRequest {
    #[schema(example = "Panadería La Espiga")]
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipStatus {
    Active,
    Invited,
    Removed,
}

impl MembershipStatus {
    pub fn parse(raw: &str) -> Option<MembershipStatus> {
        match raw {
            "ACTIVE" => Some(MembershipStatus::Active),
            "INVITED" => Some(MembershipStatus::Invited),
            "REMOVED" => Some(MembershipStatus::Removed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MembershipStatus::Active => "ACTIVE",
            MembershipStatus::Invited => "INVITED",
            MembershipStatus::Removed => "REMOVED",
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CompanyMember {
    pub company_id: Uuid,
    pub user_id: String,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbCompanyMember {
    pub company_id: String,
    pub user_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbCompanyMember> for CompanyMember {
    type Error = AppError;

    fn try_from(value: DbCompanyMember) -> Result<Self, Self::Error> {
        Ok(CompanyMember {
            company_id: Uuid::parse_str(&value.company_id)
                .map_err(|_| AppError::internal("corrupt company id in database"))?,
            user_id: value.user_id,
            status: MembershipStatus::parse(&value.status)
                .ok_or_else(|| AppError::internal("corrupt membership status in database"))?,
            created_at: value.created_at,
        })
    }
}
