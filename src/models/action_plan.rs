use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

/// Plans cover a fixed 30-day window from their start date.
pub const PLAN_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActionPlan {
    pub id: Uuid,
    pub company_id: Uuid,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<ActionPlanItem>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbActionPlan {
    pub id: String,
    pub company_id: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbActionPlan {
    pub fn into_plan(self, items: Vec<ActionPlanItem>) -> Result<ActionPlan, AppError> {
        Ok(ActionPlan {
            id: Uuid::parse_str(&self.id)
                .map_err(|_| AppError::internal("corrupt plan id in database"))?,
            company_id: Uuid::parse_str(&self.company_id)
                .map_err(|_| AppError::internal("corrupt company id in database"))?,
            starts_on: self.starts_on,
            ends_on: self.ends_on,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        })
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActionPlanItem {
    pub id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub due_on: NaiveDate,
    pub done: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbActionPlanItem {
    pub id: String,
    pub title: String,
    pub owner: Option<String>,
    pub due_on: NaiveDate,
    pub done: bool,
}

impl TryFrom<DbActionPlanItem> for ActionPlanItem {
    type Error = AppError;

    fn try_from(value: DbActionPlanItem) -> Result<Self, Self::Error> {
        Ok(ActionPlanItem {
            id: Uuid::parse_str(&value.id)
                .map_err(|_| AppError::internal("corrupt plan item id in database"))?,
            title: value.title,
            owner: value.owner,
            due_on: value.due_on,
            done: value.done,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ActionPlanItemInput {
    #[schema(example = "Revisar márgenes por producto")]
    pub title: String,
    pub owner: Option<String>,
    pub due_on: NaiveDate,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ActionPlanUpsertRequest {
    pub starts_on: NaiveDate,
    pub items: Vec<ActionPlanItemInput>,
}
