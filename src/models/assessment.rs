use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

/// Answers are scored on a 0..=4 scale per question.
pub const MAX_ANSWER_VALUE: i64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssessmentVariant {
    Light,
    Full,
}

impl AssessmentVariant {
    pub fn parse(raw: &str) -> Option<AssessmentVariant> {
        match raw {
            "LIGHT" => Some(AssessmentVariant::Light),
            "FULL" => Some(AssessmentVariant::Full),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssessmentVariant::Light => "LIGHT",
            AssessmentVariant::Full => "FULL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssessmentStatus {
    Open,
    Submitted,
}

impl AssessmentStatus {
    pub fn parse(raw: &str) -> Option<AssessmentStatus> {
        match raw {
            "OPEN" => Some(AssessmentStatus::Open),
            "SUBMITTED" => Some(AssessmentStatus::Submitted),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssessmentStatus::Open => "OPEN",
            AssessmentStatus::Submitted => "SUBMITTED",
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Assessment {
    pub id: Uuid,
    pub company_id: Uuid,
    pub variant: AssessmentVariant,
    pub status: AssessmentStatus,
    /// Aggregate score in 0..=100, present once submitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbAssessment {
    pub id: String,
    pub company_id: String,
    pub variant: String,
    pub status: String,
    pub score: Option<f64>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbAssessment> for Assessment {
    type Error = AppError;

    fn try_from(value: DbAssessment) -> Result<Self, Self::Error> {
        Ok(Assessment {
            id: Uuid::parse_str(&value.id)
                .map_err(|_| AppError::internal("corrupt assessment id in database"))?,
            company_id: Uuid::parse_str(&value.company_id)
                .map_err(|_| AppError::internal("corrupt company id in database"))?,
            variant: AssessmentVariant::parse(&value.variant)
                .ok_or_else(|| AppError::internal("corrupt assessment variant in database"))?,
            status: AssessmentStatus::parse(&value.status)
                .ok_or_else(|| AppError::internal("corrupt assessment status in database"))?,
            score: value.score,
            created_by: value.created_by,
            created_at: value.created_at,
            submitted_at: value.submitted_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssessmentCreateRequest {
    pub variant: AssessmentVariant,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnswerInput {
    #[schema(example = "finanzas.margen")]
    pub question_key: String,
    /// 0 (critical) .. 4 (strong)
    pub value: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitAnswersRequest {
    pub answers: Vec<AnswerInput>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Recommendation {
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub area: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Lower is more urgent; mirrors the answer value that produced it.
    pub priority: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbRecommendation {
    pub id: String,
    pub assessment_id: String,
    pub area: String,
    pub title: String,
    pub detail: Option<String>,
    pub priority: i64,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbRecommendation> for Recommendation {
    type Error = AppError;

    fn try_from(value: DbRecommendation) -> Result<Self, Self::Error> {
        Ok(Recommendation {
            id: Uuid::parse_str(&value.id)
                .map_err(|_| AppError::internal("corrupt recommendation id in database"))?,
            assessment_id: Uuid::parse_str(&value.assessment_id)
                .map_err(|_| AppError::internal("corrupt assessment id in database"))?,
            area: value.area,
            title: value.title,
            detail: value.detail,
            priority: value.priority,
            created_at: value.created_at,
        })
    }
}
