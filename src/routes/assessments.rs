use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::audit::{self, AuditEvent};
use crate::auth::{
    block_consultor_on_mutation, ensure_company_access, CompanyScope, CurrentUser, Identity,
};
use crate::errors::{AppError, AppResult};
use crate::models::assessment::{
    Assessment, AssessmentCreateRequest, AssessmentStatus, AssessmentVariant, DbAssessment,
    DbRecommendation, Recommendation, SubmitAnswersRequest, MAX_ANSWER_VALUE,
};

use super::path_uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_assessments).post(create_assessment))
        .route("/:assessment_id", get(get_assessment))
        .route("/:assessment_id/submit", post(submit_assessment))
        .route("/:assessment_id/recommendations", get(list_recommendations))
}

#[utoipa::path(
    get,
    path = "/companies/{company_id}/assessments",
    tag = "Assessments",
    params(("company_id" = Uuid, Path, description = "Company id")),
    responses(
        (status = 200, description = "Assessments for the company", body = [Assessment]),
        (status = 403, description = "No access to this company")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_assessments(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    CompanyScope(company_id): CompanyScope,
) -> AppResult<Json<Vec<Assessment>>> {
    ensure_company_access(&state.pool, &user, company_id).await?;

    let assessments = sqlx::query_as::<_, DbAssessment>(
        "SELECT id, company_id, variant, status, score, created_by, created_at, submitted_at \
         FROM assessments WHERE company_id = ? ORDER BY created_at DESC",
    )
    .bind(company_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let assessments: Vec<Assessment> = assessments
        .into_iter()
        .map(Assessment::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(assessments))
}

#[utoipa::path(
    post,
    path = "/companies/{company_id}/assessments",
    tag = "Assessments",
    params(("company_id" = Uuid, Path, description = "Company id")),
    request_body = AssessmentCreateRequest,
    responses(
        (status = 201, description = "Assessment started", body = Assessment),
        (status = 403, description = "Consultor blocked, no access, or FULL plan required")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_assessment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    CompanyScope(company_id): CompanyScope,
    Json(payload): Json<AssessmentCreateRequest>,
) -> AppResult<(StatusCode, Json<Assessment>)> {
    block_consultor_on_mutation(&user)?;
    ensure_company_access(&state.pool, &user, company_id).await?;

    // Starting a FULL assessment is itself FULL content.
    if payload.variant == AssessmentVariant::Full {
        require_full_access(&state, &user, company_id).await?;
    }

    let assessment_id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO assessments (id, company_id, variant, status, score, created_by, created_at, submitted_at) \
         VALUES (?, ?, ?, ?, NULL, ?, ?, NULL)",
    )
    .bind(assessment_id.to_string())
    .bind(company_id.to_string())
    .bind(payload.variant.as_str())
    .bind(AssessmentStatus::Open.as_str())
    .bind(&user.id)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let assessment = fetch_assessment(&state.pool, company_id, assessment_id).await?;
    Ok((StatusCode::CREATED, Json(assessment)))
}

#[utoipa::path(
    get,
    path = "/companies/{company_id}/assessments/{assessment_id}",
    tag = "Assessments",
    params(
        ("company_id" = Uuid, Path, description = "Company id"),
        ("assessment_id" = Uuid, Path, description = "Assessment id")
    ),
    responses(
        (status = 200, description = "Assessment detail", body = Assessment),
        (status = 403, description = "No access, or FULL plan required"),
        (status = 404, description = "Assessment not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_assessment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    CompanyScope(company_id): CompanyScope,
    Path(params): Path<HashMap<String, String>>,
) -> AppResult<Json<Assessment>> {
    ensure_company_access(&state.pool, &user, company_id).await?;
    let assessment_id = path_uuid(&params, "assessment_id")?;

    let assessment = fetch_assessment(&state.pool, company_id, assessment_id).await?;

    if assessment.variant == AssessmentVariant::Full {
        require_full_access(&state, &user, company_id).await?;
    }

    Ok(Json(assessment))
}

#[utoipa::path(
    post,
    path = "/companies/{company_id}/assessments/{assessment_id}/submit",
    tag = "Assessments",
    params(
        ("company_id" = Uuid, Path, description = "Company id"),
        ("assessment_id" = Uuid, Path, description = "Assessment id")
    ),
    request_body = SubmitAnswersRequest,
    responses(
        (status = 200, description = "Assessment scored", body = Assessment),
        (status = 403, description = "Consultor blocked or no access"),
        (status = 409, description = "Already submitted")
    ),
    security(("bearerAuth" = []))
)]
pub async fn submit_assessment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    CompanyScope(company_id): CompanyScope,
    Path(params): Path<HashMap<String, String>>,
    Json(payload): Json<SubmitAnswersRequest>,
) -> AppResult<Json<Assessment>> {
    block_consultor_on_mutation(&user)?;
    ensure_company_access(&state.pool, &user, company_id).await?;
    let assessment_id = path_uuid(&params, "assessment_id")?;

    let assessment = fetch_assessment(&state.pool, company_id, assessment_id).await?;
    if assessment.status == AssessmentStatus::Submitted {
        return Err(AppError::conflict("assessment already submitted"));
    }

    if payload.answers.is_empty() {
        return Err(AppError::bad_request("answers must not be empty"));
    }
    for answer in &payload.answers {
        if answer.question_key.trim().is_empty() {
            return Err(AppError::bad_request("question_key must not be empty"));
        }
        if !(0..=MAX_ANSWER_VALUE).contains(&answer.value) {
            return Err(AppError::bad_request(format!(
                "answer values must be between 0 and {MAX_ANSWER_VALUE}"
            )));
        }
    }

    let now = Utc::now();

    for answer in &payload.answers {
        sqlx::query(
            "INSERT OR REPLACE INTO assessment_answers (id, assessment_id, question_key, value, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(assessment_id.to_string())
        .bind(answer.question_key.trim())
        .bind(answer.value)
        .bind(now)
        .execute(&state.pool)
        .await?;
    }

    // Aggregate score over the 0..=4 scale, as a 0..=100 percentage. The
    // detailed per-area scoring model lives outside this service.
    let total: i64 = payload.answers.iter().map(|answer| answer.value).sum();
    let score =
        (total as f64 / (payload.answers.len() as i64 * MAX_ANSWER_VALUE) as f64) * 100.0;

    // Weak answers become recommendations, most urgent first.
    for answer in &payload.answers {
        if answer.value > 1 {
            continue;
        }
        let key = answer.question_key.trim();
        let area = key.split('.').next().unwrap_or(key);
        sqlx::query(
            "INSERT INTO recommendations (id, assessment_id, area, title, detail, priority, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(assessment_id.to_string())
        .bind(area)
        .bind(format!("Refuerza {key}"))
        .bind(format!(
            "La respuesta a {key} quedó en {} de {MAX_ANSWER_VALUE}; prioriza acciones en esta área.",
            answer.value
        ))
        .bind(answer.value)
        .bind(now)
        .execute(&state.pool)
        .await?;
    }

    sqlx::query("UPDATE assessments SET status = ?, score = ?, submitted_at = ? WHERE id = ?")
        .bind(AssessmentStatus::Submitted.as_str())
        .bind(score)
        .bind(now)
        .bind(assessment_id.to_string())
        .execute(&state.pool)
        .await?;

    audit::record(
        &state.audit,
        AuditEvent::new(
            audit::EVENT_ASSESSMENT_SUBMITTED,
            Some(user.id.clone()),
            Some(assessment_id.to_string()),
            serde_json::json!({
                "company_id": company_id,
                "answers": payload.answers.len(),
                "score": score,
            }),
        ),
    );

    let assessment = fetch_assessment(&state.pool, company_id, assessment_id).await?;
    Ok(Json(assessment))
}

#[utoipa::path(
    get,
    path = "/companies/{company_id}/assessments/{assessment_id}/recommendations",
    tag = "Assessments",
    params(
        ("company_id" = Uuid, Path, description = "Company id"),
        ("assessment_id" = Uuid, Path, description = "Assessment id")
    ),
    responses(
        (status = 200, description = "Scored recommendations", body = [Recommendation]),
        (status = 403, description = "No access, or FULL plan required"),
        (status = 404, description = "Assessment not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_recommendations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    CompanyScope(company_id): CompanyScope,
    Path(params): Path<HashMap<String, String>>,
) -> AppResult<Json<Vec<Recommendation>>> {
    ensure_company_access(&state.pool, &user, company_id).await?;
    let assessment_id = path_uuid(&params, "assessment_id")?;

    let assessment = fetch_assessment(&state.pool, company_id, assessment_id).await?;
    if assessment.variant == AssessmentVariant::Full {
        require_full_access(&state, &user, company_id).await?;
    }

    let recommendations = sqlx::query_as::<_, DbRecommendation>(
        "SELECT id, assessment_id, area, title, detail, priority, created_at \
         FROM recommendations WHERE assessment_id = ? ORDER BY priority ASC, created_at ASC",
    )
    .bind(assessment_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let recommendations: Vec<Recommendation> = recommendations
        .into_iter()
        .map(Recommendation::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(recommendations))
}

async fn require_full_access(
    state: &AppState,
    user: &Identity,
    company_id: Uuid,
) -> AppResult<()> {
    if state
        .entitlements
        .can_access_full(&state.pool, user, company_id)
        .await
    {
        Ok(())
    } else {
        Err(AppError::PlanRequired)
    }
}

async fn fetch_assessment(
    pool: &SqlitePool,
    company_id: Uuid,
    assessment_id: Uuid,
) -> AppResult<Assessment> {
    let assessment = sqlx::query_as::<_, DbAssessment>(
        "SELECT id, company_id, variant, status, score, created_by, created_at, submitted_at \
         FROM assessments WHERE id = ? AND company_id = ?",
    )
    .bind(assessment_id.to_string())
    .bind(company_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("assessment not found"))?;

    assessment.try_into()
}
