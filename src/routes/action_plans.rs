use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::{block_consultor_on_mutation, ensure_company_access, CompanyScope, CurrentUser};
use crate::errors::{AppError, AppResult};
use crate::models::action_plan::{
    ActionPlan, ActionPlanItem, ActionPlanUpsertRequest, DbActionPlan, DbActionPlanItem,
    PLAN_WINDOW_DAYS,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_plan).put(upsert_plan))
        .route("/items/:item_id/toggle", post(toggle_item))
}

#[utoipa::path(
    get,
    path = "/companies/{company_id}/action-plan",
    tag = "ActionPlan",
    params(("company_id" = Uuid, Path, description = "Company id")),
    responses(
        (status = 200, description = "Current 30-day plan", body = ActionPlan),
        (status = 403, description = "No access to this company"),
        (status = 404, description = "No plan yet")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    CompanyScope(company_id): CompanyScope,
) -> AppResult<Json<ActionPlan>> {
    ensure_company_access(&state.pool, &user, company_id).await?;

    let plan = fetch_plan(&state.pool, company_id).await?;
    Ok(Json(plan))
}

/// Replace the company's plan. The window is fixed at 30 days from the start
/// date; items must fall inside it.
#[utoipa::path(
    put,
    path = "/companies/{company_id}/action-plan",
    tag = "ActionPlan",
    params(("company_id" = Uuid, Path, description = "Company id")),
    request_body = ActionPlanUpsertRequest,
    responses(
        (status = 200, description = "Plan replaced", body = ActionPlan),
        (status = 400, description = "Item outside the 30-day window"),
        (status = 403, description = "Consultor blocked or no access")
    ),
    security(("bearerAuth" = []))
)]
pub async fn upsert_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    CompanyScope(company_id): CompanyScope,
    Json(payload): Json<ActionPlanUpsertRequest>,
) -> AppResult<Json<ActionPlan>> {
    block_consultor_on_mutation(&user)?;
    ensure_company_access(&state.pool, &user, company_id).await?;

    let ends_on = payload.starts_on + Duration::days(PLAN_WINDOW_DAYS);

    for item in &payload.items {
        if item.title.trim().is_empty() {
            return Err(AppError::bad_request("item title must not be empty"));
        }
        if item.due_on < payload.starts_on || item.due_on > ends_on {
            return Err(AppError::bad_request(format!(
                "item due date {} is outside the plan window",
                item.due_on
            )));
        }
    }

    let now = Utc::now();
    let plan_id = Uuid::new_v4();

    // Replace semantics: one plan per company.
    let existing: Option<String> =
        sqlx::query_scalar("SELECT id FROM action_plans WHERE company_id = ?")
            .bind(company_id.to_string())
            .fetch_optional(&state.pool)
            .await?;

    if let Some(old_id) = existing {
        sqlx::query("DELETE FROM action_plan_items WHERE plan_id = ?")
            .bind(&old_id)
            .execute(&state.pool)
            .await?;
        sqlx::query("DELETE FROM action_plans WHERE id = ?")
            .bind(&old_id)
            .execute(&state.pool)
            .await?;
    }

    sqlx::query(
        "INSERT INTO action_plans (id, company_id, starts_on, ends_on, created_by, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(plan_id.to_string())
    .bind(company_id.to_string())
    .bind(payload.starts_on)
    .bind(ends_on)
    .bind(&user.id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    for item in &payload.items {
        sqlx::query(
            "INSERT INTO action_plan_items (id, plan_id, title, owner, due_on, done, created_at) \
             VALUES (?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(plan_id.to_string())
        .bind(item.title.trim())
        .bind(&item.owner)
        .bind(item.due_on)
        .bind(now)
        .execute(&state.pool)
        .await?;
    }

    let plan = fetch_plan(&state.pool, company_id).await?;
    Ok(Json(plan))
}

#[utoipa::path(
    post,
    path = "/companies/{company_id}/action-plan/items/{item_id}/toggle",
    tag = "ActionPlan",
    params(
        ("company_id" = Uuid, Path, description = "Company id"),
        ("item_id" = Uuid, Path, description = "Plan item id")
    ),
    responses(
        (status = 200, description = "Item toggled", body = ActionPlan),
        (status = 403, description = "Consultor blocked or no access"),
        (status = 404, description = "Item not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn toggle_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    CompanyScope(company_id): CompanyScope,
    Path(params): Path<HashMap<String, String>>,
) -> AppResult<Json<ActionPlan>> {
    block_consultor_on_mutation(&user)?;
    ensure_company_access(&state.pool, &user, company_id).await?;
    let item_id = super::path_uuid(&params, "item_id")?;

    let affected = sqlx::query(
        "UPDATE action_plan_items SET done = NOT done WHERE id = ? AND plan_id IN \
         (SELECT id FROM action_plans WHERE company_id = ?)",
    )
    .bind(item_id.to_string())
    .bind(company_id.to_string())
    .execute(&state.pool)
    .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("plan item not found"));
    }

    let plan = fetch_plan(&state.pool, company_id).await?;
    Ok(Json(plan))
}

async fn fetch_plan(pool: &SqlitePool, company_id: Uuid) -> AppResult<ActionPlan> {
    let plan = sqlx::query_as::<_, DbActionPlan>(
        "SELECT id, company_id, starts_on, ends_on, created_by, created_at, updated_at \
         FROM action_plans WHERE company_id = ?",
    )
    .bind(company_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("no action plan for this company"))?;

    let items = sqlx::query_as::<_, DbActionPlanItem>(
        "SELECT id, title, owner, due_on, done FROM action_plan_items WHERE plan_id = ? ORDER BY due_on, created_at",
    )
    .bind(&plan.id)
    .fetch_all(pool)
    .await?;

    let items: Vec<ActionPlanItem> = items
        .into_iter()
        .map(ActionPlanItem::try_from)
        .collect::<Result<_, _>>()?;

    plan.into_plan(items)
}
