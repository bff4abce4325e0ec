//! Admin surface: portfolio view, subscription record management, audit log.
//! Everything here is admin-only; entitlement records written here are what
//! the FULL-content gate reads.

use axum::extract::State;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use uuid::Uuid;

use crate::app::AppState;
use crate::audit::{self, AuditEntry, AuditEvent};
use crate::auth::{ensure_company_access, require_any_of, CompanyScope, CurrentUser, Role};
use crate::errors::{AppError, AppResult};
use crate::models::company::{Company, DbCompany};
use crate::models::entitlement::{
    CompanyEntitlement, DbCompanyEntitlement, EntitlementUpdateRequest,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/companies", get(list_all_companies))
        .route(
            "/companies/:company_id/entitlement",
            put(upsert_entitlement).get(get_entitlement),
        )
        .route("/audit-log", get(list_audit_log))
}

#[utoipa::path(
    get,
    path = "/admin/companies",
    tag = "Admin",
    responses(
        (status = 200, description = "All companies", body = [Company]),
        (status = 403, description = "Admin only")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_all_companies(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Company>>> {
    require_any_of(&user, &[Role::Admin])?;

    let companies = sqlx::query_as::<_, DbCompany>(
        "SELECT id, name, owner_user_id, created_at, updated_at FROM companies ORDER BY created_at DESC",
    )
    .fetch_all(&state.pool)
    .await?;

    let companies: Vec<Company> = companies
        .into_iter()
        .map(Company::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(companies))
}

#[utoipa::path(
    get,
    path = "/admin/companies/{company_id}/entitlement",
    tag = "Admin",
    params(("company_id" = Uuid, Path, description = "Company id")),
    responses(
        (status = 200, description = "Subscription record", body = CompanyEntitlement),
        (status = 403, description = "Admin only"),
        (status = 404, description = "No record for this company")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_entitlement(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    CompanyScope(company_id): CompanyScope,
) -> AppResult<Json<CompanyEntitlement>> {
    require_any_of(&user, &[Role::Admin])?;

    let record = sqlx::query_as::<_, DbCompanyEntitlement>(
        "SELECT company_id, plan, status, is_admin, updated_at FROM company_entitlements WHERE company_id = ?",
    )
    .bind(company_id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("no entitlement record for this company"))?;

    Ok(Json(record.try_into()?))
}

#[utoipa::path(
    put,
    path = "/admin/companies/{company_id}/entitlement",
    tag = "Admin",
    params(("company_id" = Uuid, Path, description = "Company id")),
    request_body = EntitlementUpdateRequest,
    responses(
        (status = 200, description = "Record upserted", body = CompanyEntitlement),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Company not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn upsert_entitlement(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    CompanyScope(company_id): CompanyScope,
    Json(payload): Json<EntitlementUpdateRequest>,
) -> AppResult<Json<CompanyEntitlement>> {
    require_any_of(&user, &[Role::Admin])?;
    // Admin passes unconditionally; the call still validates company existence.
    ensure_company_access(&state.pool, &user, company_id).await?;
    super::companies::fetch_company(&state.pool, company_id).await?;

    let now = Utc::now();
    sqlx::query(
        "INSERT INTO company_entitlements (company_id, plan, status, is_admin, updated_at) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(company_id) DO UPDATE SET plan = excluded.plan, status = excluded.status, \
         is_admin = excluded.is_admin, updated_at = excluded.updated_at",
    )
    .bind(company_id.to_string())
    .bind(payload.plan.as_str())
    .bind(payload.status.as_str())
    .bind(payload.is_admin)
    .bind(now)
    .execute(&state.pool)
    .await?;

    audit::record(
        &state.audit,
        AuditEvent::new(
            audit::EVENT_ENTITLEMENT_UPDATED,
            Some(user.id.clone()),
            Some(company_id.to_string()),
            serde_json::json!({
                "plan": payload.plan,
                "status": payload.status,
                "is_admin": payload.is_admin,
            }),
        ),
    );

    let record = sqlx::query_as::<_, DbCompanyEntitlement>(
        "SELECT company_id, plan, status, is_admin, updated_at FROM company_entitlements WHERE company_id = ?",
    )
    .bind(company_id.to_string())
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(record.try_into()?))
}

#[utoipa::path(
    get,
    path = "/admin/audit-log",
    tag = "Admin",
    responses(
        (status = 200, description = "Recent audit entries", body = [AuditEntry]),
        (status = 403, description = "Admin only")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_audit_log(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<AuditEntry>>> {
    require_any_of(&user, &[Role::Admin])?;

    let entries = sqlx::query_as::<_, AuditEntry>(
        "SELECT id, event_name, actor_id, subject_id, occurred_at, payload, prev_hash, hash \
         FROM audit_log ORDER BY occurred_at DESC, rowid DESC LIMIT 100",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(entries))
}
