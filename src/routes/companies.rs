use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::audit::{self, AuditEvent};
use crate::auth::{
    block_consultor_on_mutation, ensure_company_access, require_any_of, CompanyScope, CurrentUser,
    Role,
};
use crate::errors::{AppError, AppResult};
use crate::models::company::{
    Company, CompanyCreateRequest, CompanyMember, DbCompany, DbCompanyMember, MembershipStatus,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_companies).post(create_company))
        .route("/:company_id", get(get_company))
        .route("/:company_id/members", get(list_members))
}

/// Portfolio listing for the consultant/admin side.
#[utoipa::path(
    get,
    path = "/companies",
    tag = "Companies",
    responses(
        (status = 200, description = "All companies", body = [Company]),
        (status = 403, description = "Requires consultor or admin")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_companies(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Company>>> {
    require_any_of(&user, &[Role::Consultor, Role::Admin])?;

    let companies = sqlx::query_as::<_, DbCompany>(
        "SELECT id, name, owner_user_id, created_at, updated_at FROM companies ORDER BY name",
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
    post,
    path = "/companies",
    tag = "Companies",
    request_body = CompanyCreateRequest,
    responses(
        (status = 201, description = "Company created", body = Company),
        (status = 403, description = "Consultor accounts cannot create companies")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_company(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CompanyCreateRequest>,
) -> AppResult<(StatusCode, Json<Company>)> {
    block_consultor_on_mutation(&user)?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let company_id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO companies (id, name, owner_user_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(company_id.to_string())
    .bind(name)
    .bind(&user.id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    sqlx::query(
        "INSERT INTO company_members (company_id, user_id, status, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(company_id.to_string())
    .bind(&user.id)
    .bind(MembershipStatus::Active.as_str())
    .bind(now)
    .execute(&state.pool)
    .await?;

    audit::record(
        &state.audit,
        AuditEvent::new(
            audit::EVENT_COMPANY_CREATED,
            Some(user.id.clone()),
            Some(company_id.to_string()),
            serde_json::json!({ "name": name }),
        ),
    );

    let company = fetch_company(&state.pool, company_id).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

#[utoipa::path(
    get,
    path = "/companies/{company_id}",
    tag = "Companies",
    params(("company_id" = Uuid, Path, description = "Company id")),
    responses(
        (status = 200, description = "Company detail", body = Company),
        (status = 400, description = "Malformed company id"),
        (status = 403, description = "No access to this company"),
        (status = 404, description = "Company not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_company(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    CompanyScope(company_id): CompanyScope,
) -> AppResult<Json<Company>> {
    ensure_company_access(&state.pool, &user, company_id).await?;

    let company = fetch_company(&state.pool, company_id).await?;
    Ok(Json(company))
}

#[utoipa::path(
    get,
    path = "/companies/{company_id}/members",
    tag = "Companies",
    params(("company_id" = Uuid, Path, description = "Company id")),
    responses(
        (status = 200, description = "Company members", body = [CompanyMember]),
        (status = 403, description = "No access to this company")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_members(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    CompanyScope(company_id): CompanyScope,
) -> AppResult<Json<Vec<CompanyMember>>> {
    ensure_company_access(&state.pool, &user, company_id).await?;

    let members = sqlx::query_as::<_, DbCompanyMember>(
        "SELECT company_id, user_id, status, created_at FROM company_members WHERE company_id = ? ORDER BY created_at",
    )
    .bind(company_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let members: Vec<CompanyMember> = members
        .into_iter()
        .map(CompanyMember::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(members))
}

pub(crate) async fn fetch_company(pool: &SqlitePool, company_id: Uuid) -> AppResult<Company> {
    let company = sqlx::query_as::<_, DbCompany>(
        "SELECT id, name, owner_user_id, created_at, updated_at FROM companies WHERE id = ?",
    )
    .bind(company_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("company not found"))?;

    company.try_into()
}
