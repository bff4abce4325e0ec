use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::{CompanyScope, CurrentUser};
use crate::errors::AppResult;

pub fn routes() -> Router<AppState> {
    Router::new().route("/status", get(status))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EntitlementStatusResponse {
    pub company_id: Uuid,
    pub full_access: bool,
}

/// FULL-content probe for a company, taken from the query string. The gate
/// itself is the authorization decision here; no role requirement beyond
/// authentication.
#[utoipa::path(
    get,
    path = "/entitlements/status",
    tag = "Entitlements",
    params(("company_id" = Uuid, Query, description = "Company id")),
    responses(
        (status = 200, description = "Whether FULL content is accessible", body = EntitlementStatusResponse),
        (status = 400, description = "Missing or malformed company id")
    ),
    security(("bearerAuth" = []))
)]
pub async fn status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    CompanyScope(company_id): CompanyScope,
) -> AppResult<Json<EntitlementStatusResponse>> {
    let full_access = state
        .entitlements
        .can_access_full(&state.pool, &user, company_id)
        .await;

    Ok(Json(EntitlementStatusResponse {
        company_id,
        full_access,
    }))
}
