use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::auth::{CurrentUser, Identity, OptionalUser};
use crate::errors::AppResult;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/session", get(session))
        .route("/me", get(me))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
}

/// Optional-auth probe: a missing or invalid credential is not an error here.
#[utoipa::path(
    get,
    path = "/auth/session",
    tag = "Auth",
    responses((status = 200, description = "Session state", body = SessionResponse))
)]
pub async fn session(OptionalUser(identity): OptionalUser) -> Json<SessionResponse> {
    Json(SessionResponse {
        authenticated: identity.is_some(),
        identity,
    })
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Resolved identity", body = Identity),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearerAuth" = []))
)]
pub async fn me(CurrentUser(identity): CurrentUser) -> AppResult<Json<Identity>> {
    Ok(Json(identity))
}
