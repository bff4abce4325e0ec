use std::sync::Arc;

use axum::http::Method;
use axum::routing::get;
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::audit::{self, AuditBus};
use crate::auth::{AuthState, EntitlementPolicy};
use crate::errors::AppError;
use crate::routes::{action_plans, admin, assessments, companies, entitlements, health, session};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub auth: AuthState,
    pub entitlements: Arc<EntitlementPolicy>,
    pub audit: AuditBus,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        auth: AuthState,
        entitlements: Arc<EntitlementPolicy>,
        audit: AuditBus,
    ) -> Self {
        Self {
            pool,
            auth,
            entitlements,
            audit,
        }
    }
}

/// Build the application from env configuration. Fails fast on invalid
/// configuration -- in particular when the entitlement bypass is enabled in
/// production.
pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let auth = AuthState::from_env()?;
    let entitlements = EntitlementPolicy::from_env()?;

    let (audit_bus, audit_rx) = audit::init_audit_bus();
    tokio::spawn(audit::start_audit_listener(audit_rx, pool.clone()));

    let state = AppState::new(pool, auth, Arc::new(entitlements), audit_bus);
    Ok(build_router(state))
}

/// Assemble the router from an explicit state. Tests use this to inject fake
/// verifiers and lookups.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .nest("/auth", session::routes())
        .nest("/companies", companies::routes())
        .nest("/companies/:company_id/assessments", assessments::routes())
        .nest("/companies/:company_id/action-plan", action_plans::routes())
        .nest("/entitlements", entitlements::routes())
        .nest("/admin", admin::routes())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
