//! Wire-level contract of the guards: status codes and JSON error shapes.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::tempdir;
use tower::util::ServiceExt;

use pulso::app::{build_router, AppState};
use pulso::audit;
use pulso::auth::{AuthState, Claims, EntitlementPolicy, NoopLookup, RoleMetadata, TokenVerifier};

struct StaticVerifier(HashMap<String, Claims>);

#[async_trait::async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        self.0
            .get(token)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown test token"))
    }
}

fn claims(sub: &str, email: &str, role: Option<&str>) -> Claims {
    Claims {
        sub: Some(sub.to_string()),
        email: Some(email.to_string()),
        app_metadata: role.map(|r| RoleMetadata {
            role: Some(r.to_string()),
        }),
        user_metadata: None,
    }
}

async fn test_pool(dir: &tempfile::TempDir) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("guards.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;
    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;
    Ok(pool)
}

fn test_app(pool: SqlitePool) -> Router {
    let mut tokens = HashMap::new();
    tokens.insert("user-token".to_string(), claims("user-1", "user@example.com", None));
    tokens.insert(
        "consultor-token".to_string(),
        claims("consultor-1", "consultor@example.com", Some("CONSULTOR")),
    );
    tokens.insert(
        "admin-token".to_string(),
        claims("admin-1", "admin@example.com", Some("ADMIN")),
    );

    let auth = AuthState {
        verifier: Some(Arc::new(StaticVerifier(tokens))),
        role_lookup: Arc::new(NoopLookup),
    };
    let (bus, _rx) = audit::init_audit_bus();
    build_router(AppState::new(
        pool,
        auth,
        Arc::new(EntitlementPolicy::new(false, Vec::new())),
        bus,
    ))
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(resp: axum::response::Response) -> Result<Value> {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
    serde_json::from_slice(&bytes).context("response body is not JSON")
}

#[tokio::test]
async fn missing_token_yields_401_unauthenticated() -> Result<()> {
    let dir = tempdir()?;
    let app = test_app(test_pool(&dir).await?);

    for req in [
        get("/auth/me", None),
        get("/companies", None),
        get("/entitlements/status?company_id=123e4567-e89b-42d3-a456-426614174000", None),
    ] {
        let resp = app.clone().oneshot(req).await?;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(resp).await?;
        assert_eq!(body["error"], "UNAUTHENTICATED");
    }
    Ok(())
}

#[tokio::test]
async fn malformed_and_invalid_tokens_yield_401() -> Result<()> {
    let dir = tempdir()?;
    let app = test_app(test_pool(&dir).await?);

    for auth_header in ["Basic dXNlcjpwYXNz", "Bearer ", "Bearer forged-token"] {
        let req = Request::builder()
            .method("GET")
            .uri("/auth/me")
            .header("authorization", auth_header)
            .body(Body::empty())?;
        let resp = app.clone().oneshot(req).await?;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "header = {auth_header:?}");
        let body = body_json(resp).await?;
        assert_eq!(body["error"], "UNAUTHENTICATED");
    }
    Ok(())
}

#[tokio::test]
async fn session_probe_never_rejects() -> Result<()> {
    let dir = tempdir()?;
    let app = test_app(test_pool(&dir).await?);

    let resp = app.clone().oneshot(get("/auth/session", None)).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await?;
    assert_eq!(body["authenticated"], false);

    let resp = app
        .clone()
        .oneshot(get("/auth/session", Some("consultor-token")))
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await?;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["identity"]["role"], "CONSULTOR");

    Ok(())
}

#[tokio::test]
async fn user_role_gets_403_on_consultor_or_admin_route() -> Result<()> {
    let dir = tempdir()?;
    let app = test_app(test_pool(&dir).await?);

    let resp = app.oneshot(get("/companies", Some("user-token"))).await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = body_json(resp).await?;
    assert_eq!(body["error"], "FORBIDDEN");
    Ok(())
}

#[tokio::test]
async fn consultor_and_admin_get_403_on_admin_only_route() -> Result<()> {
    let dir = tempdir()?;
    let app = test_app(test_pool(&dir).await?);

    let resp = app
        .clone()
        .oneshot(get("/admin/companies", Some("consultor-token")))
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .clone()
        .oneshot(get("/admin/companies", Some("admin-token")))
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn consultor_mutation_is_blocked_with_distinct_code() -> Result<()> {
    let dir = tempdir()?;
    let app = test_app(test_pool(&dir).await?);

    let resp = app
        .oneshot(post_json(
            "/companies",
            Some("consultor-token"),
            json!({"name": "Nueva Empresa"}),
        ))
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = body_json(resp).await?;
    assert_eq!(body["error"], "CONSULTOR_NOT_ALLOWED");
    let message = body["message_user"].as_str().unwrap_or_default();
    assert!(!message.is_empty(), "message_user must be user-facing text");
    Ok(())
}

#[tokio::test]
async fn malformed_company_id_yields_400_for_all_roles() -> Result<()> {
    let dir = tempdir()?;
    let app = test_app(test_pool(&dir).await?);

    for token in ["user-token", "consultor-token", "admin-token"] {
        let resp = app
            .clone()
            .oneshot(get("/companies/not-a-uuid", Some(token)))
            .await?;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "token = {token}");
        let body = body_json(resp).await?;
        assert_eq!(body["error"], "BAD_REQUEST");
    }
    Ok(())
}

#[tokio::test]
async fn missing_company_id_in_query_yields_400() -> Result<()> {
    let dir = tempdir()?;
    let app = test_app(test_pool(&dir).await?);

    let resp = app
        .oneshot(get("/entitlements/status", Some("user-token")))
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await?;
    assert_eq!(body["error"], "BAD_REQUEST");
    Ok(())
}
