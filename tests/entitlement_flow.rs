//! FULL-content entitlement gate through the HTTP surface: subscription
//! records, the allowlist, and the strict no-implicit-admin rule.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::tempdir;
use tower::util::ServiceExt;
use uuid::Uuid;

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
        .filename(dir.path().join("entitlement_flow.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;
    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;
    Ok(pool)
}

fn test_app(pool: SqlitePool, policy: EntitlementPolicy) -> Router {
    let mut tokens = HashMap::new();
    tokens.insert(
        "member-token".to_string(),
        claims("member-1", "member@empresa.com", None),
    );
    tokens.insert(
        "ops-token".to_string(),
        claims("ops-1", "ops@pulso.app", None),
    );
    tokens.insert(
        "admin-token".to_string(),
        claims("admin-1", "admin@pulso.app", Some("ADMIN")),
    );

    let auth = AuthState {
        verifier: Some(Arc::new(StaticVerifier(tokens))),
        role_lookup: Arc::new(NoopLookup),
    };
    let (bus, _rx) = audit::init_audit_bus();
    build_router(AppState::new(pool, auth, Arc::new(policy), bus))
}

async fn seed_company_with_member(pool: &SqlitePool, member: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO companies (id, name, owner_user_id, created_at, updated_at) VALUES (?, ?, NULL, ?, ?)",
    )
    .bind(id.to_string())
    .bind("Entitled SA")
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    sqlx::query(
        "INSERT INTO company_members (company_id, user_id, status, created_at) VALUES (?, ?, 'ACTIVE', ?)",
    )
    .bind(id.to_string())
    .bind(member)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(id)
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn request_json(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> Result<Value> {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
    serde_json::from_slice(&bytes).context("response body is not JSON")
}

async fn full_access(app: &Router, token: &str, company: Uuid) -> Result<bool> {
    let resp = app
        .clone()
        .oneshot(get(
            &format!("/entitlements/status?company_id={company}"),
            token,
        ))
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await?;
    Ok(body["full_access"].as_bool().unwrap())
}

#[tokio::test]
async fn subscription_record_drives_the_gate() -> Result<()> {
    let dir = tempdir().context("failed to create tempdir")?;
    let pool = test_pool(&dir).await?;
    let company = seed_company_with_member(&pool, "member-1").await?;
    let app = test_app(pool, EntitlementPolicy::new(false, Vec::new()));

    // no record: denied
    assert!(!full_access(&app, "member-token", company).await?);

    let resp = app
        .clone()
        .oneshot(request_json(
            "POST",
            &format!("/companies/{company}/assessments"),
            "member-token",
            json!({"variant": "FULL"}),
        ))
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = body_json(resp).await?;
    // entitlement denial carries the plan-required message as the error code
    let error = body["error"].as_str().unwrap_or_default();
    assert!(error.contains("FULL"), "error = {error:?}");

    // admin provisions a FULL/ACTIVE record
    let resp = app
        .clone()
        .oneshot(request_json(
            "PUT",
            &format!("/admin/companies/{company}/entitlement"),
            "admin-token",
            json!({"plan": "FULL", "status": "ACTIVE"}),
        ))
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    assert!(full_access(&app, "member-token", company).await?);

    let resp = app
        .clone()
        .oneshot(request_json(
            "POST",
            &format!("/companies/{company}/assessments"),
            "member-token",
            json!({"variant": "FULL"}),
        ))
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    // downgrade the record: gate closes again
    let resp = app
        .clone()
        .oneshot(request_json(
            "PUT",
            &format!("/admin/companies/{company}/entitlement"),
            "admin-token",
            json!({"plan": "FULL", "status": "CANCELED"}),
        ))
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    assert!(!full_access(&app, "member-token", company).await?);
    Ok(())
}

#[tokio::test]
async fn allowlisted_email_passes_without_a_record() -> Result<()> {
    let dir = tempdir()?;
    let pool = test_pool(&dir).await?;
    let company = seed_company_with_member(&pool, "ops-1").await?;
    let app = test_app(
        pool,
        EntitlementPolicy::new(false, vec!["ops@pulso.app".to_string()]),
    );

    assert!(full_access(&app, "ops-token", company).await?);
    Ok(())
}

#[tokio::test]
async fn bypass_mode_opens_the_gate_for_everyone() -> Result<()> {
    let dir = tempdir()?;
    let pool = test_pool(&dir).await?;
    let company = seed_company_with_member(&pool, "member-1").await?;
    let app = test_app(pool, EntitlementPolicy::new(true, Vec::new()));

    assert!(full_access(&app, "member-token", company).await?);
    Ok(())
}

#[tokio::test]
async fn admin_is_not_implicitly_entitled() -> Result<()> {
    let dir = tempdir()?;
    let pool = test_pool(&dir).await?;
    let company = seed_company_with_member(&pool, "member-1").await?;
    let app = test_app(pool, EntitlementPolicy::new(false, Vec::new()));

    // admin passes company access but the gate still denies FULL content
    assert!(!full_access(&app, "admin-token", company).await?);

    let resp = app
        .clone()
        .oneshot(request_json(
            "POST",
            &format!("/companies/{company}/assessments"),
            "admin-token",
            json!({"variant": "FULL"}),
        ))
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn entitlement_writes_are_audited() -> Result<()> {
    let dir = tempdir()?;
    let pool = test_pool(&dir).await?;
    let company = seed_company_with_member(&pool, "member-1").await?;

    // wire a real listener so the write lands in audit_log
    let mut tokens = HashMap::new();
    tokens.insert(
        "admin-token".to_string(),
        claims("admin-1", "admin@pulso.app", Some("ADMIN")),
    );
    let auth = AuthState {
        verifier: Some(Arc::new(StaticVerifier(tokens))),
        role_lookup: Arc::new(NoopLookup),
    };
    let (bus, rx) = audit::init_audit_bus();
    let listener = tokio::spawn(audit::start_audit_listener(rx, pool.clone()));
    let app = build_router(AppState::new(
        pool.clone(),
        auth,
        Arc::new(EntitlementPolicy::new(false, Vec::new())),
        bus,
    ));

    let resp = app
        .oneshot(request_json(
            "PUT",
            &format!("/admin/companies/{company}/entitlement"),
            "admin-token",
            json!({"plan": "FULL", "status": "ACTIVE", "is_admin": true}),
        ))
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    // the listener persists asynchronously
    let mut logged = 0i64;
    for _ in 0..50 {
        logged = sqlx::query_scalar(
            "SELECT COUNT(1) FROM audit_log WHERE event_name = 'entitlement.updated'",
        )
        .fetch_one(&pool)
        .await?;
        if logged > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(logged, 1);

    listener.abort();
    Ok(())
}
