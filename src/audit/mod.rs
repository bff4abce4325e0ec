//! Security audit trail.
//!
//! Handlers emit typed events onto a broadcast bus; a background listener
//! persists them to `audit_log` with a SHA-256 hash chain so tampering with a
//! stored row breaks every hash after it. Emission is fire-and-forget: audit
//! failure never fails the request that produced the event.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::{FromRow, SqlitePool};
use tokio::sync::broadcast;
use utoipa::ToSchema;
use uuid::Uuid;

pub const EVENT_COMPANY_CREATED: &str = "company.created";
pub const EVENT_ASSESSMENT_SUBMITTED: &str = "assessment.submitted";
pub const EVENT_ENTITLEMENT_UPDATED: &str = "entitlement.updated";

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub name: &'static str,
    pub occurred_at: DateTime<Utc>,
    /// Subject id of the caller, when authenticated.
    pub actor_id: Option<String>,
    /// Id of the entity the event is about.
    pub subject_id: Option<String>,
    pub detail: Value,
}

impl AuditEvent {
    pub fn new(
        name: &'static str,
        actor_id: Option<String>,
        subject_id: Option<String>,
        detail: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            occurred_at: Utc::now(),
            actor_id,
            subject_id,
            detail,
        }
    }
}

pub type AuditBus = broadcast::Sender<AuditEvent>;

pub fn init_audit_bus() -> (AuditBus, broadcast::Receiver<AuditEvent>) {
    broadcast::channel(256)
}

/// Fire-and-forget emission. A full or closed bus drops the event.
pub fn record(bus: &AuditBus, event: AuditEvent) {
    let _ = bus.send(event);
}

pub async fn start_audit_listener(mut rx: broadcast::Receiver<AuditEvent>, pool: SqlitePool) {
    tracing::info!("audit listener started");
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Err(err) = persist(&pool, &event).await {
                    tracing::error!(error = %err, event = event.name, "failed to persist audit event");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "audit listener lagged, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

pub async fn persist(pool: &SqlitePool, event: &AuditEvent) -> Result<(), sqlx::Error> {
    let payload = serde_json::to_string(&event.detail).unwrap_or_default();

    let prev_hash: Option<String> =
        sqlx::query_scalar("SELECT hash FROM audit_log ORDER BY occurred_at DESC, rowid DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    let hash = chain_hash(prev_hash.as_deref(), event.name, &event.occurred_at, &payload);

    sqlx::query(
        "INSERT INTO audit_log (id, event_name, actor_id, subject_id, occurred_at, payload, prev_hash, hash) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(event.id.to_string())
    .bind(event.name)
    .bind(&event.actor_id)
    .bind(&event.subject_id)
    .bind(event.occurred_at)
    .bind(&payload)
    .bind(&prev_hash)
    .bind(&hash)
    .execute(pool)
    .await?;

    Ok(())
}

fn chain_hash(
    prev_hash: Option<&str>,
    name: &str,
    occurred_at: &DateTime<Utc>,
    payload: &str,
) -> String {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(name.as_bytes());
    hasher.update(occurred_at.to_rfc3339().as_bytes());
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Row shape for the admin listing.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct AuditEntry {
    pub id: String,
    pub event_name: String,
    pub actor_id: Option<String>,
    pub subject_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub payload: String,
    pub prev_hash: Option<String>,
    pub hash: String,
}
