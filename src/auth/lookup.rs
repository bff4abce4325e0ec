use async_trait::async_trait;
use serde::Deserialize;

use super::claims::RoleMetadata;
use super::role::Role;

/// Secondary role source, keyed by subject id. Used only to correct stale
/// credentials whose declared role is `User`; never the primary source.
#[async_trait]
pub trait RoleLookupPort: Send + Sync {
    async fn role_for_subject(&self, subject: &str) -> anyhow::Result<Option<Role>>;
}

/// Lookup that knows nothing. Wired when no identity-admin API is configured.
pub struct NoopLookup;

#[async_trait]
impl RoleLookupPort for NoopLookup {
    async fn role_for_subject(&self, _subject: &str) -> anyhow::Result<Option<Role>> {
        Ok(None)
    }
}

/// Identity-admin API client. The response carries the same metadata shape as
/// the token payload, so role extraction follows the same precedence.
pub struct AdminApiLookup {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

#[derive(Debug, Deserialize)]
struct AdminUserResponse {
    #[serde(default)]
    app_metadata: Option<RoleMetadata>,
    #[serde(default)]
    user_metadata: Option<RoleMetadata>,
}

impl AdminApiLookup {
    pub fn new(http: reqwest::Client, base_url: String, service_key: String) -> Self {
        Self {
            http,
            base_url,
            service_key,
        }
    }
}

#[async_trait]
impl RoleLookupPort for AdminApiLookup {
    async fn role_for_subject(&self, subject: &str) -> anyhow::Result<Option<Role>> {
        let url = format!(
            "{}/admin/users/{}",
            self.base_url.trim_end_matches('/'),
            subject
        );

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.service_key)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: AdminUserResponse = response.error_for_status()?.json().await?;

        let declared = body
            .app_metadata
            .and_then(|meta| meta.role)
            .or_else(|| body.user_metadata.and_then(|meta| meta.role));

        Ok(declared.map(|raw| Role::parse(&raw)))
    }
}
