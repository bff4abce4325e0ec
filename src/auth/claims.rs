use serde::Deserialize;

use super::role::Role;

/// Role-bearing metadata namespace as published by the issuer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleMetadata {
    pub role: Option<String>,
}

/// Verified token payload. Signature, expiry, issuer and audience are checked
/// by the verifier before a `Claims` value exists; this struct only carries
/// what identity resolution needs afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    pub sub: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub app_metadata: Option<RoleMetadata>,
    #[serde(default)]
    pub user_metadata: Option<RoleMetadata>,
}

impl Claims {
    /// The role the credential declares. Application-level metadata wins over
    /// user-level metadata; a candidate outside the known set collapses to
    /// `User` without falling through to the other namespace.
    pub fn declared_role(&self) -> Role {
        let candidate = self
            .app_metadata
            .as_ref()
            .and_then(|meta| meta.role.as_deref())
            .or_else(|| {
                self.user_metadata
                    .as_ref()
                    .and_then(|meta| meta.role.as_deref())
            });

        candidate.map(Role::parse).unwrap_or(Role::User)
    }
}
