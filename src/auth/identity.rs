use std::fmt;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::errors::AppError;

use super::role::Role;
use super::AuthState;

/// Resolved caller identity. Ephemeral, built once per request, never
/// persisted. Absence of an identity is a valid state on optional-auth paths.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
    pub role: Role,
}

/// Why authentication failed, for server-side logs. Clients always receive
/// the same generic `UNAUTHENTICATED` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingHeader,
    MalformedHeader,
    EmptyToken,
    Verification,
    MissingSubject,
    Misconfigured,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            AuthFailure::MissingHeader => "authorization header missing",
            AuthFailure::MalformedHeader => "authorization header malformed",
            AuthFailure::EmptyToken => "bearer token empty",
            AuthFailure::Verification => "token verification failed",
            AuthFailure::MissingSubject => "token subject missing",
            AuthFailure::Misconfigured => "auth issuer not configured",
        };
        f.write_str(reason)
    }
}

/// Strict identity resolution: bearer credential -> verified [`Identity`],
/// with a categorized failure otherwise.
///
/// Declared-`User` credentials get one corrective lookup against the
/// identity-admin port: a stale cached token issued before a role upgrade may
/// still say `USER`. The lookup only ever upgrades, and its failure keeps the
/// safe value.
pub async fn authenticate(headers: &HeaderMap, auth: &AuthState) -> Result<Identity, AuthFailure> {
    let verifier = auth.verifier.as_deref().ok_or(AuthFailure::Misconfigured)?;

    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(AuthFailure::MissingHeader)?;
    let header = header.to_str().map_err(|_| AuthFailure::MalformedHeader)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthFailure::MalformedHeader)?
        .trim();

    if token.is_empty() {
        return Err(AuthFailure::EmptyToken);
    }

    let claims = verifier.verify(token).await.map_err(|err| {
        tracing::debug!(error = %err, "token verification failed");
        AuthFailure::Verification
    })?;

    let subject = claims
        .sub
        .as_deref()
        .map(str::trim)
        .filter(|sub| !sub.is_empty())
        .ok_or(AuthFailure::MissingSubject)?
        .to_string();

    let mut role = claims.declared_role();
    if role == Role::User {
        match auth.role_lookup.role_for_subject(&subject).await {
            Ok(Some(fresh)) if fresh != Role::User => {
                tracing::debug!(subject = %subject, role = %fresh, "adopted upgraded role from identity-admin lookup");
                role = fresh;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(subject = %subject, error = %err, "role lookup failed, keeping USER");
            }
        }
    }

    Ok(Identity {
        id: subject,
        email: claims.email,
        role,
    })
}

/// Lenient identity resolution: any failure degrades to "no identity" and the
/// reject decision is deferred to whichever guard requires authentication.
pub async fn resolve_identity(headers: &HeaderMap, auth: &AuthState) -> Option<Identity> {
    match authenticate(headers, auth).await {
        Ok(identity) => Some(identity),
        Err(reason) => {
            tracing::debug!(%reason, "request proceeds anonymous");
            None
        }
    }
}

/// Extractor for authentication-mandatory endpoints. Rejects with 401 when no
/// valid identity can be resolved.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(&parts.headers, &state.auth)
            .await
            .map(CurrentUser)
            .map_err(AppError::unauthenticated)
    }
}

/// Extractor for optional-auth endpoints. Never rejects.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<Identity>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(OptionalUser(
            resolve_identity(&parts.headers, &state.auth).await,
        ))
    }
}
