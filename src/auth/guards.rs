use std::collections::HashMap;

use axum::async_trait;
use axum::extract::{FromRequestParts, Path, Query};
use axum::http::request::Parts;
use axum::RequestPartsExt;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::AppError;
use crate::models::company::MembershipStatus;

use super::identity::Identity;
use super::role::Role;
use super::AccessDecision;

/// Passes when the identity's role is in `allowed`.
pub fn require_any_of(identity: &Identity, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&identity.role) {
        return Ok(());
    }
    Err(AppError::forbidden("insufficient role"))
}

/// Passes when the identity's role is at least `min` in the hierarchy.
pub fn require_at_least(identity: &Identity, min: Role) -> Result<(), AppError> {
    if identity.role.at_least(min) {
        return Ok(());
    }
    Err(AppError::forbidden(format!("requires role {min} or higher")))
}

/// Mutation block for consultor accounts: consultants operate from their own
/// portal and must not mutate company data here. Admin always passes, every
/// other role passes, consultor gets a distinct error code so the client can
/// tell "wrong portal" apart from "lacks permission".
pub fn block_consultor_on_mutation(identity: &Identity) -> Result<(), AppError> {
    match identity.role {
        Role::Admin => Ok(()),
        Role::Consultor => Err(AppError::ConsultorBlocked),
        Role::User => Ok(()),
    }
}

/// Validate a raw company identifier before any data-layer lookup.
pub fn parse_company_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::bad_request("company_id must be a valid UUID"))
}

/// Company identifier taken from the request: path parameter first, query
/// string second. Body-borne identifiers are parsed by the handler through
/// [`parse_company_id`], keeping the same precedence and the same 400 shape.
#[derive(Debug, Clone, Copy)]
pub struct CompanyScope(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for CompanyScope {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        let from_path = match parts.extract::<Path<HashMap<String, String>>>().await {
            Ok(Path(params)) => params.get("company_id").cloned(),
            Err(_) => None,
        };

        let raw = match from_path {
            Some(value) => Some(value),
            None => match parts.extract::<Query<HashMap<String, String>>>().await {
                Ok(Query(query)) => query.get("company_id").cloned(),
                Err(_) => None,
            },
        };

        let raw = raw.ok_or_else(|| AppError::bad_request("company_id is required"))?;
        Ok(CompanyScope(parse_company_id(&raw)?))
    }
}

/// Company-scoped access decision.
///
/// Admin and consultor pass unconditionally -- consultant access is
/// transversal across companies. A plain user needs an ACTIVE membership row
/// or the legacy ownership relation; the two lookups run concurrently and
/// OR-join.
pub async fn company_access_decision(
    pool: &SqlitePool,
    identity: &Identity,
    company_id: Uuid,
) -> AccessDecision {
    if identity.role.at_least(Role::Consultor) {
        return AccessDecision::Allowed;
    }

    let company_id = company_id.to_string();

    let membership = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(1) FROM company_members WHERE company_id = ? AND user_id = ? AND status = ?",
    )
    .bind(&company_id)
    .bind(&identity.id)
    .bind(MembershipStatus::Active.as_str())
    .fetch_one(pool);

    let ownership = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(1) FROM companies WHERE id = ? AND owner_user_id = ?",
    )
    .bind(&company_id)
    .bind(&identity.id)
    .fetch_one(pool);

    let (membership, ownership) = tokio::join!(membership, ownership);

    match (membership, ownership) {
        (Ok(members), _) if members > 0 => AccessDecision::Allowed,
        (_, Ok(owned)) if owned > 0 => AccessDecision::Allowed,
        (Ok(_), Ok(_)) => AccessDecision::Denied("no active membership for this company"),
        (Err(err), _) | (_, Err(err)) => AccessDecision::Infrastructure(err),
    }
}

/// HTTP-boundary wrapper over [`company_access_decision`]: denials become 403
/// and infrastructure failures fail closed as 403 with the cause logged.
pub async fn ensure_company_access(
    pool: &SqlitePool,
    identity: &Identity,
    company_id: Uuid,
) -> Result<(), AppError> {
    match company_access_decision(pool, identity, company_id).await {
        AccessDecision::Allowed => Ok(()),
        AccessDecision::Denied(reason) => Err(AppError::forbidden(reason)),
        AccessDecision::Infrastructure(err) => {
            tracing::error!(error = %err, company_id = %company_id, "company access lookup failed, denying");
            Err(AppError::forbidden("company access could not be verified"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: Role) -> Identity {
        Identity {
            id: "11111111-1111-4111-8111-111111111111".to_string(),
            email: None,
            role,
        }
    }

    #[test]
    fn require_any_of_checks_membership() {
        let consultor = identity(Role::Consultor);
        assert!(require_any_of(&consultor, &[Role::Consultor, Role::Admin]).is_ok());
        assert!(require_any_of(&identity(Role::Admin), &[Role::Consultor, Role::Admin]).is_ok());
        assert!(require_any_of(&identity(Role::User), &[Role::Consultor, Role::Admin]).is_err());
    }

    #[test]
    fn require_at_least_rejects_lower_tiers() {
        assert!(require_at_least(&identity(Role::User), Role::Consultor).is_err());
        assert!(require_at_least(&identity(Role::Consultor), Role::Admin).is_err());
        assert!(require_at_least(&identity(Role::Consultor), Role::Consultor).is_ok());
        assert!(require_at_least(&identity(Role::Admin), Role::User).is_ok());
    }

    #[test]
    fn consultor_mutation_block_matrix() {
        assert!(block_consultor_on_mutation(&identity(Role::User)).is_ok());
        assert!(block_consultor_on_mutation(&identity(Role::Admin)).is_ok());
        let err = block_consultor_on_mutation(&identity(Role::Consultor)).unwrap_err();
        assert!(matches!(err, AppError::ConsultorBlocked));
    }

    #[test]
    fn company_id_shape_is_validated() {
        assert!(parse_company_id("not-a-uuid").is_err());
        assert!(parse_company_id("").is_err());
        assert!(parse_company_id("123e4567-e89b-42d3-a456-426614174000").is_ok());
        assert!(parse_company_id("  123e4567-e89b-42d3-a456-426614174000  ").is_ok());
    }

    mod with_pool {
        use anyhow::Result;
        use sqlx::sqlite::SqliteConnectOptions;
        use sqlx::SqlitePool;
        use tempfile::tempdir;

        use super::*;

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

        async fn seed_company(pool: &SqlitePool, owner: Option<&str>) -> Result<Uuid> {
            let id = Uuid::new_v4();
            let now = chrono::Utc::now();
            sqlx::query(
                "INSERT INTO companies (id, name, owner_user_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(id.to_string())
            .bind("Test Co")
            .bind(owner)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await?;
            Ok(id)
        }

        async fn seed_member(pool: &SqlitePool, company: Uuid, user: &str, status: &str) -> Result<()> {
            sqlx::query(
                "INSERT INTO company_members (company_id, user_id, status, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(company.to_string())
            .bind(user)
            .bind(status)
            .bind(chrono::Utc::now())
            .execute(pool)
            .await?;
            Ok(())
        }

        #[tokio::test]
        async fn active_membership_grants_access() -> Result<()> {
            let dir = tempdir()?;
            let pool = test_pool(&dir).await?;
            let user = identity(Role::User);
            let company = seed_company(&pool, None).await?;
            seed_member(&pool, company, &user.id, "ACTIVE").await?;

            assert!(ensure_company_access(&pool, &user, company).await.is_ok());
            Ok(())
        }

        #[tokio::test]
        async fn inactive_membership_is_denied() -> Result<()> {
            let dir = tempdir()?;
            let pool = test_pool(&dir).await?;
            let user = identity(Role::User);
            let company = seed_company(&pool, None).await?;
            seed_member(&pool, company, &user.id, "REMOVED").await?;

            assert!(ensure_company_access(&pool, &user, company).await.is_err());
            Ok(())
        }

        #[tokio::test]
        async fn legacy_ownership_grants_access() -> Result<()> {
            let dir = tempdir()?;
            let pool = test_pool(&dir).await?;
            let user = identity(Role::User);
            let company = seed_company(&pool, Some(user.id.as_str())).await?;

            assert!(ensure_company_access(&pool, &user, company).await.is_ok());
            Ok(())
        }

        #[tokio::test]
        async fn consultor_and_admin_pass_without_membership() -> Result<()> {
            let dir = tempdir()?;
            let pool = test_pool(&dir).await?;
            let company = seed_company(&pool, None).await?;

            assert!(ensure_company_access(&pool, &identity(Role::Consultor), company)
                .await
                .is_ok());
            assert!(ensure_company_access(&pool, &identity(Role::Admin), company)
                .await
                .is_ok());
            Ok(())
        }

        #[tokio::test]
        async fn unknown_company_is_denied_for_users() -> Result<()> {
            let dir = tempdir()?;
            let pool = test_pool(&dir).await?;

            let decision =
                company_access_decision(&pool, &identity(Role::User), Uuid::new_v4()).await;
            assert!(matches!(decision, AccessDecision::Denied(_)));
            Ok(())
        }
    }
}
