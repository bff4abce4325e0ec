//! Startup configuration guard: the entitlement bypass must never reach a
//! production process. Kept in its own test binary because it mutates env.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::tempdir;

use pulso::create_app;

#[tokio::test]
async fn bypass_in_production_aborts_startup() -> Result<()> {
    let dir = tempdir().context("failed to create tempdir")?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("startup.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;
    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    std::env::set_var("ENTITLEMENT_BYPASS", "true");
    std::env::set_var("APP_ENV", "production");
    let result = create_app(pool.clone()).await;
    assert!(result.is_err(), "bypass + production must abort startup");

    // same flag outside production is accepted
    std::env::set_var("APP_ENV", "development");
    let result = create_app(pool.clone()).await;
    assert!(result.is_ok());

    // production without the bypass is accepted
    std::env::remove_var("ENTITLEMENT_BYPASS");
    std::env::set_var("APP_ENV", "production");
    let result = create_app(pool).await;
    assert!(result.is_ok());

    std::env::remove_var("APP_ENV");
    Ok(())
}
