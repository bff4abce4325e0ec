use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use pulso::auth::{AuthState, EntitlementPolicy};
use pulso::models::company::MembershipStatus;
use pulso::models::entitlement::{Plan, SubscriptionStatus};

#[derive(Parser, Debug)]
#[command(author, version, about = "pulso operations tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new empty migration with the provided name
    MakeMigration { name: String },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Validate env configuration, including the bypass/production conflict
    CheckConfig,
    /// Seed a demo company with an active FULL subscription
    SeedDemo {
        /// Subject id of the demo owner (defaults to a random UUID)
        #[arg(long)]
        owner: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; fall back to the crate-local `.env` when the
    // binary runs from a different directory.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MakeMigration { name } => {
            let path = make_migration_file(&name)?;
            println!("Created migration: {}", path.display());
        }
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::CheckConfig => {
            check_config()?;
        }
        Commands::SeedDemo { owner } => {
            let pool = get_pool().await?;
            seed_demo(&pool, owner).await?;
        }
    }

    Ok(())
}

fn make_migration_file(name: &str) -> anyhow::Result<PathBuf> {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let sanitized = sanitize_name(name);
    let filename = format!("{}_{}.sql", timestamp, sanitized);
    let path = Path::new("migrations").join(filename);

    if path.exists() {
        anyhow::bail!("migration already exists: {}", path.display());
    }

    fs::write(&path, "-- Write your migration SQL here\n")
        .with_context(|| format!("failed to create migration at {}", path.display()))?;

    Ok(path)
}

fn check_config() -> anyhow::Result<()> {
    // EntitlementPolicy::from_env is the startup guard: it refuses the bypass
    // flag in production.
    EntitlementPolicy::from_env().map_err(|err| anyhow::anyhow!("{err}"))?;
    let auth = AuthState::from_env().map_err(|err| anyhow::anyhow!("{err}"))?;

    println!(
        "issuer:        {}",
        std::env::var("AUTH_ISSUER").unwrap_or_else(|_| "(not set, anonymous only)".to_string())
    );
    println!(
        "admin api:     {}",
        std::env::var("ADMIN_API_URL").unwrap_or_else(|_| "(not set, no role correction)".to_string())
    );
    println!(
        "verifier:      {}",
        if auth.verifier.is_some() { "jwks" } else { "disabled" }
    );
    println!("configuration ok");
    Ok(())
}

async fn seed_demo(pool: &SqlitePool, owner: Option<String>) -> anyhow::Result<()> {
    let owner = owner.unwrap_or_else(|| Uuid::new_v4().to_string());
    let company_id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO companies (id, name, owner_user_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(company_id.to_string())
    .bind("Empresa Demo")
    .bind(&owner)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query(
        "INSERT INTO company_members (company_id, user_id, status, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(company_id.to_string())
    .bind(&owner)
    .bind(MembershipStatus::Active.as_str())
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query(
        "INSERT INTO company_entitlements (company_id, plan, status, is_admin, updated_at) VALUES (?, ?, ?, 0, ?)",
    )
    .bind(company_id.to_string())
    .bind(Plan::Full.as_str())
    .bind(SubscriptionStatus::Active.as_str())
    .bind(now)
    .execute(pool)
    .await?;

    println!("company:  {company_id}");
    println!("owner:    {owner}");
    println!("plan:     FULL / ACTIVE");
    Ok(())
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    use std::collections::HashSet;

    // If the migrations table doesn't exist, nothing is applied yet
    let table_exists =
        sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
            .fetch_optional(pool)
            .await?;

    let applied_versions: HashSet<i64> = if table_exists.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter()
            .filter_map(|row| row.try_get::<i64, _>("version").ok())
            .collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let applied = applied_versions.contains(&migration.version);
        let status = if applied { "applied" } else { "pending" };
        let desc = migration.description.as_ref().trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // Prefer ./migrations when running from the repo root, fall back to the
    // crate-local folder when CWD differs (containers).
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {display}"))
}
