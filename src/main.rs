use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use pulso::{app, audit, db, models, routes};

#[derive(OpenApi)]
#[openapi(
    components(
        schemas(
            pulso::auth::Role,
            pulso::auth::Identity,
            routes::session::SessionResponse,
            routes::health::HealthResponse,
            routes::entitlements::EntitlementStatusResponse,
            models::company::Company,
            models::company::CompanyCreateRequest,
            models::company::CompanyMember,
            models::company::MembershipStatus,
            models::entitlement::Plan,
            models::entitlement::SubscriptionStatus,
            models::entitlement::CompanyEntitlement,
            models::entitlement::EntitlementUpdateRequest,
            models::assessment::Assessment,
            models::assessment::AssessmentVariant,
            models::assessment::AssessmentStatus,
            models::assessment::AssessmentCreateRequest,
            models::assessment::AnswerInput,
            models::assessment::SubmitAnswersRequest,
            models::assessment::Recommendation,
            models::action_plan::ActionPlan,
            models::action_plan::ActionPlanItem,
            models::action_plan::ActionPlanItemInput,
            models::action_plan::ActionPlanUpsertRequest,
            audit::AuditEntry,
        )
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Auth", description = "Identity resolution"),
        (name = "Companies", description = "Company access"),
        (name = "Assessments", description = "Diagnostic assessments"),
        (name = "ActionPlan", description = "30-day action plans"),
        (name = "Entitlements", description = "FULL content gate"),
        (name = "Admin", description = "Admin surface")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let pool = db::init().await?;
    // Fails fast on invalid configuration, including ENTITLEMENT_BYPASS in
    // production.
    let app = app::create_app(pool).await?;

    let app = app.merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let port = std::env::var("APP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8000);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
