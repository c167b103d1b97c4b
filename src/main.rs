use content_portal::{
    AppState,
    bootstrap::ensure_admin,
    config::{AppConfig, Env},
    create_router,
    repository::PostgresRepository,
};
use sqlx::postgres::PgPoolOptions;
use std::{error::Error, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Startup order: configuration, logging, database + migrations, admin seed,
/// HTTP server. Any failure before the server is listening aborts the process.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    let config = AppConfig::load()?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "content_portal=debug,tower_http=info,axum=trace".into());

    // Pretty output locally, JSON lines for log aggregation in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.db_url)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "failed to connect to Postgres"))?;

    let repo = Arc::new(PostgresRepository::new(pool));
    repo.migrate().await?;
    tracing::info!("database migrations applied");

    let outcome = ensure_admin(repo.as_ref(), &config.admin).await?;
    tracing::info!(?outcome, "administrator seed checked");

    let address = config.bind_address();
    let app = create_router(AppState::new(repo, &config));

    let listener = TcpListener::bind(&address).await?;
    tracing::info!("Listening on {}", address);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", address);

    axum::serve(listener, app).await?;
    Ok(())
}
