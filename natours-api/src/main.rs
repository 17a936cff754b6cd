use anyhow::Context;
use natours_api::{
    app,
    state::{AppState, Repositories},
};
use natours_core::notify::{LogMailer, Mailer};
use natours_store::app_config::{Config, StorageBackend};
use natours_store::{DbClient, SmtpMailer, StripeClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "natours_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Natours API on port {}", config.server.port);

    let repos = match config.storage.backend {
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database.url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Repositories::postgres(&db)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data is lost on restart");
            Repositories::in_memory()
        }
    };

    let payments = StripeClient::new(&config.payments).context("Failed to build payment client")?;

    let mailer: Arc<dyn Mailer> = if config.mail.enabled {
        Arc::new(SmtpMailer::new(&config.mail).context("Failed to configure SMTP")?)
    } else {
        tracing::info!("Mail delivery disabled");
        Arc::new(LogMailer)
    };

    let app_state = AppState::new(repos, Arc::new(payments), mailer, &config);
    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
