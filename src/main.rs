use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use admin_console::config::{self, AppConfig, StoreBackend};
use admin_console::database::{AdminStore, DatabaseManager, InMemoryStore, PgStore, ResilientStore};
use admin_console::identity::{HostedIdentityProvider, IdentityProvider, StaticIdentityProvider};
use admin_console::is_production;
use admin_console::security::{spawn_sweeper, Clock, SystemClock};
use admin_console::types::{Role, SubscriptionTier};
use admin_console::{app, AppState};

#[derive(Parser, Debug)]
#[command(name = "admin-console")]
#[command(about = "Administrative API: roles, audit trail, usage statistics and subscription control")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides CONSOLE_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind (overrides CONSOLE_BIND)
    #[arg(long)]
    bind: Option<String>,

    /// Use the in-process store and identity provider instead of Postgres and the hosted provider
    #[arg(long)]
    memory: bool,

    /// With --memory: seed an admin account, given as EMAIL:PASSWORD
    #[arg(long, value_name = "EMAIL:PASSWORD", requires = "memory")]
    seed_admin: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL and friends are visible to the config
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("admin_console=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();

    let mut config: AppConfig = config::config().clone();
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind.clone() {
        config.server.bind = bind;
    }
    if args.memory {
        config.store = StoreBackend::Memory;
    }

    tracing::info!("Starting admin console in {:?} mode", config.environment);
    if is_production!() && config.security.allowed_origins.iter().any(|o| o == "*") {
        tracing::warn!("Wildcard origin allowed in production; the origin check is effectively off");
    }

    let (store, identity) = build_backends(&mut config, args.seed_admin.as_deref()).await?;
    let config = Arc::new(config);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let state = AppState::new(config.clone(), store, identity, clock);
    let sweeper = spawn_sweeper(
        state.rate_limiter.clone(),
        state.abuse.clone(),
        Duration::from_secs(config.abuse.sweep_interval_secs),
        config.abuse.sweep_batch,
    );

    let bind_addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Admin console listening on http://{}", bind_addr);

    axum::serve(listener, app(state).into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweeper.abort();
    tracing::info!("Admin console stopped");
    Ok(())
}

async fn build_backends(
    config: &mut AppConfig,
    seed_admin: Option<&str>,
) -> anyhow::Result<(Arc<dyn AdminStore>, Arc<dyn IdentityProvider>)> {
    let call_timeout = Duration::from_millis(config.database.call_timeout_ms);

    match config.store {
        StoreBackend::Memory => {
            if config.identity.jwt_secret.is_empty() {
                tracing::warn!("IDENTITY_JWT_SECRET not set; using a per-process secret");
                config.identity.jwt_secret = Uuid::new_v4().simple().to_string();
            }

            let memory = InMemoryStore::new();
            let identity = StaticIdentityProvider::new(config.identity.jwt_secret.clone());

            if let Some(seed) = seed_admin {
                let (email, password) = seed
                    .split_once(':')
                    .context("--seed-admin expects EMAIL:PASSWORD")?;
                let id = memory.add_user(email, Role::Admin, SubscriptionTier::Free).await;
                identity.add_account(id, email, password).await;
                tracing::info!("Seeded admin account {}", email);
            }

            let store: Arc<dyn AdminStore> =
                Arc::new(ResilientStore::new(memory, call_timeout, config.database.retry_reads));
            let identity: Arc<dyn IdentityProvider> = Arc::new(identity);
            Ok((store, identity))
        }
        StoreBackend::Postgres => {
            if config.identity.jwt_secret.is_empty() {
                anyhow::bail!("IDENTITY_JWT_SECRET must be set when using the hosted identity provider");
            }

            let pool = DatabaseManager::connect(&config.database)
                .await
                .context("failed to connect to database")?;
            let store: Arc<dyn AdminStore> = Arc::new(ResilientStore::new(
                PgStore::new(pool),
                call_timeout,
                config.database.retry_reads,
            ));
            let identity: Arc<dyn IdentityProvider> = Arc::new(
                HostedIdentityProvider::new(&config.identity).context("invalid identity configuration")?,
            );
            Ok((store, identity))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
