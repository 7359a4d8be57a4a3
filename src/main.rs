use schoolpay_backend::api::{self, AppState};
use schoolpay_backend::config::{AppConfig, StorageBackend};
use schoolpay_backend::database::account_repository::AccountRepository;
use schoolpay_backend::database::memory::MemoryStore;
use schoolpay_backend::database::order_repository::OrderRepository;
use schoolpay_backend::database::repository::{
    AccountStore, OrderStore, TransactionReader, WebhookLogStore,
};
use schoolpay_backend::database::transaction_repository::TransactionRepository;
use schoolpay_backend::database::webhook_log_repository::WebhookLogRepository;
use schoolpay_backend::database::{init_pool_from_config, run_migrations};
use schoolpay_backend::health::HealthChecker;
use schoolpay_backend::logging::init_tracing;
use schoolpay_backend::payments::{AggregatorClient, PaymentGateway};
use schoolpay_backend::services::{
    AuthService, PaymentOrchestrator, SessionIssuer, TransactionQueryService, WebhookProcessor,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Storage handles, one per seam
struct Stores {
    accounts: Arc<dyn AccountStore>,
    orders: Arc<dyn OrderStore>,
    transactions: Arc<dyn TransactionReader>,
    webhook_logs: Arc<dyn WebhookLogStore>,
    pool: Option<sqlx::PgPool>,
}

async fn init_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    match (config.storage, &config.database) {
        (StorageBackend::Postgres, Some(db_config)) => {
            info!("🔌 Connecting to PostgreSQL...");
            let pool = init_pool_from_config(db_config).await.map_err(|e| {
                error!("❌ Database initialization failed: {}", e);
                e
            })?;
            run_migrations(&pool).await?;
            info!("✅ Database ready");

            Ok(Stores {
                accounts: Arc::new(AccountRepository::new(pool.clone())),
                orders: Arc::new(OrderRepository::new(pool.clone())),
                transactions: Arc::new(TransactionRepository::new(pool.clone())),
                webhook_logs: Arc::new(WebhookLogRepository::new(pool.clone())),
                pool: Some(pool),
            })
        }
        (StorageBackend::Postgres, None) => {
            anyhow::bail!("postgres storage selected without database configuration")
        }
        (StorageBackend::Memory, _) => {
            warn!("⚠️  Using the in-memory store; records are lost on restart");
            let store = Arc::new(MemoryStore::new());
            Ok(Stores {
                accounts: store.clone(),
                orders: store.clone(),
                transactions: store.clone(),
                webhook_logs: store,
                pool: None,
            })
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(&config.logging);
    config.validate()?;

    info!("🚀 Starting school fee payment backend");

    let stores = init_stores(&config).await?;

    let gateway: Arc<dyn PaymentGateway> = Arc::new(AggregatorClient::new(config.gateway.clone())?);
    info!(gateway = gateway.name(), "✅ Payment gateway client ready");

    if config.webhook.signing_secret.is_none() {
        warn!("⚠️  WEBHOOK_SIGNING_SECRET not set; payment callbacks are accepted unsigned");
    }

    let sessions = Arc::new(SessionIssuer::new(&config.auth));
    let state = AppState {
        auth: Arc::new(AuthService::new(stores.accounts.clone(), sessions.clone())),
        sessions,
        orchestrator: Arc::new(PaymentOrchestrator::new(gateway, stores.orders.clone())),
        webhooks: Arc::new(WebhookProcessor::new(
            stores.orders.clone(),
            stores.webhook_logs.clone(),
            config.webhook.signing_secret.clone(),
        )),
        transactions: Arc::new(TransactionQueryService::new(
            stores.transactions.clone(),
            stores.orders.clone(),
        )),
        health_checker: HealthChecker::new(stores.pool.clone()),
        webhook_signature_header: config.webhook.signature_header.clone(),
    };

    info!("🛣️  Setting up application routes...");
    let app = api::router(state, &config.server.cors_allowed_origins);
    info!("✅ Routes configured");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(
        address = %addr,
        storage = ?config.storage,
        "🚀 Server listening on http://{}",
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = stores.pool {
        pool.close().await;
    }

    info!("👋 Server shutdown complete");
    Ok(())
}
