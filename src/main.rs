//! PriceOracle binary
//!
//! `priceoracle <product_id>` prices one catalog product and prints the
//! outcome as JSON. Without arguments the catalog is re-priced on the
//! configured interval until Ctrl-C.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use priceoracle::broadcast::PriceBroadcaster;
use priceoracle::config::AppConfig;
use priceoracle::oracle::sources::{HttpClient, HttpSettings, SourceRegistry};
use priceoracle::oracle::PriceOracle;
use priceoracle::persistence::CsvPersistence;
use priceoracle::pricing::{ChainSubmitter, DisabledSubmitter, PricingService};
use priceoracle::scheduler::PriceScheduler;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    setup_tracing(config.logging.json);

    info!(config = %config, "🚀 PriceOracle starting");

    let service = Arc::new(build_service(&config)?);

    match std::env::args().nth(1) {
        Some(product_id) => price_once(&config, &service, &product_id).await,
        None => run_scheduler(&config, service).await,
    }
}

fn setup_tracing(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn build_service(config: &AppConfig) -> Result<PricingService> {
    let http = HttpClient::new(&HttpSettings::from(&config.http))?;
    let registry =
        SourceRegistry::from_config(&config.sources).context("Failed to build source registry")?;
    if registry.is_empty() {
        tracing::warn!("No price sources enabled; every run will fall back to last known prices");
    }

    let oracle = Arc::new(PriceOracle::from_config(&config.oracle, http, registry));
    info!(sources = ?oracle.registry().names(), "Price oracle ready");

    let submitter: Arc<dyn ChainSubmitter> = if config.chain.enabled {
        // No ledger client is bundled; an enabled chain without one is reported per submission
        Arc::new(DisabledSubmitter::new(format!(
            "no ledger client configured for app {}",
            config.chain.app_id
        )))
    } else {
        Arc::new(DisabledSubmitter::default())
    };

    let mut service = PricingService::new(
        oracle,
        submitter,
        PriceBroadcaster::default(),
        config.pricing.margin_percent,
    )
    .with_currency(config.pricing.currency.clone());

    if config.persistence.csv_enabled {
        let persistence = CsvPersistence::new(&config.persistence.data_dir)?;
        service = service.with_persistence(Arc::new(persistence));
    }

    Ok(service)
}

async fn price_once(config: &AppConfig, service: &PricingService, product_id: &str) -> Result<()> {
    let Some(product) = config.product(product_id) else {
        bail!("Product {} is not in the catalog", product_id);
    };

    let outcome = service.compute(product).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn run_scheduler(config: &AppConfig, service: Arc<PricingService>) -> Result<()> {
    if !config.scheduler.enabled {
        info!("Scheduler disabled; nothing to do");
        return Ok(());
    }

    let scheduler = PriceScheduler::new(
        service,
        config.active_products(),
        Duration::from_secs(config.scheduler.interval_secs),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

    shutdown_signal().await;
    info!("Shutdown signal received, stopping scheduler...");

    shutdown_tx.send(true).ok();
    handle.await.context("Scheduler task panicked")?;

    info!("PriceOracle stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
