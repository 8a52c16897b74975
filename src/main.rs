mod cli;

use adaptive_scrape_engine::browser;
use adaptive_scrape_engine::captcha::{ChallengeSolverChain, CloudflareWaitSolver, RecaptchaCheckboxSolver};
use adaptive_scrape_engine::config::EngineConfig;
use adaptive_scrape_engine::http_client::ReqwestHttpClient;
use adaptive_scrape_engine::proxy::lb::NullLoadBalancerSink;
use adaptive_scrape_engine::proxy::store::InMemoryProxyStore;
use adaptive_scrape_engine::proxy::ProxyPoolManager;
use adaptive_scrape_engine::retailer::RetailerRegistry;
use adaptive_scrape_engine::strategy::StrategyOrchestrator;
use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use std::io::{BufRead, BufReader};
use std::sync::Arc;
use tracing::info;

/// Hard upper bound on in-flight sub-requests for `scrape-batch` (spec.md
/// §5's default batch concurrency cap).
const BATCH_CONCURRENCY: usize = 10;

fn build_proxy_manager(config: &EngineConfig) -> Arc<ProxyPoolManager> {
    Arc::new(ProxyPoolManager::with_f_max(
        Arc::new(InMemoryProxyStore::new()),
        Arc::new(NullLoadBalancerSink),
        config.f_max,
    ))
}

fn build_orchestrator(config: &EngineConfig) -> Result<StrategyOrchestrator> {
    let retailers = Arc::new(
        RetailerRegistry::load(config.retailer_catalog_path.as_deref())
            .context("loading retailer catalog")?,
    );

    let proxy_manager = build_proxy_manager(config);

    let driver = browser::driver::ChromiumoxideDriver::new(config.browser_headless);
    let session_manager = Arc::new(
        browser::StealthSessionManager::new(
            driver.clone(),
            config.max_concurrent_sessions,
            config.per_domain_min_delay,
        ),
    );

    let captcha_chain = Arc::new(ChallengeSolverChain::new(vec![
        Arc::new(RecaptchaCheckboxSolver::new(driver.clone())),
        Arc::new(CloudflareWaitSolver::new(driver)),
    ]));

    let http_client = Arc::new(ReqwestHttpClient::new(config.browser_timeout));

    Ok(StrategyOrchestrator::new(
        retailers,
        proxy_manager,
        session_manager,
        http_client,
        Some(captcha_chain),
    )
    .with_request_jitter_range(config.request_jitter_range))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env();

    match cli.command {
        Command::Scrape { url, retailer_catalog } => {
            let mut config = config;
            if let Some(path) = retailer_catalog {
                config.retailer_catalog_path = Some(path);
            }
            let orchestrator = build_orchestrator(&config)?;
            let result = orchestrator.scrape(&url).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::ScrapeBatch { urls_file } => {
            let orchestrator = build_orchestrator(&config)?;
            let file = std::fs::File::open(&urls_file).context("opening URL list")?;
            let urls: Vec<String> = BufReader::new(file)
                .lines()
                .filter_map(|l| l.ok())
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();

            info!(count = urls.len(), "scraping batch");
            let results = orchestrator.scrape_batch(&urls, BATCH_CONCURRENCY).await;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Command::ProxyStats => {
            let proxy_manager = build_proxy_manager(&config);
            println!("{}", serde_json::to_string_pretty(&proxy_manager.stats().await)?);
        }
        Command::ProxyHealthCheck => {
            let proxy_manager = build_proxy_manager(&config);
            proxy_manager
                .continuous_health_check("http://httpbin.org/ip", config.health_check_batch_size)
                .await;
            println!("health check complete");
        }
        Command::SetRetailerStatus { retailer_key, status } => {
            let registry = RetailerRegistry::load(config.retailer_catalog_path.as_deref())?;
            let updated = registry.set_status(&retailer_key, status.into());
            if updated {
                println!("updated {retailer_key}");
            } else {
                eprintln!("unknown retailer: {retailer_key}");
            }
        }
        Command::StrategyStats => {
            println!("strategy stats are process-local; run a scrape first to populate them");
        }
        Command::Serve => {
            let proxy_manager = build_proxy_manager(&config);
            info!(
                health_interval = ?config.health_interval,
                discovery_interval = ?config.discovery_interval,
                "starting proxy pool background loops"
            );

            let health_task = proxy_manager.clone().spawn_health_check_loop(
                config.health_interval,
                config.health_check_batch_size,
                "http://httpbin.org/ip".to_string(),
            );
            let discovery_task = proxy_manager.clone().spawn_discovery_loop(
                config.discovery_interval,
                config.proxy_discovery_urls.clone(),
                config.max_new_proxies_per_discovery,
            );

            tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
            info!("shutdown signal received, stopping background loops");
            health_task.abort();
            discovery_task.abort();
        }
    }

    Ok(())
}
