pub mod browser;
pub mod captcha;
pub mod config;
pub mod error;
pub mod extract;
pub mod http_client;
pub mod models;
pub mod proxy;
pub mod retailer;
pub mod strategy;

pub use config::EngineConfig;
pub use error::ScrapeError;
pub use models::{ProductRecord, ProxyEntry, RetailerConfig, ScrapingResult};
pub use proxy::ProxyPoolManager;
pub use retailer::RetailerRegistry;
pub use strategy::{Strategy, StrategyOrchestrator};
