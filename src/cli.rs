use clap::{Parser, Subcommand};

/// Resilient, adaptive e-commerce scraping engine.
#[derive(Parser)]
#[command(name = "scrape-engine")]
#[command(about = "Adaptive e-commerce scraping engine with strategy escalation")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Scrape a single product URL
    Scrape {
        url: String,
        #[arg(long, value_name = "PATH")]
        retailer_catalog: Option<String>,
    },
    /// Scrape a batch of URLs from a newline-delimited file
    ScrapeBatch {
        #[arg(value_name = "FILE")]
        urls_file: String,
    },
    /// Print current proxy pool health statistics
    ProxyStats,
    /// Force an immediate proxy health-check pass
    ProxyHealthCheck,
    /// Enable/disable/maintenance-flag a retailer
    SetRetailerStatus {
        retailer_key: String,
        #[arg(value_enum)]
        status: StatusArg,
    },
    /// Dump per-(domain, strategy) learning stats as JSON
    StrategyStats,
    /// Run the proxy pool's health-check and discovery background loops
    /// until interrupted (spec.md §4.2)
    Serve,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum StatusArg {
    Active,
    Inactive,
    Maintenance,
}

impl From<StatusArg> for adaptive_scrape_engine::models::RetailerStatus {
    fn from(value: StatusArg) -> Self {
        use adaptive_scrape_engine::models::RetailerStatus;
        match value {
            StatusArg::Active => RetailerStatus::Active,
            StatusArg::Inactive => RetailerStatus::Inactive,
            StatusArg::Maintenance => RetailerStatus::Maintenance,
        }
    }
}
