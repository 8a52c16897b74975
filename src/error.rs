use thiserror::Error;

/// Typed error taxonomy for the scraping engine.
///
/// Strategy attempts convert every failure into one of these before it
/// reaches the orchestrator; the orchestrator itself never propagates a raw
/// exception to its caller (it folds everything into `ScrapingResult`).
#[derive(Error, Debug, Clone)]
pub enum ScrapeError {
    #[error("transient network failure: {0}")]
    Transient(String),

    #[error("anti-bot detection: {0}")]
    AntiBotDetected(String),

    #[error("challenge unsolvable: {0}")]
    ChallengeUnsolvable(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("fatal internal error: {0}")]
    Fatal(String),
}

impl ScrapeError {
    /// True when this error should short-circuit remaining retries on the
    /// current strategy and trigger immediate escalation (spec §4.4 step 4).
    pub fn is_anti_bot(&self) -> bool {
        matches!(self, ScrapeError::AntiBotDetected(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ScrapeError::Transient(_))
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        ScrapeError::Transient(err.to_string())
    }
}

impl From<url::ParseError> for ScrapeError {
    fn from(err: url::ParseError) -> Self {
        ScrapeError::Configuration(err.to_string())
    }
}
