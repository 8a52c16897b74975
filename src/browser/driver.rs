//! Narrow trait over a headless-browser automation library, so the session
//! manager's concurrency and rate-limiting logic is exercised against a real
//! driver without hard-wiring the crate it happens to use.

use crate::browser::fingerprint::BrowserFingerprintSpec;
use crate::error::ScrapeError;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Opaque handle to a driver-managed browser context. Keeps the trait
/// object-safe: callers never see the underlying `Page`/`Browser` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u64);

#[async_trait]
pub trait HeadlessBrowserDriver: Send + Sync {
    async fn new_context(
        &self,
        fingerprint: &BrowserFingerprintSpec,
        proxy: Option<&str>,
    ) -> Result<ContextId, ScrapeError>;

    async fn navigate(&self, ctx: ContextId, url: &str) -> Result<(), ScrapeError>;

    /// Registers `script` to run on every document the context loads,
    /// before any page script executes — unlike `evaluate`, this survives
    /// `navigate`. Used to install the anti-fingerprinting overrides ahead
    /// of the target page's own scripts.
    async fn inject_init_script(&self, ctx: ContextId, script: &str) -> Result<(), ScrapeError>;

    async fn evaluate(&self, ctx: ContextId, script: &str) -> Result<(), ScrapeError>;

    async fn content(&self, ctx: ContextId) -> Result<String, ScrapeError>;

    async fn mouse_move(&self, ctx: ContextId, x: f64, y: f64) -> Result<(), ScrapeError>;

    async fn close_context(&self, ctx: ContextId) -> Result<(), ScrapeError>;
}

/// Real implementation backed by `chromiumoxide`. One `Browser` process is
/// launched lazily and shared across contexts; each `ContextId` maps to an
/// independent `Page`.
pub struct ChromiumoxideDriver {
    browser: tokio::sync::Mutex<Option<Browser>>,
    headless: bool,
    pages: Mutex<HashMap<u64, Page>>,
    next_id: AtomicU64,
}

impl ChromiumoxideDriver {
    pub fn new(headless: bool) -> Arc<Self> {
        Arc::new(Self {
            browser: tokio::sync::Mutex::new(None),
            headless,
            pages: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    async fn ensure_browser(&self) -> Result<(), ScrapeError> {
        let mut guard = self.browser.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        let mut builder = BrowserConfig::builder();
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| ScrapeError::Configuration(e.to_string()))?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::Fatal(format!("browser launch failed: {e}")))?;
        tokio::spawn(async move { while handler.next().await.is_some() {} });
        *guard = Some(browser);
        Ok(())
    }
}

#[async_trait]
impl HeadlessBrowserDriver for ChromiumoxideDriver {
    async fn new_context(
        &self,
        _fingerprint: &BrowserFingerprintSpec,
        _proxy: Option<&str>,
    ) -> Result<ContextId, ScrapeError> {
        self.ensure_browser().await?;
        let guard = self.browser.lock().await;
        let browser = guard.as_ref().expect("ensured above");
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScrapeError::Transient(format!("new_page failed: {e}")))?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.pages.lock().insert(id, page);
        Ok(ContextId(id))
    }

    async fn navigate(&self, ctx: ContextId, url: &str) -> Result<(), ScrapeError> {
        let page = self
            .pages
            .lock()
            .get(&ctx.0)
            .cloned()
            .ok_or_else(|| ScrapeError::Fatal("unknown browser context".into()))?;
        page.goto(NavigateParams::new(url))
            .await
            .map_err(|e| ScrapeError::Transient(format!("navigation failed: {e}")))?;
        Ok(())
    }

    async fn inject_init_script(&self, ctx: ContextId, script: &str) -> Result<(), ScrapeError> {
        let page = self
            .pages
            .lock()
            .get(&ctx.0)
            .cloned()
            .ok_or_else(|| ScrapeError::Fatal("unknown browser context".into()))?;
        page.execute(chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams {
            source: script.to_string(),
            include_command_line_api: None,
            world_name: None,
            run_immediately: None,
        })
        .await
        .map_err(|e| ScrapeError::Transient(format!("init script injection failed: {e}")))?;
        Ok(())
    }

    async fn evaluate(&self, ctx: ContextId, script: &str) -> Result<(), ScrapeError> {
        let page = self
            .pages
            .lock()
            .get(&ctx.0)
            .cloned()
            .ok_or_else(|| ScrapeError::Fatal("unknown browser context".into()))?;
        page.evaluate(script)
            .await
            .map_err(|e| ScrapeError::Transient(format!("evaluate failed: {e}")))?;
        Ok(())
    }

    async fn content(&self, ctx: ContextId) -> Result<String, ScrapeError> {
        let page = self
            .pages
            .lock()
            .get(&ctx.0)
            .cloned()
            .ok_or_else(|| ScrapeError::Fatal("unknown browser context".into()))?;
        page.content()
            .await
            .map_err(|e| ScrapeError::Transient(format!("content failed: {e}")))
    }

    async fn mouse_move(&self, ctx: ContextId, x: f64, y: f64) -> Result<(), ScrapeError> {
        let page = self
            .pages
            .lock()
            .get(&ctx.0)
            .cloned()
            .ok_or_else(|| ScrapeError::Fatal("unknown browser context".into()))?;
        page.move_mouse(chromiumoxide::types::Point { x, y })
            .await
            .map_err(|e| ScrapeError::Transient(format!("mouse move failed: {e}")))?;
        Ok(())
    }

    async fn close_context(&self, ctx: ContextId) -> Result<(), ScrapeError> {
        if let Some(page) = self.pages.lock().remove(&ctx.0) {
            let _ = page.close().await;
        }
        Ok(())
    }
}
