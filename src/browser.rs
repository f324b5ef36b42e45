//! Real-browser backend on top of `playwright-rs`
//!
//! One [`PlaywrightBrowser`] launches a single browser process; every
//! [`SessionFactory::open`] creates a fresh browser context so cookies and
//! storage are never shared between sessions.

use async_trait::async_trait;
use playwright_rs::{Browser, BrowserContext, ClickOptions, Locator, Page, Playwright};
use tracing::{debug, info};

use crate::config::BrowserKind;
use crate::error::SessionError;
use crate::locator::Query;
use crate::session::{ClickMode, Session, SessionFactory};

fn backend_error(err: impl std::fmt::Display) -> SessionError {
    SessionError::Backend(err.to_string())
}

fn action_error(operation: &'static str, query: &Query, err: impl std::fmt::Display) -> SessionError {
    SessionError::Action {
        operation,
        selector: query.to_string(),
        reason: err.to_string(),
    }
}

pub struct PlaywrightBrowser {
    // Keeps the driver alive for as long as the browser is in use.
    _playwright: Playwright,
    browser: Browser,
    kind: BrowserKind,
}

impl PlaywrightBrowser {
    pub async fn launch(kind: BrowserKind) -> Result<Self, SessionError> {
        let playwright = Playwright::launch().await.map_err(backend_error)?;
        let browser_type = match kind {
            BrowserKind::Chromium => playwright.chromium(),
            BrowserKind::Firefox => playwright.firefox(),
            BrowserKind::Webkit => playwright.webkit(),
        };
        let browser = browser_type.launch().await.map_err(backend_error)?;
        info!(
            browser = browser.name(),
            version = browser.version(),
            "browser launched"
        );
        Ok(Self {
            _playwright: playwright,
            browser,
            kind,
        })
    }

    pub fn kind(&self) -> BrowserKind {
        self.kind
    }

    pub async fn close(self) -> Result<(), SessionError> {
        self.browser.close().await.map_err(backend_error)
    }
}

#[async_trait]
impl SessionFactory for PlaywrightBrowser {
    type Session = PlaywrightSession;

    async fn open(&self) -> Result<PlaywrightSession, SessionError> {
        let context = self.browser.new_context().await.map_err(backend_error)?;
        let page = context.new_page().await.map_err(backend_error)?;
        debug!(browser = self.kind.as_str(), "opened browser context");
        Ok(PlaywrightSession { context, page })
    }

    async fn release(&self, session: PlaywrightSession) -> Result<(), SessionError> {
        session.close().await?;
        debug!(browser = self.kind.as_str(), "closed browser context");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        self.kind.as_str()
    }
}

/// One isolated browser context with a single page
pub struct PlaywrightSession {
    context: BrowserContext,
    page: Page,
}

impl PlaywrightSession {
    async fn locator(&self, query: &Query) -> Locator {
        self.page.locator(&query.to_string()).await
    }

    pub async fn close(self) -> Result<(), SessionError> {
        self.context.close().await.map_err(backend_error)
    }
}

#[async_trait]
impl Session for PlaywrightSession {
    async fn goto(&self, url: &str) -> Result<(), SessionError> {
        self.page
            .goto(url, None)
            .await
            .map(|_| ())
            .map_err(|err| SessionError::Goto {
                url: url.to_string(),
                reason: err.to_string(),
            })
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        Ok(self.page.url())
    }

    async fn title(&self) -> Result<String, SessionError> {
        self.page.title().await.map_err(backend_error)
    }

    async fn count(&self, query: &Query) -> Result<usize, SessionError> {
        self.locator(query)
            .await
            .count()
            .await
            .map_err(|err| action_error("count", query, err))
    }

    async fn text(&self, query: &Query) -> Result<Option<String>, SessionError> {
        let locator = self.locator(query).await;
        let found = locator
            .count()
            .await
            .map_err(|err| action_error("text_content", query, err))?;
        if found == 0 {
            return Ok(None);
        }
        locator
            .text_content()
            .await
            .map_err(|err| action_error("text_content", query, err))
    }

    async fn texts(&self, query: &Query) -> Result<Vec<String>, SessionError> {
        let found = self.count(query).await?;
        let mut texts = Vec::with_capacity(found);
        for i in 0..found {
            let text = self
                .locator(&query.nth(i))
                .await
                .text_content()
                .await
                .map_err(|err| action_error("text_content", query, err))?;
            texts.push(text.unwrap_or_default());
        }
        Ok(texts)
    }

    async fn attribute(&self, query: &Query, name: &str) -> Result<Option<String>, SessionError> {
        let locator = self.locator(query).await;
        let found = locator
            .count()
            .await
            .map_err(|err| action_error("get_attribute", query, err))?;
        if found == 0 {
            return Ok(None);
        }
        locator
            .get_attribute(name)
            .await
            .map_err(|err| action_error("get_attribute", query, err))
    }

    async fn is_visible(&self, query: &Query) -> Result<bool, SessionError> {
        self.locator(query)
            .await
            .is_visible()
            .await
            .map_err(|err| action_error("is_visible", query, err))
    }

    async fn click(&self, query: &Query, mode: ClickMode) -> Result<(), SessionError> {
        let options = match mode {
            ClickMode::Normal => None,
            ClickMode::Force => Some(ClickOptions {
                force: Some(true),
                ..Default::default()
            }),
        };
        self.locator(query)
            .await
            .click(options)
            .await
            .map_err(|err| action_error("click", query, err))
    }

    async fn fill(&self, query: &Query, value: &str) -> Result<(), SessionError> {
        self.locator(query)
            .await
            .fill(value, None)
            .await
            .map_err(|err| action_error("fill", query, err))
    }

    async fn select_option(&self, query: &Query, value: &str) -> Result<(), SessionError> {
        self.locator(query)
            .await
            .select_option(value, None)
            .await
            .map(|_| ())
            .map_err(|err| action_error("select_option", query, err))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, SessionError> {
        self.page.screenshot(None).await.map_err(backend_error)
    }
}
