use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use super::{BasePage, NavState, PageKind};
use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::locator::{LocatorKey, LocatorMap, Query};
use crate::persona::Credentials;
use crate::poll::Poll;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginKey {
    Username,
    Password,
    Submit,
    ErrorBanner,
    ErrorDismiss,
}

impl LocatorKey for LoginKey {
    const ALL: &'static [Self] = &[
        LoginKey::Username,
        LoginKey::Password,
        LoginKey::Submit,
        LoginKey::ErrorBanner,
        LoginKey::ErrorDismiss,
    ];

    fn name(self) -> &'static str {
        match self {
            LoginKey::Username => "username_field",
            LoginKey::Password => "password_field",
            LoginKey::Submit => "login_button",
            LoginKey::ErrorBanner => "error_banner",
            LoginKey::ErrorDismiss => "error_dismiss_button",
        }
    }

    fn query(self) -> Query {
        match self {
            LoginKey::Username => Query::css("input[placeholder=\"Username\"]"),
            LoginKey::Password => Query::css("input[placeholder=\"Password\"]"),
            LoginKey::Submit => Query::css("#login-button"),
            LoginKey::ErrorBanner => Query::css("[data-test=\"error\"]"),
            LoginKey::ErrorDismiss => Query::css(".error-button"),
        }
    }
}

/// Snapshot of the login form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginState {
    pub title: String,
    /// Banner text, when one is showing
    pub error: Option<String>,
}

/// Outcome of a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginReport {
    pub username: String,
    /// From pressing the button to landing on the inventory page
    pub elapsed: Duration,
}

pub struct LoginPage<'s, S: Session + ?Sized> {
    base: BasePage<'s, S>,
    locators: LocatorMap<LoginKey>,
}

impl<'s, S: Session + ?Sized> LoginPage<'s, S> {
    pub fn new(session: &'s S, config: &'s HarnessConfig) -> Self {
        Self {
            base: BasePage::new(session, config, PageKind::Login),
            locators: LocatorMap::new(PageKind::Login.name()),
        }
    }

    pub fn base(&self) -> &BasePage<'s, S> {
        &self.base
    }

    pub async fn navigate(&self) -> HarnessResult<()> {
        self.base.navigate().await?;
        self.base
            .wait_ready(self.locators.get(LoginKey::Submit)?, LoginKey::Submit.name())
            .await?;
        Ok(())
    }

    pub async fn read_state(&self) -> HarnessResult<LoginState> {
        self.base
            .wait_ready(self.locators.get(LoginKey::Submit)?, LoginKey::Submit.name())
            .await?;
        Ok(LoginState {
            title: self.base.title().await?,
            error: self.error_message().await?,
        })
    }

    /// Banner text if the banner is visible
    pub async fn error_message(&self) -> HarnessResult<Option<String>> {
        let banner = self.locators.get(LoginKey::ErrorBanner)?;
        if !self.base.session().is_visible(banner).await? {
            return Ok(None);
        }
        Ok(self
            .base
            .session()
            .text(banner)
            .await?
            .map(|text| text.trim().to_string()))
    }

    /// Close the error banner and wait for it to go away
    pub async fn dismiss_error(&self) -> HarnessResult<()> {
        let dismiss = self.locators.get(LoginKey::ErrorDismiss)?;
        self.base.click(dismiss, LoginKey::ErrorDismiss.name()).await?;

        let banner = self.locators.get(LoginKey::ErrorBanner)?;
        let poll = Poll::transition(&self.base.config().timeouts);
        let result = poll
            .until_eq(
                "error banner to close",
                || async {
                    self.base
                        .session()
                        .is_visible(banner)
                        .await
                        .map_err(HarnessError::from)
                },
                false,
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(err) => Err(self
                .base
                .transition_failed(err, "dismiss_error", "no error banner".to_string())
                .await),
        }
    }

    /// Submit credentials and wait for either the inventory page or an error
    /// banner. A banner is reported as [`HarnessError::UnexpectedState`]
    /// carrying its text.
    pub async fn login(&self, credentials: Credentials<'_>) -> HarnessResult<LoginReport> {
        self.base.ensure_can_transition(NavState::LoggingIn).await?;

        let username = self.locators.get(LoginKey::Username)?;
        let password = self.locators.get(LoginKey::Password)?;
        let submit = self.locators.get(LoginKey::Submit)?;

        self.base
            .require(username, LoginKey::Username.name())
            .await?;
        self.base
            .session()
            .fill(username, credentials.username)
            .await?;
        self.base
            .session()
            .fill(password, credentials.password)
            .await?;

        debug!(username = credentials.username, "submitting login");
        let started = Instant::now();
        self.base.click(submit, LoginKey::Submit.name()).await?;

        let poll = Poll::new(
            self.base.config().timeouts.login(),
            self.base.config().timeouts.poll_interval(),
        );
        let settled = poll
            .until(
                "login outcome",
                || self.base.current_state(),
                |state| matches!(state, Some(NavState::Inventory | NavState::LoginError)),
            )
            .await;

        match settled {
            Ok(Some(NavState::Inventory)) => {
                let elapsed = started.elapsed();
                info!(
                    username = credentials.username,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "logged in"
                );
                Ok(LoginReport {
                    username: credentials.username.to_string(),
                    elapsed,
                })
            }
            Ok(_) => {
                let detail = self
                    .error_message()
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| "login error banner".to_string());
                Err(HarnessError::UnexpectedState {
                    page: PageKind::Login.name(),
                    detail,
                    diagnostics: self.base.diagnostics().await,
                })
            }
            Err(err) => Err(self
                .base
                .transition_failed(err, "login", NavState::Inventory.to_string())
                .await),
        }
    }
}
