//! Page objects for the demo storefront
//!
//! Every page object borrows a [`Session`] for its whole lifetime and keeps no
//! other mutable state. Actions perform one user-level interaction and then
//! wait for the transition they are supposed to cause, so callers see them as
//! synchronous.
//!
//! Session-level navigation follows a small state machine:
//!
//! ```text
//! LOGGED_OUT -> LOGGING_IN -> INVENTORY | LOGIN_ERROR
//! LOGIN_ERROR -> LOGGING_IN
//! INVENTORY -> CART -> CHECKOUT_INFO
//! CART -> INVENTORY
//! ```

mod cart;
mod checkout;
mod inventory;
mod login;

pub use cart::{CartKey, CartPage, CartState};
pub use checkout::{CheckoutInfoPage, CheckoutInfoState, CheckoutKey};
pub use inventory::{InventoryKey, InventoryPage, InventoryState};
pub use login::{LoginKey, LoginPage, LoginReport, LoginState};

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::config::HarnessConfig;
use crate::error::{Diagnostics, HarnessError, HarnessResult};
use crate::locator::{LocatorKey, Query};
use crate::poll::Poll;
use crate::session::{ClickMode, Session};

/// Document title every page of the storefront carries
pub const SITE_TITLE: &str = "Swag Labs";

/// Logical pages of the storefront and their fixed addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    Login,
    Inventory,
    Cart,
    CheckoutInfo,
}

impl PageKind {
    pub const ALL: [PageKind; 4] = [
        PageKind::Login,
        PageKind::Inventory,
        PageKind::Cart,
        PageKind::CheckoutInfo,
    ];

    pub fn path(self) -> &'static str {
        match self {
            PageKind::Login => "index.html",
            PageKind::Inventory => "inventory.html",
            PageKind::Cart => "cart.html",
            PageKind::CheckoutInfo => "checkout-step-one.html",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PageKind::Login => "login",
            PageKind::Inventory => "inventory",
            PageKind::Cart => "cart",
            PageKind::CheckoutInfo => "checkout-info",
        }
    }

    /// Identify a page from a location, ignoring query string and fragment
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let file = path.rsplit('/').next().unwrap_or(path);
        PageKind::ALL.into_iter().find(|page| page.path() == file)
    }
}

/// Session-level navigation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavState {
    LoggedOut,
    LoggingIn,
    Inventory,
    LoginError,
    Cart,
    CheckoutInfo,
}

impl NavState {
    /// Whether an explicit action may move the session from `self` to `next`
    pub fn can_transition_to(self, next: NavState) -> bool {
        use NavState::*;
        matches!(
            (self, next),
            (LoggedOut, LoggingIn)
                | (LoginError, LoggingIn)
                | (LoggingIn, Inventory)
                | (LoggingIn, LoginError)
                | (Inventory, Cart)
                | (Cart, CheckoutInfo)
                | (Cart, Inventory)
        )
    }

    /// Derive the state from what the page shows. `LoggingIn` is never
    /// observed; it only exists between submitting and the outcome.
    pub fn observe(page: Option<PageKind>, error_banner: bool) -> Option<Self> {
        match page? {
            PageKind::Login if error_banner => Some(NavState::LoginError),
            PageKind::Login => Some(NavState::LoggedOut),
            PageKind::Inventory => Some(NavState::Inventory),
            PageKind::Cart => Some(NavState::Cart),
            PageKind::CheckoutInfo => Some(NavState::CheckoutInfo),
        }
    }
}

impl fmt::Display for NavState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NavState::LoggedOut => "LOGGED_OUT",
            NavState::LoggingIn => "LOGGING_IN",
            NavState::Inventory => "INVENTORY",
            NavState::LoginError => "LOGIN_ERROR",
            NavState::Cart => "CART",
            NavState::CheckoutInfo => "CHECKOUT_INFO",
        };
        f.write_str(name)
    }
}

/// Behaviour shared by every page object
pub struct BasePage<'s, S: Session + ?Sized> {
    session: &'s S,
    config: &'s HarnessConfig,
    kind: PageKind,
}

impl<'s, S: Session + ?Sized> BasePage<'s, S> {
    pub fn new(session: &'s S, config: &'s HarnessConfig, kind: PageKind) -> Self {
        Self {
            session,
            config,
            kind,
        }
    }

    pub fn session(&self) -> &'s S {
        self.session
    }

    pub fn config(&self) -> &'s HarnessConfig {
        self.config
    }

    pub fn kind(&self) -> PageKind {
        self.kind
    }

    pub fn url(&self) -> String {
        self.config.url_for(self.kind)
    }

    /// Load the page's canonical address and confirm the browser stayed there
    pub async fn navigate(&self) -> HarnessResult<()> {
        let expected = self.url();
        debug!(page = self.kind.name(), url = %expected, "navigating");
        self.session.goto(&expected).await?;

        let poll = Poll::new(
            self.config.timeouts.navigation(),
            self.config.timeouts.poll_interval(),
        );
        let arrived = poll
            .until(
                &format!("location {expected}"),
                || async { self.session.current_url().await.map_err(HarnessError::from) },
                |url: &String| PageKind::from_url(url) == Some(self.kind),
            )
            .await;

        match arrived {
            Ok(_) => Ok(()),
            Err(HarnessError::AssertionTimeout { .. }) => Err(HarnessError::Navigation {
                expected,
                diagnostics: self.diagnostics().await,
            }),
            Err(err) => Err(err),
        }
    }

    pub async fn title(&self) -> HarnessResult<String> {
        Ok(self.session.title().await?)
    }

    pub async fn current_url(&self) -> HarnessResult<String> {
        Ok(self.session.current_url().await?)
    }

    /// Current navigation state as shown by the location and login banner
    pub async fn current_state(&self) -> HarnessResult<Option<NavState>> {
        let url = self.session.current_url().await?;
        let page = PageKind::from_url(&url);
        let banner = match page {
            Some(PageKind::Login) => {
                self.session
                    .is_visible(&LoginKey::ErrorBanner.query())
                    .await?
            }
            _ => false,
        };
        Ok(NavState::observe(page, banner))
    }

    /// Fail unless the session may move from its current state to `next`
    pub async fn ensure_can_transition(&self, next: NavState) -> HarnessResult<NavState> {
        let current = self.current_state().await?;
        match current {
            Some(state) if state.can_transition_to(next) => Ok(state),
            other => Err(HarnessError::UnexpectedState {
                page: self.kind.name(),
                detail: format!(
                    "cannot go to {next} from {}",
                    other.map_or_else(|| "an unknown page".to_string(), |s| s.to_string())
                ),
                diagnostics: self.diagnostics().await,
            }),
        }
    }

    /// Wait until the session reports `expected`
    pub async fn expect_state(
        &self,
        action: &str,
        expected: NavState,
        timeout: Duration,
    ) -> HarnessResult<()> {
        let poll = Poll::new(timeout, self.config.timeouts.poll_interval());
        let result = poll
            .until(
                &format!("{action} to reach {expected}"),
                || self.current_state(),
                |state| *state == Some(expected),
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(err) => Err(self.transition_failed(err, action, expected.to_string()).await),
        }
    }

    /// Wait for at least one match of a readiness query
    pub async fn wait_ready(&self, query: &Query, key: &'static str) -> HarnessResult<usize> {
        self.wait_present(query, key, self.config.timeouts.navigation())
            .await
    }

    /// Wait briefly for an element an action needs
    pub async fn require(&self, query: &Query, key: &'static str) -> HarnessResult<usize> {
        self.wait_present(query, key, self.config.timeouts.transition())
            .await
    }

    async fn wait_present(
        &self,
        query: &Query,
        key: &'static str,
        timeout: Duration,
    ) -> HarnessResult<usize> {
        let poll = Poll::new(timeout, self.config.timeouts.poll_interval());
        let found = poll
            .until(
                key,
                || async { self.session.count(query).await.map_err(HarnessError::from) },
                |count| *count > 0,
            )
            .await;
        match found {
            Err(HarnessError::AssertionTimeout { .. }) => {
                Err(self.not_found(key, query.to_string()).await)
            }
            other => other,
        }
    }

    pub async fn count(&self, query: &Query) -> HarnessResult<usize> {
        Ok(self.session.count(query).await?)
    }

    /// Text of a required element
    pub async fn text_of(&self, query: &Query, key: &'static str) -> HarnessResult<String> {
        match self.session.text(query).await? {
            Some(text) => Ok(text.trim().to_string()),
            None => Err(self.not_found(key, query.to_string()).await),
        }
    }

    /// Click a required element.
    ///
    /// A click the browser rejects is retried exactly once with `force` when
    /// the config allows it. A click that went through is never repeated.
    pub async fn click(&self, query: &Query, key: &'static str) -> HarnessResult<()> {
        self.require(query, key).await?;
        match self.session.click(query, ClickMode::Normal).await {
            Ok(()) => Ok(()),
            Err(err) if self.config.force_click_fallback => {
                warn!(
                    page = self.kind.name(),
                    key,
                    error = %err,
                    "click rejected, retrying once with force"
                );
                Ok(self.session.click(query, ClickMode::Force).await?)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Cart badge count; an absent badge means an empty cart
    pub async fn badge_count(&self, badge: &Query) -> HarnessResult<usize> {
        if !self.session.is_visible(badge).await? {
            return Ok(0);
        }
        let text = self.session.text(badge).await?.unwrap_or_default();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(0);
        }
        match trimmed.parse() {
            Ok(count) => Ok(count),
            Err(_) => Err(self.unexpected(format!("cart badge shows {trimmed:?}")).await),
        }
    }

    /// `ElementNotFound` for this page, with diagnostics
    pub async fn not_found(&self, key: &'static str, query: String) -> HarnessError {
        HarnessError::ElementNotFound {
            page: self.kind.name(),
            key,
            query,
            diagnostics: self.diagnostics().await,
        }
    }

    /// `UnexpectedState` for this page, with diagnostics
    pub async fn unexpected(&self, detail: impl Into<String>) -> HarnessError {
        let detail = detail.into();
        HarnessError::UnexpectedState {
            page: self.kind.name(),
            detail,
            diagnostics: self.diagnostics().await,
        }
    }

    /// Turn a polling timeout into the action-level error
    pub async fn transition_failed(
        &self,
        err: HarnessError,
        action: &str,
        expected: String,
    ) -> HarnessError {
        match err {
            HarnessError::AssertionTimeout {
                last_observed,
                elapsed,
                ..
            } => HarnessError::TransitionTimeout {
                action: action.to_string(),
                expected,
                observed: last_observed,
                elapsed,
                diagnostics: self.diagnostics().await,
            },
            other => other,
        }
    }

    /// Best-effort snapshot of where the session is. Never fails.
    pub async fn diagnostics(&self) -> Diagnostics {
        let url = self.session.current_url().await.ok();
        let screenshot = match &self.config.artifacts_dir {
            Some(dir) => self.capture(dir).await,
            None => None,
        };
        Diagnostics { url, screenshot }
    }

    async fn capture(&self, dir: &Path) -> Option<PathBuf> {
        let bytes = match self.session.screenshot().await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "screenshot failed");
                return None;
            }
        };
        if let Err(err) = tokio::fs::create_dir_all(dir).await {
            warn!(error = %err, dir = %dir.display(), "cannot create artifacts dir");
            return None;
        }
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let path = dir.join(format!("{}-{stamp}.png", self.kind.name()));
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => Some(path),
            Err(err) => {
                warn!(error = %err, path = %path.display(), "cannot write screenshot");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_kind_from_url_ignores_query_and_fragment() {
        assert_eq!(
            PageKind::from_url("https://www.saucedemo.com/v1/cart.html?x=1#top"),
            Some(PageKind::Cart)
        );
        assert_eq!(
            PageKind::from_url("https://www.saucedemo.com/v1/index.html"),
            Some(PageKind::Login)
        );
        assert_eq!(PageKind::from_url("https://www.saucedemo.com/v1/"), None);
    }

    #[test]
    fn navigation_state_machine_allows_only_listed_edges() {
        use NavState::*;
        assert!(LoggedOut.can_transition_to(LoggingIn));
        assert!(LoggingIn.can_transition_to(Inventory));
        assert!(LoggingIn.can_transition_to(LoginError));
        assert!(LoginError.can_transition_to(LoggingIn));
        assert!(Inventory.can_transition_to(Cart));
        assert!(Cart.can_transition_to(CheckoutInfo));
        assert!(Cart.can_transition_to(Inventory));

        assert!(!LoggedOut.can_transition_to(Inventory));
        assert!(!Inventory.can_transition_to(CheckoutInfo));
        assert!(!CheckoutInfo.can_transition_to(Cart));
        assert!(!Inventory.can_transition_to(Inventory));
    }

    #[test]
    fn login_banner_distinguishes_error_state() {
        assert_eq!(
            NavState::observe(Some(PageKind::Login), true),
            Some(NavState::LoginError)
        );
        assert_eq!(
            NavState::observe(Some(PageKind::Login), false),
            Some(NavState::LoggedOut)
        );
        assert_eq!(
            NavState::observe(Some(PageKind::Cart), true),
            Some(NavState::Cart)
        );
        assert_eq!(NavState::observe(None, false), None);
    }
}
