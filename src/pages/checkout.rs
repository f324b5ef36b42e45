use super::{BasePage, PageKind};
use crate::config::HarnessConfig;
use crate::error::HarnessResult;
use crate::locator::{LocatorKey, LocatorMap, Query};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckoutKey {
    FirstName,
    LastName,
    PostalCode,
}

impl LocatorKey for CheckoutKey {
    const ALL: &'static [Self] = &[
        CheckoutKey::FirstName,
        CheckoutKey::LastName,
        CheckoutKey::PostalCode,
    ];

    fn name(self) -> &'static str {
        match self {
            CheckoutKey::FirstName => "first_name_field",
            CheckoutKey::LastName => "last_name_field",
            CheckoutKey::PostalCode => "postal_code_field",
        }
    }

    fn query(self) -> Query {
        match self {
            CheckoutKey::FirstName => Query::css("#first-name"),
            CheckoutKey::LastName => Query::css("#last-name"),
            CheckoutKey::PostalCode => Query::css("#postal-code"),
        }
    }
}

/// Which of the customer information fields are showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckoutInfoState {
    pub first_name: bool,
    pub last_name: bool,
    pub postal_code: bool,
}

impl CheckoutInfoState {
    pub fn form_ready(&self) -> bool {
        self.first_name && self.last_name && self.postal_code
    }
}

/// First checkout step. Only the hand-off into it is exercised.
pub struct CheckoutInfoPage<'s, S: Session + ?Sized> {
    base: BasePage<'s, S>,
    locators: LocatorMap<CheckoutKey>,
}

impl<'s, S: Session + ?Sized> CheckoutInfoPage<'s, S> {
    pub fn new(session: &'s S, config: &'s HarnessConfig) -> Self {
        Self {
            base: BasePage::new(session, config, PageKind::CheckoutInfo),
            locators: LocatorMap::new(PageKind::CheckoutInfo.name()),
        }
    }

    pub fn base(&self) -> &BasePage<'s, S> {
        &self.base
    }

    pub async fn navigate(&self) -> HarnessResult<()> {
        self.base.navigate().await?;
        self.wait_ready().await
    }

    async fn wait_ready(&self) -> HarnessResult<()> {
        self.base
            .wait_ready(
                self.locators.get(CheckoutKey::FirstName)?,
                CheckoutKey::FirstName.name(),
            )
            .await?;
        Ok(())
    }

    pub async fn read_state(&self) -> HarnessResult<CheckoutInfoState> {
        self.wait_ready().await?;
        let session = self.base.session();
        Ok(CheckoutInfoState {
            first_name: session
                .is_visible(self.locators.get(CheckoutKey::FirstName)?)
                .await?,
            last_name: session
                .is_visible(self.locators.get(CheckoutKey::LastName)?)
                .await?,
            postal_code: session
                .is_visible(self.locators.get(CheckoutKey::PostalCode)?)
                .await?,
        })
    }
}
