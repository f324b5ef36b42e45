use tracing::debug;

use super::{BasePage, NavState, PageKind};
use crate::config::HarnessConfig;
use crate::error::HarnessResult;
use crate::locator::{LocatorKey, LocatorMap, Query};
use crate::poll::Poll;
use crate::product::CartLineItem;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartKey {
    List,
    Item,
    Name,
    Price,
    RemoveButton,
    ContinueShopping,
    Checkout,
    Subheader,
    CartBadge,
}

impl LocatorKey for CartKey {
    const ALL: &'static [Self] = &[
        CartKey::List,
        CartKey::Item,
        CartKey::Name,
        CartKey::Price,
        CartKey::RemoveButton,
        CartKey::ContinueShopping,
        CartKey::Checkout,
        CartKey::Subheader,
        CartKey::CartBadge,
    ];

    fn name(self) -> &'static str {
        match self {
            CartKey::List => "cart_list",
            CartKey::Item => "cart_item",
            CartKey::Name => "item_name",
            CartKey::Price => "item_price",
            CartKey::RemoveButton => "remove_button",
            CartKey::ContinueShopping => "continue_shopping_button",
            CartKey::Checkout => "checkout_button",
            CartKey::Subheader => "subheader",
            CartKey::CartBadge => "cart_badge",
        }
    }

    fn query(self) -> Query {
        match self {
            CartKey::List => Query::css(".cart_list"),
            CartKey::Item => Query::css(".cart_item"),
            CartKey::Name => Query::css(".inventory_item_name"),
            CartKey::Price => Query::css(".inventory_item_price"),
            CartKey::RemoveButton => Query::css(".btn_secondary.cart_button"),
            CartKey::ContinueShopping => Query::text("Continue Shopping"),
            CartKey::Checkout => Query::text("CHECKOUT"),
            CartKey::Subheader => Query::css(".subheader"),
            CartKey::CartBadge => Query::css(".shopping_cart_badge"),
        }
    }
}

/// Cart rows and the header badge, read together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartState {
    pub items: Vec<CartLineItem>,
    pub badge: usize,
}

impl CartState {
    /// Badge agrees with the number of rows
    pub fn is_consistent(&self) -> bool {
        self.badge == self.items.len()
    }
}

pub struct CartPage<'s, S: Session + ?Sized> {
    base: BasePage<'s, S>,
    locators: LocatorMap<CartKey>,
}

impl<'s, S: Session + ?Sized> CartPage<'s, S> {
    pub fn new(session: &'s S, config: &'s HarnessConfig) -> Self {
        Self {
            base: BasePage::new(session, config, PageKind::Cart),
            locators: LocatorMap::new(PageKind::Cart.name()),
        }
    }

    pub fn base(&self) -> &BasePage<'s, S> {
        &self.base
    }

    pub async fn navigate(&self) -> HarnessResult<()> {
        self.base.navigate().await?;
        self.wait_ready().await
    }

    // An empty cart still renders the list container.
    async fn wait_ready(&self) -> HarnessResult<()> {
        self.base
            .wait_ready(self.locators.get(CartKey::List)?, CartKey::List.name())
            .await?;
        Ok(())
    }

    fn in_item(&self, index: usize, key: CartKey) -> HarnessResult<Query> {
        Ok(self
            .locators
            .get(CartKey::Item)?
            .nth(index)
            .within(self.locators.get(key)?))
    }

    pub async fn subheader(&self) -> HarnessResult<String> {
        self.base
            .text_of(self.locators.get(CartKey::Subheader)?, CartKey::Subheader.name())
            .await
    }

    pub async fn item_count(&self) -> HarnessResult<usize> {
        self.base.count(self.locators.get(CartKey::Item)?).await
    }

    pub async fn items(&self) -> HarnessResult<Vec<CartLineItem>> {
        let rows = self.item_count().await?;
        let mut items = Vec::with_capacity(rows);
        for i in 0..rows {
            let name = self
                .base
                .text_of(&self.in_item(i, CartKey::Name)?, CartKey::Name.name())
                .await?;
            let price = self
                .base
                .text_of(&self.in_item(i, CartKey::Price)?, CartKey::Price.name())
                .await?
                .parse()?;
            items.push(CartLineItem { name, price });
        }
        Ok(items)
    }

    pub async fn badge(&self) -> HarnessResult<usize> {
        self.base
            .badge_count(self.locators.get(CartKey::CartBadge)?)
            .await
    }

    pub async fn read_state(&self) -> HarnessResult<CartState> {
        self.wait_ready().await?;
        Ok(CartState {
            items: self.items().await?,
            badge: self.badge().await?,
        })
    }

    /// Remove row `index` and wait until both the rows and the badge reflect it
    pub async fn remove_item(&self, index: usize) -> HarnessResult<CartState> {
        let before = self.read_state().await?;
        if index >= before.items.len() {
            let query = self.locators.get(CartKey::Item)?.nth(index).to_string();
            return Err(self.base.not_found(CartKey::Item.name(), query).await);
        }
        let expected = before.items.len() - 1;

        self.base
            .click(
                &self.in_item(index, CartKey::RemoveButton)?,
                CartKey::RemoveButton.name(),
            )
            .await?;
        debug!(index, expected, "waiting for cart row removal");

        let poll = Poll::transition(&self.base.config().timeouts);
        let settled = poll
            .until(
                &format!("{expected} cart rows"),
                || self.read_state(),
                |state: &CartState| state.items.len() == expected && state.is_consistent(),
            )
            .await;
        match settled {
            Ok(state) => Ok(state),
            Err(err) => Err(self
                .base
                .transition_failed(
                    err,
                    &format!("remove_item({index})"),
                    format!("{expected} cart rows"),
                )
                .await),
        }
    }

    /// Back to the inventory listing
    pub async fn continue_shopping(&self) -> HarnessResult<()> {
        self.leave("continue_shopping", CartKey::ContinueShopping, NavState::Inventory)
            .await
    }

    /// On to the checkout information form
    pub async fn checkout(&self) -> HarnessResult<()> {
        self.leave("checkout", CartKey::Checkout, NavState::CheckoutInfo)
            .await
    }

    async fn leave(&self, action: &str, button: CartKey, next: NavState) -> HarnessResult<()> {
        self.base.ensure_can_transition(next).await?;
        self.base
            .click(self.locators.get(button)?, button.name())
            .await?;
        self.base
            .expect_state(action, next, self.base.config().timeouts.navigation())
            .await
    }
}
