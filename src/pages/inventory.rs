use tracing::debug;

use super::{BasePage, NavState, PageKind};
use crate::config::HarnessConfig;
use crate::error::HarnessResult;
use crate::locator::{LocatorKey, LocatorMap, Query};
use crate::poll::Poll;
use crate::product::{Price, ProductRecord, SortOrder};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InventoryKey {
    List,
    Row,
    Name,
    Description,
    Price,
    Image,
    AddButton,
    RemoveButton,
    ItemButton,
    SortSelect,
    CartBadge,
    CartLink,
}

impl LocatorKey for InventoryKey {
    const ALL: &'static [Self] = &[
        InventoryKey::List,
        InventoryKey::Row,
        InventoryKey::Name,
        InventoryKey::Description,
        InventoryKey::Price,
        InventoryKey::Image,
        InventoryKey::AddButton,
        InventoryKey::RemoveButton,
        InventoryKey::ItemButton,
        InventoryKey::SortSelect,
        InventoryKey::CartBadge,
        InventoryKey::CartLink,
    ];

    fn name(self) -> &'static str {
        match self {
            InventoryKey::List => "inventory_list",
            InventoryKey::Row => "item_row",
            InventoryKey::Name => "item_name",
            InventoryKey::Description => "item_description",
            InventoryKey::Price => "item_price",
            InventoryKey::Image => "item_image",
            InventoryKey::AddButton => "add_to_cart_button",
            InventoryKey::RemoveButton => "remove_button",
            InventoryKey::ItemButton => "item_button",
            InventoryKey::SortSelect => "sort_dropdown",
            InventoryKey::CartBadge => "cart_badge",
            InventoryKey::CartLink => "cart_link",
        }
    }

    fn query(self) -> Query {
        match self {
            InventoryKey::List => Query::css(".inventory_list"),
            InventoryKey::Row => Query::css("div.inventory_item"),
            InventoryKey::Name => Query::css(".inventory_item_name"),
            InventoryKey::Description => Query::css(".inventory_item_desc"),
            InventoryKey::Price => Query::css(".inventory_item_price"),
            InventoryKey::Image => Query::css("img"),
            InventoryKey::AddButton => Query::css(".btn_primary.btn_inventory"),
            InventoryKey::RemoveButton => Query::css(".btn_secondary.btn_inventory"),
            InventoryKey::ItemButton => Query::css(".btn_inventory"),
            InventoryKey::SortSelect => Query::css(".product_sort_container"),
            InventoryKey::CartBadge => Query::css(".shopping_cart_badge"),
            InventoryKey::CartLink => Query::css(".shopping_cart_link"),
        }
    }
}

/// Snapshot of the inventory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryState {
    pub products: Vec<ProductRecord>,
    pub cart_count: usize,
}

pub struct InventoryPage<'s, S: Session + ?Sized> {
    base: BasePage<'s, S>,
    locators: LocatorMap<InventoryKey>,
}

impl<'s, S: Session + ?Sized> InventoryPage<'s, S> {
    pub fn new(session: &'s S, config: &'s HarnessConfig) -> Self {
        Self {
            base: BasePage::new(session, config, PageKind::Inventory),
            locators: LocatorMap::new(PageKind::Inventory.name()),
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
            .wait_ready(self.locators.get(InventoryKey::Row)?, InventoryKey::Row.name())
            .await?;
        Ok(())
    }

    fn row(&self, index: usize) -> HarnessResult<Query> {
        Ok(self.locators.get(InventoryKey::Row)?.nth(index))
    }

    fn in_row(&self, index: usize, key: InventoryKey) -> HarnessResult<Query> {
        Ok(self.row(index)?.within(self.locators.get(key)?))
    }

    /// Products and cart count, once at least one row has rendered
    pub async fn read_state(&self) -> HarnessResult<InventoryState> {
        self.wait_ready().await?;
        Ok(InventoryState {
            products: self.products().await?,
            cart_count: self.cart_count().await?,
        })
    }

    pub async fn product_count(&self) -> HarnessResult<usize> {
        self.base
            .count(self.locators.get(InventoryKey::Row)?)
            .await
    }

    /// Full records in display order
    pub async fn products(&self) -> HarnessResult<Vec<ProductRecord>> {
        let rows = self.product_count().await?;
        let mut products = Vec::with_capacity(rows);
        for i in 0..rows {
            products.push(self.product(i).await?);
        }
        Ok(products)
    }

    async fn product(&self, index: usize) -> HarnessResult<ProductRecord> {
        let name = self
            .base
            .text_of(&self.in_row(index, InventoryKey::Name)?, InventoryKey::Name.name())
            .await?;
        let description = self
            .base
            .text_of(
                &self.in_row(index, InventoryKey::Description)?,
                InventoryKey::Description.name(),
            )
            .await?;
        let price = self
            .base
            .text_of(&self.in_row(index, InventoryKey::Price)?, InventoryKey::Price.name())
            .await?
            .parse()?;
        let image_reference = self
            .base
            .session()
            .attribute(&self.in_row(index, InventoryKey::Image)?, "src")
            .await?
            .unwrap_or_default();
        Ok(ProductRecord {
            name,
            description,
            price,
            image_reference,
        })
    }

    pub async fn product_names(&self) -> HarnessResult<Vec<String>> {
        let names = self
            .base
            .session()
            .texts(self.locators.get(InventoryKey::Name)?)
            .await?;
        Ok(names.into_iter().map(|n| n.trim().to_string()).collect())
    }

    pub async fn product_prices(&self) -> HarnessResult<Vec<Price>> {
        self.base
            .session()
            .texts(self.locators.get(InventoryKey::Price)?)
            .await?
            .iter()
            .map(|text| text.parse())
            .collect()
    }

    /// Items in the cart according to the header badge
    pub async fn cart_count(&self) -> HarnessResult<usize> {
        self.base
            .badge_count(self.locators.get(InventoryKey::CartBadge)?)
            .await
    }

    /// Whether the header badge is rendered at all
    pub async fn cart_badge_visible(&self) -> HarnessResult<bool> {
        let badge = self.locators.get(InventoryKey::CartBadge)?;
        Ok(self.base.session().is_visible(badge).await?)
    }

    /// Label of a row's cart button (`ADD TO CART` or `REMOVE`)
    pub async fn button_label(&self, index: usize) -> HarnessResult<String> {
        self.base
            .text_of(
                &self.in_row(index, InventoryKey::ItemButton)?,
                InventoryKey::ItemButton.name(),
            )
            .await
    }

    /// Add the product in row `index` and wait for the badge to count it
    pub async fn add_item(&self, index: usize) -> HarnessResult<usize> {
        self.toggle_item(index, InventoryKey::AddButton, true).await
    }

    /// Remove the product in row `index` and wait for the badge to drop
    pub async fn remove_item(&self, index: usize) -> HarnessResult<usize> {
        self.toggle_item(index, InventoryKey::RemoveButton, false).await
    }

    pub async fn add_item_by_name(&self, name: &str) -> HarnessResult<usize> {
        let names = self.product_names().await?;
        let Some(index) = names.iter().position(|n| n == name) else {
            return Err(self
                .base
                .not_found(
                    InventoryKey::Name.name(),
                    format!("{} with text {name:?}", InventoryKey::Name.query()),
                )
                .await);
        };
        self.add_item(index).await
    }

    async fn toggle_item(
        &self,
        index: usize,
        button: InventoryKey,
        adding: bool,
    ) -> HarnessResult<usize> {
        let rows = self.product_count().await?;
        if index >= rows {
            return Err(self
                .base
                .not_found(InventoryKey::Row.name(), self.row(index)?.to_string())
                .await);
        }

        let before = self.cart_count().await?;
        let expected = match (adding, before.checked_sub(1)) {
            (true, _) => before + 1,
            (false, Some(fewer)) => fewer,
            (false, None) => {
                return Err(self
                    .base
                    .unexpected(format!("remove_item({index}) with an empty cart"))
                    .await);
            }
        };

        self.base
            .click(&self.in_row(index, button)?, button.name())
            .await?;

        let action = if adding {
            format!("add_item({index})")
        } else {
            format!("remove_item({index})")
        };
        debug!(action = %action, before, expected, "waiting for cart badge");

        let poll = Poll::transition(&self.base.config().timeouts);
        match poll
            .until_eq(&format!("cart badge {expected}"), || self.cart_count(), expected)
            .await
        {
            Ok(count) => Ok(count),
            Err(err) => Err(self
                .base
                .transition_failed(err, &action, format!("cart badge {expected}"))
                .await),
        }
    }

    /// Pick a sort option and wait until the listing is ordered by it.
    /// Returns the listing as rendered afterwards.
    pub async fn sort(&self, order: SortOrder) -> HarnessResult<Vec<ProductRecord>> {
        let select = self.locators.get(InventoryKey::SortSelect)?;
        self.base
            .require(select, InventoryKey::SortSelect.name())
            .await?;
        self.base
            .session()
            .select_option(select, order.option_value())
            .await?;

        let poll = Poll::transition(&self.base.config().timeouts);
        let sorted = poll
            .until(
                &format!("listing sorted {order}"),
                || self.products(),
                |products: &Vec<ProductRecord>| !products.is_empty() && order.is_sorted(products),
            )
            .await;
        match sorted {
            Ok(products) => Ok(products),
            Err(err) => Err(self
                .base
                .transition_failed(err, &format!("sort({order})"), format!("{order} order"))
                .await),
        }
    }

    /// Open the cart through the header link
    pub async fn go_to_cart(&self) -> HarnessResult<()> {
        self.base.ensure_can_transition(NavState::Cart).await?;
        let link = self.locators.get(InventoryKey::CartLink)?;
        self.base.click(link, InventoryKey::CartLink.name()).await?;
        self.base
            .expect_state(
                "go_to_cart",
                NavState::Cart,
                self.base.config().timeouts.navigation(),
            )
            .await
    }
}
