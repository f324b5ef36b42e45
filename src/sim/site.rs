//! State machine and page rendering for the simulated storefront

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use super::SimOptions;
use super::dom::{Action, Node};
use crate::pages::{PageKind, SITE_TITLE};
use crate::persona::SHARED_PASSWORD;
use crate::product::SortOrder;

const BROKEN_IMAGE: &str = "./img/sl-404.168b1cce.jpg";

struct Item {
    name: &'static str,
    description: &'static str,
    cents: u32,
    image: &'static str,
}

const CATALOG: [Item; 6] = [
    Item {
        name: "Sauce Labs Backpack",
        description: "carry.allTheThings() with the sleek, streamlined Sly Pack that melds uncompromising style with unequaled laptop and tablet protection.",
        cents: 2999,
        image: "./img/sauce-backpack-1200x1500.jpg",
    },
    Item {
        name: "Sauce Labs Bike Light",
        description: "A red light isn't the desired state in testing but it sure helps when riding your bike at night. Water-resistant with 3 lighting modes, 1 AAA battery included.",
        cents: 999,
        image: "./img/bike-light-1200x1500.jpg",
    },
    Item {
        name: "Sauce Labs Bolt T-Shirt",
        description: "Get your testing superhero on with the Sauce Labs bolt T-shirt. From American Apparel, 100% ringspun combed cotton, heather gray with red bolt.",
        cents: 1599,
        image: "./img/bolt-shirt-1200x1500.jpg",
    },
    Item {
        name: "Sauce Labs Fleece Jacket",
        description: "It's not every day that you come across a midweight quarter-zip fleece jacket capable of handling everything from a relaxing day outdoors to a busy day at the office.",
        cents: 4999,
        image: "./img/sauce-pullover-1200x1500.jpg",
    },
    Item {
        name: "Sauce Labs Onesie",
        description: "Rib snap infant onesie for the junior automation engineer in development. Reinforced 3-snap bottom closure, two-needle hemmed sleeved and bottom won't unravel.",
        cents: 799,
        image: "./img/red-onesie-1200x1500.jpg",
    },
    Item {
        name: "Test.allTheThings() T-Shirt (Red)",
        description: "This classic Sauce Labs t-shirt is perfect to wear when cozying up to your keyboard to automate a few tests. Super-soft and comfy ringspun combed cotton.",
        cents: 1599,
        image: "./img/red-tatt-1200x1500.jpg",
    },
];

/// Seeded accounts the simulated site knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Account {
    Standard,
    LockedOut,
    Problem,
    PerformanceGlitch,
}

impl Account {
    fn from_username(username: &str) -> Option<Self> {
        match username {
            "standard_user" => Some(Account::Standard),
            "locked_out_user" => Some(Account::LockedOut),
            "problem_user" => Some(Account::Problem),
            "performance_glitch_user" => Some(Account::PerformanceGlitch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Blank,
    Page(PageKind),
    NotFound(String),
}

#[derive(Debug, Clone)]
enum Effect {
    Land(PageKind),
    ShowBanner(String),
    CartAdd(usize),
    CartRemove(usize),
    Sort(SortOrder),
}

pub struct Site {
    options: SimOptions,
    origin: String,
    location: Location,
    account: Option<Account>,
    inputs: BTreeMap<String, String>,
    banner: Option<String>,
    cart: Vec<usize>,
    sort: SortOrder,
    pending: Vec<(Instant, Effect)>,
}

impl Site {
    pub fn new(options: SimOptions) -> Self {
        Self {
            options,
            origin: String::new(),
            location: Location::Blank,
            account: None,
            inputs: BTreeMap::new(),
            banner: None,
            cart: Vec::new(),
            sort: SortOrder::NameAsc,
            pending: Vec::new(),
        }
    }

    pub fn url(&self) -> String {
        match &self.location {
            Location::Blank => "about:blank".to_string(),
            Location::Page(page) => format!("{}{}", self.origin, page.path()),
            Location::NotFound(url) => url.clone(),
        }
    }

    pub fn title(&self) -> &'static str {
        match self.location {
            Location::Blank => "",
            Location::Page(_) => SITE_TITLE,
            Location::NotFound(_) => "404 Not Found",
        }
    }

    /// Apply every scheduled effect that is due
    pub fn settle(&mut self) {
        let now = Instant::now();
        self.pending.sort_by_key(|(due, _)| *due);
        let due = self.pending.iter().take_while(|(at, _)| *at <= now).count();
        let effects: Vec<Effect> = self.pending.drain(..due).map(|(_, e)| e).collect();
        for effect in effects {
            trace!(?effect, "sim effect");
            match effect {
                Effect::Land(page) => {
                    self.location = Location::Page(page);
                    self.banner = None;
                }
                Effect::ShowBanner(text) => self.banner = Some(text),
                Effect::CartAdd(item) => {
                    if !self.cart.contains(&item) {
                        self.cart.push(item);
                    }
                }
                Effect::CartRemove(item) => self.cart.retain(|&i| i != item),
                Effect::Sort(order) => self.sort = order,
            }
        }
    }

    fn schedule(&mut self, delay: Duration, effect: Effect) {
        self.pending.push((Instant::now() + delay, effect));
    }

    pub fn goto(&mut self, url: &str) {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if let Some(slash) = path.rfind('/') {
            self.origin = path[..=slash].to_string();
        }
        self.pending.clear();
        self.banner = None;

        let file = path.rsplit('/').next().unwrap_or_default();
        self.location = match PageKind::from_url(url) {
            Some(PageKind::Login) => Location::Page(PageKind::Login),
            Some(page) if self.account.is_none() => {
                self.banner = Some(format!(
                    "Epic sadface: You can only access '/{}' when you are logged in.",
                    page.path()
                ));
                Location::Page(PageKind::Login)
            }
            Some(page) => Location::Page(page),
            None if file.is_empty() => Location::Page(PageKind::Login),
            None => Location::NotFound(url.to_string()),
        };
        self.inputs.clear();
    }

    pub fn fill(&mut self, field: &str, value: &str) {
        self.inputs.insert(field.to_string(), value.to_string());
    }

    pub fn select(&mut self, value: &str) -> Result<(), String> {
        let order: SortOrder = value
            .parse()
            .map_err(|_| format!("no option with value {value:?}"))?;
        self.schedule(self.options.ui_delay, Effect::Sort(order));
        Ok(())
    }

    pub fn click(&mut self, action: Action) {
        let delay = self.options.ui_delay;
        match action {
            Action::Login => self.submit_login(),
            Action::DismissError => self.banner = None,
            Action::AddToCart(item) => self.schedule(delay, Effect::CartAdd(item)),
            Action::RemoveFromCart(item) => {
                let on_cart = self.location == Location::Page(PageKind::Cart);
                if on_cart && self.account == Some(Account::Problem) {
                    trace!(item, "cart removal ignored");
                } else {
                    self.schedule(delay, Effect::CartRemove(item));
                }
            }
            Action::OpenCart => self.schedule(delay, Effect::Land(PageKind::Cart)),
            Action::ContinueShopping => self.schedule(delay, Effect::Land(PageKind::Inventory)),
            Action::Checkout => self.schedule(delay, Effect::Land(PageKind::CheckoutInfo)),
            Action::CancelCheckout => self.schedule(delay, Effect::Land(PageKind::Cart)),
        }
    }

    fn submit_login(&mut self) {
        let username = self.inputs.get("user-name").cloned().unwrap_or_default();
        let password = self.inputs.get("password").cloned().unwrap_or_default();
        self.banner = None;

        let refusal = if username.is_empty() {
            Some("Epic sadface: Username is required")
        } else if password.is_empty() {
            Some("Epic sadface: Password is required")
        } else {
            match Account::from_username(&username) {
                Some(_) if password != SHARED_PASSWORD => {
                    Some("Epic sadface: Username and password do not match any user in this service")
                }
                None => {
                    Some("Epic sadface: Username and password do not match any user in this service")
                }
                Some(Account::LockedOut) => Some("Epic sadface: Sorry, this user has been locked out."),
                Some(account) => {
                    self.account = Some(account);
                    let delay = if account == Account::PerformanceGlitch {
                        self.options.login_delay
                    } else {
                        self.options.ui_delay
                    };
                    self.schedule(delay, Effect::Land(PageKind::Inventory));
                    None
                }
            }
        };
        if let Some(message) = refusal {
            self.schedule(self.options.ui_delay, Effect::ShowBanner(message.to_string()));
        }
    }

    pub fn render(&self) -> Node {
        let body = Node::new("body");
        match &self.location {
            Location::Blank => body,
            Location::NotFound(_) => body.child(Node::new("h1").text("404 Not Found")),
            Location::Page(PageKind::Login) => body.child(self.login_page()),
            Location::Page(page) => body.child(
                Node::new("div")
                    .id("page_wrapper")
                    .class("page_wrapper")
                    .child(self.header())
                    .child(match page {
                        PageKind::Inventory => self.inventory_page(),
                        PageKind::Cart => self.cart_page(),
                        _ => self.checkout_page(),
                    }),
            ),
        }
    }

    fn input(&self, id: &str, kind: &str, placeholder: &str) -> Node {
        Node::new("input")
            .id(id)
            .class("form_input")
            .attr("type", kind)
            .attr("placeholder", placeholder)
            .attr("data-test", id)
            .attr("value", self.inputs.get(id).cloned().unwrap_or_default())
    }

    fn login_page(&self) -> Node {
        let mut form = Node::new("form")
            .child(self.input("user-name", "text", "Username"))
            .child(self.input("password", "password", "Password"));
        if let Some(message) = &self.banner {
            form = form.child(
                Node::new("h3").attr("data-test", "error").text(message.clone()).child(
                    Node::new("button")
                        .class("error-button")
                        .on_click(Action::DismissError),
                ),
            );
        }
        form = form.child(
            Node::new("input")
                .id("login-button")
                .class("btn_action")
                .attr("type", "submit")
                .attr("value", "LOGIN")
                .on_click(Action::Login),
        );

        Node::new("div")
            .class("login_wrapper")
            .child(Node::new("div").class("login_logo"))
            .child(
                Node::new("div")
                    .id("login_button_container")
                    .class("form_column")
                    .child(Node::new("div").class("login-box").child(form)),
            )
    }

    fn header(&self) -> Node {
        let mut link = Node::new("a")
            .class("shopping_cart_link fa-layers fa-fw")
            .attr("href", "./cart.html")
            .on_click(Action::OpenCart);
        if !self.cart.is_empty() {
            link = link.child(
                Node::new("span")
                    .class("fa-layers-counter shopping_cart_badge")
                    .text(self.cart.len().to_string()),
            );
        }
        let menu = Node::new("div").class("bm-menu-wrap").hidden().child(
            Node::new("a")
                .id("logout_sidebar_link")
                .class("bm-item menu-item")
                .text("Logout"),
        );
        Node::new("div")
            .id("header_container")
            .class("header_container")
            .child(menu)
            .child(Node::new("div").class("app_logo"))
            .child(
                Node::new("div")
                    .id("shopping_cart_container")
                    .class("shopping_cart_container")
                    .child(link),
            )
    }

    fn display_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..CATALOG.len()).collect();
        match self.sort {
            SortOrder::NameAsc => order.sort_by_key(|&i| CATALOG[i].name),
            SortOrder::NameDesc => order.sort_by(|&a, &b| CATALOG[b].name.cmp(CATALOG[a].name)),
            SortOrder::PriceAsc => order.sort_by_key(|&i| CATALOG[i].cents),
            SortOrder::PriceDesc => order.sort_by(|&a, &b| CATALOG[b].cents.cmp(&CATALOG[a].cents)),
        }
        order
    }

    fn inventory_page(&self) -> Node {
        let image_for = |item: &Item| {
            if self.account == Some(Account::Problem) {
                BROKEN_IMAGE
            } else {
                item.image
            }
        };
        let rows = self.display_order().into_iter().map(|i| {
            let item = &CATALOG[i];
            let button = if self.cart.contains(&i) {
                Node::new("button")
                    .class("btn_secondary btn_inventory")
                    .text("REMOVE")
                    .on_click(Action::RemoveFromCart(i))
            } else {
                Node::new("button")
                    .class("btn_primary btn_inventory")
                    .text("ADD TO CART")
                    .on_click(Action::AddToCart(i))
            };
            Node::new("div")
                .class("inventory_item")
                .child(
                    Node::new("div").class("inventory_item_img").child(
                        Node::new("a").child(
                            Node::new("img")
                                .class("inventory_item_img")
                                .attr("src", image_for(item)),
                        ),
                    ),
                )
                .child(
                    Node::new("div")
                        .class("inventory_item_label")
                        .child(
                            Node::new("a").child(
                                Node::new("div").class("inventory_item_name").text(item.name),
                            ),
                        )
                        .child(
                            Node::new("div")
                                .class("inventory_item_desc")
                                .text(item.description),
                        ),
                )
                .child(
                    Node::new("div")
                        .class("pricebar")
                        .child(
                            Node::new("div")
                                .class("inventory_item_price")
                                .text(format!("${}.{:02}", item.cents / 100, item.cents % 100)),
                        )
                        .child(button),
                )
        });

        let options = SortOrder::ALL.into_iter().map(|order| {
            let label = match order {
                SortOrder::NameAsc => "Name (A to Z)",
                SortOrder::NameDesc => "Name (Z to A)",
                SortOrder::PriceAsc => "Price (low to high)",
                SortOrder::PriceDesc => "Price (high to low)",
            };
            Node::new("option").attr("value", order.option_value()).text(label)
        });

        Node::new("div")
            .id("inventory_container")
            .child(Node::new("div").class("product_label").text("Products"))
            .child(
                Node::new("select")
                    .class("product_sort_container")
                    .attr("value", self.sort.option_value())
                    .children(options),
            )
            .child(Node::new("div").class("inventory_list").children(rows))
    }

    fn cart_page(&self) -> Node {
        let rows = self.cart.iter().map(|&i| {
            let item = &CATALOG[i];
            Node::new("div")
                .class("cart_item")
                .child(Node::new("div").class("cart_quantity").text("1"))
                .child(
                    Node::new("div")
                        .class("cart_item_label")
                        .child(
                            Node::new("a").child(
                                Node::new("div").class("inventory_item_name").text(item.name),
                            ),
                        )
                        .child(
                            Node::new("div")
                                .class("inventory_item_desc")
                                .text(item.description),
                        )
                        .child(
                            Node::new("div")
                                .class("item_pricebar")
                                .child(
                                    Node::new("div")
                                        .class("inventory_item_price")
                                        .text(format!("{}.{:02}", item.cents / 100, item.cents % 100)),
                                )
                                .child(
                                    Node::new("button")
                                        .class("btn_secondary cart_button")
                                        .text("REMOVE")
                                        .on_click(Action::RemoveFromCart(i)),
                                ),
                        ),
                )
        });

        Node::new("div")
            .id("cart_contents_container")
            .child(Node::new("div").class("subheader").text("Your Cart"))
            .child(
                Node::new("div")
                    .class("cart_list")
                    .child(Node::new("div").class("cart_quantity_label").text("QTY"))
                    .child(Node::new("div").class("cart_desc_label").text("DESCRIPTION"))
                    .children(rows),
            )
            .child(
                Node::new("div")
                    .class("cart_footer")
                    .child(
                        Node::new("a")
                            .class("btn_secondary")
                            .attr("href", "./inventory.html")
                            .text("Continue Shopping")
                            .on_click(Action::ContinueShopping),
                    )
                    .child(
                        Node::new("a")
                            .class("btn_action checkout_button")
                            .attr("href", "./checkout-step-one.html")
                            .text("CHECKOUT")
                            .on_click(Action::Checkout),
                    ),
            )
    }

    fn checkout_page(&self) -> Node {
        Node::new("div")
            .id("checkout_info_container")
            .child(
                Node::new("div")
                    .class("subheader")
                    .text("Checkout: Your Information"),
            )
            .child(
                Node::new("form")
                    .child(self.input("first-name", "text", "First Name"))
                    .child(self.input("last-name", "text", "Last Name"))
                    .child(self.input("postal-code", "text", "Zip/Postal Code"))
                    .child(
                        Node::new("a")
                            .class("cart_cancel_link btn_secondary")
                            .attr("href", "./cart.html")
                            .text("CANCEL")
                            .on_click(Action::CancelCheckout),
                    )
                    .child(
                        Node::new("input")
                            .class("btn_primary cart_button")
                            .attr("type", "submit")
                            .attr("value", "CONTINUE"),
                    ),
            )
    }
}
