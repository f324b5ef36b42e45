//! Records read off the inventory and cart pages

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{HarnessError, HarnessResult};

/// Product names and prices every quirk-free persona must see, in default order
pub const EXPECTED_CATALOG: [(&str, &str); 6] = [
    ("Sauce Labs Backpack", "$29.99"),
    ("Sauce Labs Bike Light", "$9.99"),
    ("Sauce Labs Bolt T-Shirt", "$15.99"),
    ("Sauce Labs Fleece Jacket", "$49.99"),
    ("Sauce Labs Onesie", "$7.99"),
    ("Test.allTheThings() T-Shirt (Red)", "$15.99"),
];

/// Dollar amount held as whole cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Price(u32);

impl Price {
    pub fn from_cents(cents: u32) -> Self {
        Self(cents)
    }

    pub fn cents(self) -> u32 {
        self.0
    }
}

impl FromStr for Price {
    type Err = HarnessError;

    /// Accepts `$29.99`, `29.99` and `29.9`
    fn from_str(raw: &str) -> HarnessResult<Self> {
        let invalid = || HarnessError::InvalidPrice(raw.to_string());
        let trimmed = raw.trim();
        let digits = trimmed.strip_prefix('$').unwrap_or(trimmed);

        let (whole, frac) = match digits.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (digits, ""),
        };
        if whole.is_empty() || frac.len() > 2 {
            return Err(invalid());
        }
        let whole: u32 = whole.parse().map_err(|_| invalid())?;
        let frac: u32 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u32>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };
        whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac))
            .map(Price)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// One row of the inventory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRecord {
    pub name: String,
    pub description: String,
    pub price: Price,
    pub image_reference: String,
}

/// One row of the cart page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLineItem {
    pub name: String,
    pub price: Price,
}

impl From<&ProductRecord> for CartLineItem {
    fn from(product: &ProductRecord) -> Self {
        Self {
            name: product.name.clone(),
            price: product.price,
        }
    }
}

/// Inventory sort options, keyed by the dropdown's option values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SortOrder {
    NameAsc,
    NameDesc,
    PriceAsc,
    PriceDesc,
}

impl SortOrder {
    pub const ALL: [SortOrder; 4] = [
        SortOrder::NameAsc,
        SortOrder::NameDesc,
        SortOrder::PriceAsc,
        SortOrder::PriceDesc,
    ];

    /// `value` attribute of the matching `<option>`
    pub fn option_value(self) -> &'static str {
        match self {
            SortOrder::NameAsc => "az",
            SortOrder::NameDesc => "za",
            SortOrder::PriceAsc => "lohi",
            SortOrder::PriceDesc => "hilo",
        }
    }

    /// Sort in place. Ties on price keep their existing relative order.
    pub fn apply(self, products: &mut [ProductRecord]) {
        match self {
            SortOrder::NameAsc => products.sort_by(|a, b| a.name.cmp(&b.name)),
            SortOrder::NameDesc => products.sort_by(|a, b| b.name.cmp(&a.name)),
            SortOrder::PriceAsc => products.sort_by_key(|p| p.price),
            SortOrder::PriceDesc => products.sort_by(|a, b| b.price.cmp(&a.price)),
        }
    }

    /// Whether the sequence is ordered on this order's sort key
    pub fn is_sorted(self, products: &[ProductRecord]) -> bool {
        products.windows(2).all(|pair| match self {
            SortOrder::NameAsc => pair[0].name <= pair[1].name,
            SortOrder::NameDesc => pair[0].name >= pair[1].name,
            SortOrder::PriceAsc => pair[0].price <= pair[1].price,
            SortOrder::PriceDesc => pair[0].price >= pair[1].price,
        })
    }
}

impl FromStr for SortOrder {
    type Err = HarnessError;

    fn from_str(value: &str) -> HarnessResult<Self> {
        SortOrder::ALL
            .into_iter()
            .find(|order| order.option_value() == value)
            .ok_or_else(|| HarnessError::Config(format!("unknown sort option `{value}`")))
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.option_value())
    }
}

/// Check names and prices against [`EXPECTED_CATALOG`], returning mismatches
pub fn catalog_mismatches(products: &[ProductRecord]) -> Vec<String> {
    let mut problems = Vec::new();
    if products.len() != EXPECTED_CATALOG.len() {
        problems.push(format!(
            "expected {} products, found {}",
            EXPECTED_CATALOG.len(),
            products.len()
        ));
    }
    for (i, (product, (name, price))) in products.iter().zip(EXPECTED_CATALOG).enumerate() {
        if product.name != name {
            problems.push(format!("row {i}: name {:?} != {name:?}", product.name));
        }
        if product.price.to_string() != price {
            problems.push(format!("row {i}: price {} != {price}", product.price));
        }
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, price: &str) -> ProductRecord {
        ProductRecord {
            name: name.to_string(),
            description: String::new(),
            price: price.parse().unwrap(),
            image_reference: String::new(),
        }
    }

    fn catalog() -> Vec<ProductRecord> {
        EXPECTED_CATALOG
            .iter()
            .map(|(name, price)| record(name, price))
            .collect()
    }

    #[test]
    fn price_parses_display_text() {
        assert_eq!("$29.99".parse::<Price>().unwrap().cents(), 2999);
        assert_eq!("7.9".parse::<Price>().unwrap().cents(), 790);
        assert_eq!(" $49 ".parse::<Price>().unwrap().cents(), 4900);
        assert_eq!(Price::from_cents(999).to_string(), "$9.99");
    }

    #[test]
    fn price_rejects_garbage() {
        for raw in ["", "$", "abc", "$1.234", "$.99", "$-1.00"] {
            assert!(raw.parse::<Price>().is_err(), "{raw:?} should not parse");
        }
    }

    #[test]
    fn sort_orders_round_trip_option_values() {
        for order in SortOrder::ALL {
            assert_eq!(order.option_value().parse::<SortOrder>().unwrap(), order);
        }
        assert!("random".parse::<SortOrder>().is_err());
    }

    #[test]
    fn name_sorts_match_expected_sequences() {
        let mut products = catalog();
        SortOrder::NameDesc.apply(&mut products);
        assert_eq!(products[0].name, "Test.allTheThings() T-Shirt (Red)");
        assert!(SortOrder::NameDesc.is_sorted(&products));
        assert!(!SortOrder::NameAsc.is_sorted(&products));
    }

    #[test]
    fn price_sorts_handle_ties() {
        let mut products = catalog();
        SortOrder::PriceAsc.apply(&mut products);
        let prices: Vec<u32> = products.iter().map(|p| p.price.cents()).collect();
        assert_eq!(prices, vec![799, 999, 1599, 1599, 2999, 4999]);
        assert!(SortOrder::PriceAsc.is_sorted(&products));

        SortOrder::PriceDesc.apply(&mut products);
        assert_eq!(products[0].name, "Sauce Labs Fleece Jacket");
    }

    #[test]
    fn sorting_twice_is_idempotent() {
        for order in SortOrder::ALL {
            let mut once = catalog();
            order.apply(&mut once);
            let mut twice = once.clone();
            order.apply(&mut twice);
            assert_eq!(once, twice, "{order} should be idempotent");
        }
    }

    #[test]
    fn catalog_check_reports_differences() {
        assert!(catalog_mismatches(&catalog()).is_empty());

        let mut products = catalog();
        products[1].price = Price::from_cents(1099);
        products.pop();
        let problems = catalog_mismatches(&products);
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("expected 6 products, found 5"));
        assert!(problems[1].contains("row 1: price $10.99 != $9.99"));
    }
}
