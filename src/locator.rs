//! Declarative element bindings
//!
//! A [`Query`] is an immutable selector chain. Nothing is resolved until a
//! [`Session`](crate::session::Session) evaluates it, so a query built once at
//! page construction always sees the live DOM.
//!
//! Each page names its elements with a closed key enum implementing
//! [`LocatorKey`]; [`LocatorMap`] materialises all bindings up front.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::error::{Diagnostics, HarnessError, HarnessResult};

/// One link in a selector chain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Part {
    /// CSS compound selector, evaluated against descendants of the current scope
    Css(String),
    /// Elements whose trimmed text equals the given string
    Text(String),
    /// Keep only the n-th match (zero based)
    Nth(usize),
    /// Keep only the last match
    Last,
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Part::Css(css) => f.write_str(css),
            Part::Text(text) => write!(f, "text=\"{text}\""),
            Part::Nth(n) => write!(f, "nth={n}"),
            Part::Last => f.write_str("nth=-1"),
        }
    }
}

/// Selector chain rendered in Playwright's `a >> b` syntax
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    parts: Vec<Part>,
}

impl Query {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::Css(selector.into())],
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Narrow to descendants matching `selector`
    pub fn child(&self, selector: impl Into<String>) -> Self {
        self.with(Part::Css(selector.into()))
    }

    pub fn nth(&self, index: usize) -> Self {
        self.with(Part::Nth(index))
    }

    pub fn first(&self) -> Self {
        self.nth(0)
    }

    pub fn last(&self) -> Self {
        self.with(Part::Last)
    }

    /// Scope `other`'s chain under this one
    pub fn within(&self, other: &Query) -> Self {
        let mut parts = self.parts.clone();
        parts.extend(other.parts.iter().cloned());
        Self { parts }
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    fn with(&self, part: Part) -> Self {
        let mut parts = self.parts.clone();
        parts.push(part);
        Self { parts }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(" >> ")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

/// Semantic element names for one logical page
pub trait LocatorKey: Copy + Eq + Hash + fmt::Debug + 'static {
    /// Every key the page defines
    const ALL: &'static [Self];

    /// Stable name used in errors and logs
    fn name(self) -> &'static str;

    /// The query this key binds to
    fn query(self) -> Query;
}

/// Immutable key → query table built once per page object
#[derive(Debug, Clone)]
pub struct LocatorMap<K: LocatorKey> {
    page: &'static str,
    entries: HashMap<K, Query>,
}

impl<K: LocatorKey> LocatorMap<K> {
    pub fn new(page: &'static str) -> Self {
        let entries = K::ALL.iter().map(|&key| (key, key.query())).collect();
        Self { page, entries }
    }

    pub fn page(&self) -> &'static str {
        self.page
    }

    pub fn get(&self, key: K) -> HarnessResult<&Query> {
        self.entries
            .get(&key)
            .ok_or_else(|| HarnessError::ElementNotFound {
                page: self.page,
                key: key.name(),
                query: "<unbound>".to_string(),
                diagnostics: Diagnostics::default(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
