//! Minimal element tree and selector engine for the simulator

use std::collections::{BTreeMap, BTreeSet};

use crate::locator::{Part, Query};

/// What clicking an element does to the simulated site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Login,
    DismissError,
    AddToCart(usize),
    RemoveFromCart(usize),
    OpenCart,
    ContinueShopping,
    Checkout,
    CancelCheckout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub tag: &'static str,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: BTreeMap<String, String>,
    pub text: String,
    pub visible: bool,
    pub action: Option<Action>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            id: None,
            classes: Vec::new(),
            attrs: BTreeMap::new(),
            text: String::new(),
            visible: true,
            action: None,
            children: Vec::new(),
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Space separated, like the `class` attribute
    pub fn class(mut self, classes: &str) -> Self {
        self.classes
            .extend(classes.split_whitespace().map(str::to_string));
        self
    }

    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn on_click(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    /// Own text followed by descendants' text, like `textContent`
    pub fn text_content(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            out.push_str(&child.text_content());
        }
        out
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "id" => self.id.clone(),
            "class" if !self.classes.is_empty() => Some(self.classes.join(" ")),
            _ => self.attrs.get(name).cloned(),
        }
    }

    pub fn at(&self, path: &[usize]) -> Option<&Node> {
        match path.split_first() {
            None => Some(self),
            Some((&i, rest)) => self.children.get(i)?.at(rest),
        }
    }

    /// Visible when the node and all of its ancestors are
    pub fn visible_at(&self, path: &[usize]) -> bool {
        let mut node = self;
        if !node.visible {
            return false;
        }
        for &i in path {
            match node.children.get(i) {
                Some(child) if child.visible => node = child,
                _ => return false,
            }
        }
        true
    }

    fn descendants(&self, path: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        for (i, child) in self.children.iter().enumerate() {
            path.push(i);
            out.push(path.clone());
            child.descendants(path, out);
            path.pop();
        }
    }

    /// Readable outline of the tree
    pub fn outline(&self, depth: usize, out: &mut String) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(self.tag);
        if let Some(id) = &self.id {
            out.push('#');
            out.push_str(id);
        }
        for class in &self.classes {
            out.push('.');
            out.push_str(class);
        }
        if !self.text.is_empty() {
            out.push_str(&format!(" {:?}", self.text));
        }
        out.push('\n');
        for child in &self.children {
            child.outline(depth + 1, out);
        }
    }
}

/// Single compound selector: `tag#id.class[attr="value"]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Compound {
    pub fn parse(selector: &str) -> Result<Self, String> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Err("empty selector".to_string());
        }
        let mut compound = Compound::default();
        let mut rest = selector;

        let tag_end = rest
            .find(|c: char| matches!(c, '.' | '#' | '['))
            .unwrap_or(rest.len());
        if tag_end > 0 {
            compound.tag = Some(rest[..tag_end].to_string());
        }
        rest = &rest[tag_end..];

        while let Some(first) = rest.chars().next() {
            match first {
                '.' | '#' => {
                    let body = &rest[1..];
                    let end = body
                        .find(|c: char| matches!(c, '.' | '#' | '['))
                        .unwrap_or(body.len());
                    let name = &body[..end];
                    if name.is_empty() {
                        return Err(format!("dangling `{first}` in `{selector}`"));
                    }
                    if first == '.' {
                        compound.classes.push(name.to_string());
                    } else {
                        compound.id = Some(name.to_string());
                    }
                    rest = &body[end..];
                }
                '[' => {
                    let close = rest
                        .find(']')
                        .ok_or_else(|| format!("unclosed `[` in `{selector}`"))?;
                    let inner = &rest[1..close];
                    let attr = match inner.split_once('=') {
                        Some((name, value)) => (
                            name.trim().to_string(),
                            Some(value.trim().trim_matches(['"', '\'']).to_string()),
                        ),
                        None => (inner.trim().to_string(), None),
                    };
                    compound.attrs.push(attr);
                    rest = &rest[close + 1..];
                }
                _ => return Err(format!("unsupported selector `{selector}`")),
            }
        }

        if compound
            .tag
            .as_deref()
            .is_some_and(|tag| !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
        {
            return Err(format!("unsupported selector `{selector}`"));
        }
        Ok(compound)
    }

    pub fn matches(&self, node: &Node) -> bool {
        if self.tag.as_deref().is_some_and(|tag| tag != node.tag) {
            return false;
        }
        if self.id.is_some() && self.id != node.id {
            return false;
        }
        if !self.classes.iter().all(|c| node.classes.contains(c)) {
            return false;
        }
        self.attrs.iter().all(|(name, expected)| {
            match (node.attribute(name), expected) {
                (Some(actual), Some(expected)) => actual == *expected,
                (Some(_), None) => true,
                (None, _) => false,
            }
        })
    }
}

/// Resolve a query against a tree, returning element paths in document order
pub fn select(root: &Node, query: &Query) -> Result<Vec<Vec<usize>>, String> {
    let mut current: Vec<Vec<usize>> = vec![Vec::new()];

    for part in query.parts() {
        current = match part {
            Part::Css(selector) => {
                let compound = Compound::parse(selector)?;
                scoped(root, &current, |node| compound.matches(node))
            }
            Part::Text(wanted) => {
                let matches_text = |node: &Node| normalize(&node.text_content()) == *wanted;
                scoped(root, &current, |node| {
                    matches_text(node) && !node.children.iter().any(|c| matches_text(c))
                })
            }
            Part::Nth(n) => current.get(*n).cloned().into_iter().collect(),
            Part::Last => current.last().cloned().into_iter().collect(),
        };
    }
    Ok(current)
}

fn scoped(root: &Node, scopes: &[Vec<usize>], keep: impl Fn(&Node) -> bool) -> Vec<Vec<usize>> {
    let mut found = BTreeSet::new();
    for scope in scopes {
        let Some(base) = root.at(scope) else { continue };
        let mut candidates = Vec::new();
        base.descendants(&mut scope.clone(), &mut candidates);
        for path in candidates {
            if root.at(&path).is_some_and(&keep) {
                found.insert(path);
            }
        }
    }
    found.into_iter().collect()
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Node {
        Node::new("body").child(
            Node::new("div").class("inventory_list").children((0..3).map(|i| {
                Node::new("div")
                    .class("inventory_item")
                    .child(Node::new("div").class("inventory_item_name").text(format!("item {i}")))
                    .child(
                        Node::new("button")
                            .class("btn_primary btn_inventory")
                            .text("ADD TO CART")
                            .on_click(Action::AddToCart(i)),
                    )
            })),
        )
    }

    #[test]
    fn compound_selector_parts() {
        let c = Compound::parse("input[placeholder=\"Username\"]").unwrap();
        assert!(c.matches(&Node::new("input").attr("placeholder", "Username")));
        assert!(!c.matches(&Node::new("input").attr("placeholder", "Password")));
        assert!(!c.matches(&Node::new("textarea").attr("placeholder", "Username")));

        let c = Compound::parse(".btn_primary.btn_inventory").unwrap();
        assert!(c.matches(&Node::new("button").class("btn_inventory btn_primary")));
        assert!(!c.matches(&Node::new("button").class("btn_inventory")));

        assert!(Compound::parse("div > span").is_err());
        assert!(Compound::parse("[data-test").is_err());
    }

    #[test]
    fn chains_scope_and_index() {
        let root = tree();
        let rows = Query::css("div.inventory_item");
        assert_eq!(select(&root, &rows).unwrap().len(), 3);

        let name = rows.nth(1).child(".inventory_item_name");
        let paths = select(&root, &name).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(root.at(&paths[0]).unwrap().text, "item 1");

        let last = select(&root, &Query::css(".inventory_item_name").last()).unwrap();
        assert_eq!(root.at(&last[0]).unwrap().text, "item 2");
        assert!(select(&root, &rows.nth(7)).unwrap().is_empty());
    }

    #[test]
    fn text_matches_innermost_element() {
        let root = tree();
        let paths = select(&root, &Query::text("item 2")).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(root.at(&paths[0]).unwrap().tag, "div");
        assert_eq!(select(&root, &Query::text("ADD TO CART")).unwrap().len(), 3);
    }

    #[test]
    fn hidden_ancestor_hides_descendants() {
        let root = Node::new("body").child(Node::new("div").hidden().child(Node::new("span")));
        assert!(!root.visible_at(&[0]));
        assert!(!root.visible_at(&[0, 0]));
        assert!(root.visible_at(&[]));
    }
}
