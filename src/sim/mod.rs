//! In-process stand-in for the demo storefront
//!
//! [`Storefront`] implements [`SessionFactory`] without a browser. Each opened
//! [`SimSession`] owns its own site state (login, cart, sort order), renders
//! the same element classes the real site uses and applies UI updates after a
//! short delay on the tokio clock, so the page objects' waiting logic is
//! exercised for real. Seeded-account quirks are reproduced deterministically.

mod dom;
mod site;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::SessionError;
use crate::locator::Query;
use crate::session::{ClickMode, Session, SessionFactory};
use dom::Node;
use site::Site;

/// Base URL that makes the runner pick the simulator
pub const SIM_BASE_URL: &str = "sim://saucedemo/v1/";

/// Timing of the simulated site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimOptions {
    /// Delay between a click and the page reflecting it
    pub ui_delay: Duration,
    /// Delay before `performance_glitch_user` lands on the inventory
    pub login_delay: Duration,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            ui_delay: Duration::from_millis(50),
            login_delay: Duration::from_millis(2500),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Storefront {
    options: SimOptions,
    // Shared by clones of the same storefront.
    live: Arc<AtomicUsize>,
}

impl Storefront {
    pub fn new(options: SimOptions) -> Self {
        Self {
            options,
            live: Arc::default(),
        }
    }

    pub fn options(&self) -> &SimOptions {
        &self.options
    }

    /// Sessions opened and not yet released
    pub fn live_sessions(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for Storefront {
    type Session = SimSession;

    async fn open(&self) -> Result<SimSession, SessionError> {
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(SimSession {
            site: Mutex::new(Site::new(self.options.clone())),
        })
    }

    async fn release(&self, session: SimSession) -> Result<(), SessionError> {
        drop(session);
        self.live.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sim"
    }
}

/// One simulated browser tab
pub struct SimSession {
    site: Mutex<Site>,
}

impl SimSession {
    fn with_page<T>(
        &self,
        f: impl FnOnce(&mut Site, &Node) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let mut site = self.site.lock();
        site.settle();
        let root = site.render();
        f(&mut site, &root)
    }
}

fn resolve(
    root: &Node,
    query: &Query,
    operation: &'static str,
) -> Result<Vec<Vec<usize>>, SessionError> {
    dom::select(root, query).map_err(|reason| action_error(operation, query, reason))
}

/// At most one match, like a strict locator
fn single(
    root: &Node,
    query: &Query,
    operation: &'static str,
) -> Result<Option<Vec<usize>>, SessionError> {
    let mut paths = resolve(root, query, operation)?;
    match paths.len() {
        0 => Ok(None),
        1 => Ok(paths.pop()),
        n => Err(action_error(
            operation,
            query,
            format!("strict mode violation: resolved to {n} elements"),
        )),
    }
}

/// Exactly one match
fn target(root: &Node, query: &Query, operation: &'static str) -> Result<Vec<usize>, SessionError> {
    single(root, query, operation)?
        .ok_or_else(|| action_error(operation, query, "no element matches".to_string()))
}

fn action_error(operation: &'static str, query: &Query, reason: String) -> SessionError {
    SessionError::Action {
        operation,
        selector: query.to_string(),
        reason,
    }
}

fn node_at<'a>(root: &'a Node, path: &[usize]) -> Result<&'a Node, SessionError> {
    root.at(path)
        .ok_or_else(|| SessionError::Backend("stale element path".to_string()))
}

#[async_trait]
impl Session for SimSession {
    async fn goto(&self, url: &str) -> Result<(), SessionError> {
        if url.trim().is_empty() {
            return Err(SessionError::Goto {
                url: url.to_string(),
                reason: "empty address".to_string(),
            });
        }
        self.site.lock().goto(url);
        Ok(())
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        self.with_page(|site, _| Ok(site.url()))
    }

    async fn title(&self) -> Result<String, SessionError> {
        self.with_page(|site, _| Ok(site.title().to_string()))
    }

    async fn count(&self, query: &Query) -> Result<usize, SessionError> {
        self.with_page(|_, root| Ok(resolve(root, query, "count")?.len()))
    }

    async fn text(&self, query: &Query) -> Result<Option<String>, SessionError> {
        self.with_page(|_, root| {
            single(root, query, "text_content")?
                .map(|path| node_at(root, &path).map(Node::text_content))
                .transpose()
        })
    }

    async fn texts(&self, query: &Query) -> Result<Vec<String>, SessionError> {
        self.with_page(|_, root| {
            resolve(root, query, "all_text_contents")?
                .iter()
                .map(|path| node_at(root, path).map(Node::text_content))
                .collect()
        })
    }

    async fn attribute(&self, query: &Query, name: &str) -> Result<Option<String>, SessionError> {
        self.with_page(|_, root| match single(root, query, "get_attribute")? {
            Some(path) => Ok(node_at(root, &path)?.attribute(name)),
            None => Ok(None),
        })
    }

    async fn is_visible(&self, query: &Query) -> Result<bool, SessionError> {
        self.with_page(|_, root| {
            Ok(single(root, query, "is_visible")?.is_some_and(|path| root.visible_at(&path)))
        })
    }

    async fn click(&self, query: &Query, mode: ClickMode) -> Result<(), SessionError> {
        self.with_page(|site, root| {
            let path = target(root, query, "click")?;
            if mode == ClickMode::Normal && !root.visible_at(&path) {
                return Err(action_error(
                    "click",
                    query,
                    "element is not visible".to_string(),
                ));
            }
            if let Some(action) = node_at(root, &path)?.action {
                site.click(action);
            }
            Ok(())
        })
    }

    async fn fill(&self, query: &Query, value: &str) -> Result<(), SessionError> {
        self.with_page(|site, root| {
            let node = node_at(root, &target(root, query, "fill")?)?;
            match (node.tag, &node.id) {
                ("input", Some(id)) => {
                    site.fill(id, value);
                    Ok(())
                }
                _ => Err(action_error(
                    "fill",
                    query,
                    "element is not an <input>".to_string(),
                )),
            }
        })
    }

    async fn select_option(&self, query: &Query, value: &str) -> Result<(), SessionError> {
        self.with_page(|site, root| {
            let node = node_at(root, &target(root, query, "select_option")?)?;
            if node.tag != "select" {
                return Err(action_error(
                    "select_option",
                    query,
                    "element is not a <select>".to_string(),
                ));
            }
            site.select(value)
                .map_err(|reason| action_error("select_option", query, reason))
        })
    }

    /// Text outline of the rendered page, standing in for pixels
    async fn screenshot(&self) -> Result<Vec<u8>, SessionError> {
        self.with_page(|site, root| {
            let mut out = format!("{}\n", site.url());
            root.outline(0, &mut out);
            Ok(out.into_bytes())
        })
    }
}
