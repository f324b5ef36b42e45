//! Browser automation seam
//!
//! Page objects talk to the live page only through [`Session`]. The session is
//! owned by whoever opened it (a test, the runner, a verifier run) and handed
//! back to [`SessionFactory::release`] when done; page objects borrow it and
//! never close it.

use async_trait::async_trait;

use crate::error::SessionError;
use crate::locator::Query;

/// How a click is delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClickMode {
    /// Wait for the element to be actionable, then click
    #[default]
    Normal,
    /// Skip actionability checks
    Force,
}

/// Operations consumed from the browser-automation library
#[async_trait]
pub trait Session: Send + Sync {
    /// Load an address and wait for the document to settle
    async fn goto(&self, url: &str) -> Result<(), SessionError>;

    async fn current_url(&self) -> Result<String, SessionError>;

    async fn title(&self) -> Result<String, SessionError>;

    /// Number of elements matching; zero is a normal answer
    async fn count(&self, query: &Query) -> Result<usize, SessionError>;

    /// Text content of the first match, `None` if nothing matches
    async fn text(&self, query: &Query) -> Result<Option<String>, SessionError>;

    /// Text content of every match, in document order
    async fn texts(&self, query: &Query) -> Result<Vec<String>, SessionError>;

    async fn attribute(&self, query: &Query, name: &str) -> Result<Option<String>, SessionError>;

    /// False when nothing matches
    async fn is_visible(&self, query: &Query) -> Result<bool, SessionError>;

    async fn click(&self, query: &Query, mode: ClickMode) -> Result<(), SessionError>;

    async fn fill(&self, query: &Query, value: &str) -> Result<(), SessionError>;

    async fn select_option(&self, query: &Query, value: &str) -> Result<(), SessionError>;

    async fn screenshot(&self) -> Result<Vec<u8>, SessionError>;
}

/// Opens isolated sessions; nothing mutable is shared between them
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: Session;

    async fn open(&self) -> Result<Self::Session, SessionError>;

    /// Close a session this factory opened
    async fn release(&self, session: Self::Session) -> Result<(), SessionError>;

    /// Short backend label for logs and reports
    fn backend(&self) -> &'static str;
}
