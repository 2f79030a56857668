/// Browsing engine abstraction
///
/// The scraping pipeline only talks to a [`BrowserSession`]. Locators come in two
/// dialects: CSS (shorthand-attribute) and a structural XPath subset.

pub mod html_session;
pub mod page_source;
pub mod xpath;

pub use html_session::HtmlSession;
pub use page_source::{HttpPageSource, PageSource, StaticPages};

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a browsing engine
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("HTTP error {status}: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("invalid locator {locator}: {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("unsupported locator {locator}: {reason}")]
    UnsupportedLocator { locator: String, reason: String },

    #[error("no element matches {0}")]
    ElementNotFound(String),

    #[error("element handle refers to a page that is no longer loaded")]
    StaleElement,

    #[error("element has no navigable target")]
    NotNavigable,

    #[error("timed out after {waited:?} waiting for {locator}")]
    Timeout { locator: String, waited: Duration },

    #[error("no page loaded")]
    NoPage,

    #[error("{0} is not supported by this engine")]
    Unsupported(&'static str),
}

/// An element-location expression in one of the two supported dialects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(selector) => write!(f, "css:{}", selector),
            Locator::XPath(expr) => write!(f, "xpath:{}", expr),
        }
    }
}

/// Opaque reference to an element on the currently loaded page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHandle {
    pub(crate) generation: u64,
    pub(crate) ordinal: usize,
}

/// Session over a single browsing context.
///
/// Sessions are single-threaded: futures are not required to be `Send`.
#[async_trait(?Send)]
pub trait BrowserSession {
    /// Open the session on `url`.
    async fn open_session(&mut self, url: &str, headless: bool) -> Result<(), BrowserError>;

    /// Session-wide default operation timeout.
    fn set_timeout(&mut self, timeout: Duration);

    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    fn find_elements(
        &self,
        locator: &Locator,
        parent: Option<&ElementHandle>,
    ) -> Result<Vec<ElementHandle>, BrowserError>;

    fn find_element(
        &self,
        locator: &Locator,
        parent: Option<&ElementHandle>,
    ) -> Result<ElementHandle, BrowserError> {
        self.find_elements(locator, parent)?
            .into_iter()
            .next()
            .ok_or_else(|| BrowserError::ElementNotFound(locator.to_string()))
    }

    fn get_text(&self, handle: &ElementHandle) -> Result<String, BrowserError>;

    /// Read an attribute. `textContent` is treated as the element's text content.
    fn get_attribute(
        &self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError>;

    async fn click(&mut self, handle: &ElementHandle) -> Result<(), BrowserError>;

    async fn wait_until_visible(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<(), BrowserError>;

    async fn go_back(&mut self) -> Result<(), BrowserError>;

    async fn execute_script(
        &mut self,
        script: &str,
        args: &[ElementHandle],
    ) -> Result<serde_json::Value, BrowserError>;

    async fn close_all(&mut self);
}
