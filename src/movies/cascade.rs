/// Ordered "first success wins" locator cascades
use crate::browser::{BrowserError, BrowserSession, ElementHandle, Locator};
use std::fmt;
use tracing::debug;

/// What to read from the located element(s)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// Visible text of the first match
    Text,
    /// Visible text, falling back to the `textContent` attribute when empty
    TextOrContent,
    /// Named attribute of the first match
    Attribute(&'static str),
    /// Text of every match, non-empty values joined with the separator
    AllText { separator: &'static str },
}

/// One location strategy in a cascade
#[derive(Clone)]
pub struct Strategy {
    pub locator: Locator,
    pub capture: Capture,
    transform: Option<fn(&str) -> String>,
}

impl Strategy {
    pub fn new(locator: Locator, capture: Capture) -> Self {
        Self {
            locator,
            capture,
            transform: None,
        }
    }

    pub fn text(locator: Locator) -> Self {
        Self::new(locator, Capture::Text)
    }

    pub fn attribute(locator: Locator, name: &'static str) -> Self {
        Self::new(locator, Capture::Attribute(name))
    }

    /// Post-process the captured value
    pub fn map(mut self, transform: fn(&str) -> String) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Run this strategy. `Ok(None)` means it located nothing usable.
    pub fn run<B: BrowserSession + ?Sized>(
        &self,
        session: &B,
        parent: Option<&ElementHandle>,
    ) -> Result<Option<String>, BrowserError> {
        Ok(self.run_located(session, parent)?.map(|(_, value)| value))
    }

    /// Like [`Strategy::run`], also returning the element the value was read
    /// from (the first match for [`Capture::AllText`]).
    pub fn run_located<B: BrowserSession + ?Sized>(
        &self,
        session: &B,
        parent: Option<&ElementHandle>,
    ) -> Result<Option<(ElementHandle, String)>, BrowserError> {
        let (element, value) = match &self.capture {
            Capture::Text => {
                let element = session.find_element(&self.locator, parent)?;
                let text = session.get_text(&element)?;
                (element, text)
            }
            Capture::TextOrContent => {
                let element = session.find_element(&self.locator, parent)?;
                let text = session.get_text(&element)?;
                let text = if text.trim().is_empty() {
                    session
                        .get_attribute(&element, "textContent")?
                        .unwrap_or_default()
                } else {
                    text
                };
                (element, text)
            }
            Capture::Attribute(name) => {
                let element = session.find_element(&self.locator, parent)?;
                let value = session.get_attribute(&element, name)?.unwrap_or_default();
                (element, value)
            }
            Capture::AllText { separator } => {
                let elements = session.find_elements(&self.locator, parent)?;
                let Some(first) = elements.first().copied() else {
                    return Ok(None);
                };
                let mut parts = Vec::new();
                for element in &elements {
                    let text = session.get_text(element)?;
                    let text = text.trim();
                    if !text.is_empty() {
                        parts.push(text.to_string());
                    }
                }
                (first, parts.join(separator))
            }
        };

        let value = match self.transform {
            Some(transform) => transform(value.trim()),
            None => value,
        };
        let value = value.trim();

        Ok(if value.is_empty() {
            None
        } else {
            Some((element, value.to_string()))
        })
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy")
            .field("locator", &self.locator)
            .field("capture", &self.capture)
            .field("transformed", &self.transform.is_some())
            .finish()
    }
}

/// An ordered list of strategies for one field
#[derive(Debug, Clone)]
pub struct LocatorCascade {
    field: &'static str,
    strategies: Vec<Strategy>,
}

impl LocatorCascade {
    pub fn new(field: &'static str, strategies: Vec<Strategy>) -> Self {
        Self { field, strategies }
    }

    /// Value from the first strategy that succeeds, or `None` if all fail.
    ///
    /// Strategy errors are logged and never propagate.
    pub fn first_success<B: BrowserSession + ?Sized>(
        &self,
        session: &B,
        parent: Option<&ElementHandle>,
    ) -> Option<String> {
        self.first_match(session, parent).map(|(_, value)| value)
    }

    /// Element and value from the first strategy that succeeds.
    pub fn first_match<B: BrowserSession + ?Sized>(
        &self,
        session: &B,
        parent: Option<&ElementHandle>,
    ) -> Option<(ElementHandle, String)> {
        for (index, strategy) in self.strategies.iter().enumerate() {
            match strategy.run_located(session, parent) {
                Ok(Some(found)) => {
                    debug!(
                        "{}: strategy {} ({}) matched",
                        self.field,
                        index + 1,
                        strategy.locator
                    );
                    return Some(found);
                }
                Ok(None) => {
                    debug!(
                        "{}: strategy {} ({}) was empty",
                        self.field,
                        index + 1,
                        strategy.locator
                    );
                }
                Err(e) => {
                    debug!("{}: strategy {} failed: {}", self.field, index + 1, e);
                }
            }
        }
        debug!("{}: all {} strategies exhausted", self.field, self.strategies.len());
        None
    }
}

/// Drop one trailing separator: `"PG-13,"` -> `"PG-13"`
pub fn strip_trailing_separator(value: &str) -> String {
    value
        .trim()
        .strip_suffix(',')
        .unwrap_or(value.trim())
        .trim()
        .to_string()
}
