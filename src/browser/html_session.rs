/// Document-model browsing session built on `scraper`.
///
/// Every navigation fetches the page through a [`PageSource`] and parses it into a
/// DOM. Element handles are positions in document order, tagged with a page
/// generation so handles from a previous page are rejected.
use super::page_source::PageSource;
use super::xpath;
use super::{BrowserError, BrowserSession, ElementHandle, Locator};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

static ALL_ELEMENTS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("*").expect("universal selector is valid"));

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

struct LoadedPage {
    url: Url,
    document: Html,
    generation: u64,
}

pub struct HtmlSession<S: PageSource> {
    source: S,
    page: Option<LoadedPage>,
    history: Vec<Url>,
    generation: u64,
    timeout: Duration,
    poll_interval: Duration,
}

impl<S: PageSource> HtmlSession<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            page: None,
            history: Vec::new(),
            generation: 0,
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// How often `wait_until_visible` reloads the page while waiting
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn current_url(&self) -> Option<&Url> {
        self.page.as_ref().map(|page| &page.url)
    }

    async fn load(&mut self, url: Url) -> Result<(), BrowserError> {
        let html = self.source.fetch(&url, self.timeout).await?;
        self.generation += 1;
        self.page = Some(LoadedPage {
            url,
            document: Html::parse_document(&html),
            generation: self.generation,
        });
        Ok(())
    }

    fn resolve_url(&self, target: &str) -> Result<Url, BrowserError> {
        let parsed = match &self.page {
            Some(page) => page.url.join(target),
            None => Url::parse(target),
        };
        parsed.map_err(|e| BrowserError::Navigation {
            url: target.to_string(),
            reason: e.to_string(),
        })
    }

    fn loaded(&self) -> Result<&LoadedPage, BrowserError> {
        self.page.as_ref().ok_or(BrowserError::NoPage)
    }

    fn element<'a>(
        &self,
        page: &'a LoadedPage,
        handle: &ElementHandle,
    ) -> Result<ElementRef<'a>, BrowserError> {
        if handle.generation != page.generation {
            return Err(BrowserError::StaleElement);
        }
        page.document
            .select(&ALL_ELEMENTS)
            .nth(handle.ordinal)
            .ok_or(BrowserError::StaleElement)
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn parse_selector(source: &str, locator: &Locator) -> Result<Selector, BrowserError> {
    Selector::parse(source).map_err(|e| BrowserError::InvalidLocator {
        locator: locator.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait(?Send)]
impl<S: PageSource> BrowserSession for HtmlSession<S> {
    async fn open_session(&mut self, url: &str, headless: bool) -> Result<(), BrowserError> {
        if !headless {
            debug!("Document sessions are always headless; ignoring headed mode");
        }
        self.history.clear();
        self.page = None;
        let url = self.resolve_url(url)?;
        info!("🌐 Opening session at {}", url);
        self.load(url).await
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        let target = self.resolve_url(url)?;
        // Failed loads still get an entry, so going back returns to this page
        if let Some(page) = &self.page {
            self.history.push(page.url.clone());
        }
        debug!("➡️ Navigating to {}", target);
        self.load(target).await
    }

    fn find_elements(
        &self,
        locator: &Locator,
        parent: Option<&ElementHandle>,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        let page = self.loaded()?;

        let (selector, text_contains, absolute) = match locator {
            Locator::Css(css) => (parse_selector(css, locator)?, None, false),
            Locator::XPath(expr) => {
                let compiled = xpath::compile(expr)?;
                (
                    parse_selector(&compiled.css, locator)?,
                    compiled.text_contains,
                    compiled.absolute,
                )
            }
        };

        let matches: Vec<ElementRef<'_>> = match parent {
            Some(handle) if !absolute => self.element(page, handle)?.select(&selector).collect(),
            _ => page.document.select(&selector).collect(),
        };

        let ordinals: HashMap<_, usize> = page
            .document
            .select(&ALL_ELEMENTS)
            .enumerate()
            .map(|(ordinal, element)| (element.id(), ordinal))
            .collect();

        Ok(matches
            .into_iter()
            .filter(|element| match &text_contains {
                Some(needle) => element.text().collect::<String>().contains(needle.as_str()),
                None => true,
            })
            .filter_map(|element| ordinals.get(&element.id()).copied())
            .map(|ordinal| ElementHandle {
                generation: page.generation,
                ordinal,
            })
            .collect())
    }

    fn get_text(&self, handle: &ElementHandle) -> Result<String, BrowserError> {
        let page = self.loaded()?;
        Ok(element_text(&self.element(page, handle)?))
    }

    fn get_attribute(
        &self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        let page = self.loaded()?;
        let element = self.element(page, handle)?;

        if name == "textContent" {
            return Ok(Some(element.text().collect()));
        }
        Ok(element.value().attr(name).map(str::to_string))
    }

    async fn click(&mut self, handle: &ElementHandle) -> Result<(), BrowserError> {
        let target = {
            let page = self.loaded()?;
            let element = self.element(page, handle)?;

            // Own link, enclosing link, then a link the element wraps
            element
                .value()
                .attr("href")
                .or_else(|| {
                    element
                        .ancestors()
                        .filter_map(ElementRef::wrap)
                        .find_map(|ancestor| ancestor.value().attr("href"))
                })
                .or_else(|| {
                    element
                        .descendants()
                        .filter_map(ElementRef::wrap)
                        .find_map(|child| child.value().attr("href"))
                })
                .map(str::to_string)
                .ok_or(BrowserError::NotNavigable)?
        };
        self.navigate(&target).await
    }

    async fn wait_until_visible(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let started = Instant::now();
        loop {
            if !self.find_elements(locator, None)?.is_empty() {
                return Ok(());
            }

            let waited = started.elapsed();
            if waited >= timeout {
                return Err(BrowserError::Timeout {
                    locator: locator.to_string(),
                    waited,
                });
            }

            tokio::time::sleep(self.poll_interval.min(timeout - waited)).await;

            let url = self.loaded()?.url.clone();
            if let Err(e) = self.load(url).await {
                warn!("Reload while waiting for {} failed: {}", locator, e);
            }
        }
    }

    async fn go_back(&mut self) -> Result<(), BrowserError> {
        let previous = self
            .history
            .pop()
            .ok_or_else(|| BrowserError::Navigation {
                url: String::new(),
                reason: "history is empty".to_string(),
            })?;
        debug!("⬅️ Going back to {}", previous);
        self.load(previous).await
    }

    async fn execute_script(
        &mut self,
        _script: &str,
        _args: &[ElementHandle],
    ) -> Result<serde_json::Value, BrowserError> {
        Err(BrowserError::Unsupported("script execution"))
    }

    async fn close_all(&mut self) {
        self.page = None;
        self.history.clear();
        info!("🔒 Browser session closed");
    }
}
