/// Page fetchers used by [`super::HtmlSession`]
use super::BrowserError;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Something that can turn a URL into an HTML document
#[async_trait(?Send)]
pub trait PageSource {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<String, BrowserError>;
}

/// Fetches pages over HTTP
#[derive(Clone)]
pub struct HttpPageSource {
    client: Client,
}

impl HttpPageSource {
    pub fn new(user_agent: &str) -> Result<Self, BrowserError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| BrowserError::Navigation {
                url: String::new(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }
}

#[async_trait(?Send)]
impl PageSource for HttpPageSource {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<String, BrowserError> {
        let navigation = |e: reqwest::Error| BrowserError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self
            .client
            .get(url.as_str())
            .timeout(timeout)
            .send()
            .await
            .map_err(navigation)?;

        if !response.status().is_success() {
            return Err(BrowserError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let html = response.text().await.map_err(navigation)?;
        debug!("📄 Downloaded {} characters from {}", html.len(), url);
        Ok(html)
    }
}

/// Serves pre-recorded pages from memory, keyed by absolute URL.
///
/// Query strings are part of the key.
#[derive(Debug, Clone, Default)]
pub struct StaticPages {
    pages: HashMap<String, String>,
}

impl StaticPages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.insert(url, html);
        self
    }

    pub fn insert(&mut self, url: &str, html: impl Into<String>) {
        let key = Url::parse(url)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| url.to_string());
        self.pages.insert(key, html.into());
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[async_trait(?Send)]
impl PageSource for StaticPages {
    async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<String, BrowserError> {
        self.pages
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| BrowserError::HttpStatus {
                status: 404,
                url: url.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_pages_normalizes_keys() {
        let pages = StaticPages::new().with_page("https://example.com", "<p>home</p>");
        assert_eq!(pages.len(), 1);

        let url = Url::parse("https://example.com/").unwrap();
        let html = pages.fetch(&url, Duration::from_secs(1)).await.unwrap();
        assert_eq!(html, "<p>home</p>");
    }

    #[tokio::test]
    async fn test_static_pages_missing_page_is_404() {
        let pages = StaticPages::new();
        let url = Url::parse("https://example.com/missing").unwrap();

        match pages.fetch(&url, Duration::from_secs(1)).await {
            Err(BrowserError::HttpStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
