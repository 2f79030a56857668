/// Search page navigation
use crate::browser::{BrowserError, BrowserSession, Locator};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Issues title searches and applies the "movies only" filter
#[derive(Debug, Clone)]
pub struct SearchNavigator {
    base_url: String,
    filter_timeout: Duration,
    filter_controls: Vec<Locator>,
}

impl SearchNavigator {
    pub fn new(base_url: &str, filter_timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            filter_timeout,
            // Markup revisions differ on the filter control
            filter_controls: vec![
                Locator::css("li[data-filter='movie']"),
                Locator::xpath(
                    "//span[@data-qa='search-filter-text' and contains(text(), 'Movies')]",
                ),
            ],
        }
    }

    /// Search results URL for a title
    pub fn search_url(&self, title: &str) -> String {
        format!(
            "{}/search?search={}",
            self.base_url,
            urlencoding::encode(title.trim())
        )
    }

    pub async fn search<B: BrowserSession + ?Sized>(
        &self,
        session: &mut B,
        title: &str,
    ) -> Result<(), BrowserError> {
        let url = self.search_url(title);
        info!("🔍 Searching for '{}'", title.trim());
        session.navigate(&url).await
    }

    /// Try to activate the movies-only filter. Never fails: without the filter the
    /// resolver simply sees unfiltered results.
    pub async fn apply_movie_filter<B: BrowserSession + ?Sized>(&self, session: &mut B) {
        if let Err(e) = self.try_apply_movie_filter(session).await {
            warn!(
                "Could not click 'Movies' filter (may already be selected or missing): {}",
                e
            );
        }
    }

    async fn try_apply_movie_filter<B: BrowserSession + ?Sized>(
        &self,
        session: &mut B,
    ) -> Result<(), BrowserError> {
        session
            .wait_until_visible(&self.filter_controls[0], self.filter_timeout)
            .await
            .or_else(|first_error| {
                // The alternative control only counts if it is already present
                self.filter_controls[1..]
                    .iter()
                    .any(|locator| session.find_element(locator, None).is_ok())
                    .then_some(())
                    .ok_or(first_error)
            })?;

        let mut last_error = BrowserError::ElementNotFound("movie filter".to_string());
        for locator in &self.filter_controls {
            let control = match session.find_element(locator, None) {
                Ok(control) => control,
                Err(e) => {
                    last_error = e;
                    continue;
                }
            };
            match session.click(&control).await {
                Ok(()) => {
                    debug!("🎬 Movies filter applied via {}", locator);
                    return Ok(());
                }
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{HtmlSession, StaticPages};

    #[test]
    fn test_search_url_encodes_title() {
        let navigator = SearchNavigator::new("https://site.test/", Duration::from_secs(10));
        assert_eq!(
            navigator.search_url(" The Dark Knight "),
            "https://site.test/search?search=The%20Dark%20Knight"
        );
        assert_eq!(
            navigator.search_url("Tom & Jerry"),
            "https://site.test/search?search=Tom%20%26%20Jerry"
        );
    }

    #[tokio::test]
    async fn test_filter_followed_when_navigable() {
        let navigator = SearchNavigator::new("https://site.test", Duration::from_millis(20));
        let search = navigator.search_url("Heat");
        let pages = StaticPages::new()
            .with_page(
                &search,
                r#"<ul><li data-filter="movie"><a href="/search?search=Heat&amp;type=movie">Movies</a></li></ul>"#,
            )
            .with_page("https://site.test/search?search=Heat&type=movie", "<p id='filtered'></p>");
        let mut session = HtmlSession::new(pages).with_poll_interval(Duration::from_millis(5));

        navigator.search(&mut session, "Heat").await.unwrap();
        navigator.apply_movie_filter(&mut session).await;

        assert!(session.find_element(&Locator::css("#filtered"), None).is_ok());
    }

    #[tokio::test]
    async fn test_missing_filter_is_not_fatal() {
        let navigator = SearchNavigator::new("https://site.test", Duration::from_millis(20));
        let search = navigator.search_url("Heat");
        let pages = StaticPages::new().with_page(&search, "<p id='results'></p>");
        let mut session = HtmlSession::new(pages).with_poll_interval(Duration::from_millis(5));

        navigator.search(&mut session, "Heat").await.unwrap();
        navigator.apply_movie_filter(&mut session).await;

        // Still on the unfiltered results page
        assert!(session.find_element(&Locator::css("#results"), None).is_ok());
    }
}
