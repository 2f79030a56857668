/// Detail page extraction
use super::cascade::{strip_trailing_separator, Capture, LocatorCascade, Strategy};
use super::normalize::{normalize, normalize_genres};
use super::{Candidate, REVIEW_SLOTS};
use crate::browser::{BrowserError, BrowserSession, Locator};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Any of these marks a loaded detail page
const PRIMARY_INDICATOR: &str =
    "rt-text[slot='criticsScore'], [data-qa='tomatometer-score'], score-board";

const REVIEW_CARDS: &str = "media-review-card-critic rt-text[data-qa='review-text']";

const SUPPLEMENTAL_REVIEWS: [&str; 8] = [
    "div[data-qa='review-quote']",
    "blockquote",
    ".the_review",
    "p.review-quote",
    "div.review_quote",
    "p[data-qa='review-quote']",
    "div.review-text",
    "div.review__text",
];

/// Fields read from one detail page, already normalized.
///
/// `None` means every strategy for that field failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialRecord {
    pub tomatometer_score: Option<String>,
    pub audience_score: Option<String>,
    pub storyline: Option<String>,
    pub rating: Option<String>,
    pub genres: Option<String>,
    /// At most five, in page order
    pub reviews: Vec<String>,
}

pub struct DetailExtractor {
    detail_timeout: Duration,
    tomatometer: LocatorCascade,
    audience: LocatorCascade,
    storyline: LocatorCascade,
    rating: LocatorCascade,
    genres: LocatorCascade,
}

impl DetailExtractor {
    pub fn new(detail_timeout: Duration) -> Self {
        let joined = Capture::AllText { separator: ", " };
        Self {
            detail_timeout,
            tomatometer: LocatorCascade::new(
                "tomatometer_score",
                vec![
                    Strategy::new(
                        Locator::css("rt-text[slot='criticsScore']"),
                        Capture::TextOrContent,
                    ),
                    Strategy::text(Locator::css("[data-qa='tomatometer-score']")),
                    Strategy::attribute(Locator::css("score-board"), "tomatometerscore"),
                ],
            ),
            audience: LocatorCascade::new(
                "audience_score",
                vec![
                    Strategy::new(
                        Locator::css("rt-text[slot='audienceScore']"),
                        Capture::TextOrContent,
                    ),
                    Strategy::text(Locator::css("[data-qa='audience-score']")),
                    Strategy::attribute(Locator::css("score-board"), "audiencescore"),
                ],
            ),
            storyline: LocatorCascade::new(
                "storyline",
                vec![
                    Strategy::text(Locator::css("rt-text[slot='content']")),
                    Strategy::text(Locator::css(
                        "div.synopsis-wrap rt-text[data-qa='synopsis-value']",
                    )),
                    Strategy::text(Locator::css("[data-qa='synopsis'], .synopsis, .plot-synopsis")),
                ],
            ),
            rating: LocatorCascade::new(
                "rating",
                vec![
                    Strategy::text(Locator::css("rt-text[slot='metadataProp']"))
                        .map(strip_trailing_separator),
                    Strategy::text(Locator::css(
                        "div.category-wrap[data-qa='item'] rt-text[data-qa='item-value']",
                    )),
                    Strategy::text(Locator::css("[data-qa='rating'], .rating, .mpaa-rating")),
                ],
            ),
            genres: LocatorCascade::new(
                "genres",
                vec![
                    Strategy::new(
                        Locator::xpath(
                            "//rt-link[@data-qa='item-value' and contains(@href, 'genres:')]",
                        ),
                        joined.clone(),
                    ),
                    Strategy::new(Locator::css("rt-text[slot='metadataGenre']"), joined),
                ],
            ),
        }
    }

    /// Activate the candidate and wait for the detail page's score indicator.
    ///
    /// Errors here abort the current title.
    pub async fn open<B: BrowserSession + ?Sized>(
        &self,
        session: &mut B,
        candidate: &Candidate,
    ) -> Result<(), BrowserError> {
        info!("📄 Opening '{}' ({})", candidate.title, candidate.year_key());
        session.click(&candidate.handle).await?;
        session
            .wait_until_visible(&Locator::css(PRIMARY_INDICATOR), self.detail_timeout)
            .await
    }

    /// Read every field from the current page. Each field fails on its own.
    pub fn extract<B: BrowserSession + ?Sized>(&self, session: &B) -> PartialRecord {
        let tomatometer_score = self
            .tomatometer
            .first_success(session, None)
            .map(|v| normalize(&v));
        let audience_score = self
            .audience
            .first_success(session, None)
            .map(|v| normalize(&v));
        debug!(
            "Tomatometer: {}, Audience: {}",
            tomatometer_score.as_deref().unwrap_or("N/A"),
            audience_score.as_deref().unwrap_or("N/A")
        );

        PartialRecord {
            tomatometer_score,
            audience_score,
            storyline: self.storyline.first_success(session, None).map(|v| normalize(&v)),
            rating: self.rating.first_success(session, None).map(|v| normalize(&v)),
            genres: self.genres.first_success(session, None).map(|v| normalize_genres(&v)),
            reviews: self
                .collect_reviews(session)
                .iter()
                .map(|review| normalize(review))
                .collect(),
        }
    }

    /// Critic review cards first, then older review markup without duplicates.
    fn collect_reviews<B: BrowserSession + ?Sized>(&self, session: &B) -> Vec<String> {
        let mut reviews = Vec::with_capacity(REVIEW_SLOTS);

        match session.find_elements(&Locator::css(REVIEW_CARDS), None) {
            Ok(cards) => {
                for card in cards.iter().take(REVIEW_SLOTS) {
                    match session.get_text(card) {
                        Ok(text) if !text.trim().is_empty() => {
                            reviews.push(text.trim().to_string())
                        }
                        Ok(_) => {}
                        Err(e) => debug!("reviews: card unreadable: {}", e),
                    }
                }
            }
            Err(e) => debug!("reviews: card lookup failed: {}", e),
        }

        for selector in SUPPLEMENTAL_REVIEWS {
            if reviews.len() >= REVIEW_SLOTS {
                break;
            }
            let elements = match session.find_elements(&Locator::css(selector), None) {
                Ok(elements) => elements,
                Err(e) => {
                    debug!("reviews: {} failed: {}", selector, e);
                    continue;
                }
            };
            for element in elements {
                if reviews.len() >= REVIEW_SLOTS {
                    break;
                }
                let Ok(text) = session.get_text(&element) else {
                    continue;
                };
                let text = text.trim();
                if !text.is_empty() && !reviews.iter().any(|r| r == text) {
                    reviews.push(text.to_string());
                }
            }
        }

        debug!("reviews: collected {}", reviews.len());
        reviews
    }
}
