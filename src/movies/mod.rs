/// Movie matching and metadata extraction
///
/// This module holds the search-match-extract pipeline for a single title: the
/// navigator issues the search, the resolver picks the best exact match and the
/// extractor reads the detail page through ordered locator cascades.

pub mod cascade;
pub mod extractor;
pub mod navigator;
pub mod normalize;
pub mod resolver;

// Re-export main types
pub use cascade::{Capture, LocatorCascade, Strategy};
pub use extractor::{DetailExtractor, PartialRecord};
pub use navigator::SearchNavigator;
pub use normalize::{normalize, normalize_genres};
pub use resolver::CandidateResolver;

use crate::browser::ElementHandle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder for any field that could not be extracted
pub const NOT_AVAILABLE: &str = "N/A";

/// Number of critic review slots on every record
pub const REVIEW_SLOTS: usize = 5;

/// A single input title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieQuery {
    raw: String,
}

impl MovieQuery {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Title as supplied by the input list
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Title used for the search request
    pub fn search_text(&self) -> &str {
        self.raw.trim()
    }

    /// Comparison key: trimmed and lowercased
    pub fn key(&self) -> String {
        self.raw.trim().to_lowercase()
    }

    pub fn matches_title(&self, title: &str) -> bool {
        title.trim().to_lowercase() == self.key()
    }
}

/// A search-result entry considered for matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    /// `None` when no year signal could be extracted
    pub year: Option<u32>,
    /// Element that opens the candidate's detail page
    pub handle: ElementHandle,
}

impl Candidate {
    /// Sort key for the most-recent tie-break; unknown years count as 0
    pub fn year_key(&self) -> u32 {
        self.year.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    #[serde(rename = "Success")]
    Success,
    #[serde(rename = "No exact match found")]
    NoExactMatch,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Success => "Success",
            MatchStatus::NoExactMatch => "No exact match found",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output row: exactly one per input title
///
/// Serialized flat, with reviews as `review_1` to `review_5` like the result table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "MovieRow", from = "MovieRow")]
pub struct MovieRecord {
    pub movie_name: String,
    pub tomatometer_score: String,
    pub audience_score: String,
    pub storyline: String,
    pub rating: String,
    pub genres: String,
    pub reviews: [String; REVIEW_SLOTS],
    pub status: MatchStatus,
}

impl MovieRecord {
    /// A record with every data field at its default
    pub fn new(movie_name: impl Into<String>) -> Self {
        Self {
            movie_name: movie_name.into(),
            tomatometer_score: NOT_AVAILABLE.to_string(),
            audience_score: NOT_AVAILABLE.to_string(),
            storyline: NOT_AVAILABLE.to_string(),
            rating: NOT_AVAILABLE.to_string(),
            genres: NOT_AVAILABLE.to_string(),
            reviews: std::array::from_fn(|_| NOT_AVAILABLE.to_string()),
            status: MatchStatus::NoExactMatch,
        }
    }

    /// Apply a completed extraction and mark the record successful.
    ///
    /// Empty values fall back to `N/A`.
    pub fn apply(&mut self, partial: PartialRecord) {
        self.tomatometer_score = or_default(partial.tomatometer_score);
        self.audience_score = or_default(partial.audience_score);
        self.storyline = or_default(partial.storyline);
        self.rating = or_default(partial.rating);
        self.genres = or_default(partial.genres);

        let mut reviews = partial.reviews.into_iter();
        for slot in self.reviews.iter_mut() {
            *slot = or_default(reviews.next());
        }
        self.status = MatchStatus::Success;
    }

    pub fn is_success(&self) -> bool {
        self.status == MatchStatus::Success
    }

    /// True when every data field still holds its default
    pub fn has_default_fields(&self) -> bool {
        [
            &self.tomatometer_score,
            &self.audience_score,
            &self.storyline,
            &self.rating,
            &self.genres,
        ]
        .into_iter()
        .chain(self.reviews.iter())
        .all(|value| value == NOT_AVAILABLE)
    }
}

#[derive(Serialize, Deserialize)]
struct MovieRow {
    movie_name: String,
    tomatometer_score: String,
    audience_score: String,
    storyline: String,
    rating: String,
    genres: String,
    review_1: String,
    review_2: String,
    review_3: String,
    review_4: String,
    review_5: String,
    status: MatchStatus,
}

impl From<MovieRecord> for MovieRow {
    fn from(record: MovieRecord) -> Self {
        let [review_1, review_2, review_3, review_4, review_5] = record.reviews;
        Self {
            movie_name: record.movie_name,
            tomatometer_score: record.tomatometer_score,
            audience_score: record.audience_score,
            storyline: record.storyline,
            rating: record.rating,
            genres: record.genres,
            review_1,
            review_2,
            review_3,
            review_4,
            review_5,
            status: record.status,
        }
    }
}

impl From<MovieRow> for MovieRecord {
    fn from(row: MovieRow) -> Self {
        Self {
            movie_name: row.movie_name,
            tomatometer_score: row.tomatometer_score,
            audience_score: row.audience_score,
            storyline: row.storyline,
            rating: row.rating,
            genres: row.genres,
            reviews: [row.review_1, row.review_2, row.review_3, row.review_4, row.review_5],
            status: row.status,
        }
    }
}

fn or_default(value: Option<String>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_identity() {
        let query = MovieQuery::new("  The Matrix ");
        assert_eq!(query.key(), "the matrix");
        assert_eq!(query.search_text(), "The Matrix");
        assert_eq!(query.raw(), "  The Matrix ");
        assert!(query.matches_title("the MATRIX"));
        assert!(!query.matches_title("The Matrix Reloaded"));
    }

    #[test]
    fn test_new_record_has_defaults() {
        let record = MovieRecord::new("Heat");
        assert_eq!(record.status, MatchStatus::NoExactMatch);
        assert!(record.has_default_fields());
        assert_eq!(record.reviews.len(), REVIEW_SLOTS);
    }

    #[test]
    fn test_apply_pads_reviews_and_sets_success() {
        let mut record = MovieRecord::new("Heat");
        record.apply(PartialRecord {
            tomatometer_score: Some("88%".to_string()),
            audience_score: None,
            storyline: Some(String::new()),
            rating: Some("R".to_string()),
            genres: Some("Crime, Drama".to_string()),
            reviews: vec!["Taut.".to_string(), "Epic.".to_string()],
        });

        assert!(record.is_success());
        assert_eq!(record.tomatometer_score, "88%");
        assert_eq!(record.audience_score, NOT_AVAILABLE);
        assert_eq!(record.storyline, NOT_AVAILABLE);
        assert_eq!(record.reviews[1], "Epic.");
        assert!(record.reviews[2..].iter().all(|r| r == NOT_AVAILABLE));
    }

    #[test]
    fn test_record_serializes_reviews_as_columns() {
        let mut record = MovieRecord::new("Heat");
        record.apply(PartialRecord {
            reviews: vec!["Taut.".to_string(), "Epic.".to_string()],
            ..PartialRecord::default()
        });

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["review_1"], "Taut.");
        assert_eq!(json["review_2"], "Epic.");
        assert_eq!(json["review_5"], NOT_AVAILABLE);
        assert_eq!(json["status"], "Success");
        assert!(json.get("reviews").is_none());

        let back: MovieRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_status_serializes_as_label() {
        let json = serde_json::to_string(&MatchStatus::NoExactMatch).unwrap();
        assert_eq!(json, "\"No exact match found\"");
        assert_eq!(MatchStatus::Success.to_string(), "Success");
    }
}
