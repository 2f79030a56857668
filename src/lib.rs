/// Tomato Scraper - Rust Implementation
///
/// Movie review metadata scraper: searches a review site for each input title,
/// picks the most recent exact match and extracts scores, synopsis, rating,
/// genres and critic reviews into a relational table.

pub mod browser;
pub mod config;
pub mod input;
pub mod movies;
pub mod processing;
pub mod storage;

// Re-export main types for easy access
pub use crate::browser::{
    BrowserError, BrowserSession, HtmlSession, HttpPageSource, Locator, StaticPages,
};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::input::{InputError, TitleLoader};
pub use crate::movies::{MatchStatus, MovieQuery, MovieRecord, NOT_AVAILABLE, REVIEW_SLOTS};
pub use crate::processing::{
    BatchOrchestrator, BatchReport, FailureStage, ScrapeSettings, ScrapeTimeouts,
};
pub use crate::storage::{ResultSink, SinkError, SqliteSink};
