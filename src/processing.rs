use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::browser::BrowserSession;
use crate::config::Config;
use crate::movies::{
    Candidate, CandidateResolver, DetailExtractor, MovieQuery, MovieRecord, PartialRecord,
    SearchNavigator,
};

/// Bounded waits used during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeTimeouts {
    /// Session-wide default operation timeout
    pub default: Duration,
    /// Wait for the movies-only filter control
    pub filter: Duration,
    /// Wait for the detail page's score indicator
    pub detail: Duration,
}

impl Default for ScrapeTimeouts {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(60),
            filter: Duration::from_secs(10),
            detail: Duration::from_secs(15),
        }
    }
}

/// Everything the orchestrator needs to drive a batch
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub base_url: String,
    pub headless: bool,
    pub max_results: usize,
    pub timeouts: ScrapeTimeouts,
}

impl ScrapeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.site.base_url.clone(),
            headless: config.site.headless,
            max_results: config.search.max_results,
            timeouts: ScrapeTimeouts {
                default: Duration::from_secs(config.timeouts.default_seconds),
                filter: Duration::from_secs(config.timeouts.filter_seconds),
                detail: Duration::from_secs(config.timeouts.detail_seconds),
            },
        }
    }
}

/// Pipeline stage at which a title was abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureStage {
    Search,
    Resolve,
    Extract,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            FailureStage::Search => "search",
            FailureStage::Resolve => "resolve",
            FailureStage::Extract => "extract",
        };
        f.write_str(stage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFailure {
    pub movie_name: String,
    pub stage: FailureStage,
    pub reason: String,
}

/// Per-title progress through the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState {
    Pending,
    Searched,
    Resolved(Candidate),
    Extracted(PartialRecord),
    Finalized,
    Failed { stage: FailureStage, reason: String },
}

/// Result of processing one title
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub record: MovieRecord,
    pub failure: Option<QueryFailure>,
}

/// Overall batch results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub successful: usize,
    /// Titles that finished without an exact match
    pub unmatched: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records: Vec<MovieRecord>,
    pub failures: Vec<QueryFailure>,
}

impl BatchReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            total: 0,
            successful: 0,
            unmatched: 0,
            failed: 0,
            started_at,
            finished_at: started_at,
            records: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn push(&mut self, outcome: QueryOutcome) {
        self.total += 1;
        match outcome.failure {
            Some(failure) => {
                self.failed += 1;
                self.failures.push(failure);
            }
            None if outcome.record.is_success() => self.successful += 1,
            None => self.unmatched += 1,
        }
        self.records.push(outcome.record);
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    pub fn summary(&self) -> String {
        format!(
            "Processed {} movies: {} successful, {} without exact match, {} failed ({}s)",
            self.total,
            self.successful,
            self.unmatched,
            self.failed,
            self.elapsed().num_seconds()
        )
    }
}

/// Drives search, resolution and extraction for each title, strictly in order
pub struct BatchOrchestrator {
    settings: ScrapeSettings,
    navigator: SearchNavigator,
    resolver: CandidateResolver,
    extractor: DetailExtractor,
}

impl BatchOrchestrator {
    pub fn new(settings: ScrapeSettings) -> Self {
        info!(
            "🔧 Initializing BatchOrchestrator for {} (max {} results per search)",
            settings.base_url, settings.max_results
        );
        Self {
            navigator: SearchNavigator::new(&settings.base_url, settings.timeouts.filter),
            resolver: CandidateResolver::new(settings.max_results),
            extractor: DetailExtractor::new(settings.timeouts.detail),
            settings,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ScrapeSettings::from_config(config))
    }

    /// Process every title and return one record per title, in input order.
    ///
    /// The session is closed before returning, whatever happened to the titles.
    pub async fn run<B: BrowserSession + ?Sized>(
        &self,
        session: &mut B,
        titles: &[String],
    ) -> BatchReport {
        let mut report = BatchReport::new(Utc::now());
        info!("🚀 Starting batch of {} movies", titles.len());

        if let Err(e) = session
            .open_session(&self.settings.base_url, self.settings.headless)
            .await
        {
            warn!("Could not open {}: {}", self.settings.base_url, e);
        }
        session.set_timeout(self.settings.timeouts.default);

        let total = titles.len();
        for (index, title) in titles.iter().enumerate() {
            info!("[{}/{}] Processing: {}", index + 1, total, title.trim());
            let outcome = self
                .process_query(session, &MovieQuery::new(title.as_str()))
                .await;
            report.push(outcome);
        }

        session.close_all().await;
        report.finished_at = Utc::now();
        info!("✅ {}", report.summary());
        report
    }

    /// Run one title through the pipeline. Failures stay inside the outcome.
    pub async fn process_query<B: BrowserSession + ?Sized>(
        &self,
        session: &mut B,
        query: &MovieQuery,
    ) -> QueryOutcome {
        let mut record = MovieRecord::new(query.raw());
        let mut state = QueryState::Pending;

        loop {
            state = match state {
                QueryState::Pending => {
                    match self.navigator.search(session, query.search_text()).await {
                        Ok(()) => {
                            self.navigator.apply_movie_filter(session).await;
                            QueryState::Searched
                        }
                        Err(e) => QueryState::Failed {
                            stage: FailureStage::Search,
                            reason: e.to_string(),
                        },
                    }
                }
                QueryState::Searched => match self.resolver.resolve(session, query).await {
                    Ok(Some(candidate)) => QueryState::Resolved(candidate),
                    Ok(None) => {
                        info!("No exact match found for '{}'", query.search_text());
                        QueryState::Finalized
                    }
                    Err(e) => QueryState::Failed {
                        stage: FailureStage::Resolve,
                        reason: e.to_string(),
                    },
                },
                QueryState::Resolved(candidate) => {
                    match self.extractor.open(session, &candidate).await {
                        Ok(()) => QueryState::Extracted(self.extractor.extract(&*session)),
                        Err(e) => {
                            if let Err(back) = session.go_back().await {
                                debug!("Could not return to search results: {}", back);
                            }
                            QueryState::Failed {
                                stage: FailureStage::Extract,
                                reason: e.to_string(),
                            }
                        }
                    }
                }
                QueryState::Extracted(partial) => {
                    record.apply(partial);
                    info!(
                        "✅ Extracted '{}': Tomatometer {}, Audience {}",
                        query.search_text(),
                        record.tomatometer_score,
                        record.audience_score
                    );
                    QueryState::Finalized
                }
                QueryState::Finalized => return QueryOutcome { record, failure: None },
                QueryState::Failed { stage, reason } => {
                    warn!(
                        "⚠️ Error processing '{}' during {}: {}. Continuing to next movie...",
                        query.search_text(),
                        stage,
                        reason
                    );
                    return QueryOutcome {
                        record,
                        failure: Some(QueryFailure {
                            movie_name: query.raw().to_string(),
                            stage,
                            reason,
                        }),
                    };
                }
            };
        }
    }
}
