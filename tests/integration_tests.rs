use std::time::Duration;

use tomato_scraper_rust::movies::SearchNavigator;
use tomato_scraper_rust::processing::QueryFailure;
use tomato_scraper_rust::{
    BatchOrchestrator, FailureStage, HtmlSession, MatchStatus, ResultSink, ScrapeSettings,
    ScrapeTimeouts, SqliteSink, StaticPages, NOT_AVAILABLE,
};

const BASE: &str = "https://site.test";

fn settings() -> ScrapeSettings {
    ScrapeSettings {
        base_url: BASE.to_string(),
        headless: true,
        max_results: 10,
        timeouts: ScrapeTimeouts {
            default: Duration::from_secs(1),
            filter: Duration::from_millis(10),
            detail: Duration::from_millis(10),
        },
    }
}

fn search_url(title: &str) -> String {
    SearchNavigator::new(BASE, Duration::from_millis(10)).search_url(title)
}

fn site() -> StaticPages {
    StaticPages::new()
        .with_page(BASE, "<html><body><h1>Home</h1></body></html>")
        .with_page(
            &search_url("Inception"),
            r#"<html><body>
                <ul><li data-filter="movie"><a href="/search?search=Inception&amp;type=movie">Movies</a></li></ul>
            </body></html>"#,
        )
        .with_page(
            &format!("{}/search?search=Inception&type=movie", BASE),
            r#"<html><body>
              <search-page-result type="movie">
                <search-page-media-row data-qa="data-row" releaseyear="2010">
                  <a slot="title" href="/m/inception_the_cobol_job">Inception: The Cobol Job</a>
                </search-page-media-row>
                <search-page-media-row data-qa="data-row" releaseyear="2010">
                  <a slot="title" href="/m/inception">Inception</a>
                </search-page-media-row>
              </search-page-result>
            </body></html>"#,
        )
        .with_page(
            &format!("{}/m/inception", BASE),
            r#"<html><body>
              <score-board tomatometerscore="87" audiencescore="91"></score-board>
              <rt-text slot="criticsScore">87%</rt-text>
              <rt-text slot="audienceScore">91%</rt-text>
              <rt-text slot="content">Dom Cobb is a skilled thief,   the absolute best in the dangerous art of extraction.</rt-text>
              <rt-text slot="metadataProp">PG-13,</rt-text>
              <rt-link data-qa="item-value" href="/browse/movies_at_home/genres:action">Action</rt-link>
              <rt-link data-qa="item-value" href="/browse/movies_at_home/genres:mystery_and_thriller">Mystery &amp; Thriller/ Sci-Fi</rt-link>
              <media-review-card-critic><rt-text data-qa="review-text">A dazzling puzzle.</rt-text></media-review-card-critic>
              <media-review-card-critic><rt-text data-qa="review-text">Ambitious and cerebral.</rt-text></media-review-card-critic>
              <blockquote>A dazzling puzzle.</blockquote>
              <blockquote>Nolan at his most inventive.</blockquote>
            </body></html>"#,
        )
        .with_page(
            &search_url("Heat"),
            r#"<html><body>
              <search-page-media-row data-qa="data-row">
                <a data-qa="info-name" href="/m/heat">Heat</a>
                <span data-qa="info-year">(1995)</span>
              </search-page-media-row>
            </body></html>"#,
        )
        // Detail page that never shows a score indicator
        .with_page(&format!("{}/m/heat", BASE), "<html><body><h1>Heat</h1></body></html>")
        .with_page(
            &search_url("Nonexistent Movie XYZ"),
            r#"<html><body>
              <search-page-result type="movie">
                <search-page-media-row data-qa="data-row" releaseyear="2001">
                  <a slot="title" href="/m/nonexistent_movie">Nonexistent Movie</a>
                </search-page-media-row>
              </search-page-result>
            </body></html>"#,
        )
}

fn titles() -> Vec<String> {
    ["Inception", "Heat", "Nonexistent Movie XYZ"]
        .iter()
        .map(|t| t.to_string())
        .collect()
}

async fn run_batch() -> tomato_scraper_rust::BatchReport {
    let mut session = HtmlSession::new(site()).with_poll_interval(Duration::from_millis(2));
    BatchOrchestrator::new(settings()).run(&mut session, &titles()).await
}

#[tokio::test]
async fn test_one_record_per_title_in_order() {
    let report = run_batch().await;

    assert_eq!(report.total, 3);
    let names: Vec<&str> = report.records.iter().map(|r| r.movie_name.as_str()).collect();
    assert_eq!(names, vec!["Inception", "Heat", "Nonexistent Movie XYZ"]);
    assert_eq!((report.successful, report.unmatched, report.failed), (1, 1, 1));
}

#[tokio::test]
async fn test_inception_is_fully_extracted() {
    let report = run_batch().await;
    let inception = &report.records[0];

    assert_eq!(inception.status, MatchStatus::Success);
    assert_eq!(inception.tomatometer_score, "87%");
    assert_eq!(inception.audience_score, "91%");
    assert_eq!(
        inception.storyline,
        "Dom Cobb is a skilled thief, the absolute best in the dangerous art of extraction."
    );
    assert_eq!(inception.rating, "PG-13");
    assert_eq!(inception.genres, "Action, Mystery & Thriller, Sci-Fi");
    assert_eq!(inception.reviews[0], "A dazzling puzzle.");
    assert_eq!(inception.reviews[1], "Ambitious and cerebral.");
    assert_eq!(inception.reviews[2], "Nolan at his most inventive.");
    assert_eq!(inception.reviews[3], NOT_AVAILABLE);
    assert_eq!(inception.reviews[4], NOT_AVAILABLE);
}

#[tokio::test]
async fn test_unsuccessful_records_keep_defaults() {
    let report = run_batch().await;

    for record in report.records.iter().filter(|r| !r.is_success()) {
        assert_eq!(record.status, MatchStatus::NoExactMatch);
        assert!(record.has_default_fields(), "{} has extracted data", record.movie_name);
    }

    let nonexistent = &report.records[2];
    assert_eq!(nonexistent.status.as_str(), "No exact match found");
}

#[tokio::test]
async fn test_detail_timeout_fails_only_that_title() {
    let report = run_batch().await;

    assert_eq!(report.failures.len(), 1);
    let QueryFailure {
        movie_name, stage, ..
    } = &report.failures[0];
    assert_eq!(movie_name, "Heat");
    assert_eq!(*stage, FailureStage::Extract);

    // The batch kept going after the timeout
    assert_eq!(report.records[2].movie_name, "Nonexistent Movie XYZ");
}

#[tokio::test]
async fn test_batch_persisted_to_sqlite() {
    let report = run_batch().await;

    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("results.db").display());
    let sink = SqliteSink::connect(&url, "movies").await.unwrap();

    assert_eq!(sink.save(&report.records).await.unwrap(), 3);

    let statuses: Vec<(String, String)> =
        sqlx::query_as("SELECT movie_name, status FROM movies ORDER BY id")
            .fetch_all(sink.pool())
            .await
            .unwrap();
    assert_eq!(
        statuses,
        vec![
            ("Inception".to_string(), "Success".to_string()),
            ("Heat".to_string(), "No exact match found".to_string()),
            ("Nonexistent Movie XYZ".to_string(), "No exact match found".to_string()),
        ]
    );
    sink.close().await;
}
