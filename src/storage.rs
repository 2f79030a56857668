/// Result persistence: SQLite table plus an optional JSON report
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{error, info};

use crate::movies::MovieRecord;
use crate::processing::BatchReport;

static TABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("invalid table name '{0}'")]
    InvalidTable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Destination for a finished batch of records
#[async_trait]
pub trait ResultSink {
    /// Persist all records atomically. Returns the number of rows written.
    async fn save(&self, records: &[MovieRecord]) -> Result<u64, SinkError>;

    /// Release the underlying connection.
    async fn close(&self);
}

pub fn is_valid_table_name(name: &str) -> bool {
    TABLE_NAME.is_match(name)
}

/// SQLite-backed result sink
pub struct SqliteSink {
    pool: SqlitePool,
    table: String,
}

impl SqliteSink {
    /// Connect to `database_url`, creating the database file if needed.
    pub async fn connect(database_url: &str, table: &str) -> Result<Self, SinkError> {
        if !is_valid_table_name(table) {
            return Err(SinkError::InvalidTable(table.to_string()));
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        info!("🗄️ Connected to {}", database_url);
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn create_table_sql(&self) -> String {
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                movie_name TEXT,
                tomatometer_score TEXT,
                audience_score TEXT,
                storyline TEXT,
                rating TEXT,
                genres TEXT,
                review_1 TEXT,
                review_2 TEXT,
                review_3 TEXT,
                review_4 TEXT,
                review_5 TEXT,
                status TEXT
            )
            "#,
            self.table
        )
    }

    fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (movie_name, tomatometer_score, audience_score, storyline, \
             rating, genres, review_1, review_2, review_3, review_4, review_5, status) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.table
        )
    }

    async fn write_all(&self, records: &[MovieRecord]) -> Result<u64, SinkError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&self.create_table_sql())
            .execute(&mut *tx)
            .await?;

        let insert = self.insert_sql();
        let mut written = 0;
        for record in records {
            let [review_1, review_2, review_3, review_4, review_5] = &record.reviews;
            written += sqlx::query(&insert)
                .bind(&record.movie_name)
                .bind(&record.tomatometer_score)
                .bind(&record.audience_score)
                .bind(&record.storyline)
                .bind(&record.rating)
                .bind(&record.genres)
                .bind(review_1)
                .bind(review_2)
                .bind(review_3)
                .bind(review_4)
                .bind(review_5)
                .bind(record.status.as_str())
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }
}

#[async_trait]
impl ResultSink for SqliteSink {
    async fn save(&self, records: &[MovieRecord]) -> Result<u64, SinkError> {
        match self.write_all(records).await {
            Ok(written) => {
                info!("💾 Saved {} records to table '{}'", written, self.table);
                Ok(written)
            }
            Err(e) => {
                error!("Database error: {}", e);
                self.close().await;
                Err(e)
            }
        }
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Write the batch report as pretty-printed JSON
pub async fn write_report(report: &BatchReport, path: &Path) -> Result<(), SinkError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json_data = serde_json::to_string_pretty(report)?;
    tokio::fs::write(path, json_data).await?;
    info!("💾 Report saved to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movies::{MatchStatus, PartialRecord};

    fn records() -> Vec<MovieRecord> {
        let mut inception = MovieRecord::new("Inception");
        inception.apply(PartialRecord {
            tomatometer_score: Some("87%".to_string()),
            audience_score: Some("91%".to_string()),
            storyline: Some("Dreams within dreams.".to_string()),
            rating: Some("PG-13".to_string()),
            genres: Some("Action, Sci-Fi".to_string()),
            reviews: vec!["Dazzling.".to_string()],
        });
        vec![inception, MovieRecord::new("Nonexistent Movie XYZ")]
    }

    async fn sink(dir: &tempfile::TempDir) -> SqliteSink {
        let url = format!("sqlite://{}", dir.path().join("movies.db").display());
        SqliteSink::connect(&url, "movies").await.unwrap()
    }

    #[test]
    fn test_table_name_validation() {
        assert!(is_valid_table_name("movies"));
        assert!(is_valid_table_name("_movies_2024"));
        assert!(!is_valid_table_name("movies; DROP TABLE x"));
        assert!(!is_valid_table_name("1movies"));
        assert!(!is_valid_table_name(""));
    }

    #[tokio::test]
    async fn test_rejects_invalid_table() {
        let result = SqliteSink::connect("sqlite::memory:", "bad name").await;
        assert!(matches!(result, Err(SinkError::InvalidTable(_))));
    }

    #[tokio::test]
    async fn test_save_creates_table_and_inserts_rows() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink(&dir).await;

        let written = sink.save(&records()).await.unwrap();
        assert_eq!(written, 2);

        let rows: Vec<(i64, String, String, String, String)> = sqlx::query_as(
            "SELECT id, movie_name, tomatometer_score, review_2, status FROM movies ORDER BY id",
        )
        .fetch_all(sink.pool())
        .await
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1, "Inception");
        assert_eq!(rows[0].2, "87%");
        assert_eq!(rows[0].3, "N/A");
        assert_eq!(rows[0].4, "Success");
        assert_eq!(rows[1].4, MatchStatus::NoExactMatch.as_str());

        // Re-running appends to the existing table
        sink.save(&records()).await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM movies")
            .fetch_one(sink.pool())
            .await
            .unwrap();
        assert_eq!(count, 4);
        sink.close().await;
    }

    #[tokio::test]
    async fn test_report_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("batch.json");
        let report = BatchReport {
            total: 2,
            successful: 1,
            unmatched: 1,
            failed: 0,
            started_at: chrono::Utc::now(),
            finished_at: chrono::Utc::now(),
            records: records(),
            failures: Vec::new(),
        };

        write_report(&report, &path).await.unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["total"], 2);
        assert_eq!(json["records"][0]["movie_name"], "Inception");
        assert_eq!(json["records"][0]["review_1"], "Dazzling.");
        assert_eq!(json["records"][0]["review_2"], "N/A");
        assert_eq!(json["records"][1]["status"], "No exact match found");
    }
}
