use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::browser::page_source::DEFAULT_USER_AGENT;
use crate::storage::is_valid_table_name;

/// Configuration for the movie scraper
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target site settings
    pub site: SiteConfig,

    /// Bounded waits
    pub timeouts: TimeoutConfig,

    /// Search result handling
    pub search: SearchConfig,

    /// Title list source
    pub input: InputConfig,

    /// Result database
    pub database: DatabaseConfig,

    /// Report and logging settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Home page; searches go to `<base_url>/search`
    pub base_url: String,

    /// User agent sent with every request
    pub user_agent: String,

    /// Run the browsing session without a visible window
    pub headless: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Session-wide operation timeout (seconds)
    pub default_seconds: u64,

    /// Wait for the movies filter control (seconds)
    pub filter_seconds: u64,

    /// Wait for the detail page score indicator (seconds)
    pub detail_seconds: u64,

    /// Re-check interval while waiting (milliseconds)
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Result rows considered per search
    pub max_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Spreadsheet (or `.txt` list) with the titles
    pub path: PathBuf,

    /// Header of the column holding titles
    pub column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL
    pub url: String,

    /// Result table
    pub table: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Write the batch report as JSON here
    pub report_path: Option<PathBuf>,

    /// Log level
    pub log_level: String,
}

impl Config {
    pub const SEARCH_PATHS: [&'static str; 3] = [
        "tomato-scraper.toml",
        "config/tomato-scraper.toml",
        "/etc/tomato-scraper/config.toml",
    ];

    /// Load configuration from the first readable config file, falling back to
    /// defaults. Environment overrides are applied either way.
    pub fn load() -> Result<Self> {
        for path in &Self::SEARCH_PATHS {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(mut config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        config.apply_env();
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        config.apply_env();
        Ok(config)
    }

    /// Defaults plus environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a variable lookup.
    ///
    /// `DATABASE` names a SQLite file; `DATABASE_URL` wins over it.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(base_url) = lookup("TOMATO_SCRAPER_BASE_URL") {
            self.site.base_url = base_url;
        }

        if let Some(headless) = lookup("TOMATO_SCRAPER_HEADLESS") {
            self.site.headless = matches!(headless.trim(), "1" | "true" | "yes");
        }

        if let Some(input) = lookup("TOMATO_SCRAPER_INPUT") {
            self.input.path = PathBuf::from(input);
        }

        if let Some(column) = lookup("TOMATO_SCRAPER_COLUMN") {
            self.input.column = column;
        }

        if let Some(max_results) = lookup("TOMATO_SCRAPER_MAX_RESULTS") {
            self.search.max_results = max_results.parse().unwrap_or(10);
        }

        if let Some(report) = lookup("TOMATO_SCRAPER_REPORT") {
            self.output.report_path = Some(PathBuf::from(report));
        }

        if let Some(log_level) = lookup("TOMATO_SCRAPER_LOG_LEVEL") {
            self.output.log_level = log_level;
        }

        if let Some(file) = lookup("DATABASE") {
            self.database.url = format!("sqlite://{}", file);
        }

        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.site.base_url)
            .map_err(|e| anyhow!("Invalid base_url '{}': {}", self.site.base_url, e))?;

        if self.search.max_results == 0 {
            return Err(anyhow!("max_results must be greater than 0"));
        }

        if self.timeouts.default_seconds == 0
            || self.timeouts.filter_seconds == 0
            || self.timeouts.detail_seconds == 0
        {
            return Err(anyhow!("timeouts must be greater than 0"));
        }

        if self.input.column.trim().is_empty() {
            return Err(anyhow!("input column must not be empty"));
        }

        if !is_valid_table_name(&self.database.table) {
            return Err(anyhow!("Invalid table name '{}'", self.database.table));
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Tomato Scraper Configuration:\n\
            - Site: {}\n\
            - Headless: {}\n\
            - Input: {} (column '{}')\n\
            - Database: {} (table '{}')\n\
            - Timeouts: {}s default, {}s filter, {}s detail\n\
            - Max Results: {}",
            self.site.base_url,
            self.site.headless,
            self.input.path.display(),
            self.input.column,
            self.database.url,
            self.database.table,
            self.timeouts.default_seconds,
            self.timeouts.filter_seconds,
            self.timeouts.detail_seconds,
            self.search.max_results
        )
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.rottentomatoes.com".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headless: false,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_seconds: 60,
            filter_seconds: 10,
            detail_seconds: 15,
            poll_interval_ms: 500,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { max_results: 10 }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("movies.xlsx"),
            column: "Movies".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://movies.db".to_string(),
            table: "movies".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_path: None,
            log_level: "info".to_string(),
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.site.base_url = base_url.to_string();
        self
    }

    pub fn with_input(mut self, path: PathBuf) -> Self {
        self.config.input.path = path;
        self
    }

    pub fn with_database_url(mut self, url: &str) -> Self {
        self.config.database.url = url.to_string();
        self
    }

    pub fn with_report(mut self, path: PathBuf) -> Self {
        self.config.output.report_path = Some(path);
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.config.search.max_results = max_results;
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.config.site.headless = headless;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
