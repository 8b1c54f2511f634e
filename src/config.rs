//! Configuration module for feedhook.

use serde::Deserialize;
use std::path::Path;

use crate::scheduler::normalize_cron;
use crate::{FeedhookError, Result};

/// Feed source configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Atom/RSS feed URL to crawl.
    #[serde(default = "default_feed_url")]
    pub url: String,
}

fn default_feed_url() -> String {
    "https://feeds.feedburner.com/geeknews-feed".to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
        }
    }
}

/// Chat webhook configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WebhookConfig {
    /// Webhook endpoint (required).
    #[serde(default)]
    pub url: String,
}

/// Cron schedules for the two cycles, evaluated in UTC.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// When to crawl the feed.
    #[serde(default = "default_crawl_cron")]
    pub crawl_cron: String,
    /// When to post undelivered news to the webhook.
    #[serde(default = "default_notification_cron")]
    pub notification_cron: String,
}

fn default_crawl_cron() -> String {
    "59 * * * *".to_string() // hourly at minute 59
}

fn default_notification_cron() -> String {
    "0 3 * * *".to_string() // 03:00 UTC daily
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            crawl_cron: default_crawl_cron(),
            notification_cron: default_notification_cron(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL.
    #[serde(default = "default_db_url")]
    pub url: String,
    /// Pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[cfg(feature = "sqlite")]
fn default_db_url() -> String {
    "sqlite://data/feedhook.db".to_string()
}

#[cfg(feature = "postgres")]
fn default_db_url() -> String {
    "postgres://localhost/feedhook".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file; stdout is always written.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Feed source.
    #[serde(default)]
    pub feed: FeedConfig,
    /// Webhook target.
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Cycle schedules.
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FeedhookError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FeedhookError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `RSS_FEED_URL`, `DISCORD_WEBHOOK_URL`
    /// - `CRAWL_CRON`, `NOTIFICATION_CRON`
    /// - `DATABASE_URL`, or `DB_HOST` with `DB_PORT`, `DB_USER`,
    ///   `DB_PASSWORD`, `DB_NAME` and `DB_SSLMODE`
    /// - `LOG_LEVEL`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(url) = get("RSS_FEED_URL") {
            self.feed.url = url;
        }
        if let Some(url) = get("DISCORD_WEBHOOK_URL") {
            self.webhook.url = url;
        }
        if let Some(cron) = get("CRAWL_CRON") {
            self.schedule.crawl_cron = cron;
        }
        if let Some(cron) = get("NOTIFICATION_CRON") {
            self.schedule.notification_cron = cron;
        }
        if let Some(level) = get("LOG_LEVEL") {
            self.logging.level = level;
        }

        // DATABASE_URL wins over the split DB_* variables
        if let Some(url) = get("DATABASE_URL") {
            self.database.url = url;
        } else if let Some(host) = get("DB_HOST") {
            let port = get("DB_PORT").unwrap_or_else(|| "5432".to_string());
            let user = get("DB_USER").unwrap_or_default();
            let password = get("DB_PASSWORD").unwrap_or_default();
            let name = get("DB_NAME").unwrap_or_else(|| "feedhook".to_string());
            let sslmode = get("DB_SSLMODE").unwrap_or_else(|| "disable".to_string());
            self.database.url =
                compose_postgres_url(&host, &port, &user, &password, &name, &sslmode);
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - The webhook URL is unset or not http(s)
    /// - The feed URL is unset or not http(s)
    /// - Either cron expression is malformed
    pub fn validate(&self) -> Result<()> {
        if self.webhook.url.is_empty() {
            return Err(FeedhookError::Config(
                "webhook url is not set. \
                 Set [webhook] url in config.toml or DISCORD_WEBHOOK_URL."
                    .to_string(),
            ));
        }
        validate_http_url("webhook url", &self.webhook.url)?;

        if self.feed.url.is_empty() {
            return Err(FeedhookError::Config("feed url is not set".to_string()));
        }
        validate_http_url("feed url", &self.feed.url)?;

        normalize_cron(&self.schedule.crawl_cron)?;
        normalize_cron(&self.schedule.notification_cron)?;
        Ok(())
    }
}

fn validate_http_url(name: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| FeedhookError::Config(format!("invalid {name} '{value}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(FeedhookError::Config(format!(
            "unsupported scheme for {name}: {scheme}"
        ))),
    }
}

fn compose_postgres_url(
    host: &str,
    port: &str,
    user: &str,
    password: &str,
    name: &str,
    sslmode: &str,
) -> String {
    let credentials = match (user.is_empty(), password.is_empty()) {
        (true, _) => String::new(),
        (false, true) => format!("{}@", urlencoding::encode(user)),
        (false, false) => format!(
            "{}:{}@",
            urlencoding::encode(user),
            urlencoding::encode(password)
        ),
    };
    format!("postgres://{credentials}{host}:{port}/{name}?sslmode={sslmode}")
}
