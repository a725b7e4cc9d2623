//! Configuration types for metafetch

use crate::error::{Error, Result};
use crate::types::ItemKind;
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Per-run scheduling parameters.
///
/// Supplied by the caller on every `start`/`resume`; never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of items dispatched per batch, and the in-flight bound (default: 3)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Lower bound of the jittered pause between batches (default: 1s)
    #[serde(default = "default_min_delay", with = "duration_ms_serde")]
    pub min_delay: Duration,

    /// Upper bound of the jittered pause between batches (default: 3s)
    #[serde(default = "default_max_delay", with = "duration_ms_serde")]
    pub max_delay: Duration,

    /// Fixed wait after a batch hit the remote rate limit (default: 60s)
    #[serde(default = "default_rate_limit_wait", with = "duration_ms_serde")]
    pub rate_limit_wait: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            min_delay: default_min_delay(),
            max_delay: default_max_delay(),
            rate_limit_wait: default_rate_limit_wait(),
        }
    }
}

impl RunConfig {
    /// Reject settings that would make the scheduler loop meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::config("concurrency", "concurrency must be at least 1"));
        }
        if self.min_delay > self.max_delay {
            return Err(Error::config(
                "min_delay",
                format!(
                    "min_delay ({}ms) must not exceed max_delay ({}ms)",
                    self.min_delay.as_millis(),
                    self.max_delay.as_millis()
                ),
            ));
        }
        Ok(())
    }
}

/// Remote API settings used by [`HttpFetcher`](crate::fetcher::HttpFetcher)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Base URL of the remote API (default: "https://www.pixiv.net/")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Which endpoint family the item keys refer to (default: tags)
    #[serde(default)]
    pub kind: ItemKind,

    /// Locale picked out of the tag translation table (default: "en")
    #[serde(default = "default_language")]
    pub language: String,

    /// Per-request timeout (default: 30s)
    #[serde(default = "default_timeout", with = "duration_ms_serde")]
    pub timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Raw Cookie header forwarded as-is (None = anonymous)
    #[serde(default)]
    pub cookie: Option<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            kind: ItemKind::default(),
            language: default_language(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            cookie: None,
        }
    }
}

/// Where and under which name run state is persisted
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database path (default: "./metafetch.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Job name namespacing the work set and progress records (default: "tags")
    #[serde(default = "default_job")]
    pub job: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            job: default_job(),
        }
    }
}

/// Artifact flavour produced by the export utility
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// One sparse UPDATE statement per successful key (default)
    #[default]
    Sql,
    /// Remote asset reference paired with a destination file name
    Manifest,
}

/// Export settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Artifact flavour (default: sql)
    #[serde(default)]
    pub format: ExportFormat,

    /// Table targeted by generated UPDATE statements (default: "tags")
    #[serde(default = "default_table")]
    pub table: String,

    /// Column matched against the item key (default: "name")
    #[serde(default = "default_key_column")]
    pub key_column: String,

    /// Directory the file sink writes into (default: "./exports")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::default(),
            table: default_table(),
            key_column: default_key_column(),
            output_dir: default_output_dir(),
        }
    }
}

impl ExportConfig {
    /// Check that `table` and `key_column` are plain SQL identifiers
    pub fn validate(&self) -> Result<()> {
        if !is_sql_identifier(&self.table) {
            return Err(Error::config(
                "table",
                format!("'{}' is not a valid table name", self.table),
            ));
        }
        if !is_sql_identifier(&self.key_column) {
            return Err(Error::config(
                "key_column",
                format!("'{}' is not a valid column name", self.key_column),
            ));
        }
        Ok(())
    }
}

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Scheduling parameters for `start`/`resume`
    #[serde(default)]
    pub run: RunConfig,

    /// Remote API settings
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Durable state location
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Export settings
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    /// Load a JSON configuration file. Missing fields fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.run.validate()?;

        url::Url::parse(&self.fetcher.base_url)
            .map_err(|e| Error::config("base_url", format!("invalid base_url: {e}")))?;

        if self.persistence.job.trim().is_empty() {
            return Err(Error::config("job", "job name must not be empty"));
        }
        self.export.validate()
    }
}

fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn default_concurrency() -> usize {
    3
}

fn default_min_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_max_delay() -> Duration {
    Duration::from_millis(3000)
}

fn default_rate_limit_wait() -> Duration {
    Duration::from_secs(60)
}

fn default_base_url() -> String {
    "https://www.pixiv.net/".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("metafetch/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./metafetch.db")
}

fn default_job() -> String {
    "tags".to_string()
}

fn default_table() -> String {
    "tags".to_string()
}

fn default_key_column() -> String {
    "name".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./exports")
}

// Duration serialization helper (milliseconds)
pub(crate) mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
