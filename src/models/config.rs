//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and fan-out behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Portal endpoint locations
    #[serde(default)]
    pub portal: PortalConfig,

    /// File names inside the storage directory
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if let Err(e) = self.portal.base() {
            return Err(AppError::validation(format!(
                "portal.base_url is invalid: {e}"
            )));
        }
        if self.portal.tehsils_path.trim().is_empty() || self.portal.shops_path.trim().is_empty() {
            return Err(AppError::validation("portal endpoint paths must be set"));
        }

        let files = [
            ("paths.states_dir", &self.paths.states_dir),
            ("paths.dataset_file", &self.paths.dataset_file),
            ("paths.previous_dataset_file", &self.paths.previous_dataset_file),
            ("paths.stats_file", &self.paths.stats_file),
        ];
        for (name, value) in files {
            if value.trim().is_empty() {
                return Err(AppError::validation(format!("{name} is empty")));
            }
        }
        if self.paths.dataset_file == self.paths.previous_dataset_file {
            return Err(AppError::validation(
                "paths.dataset_file and paths.previous_dataset_file must differ",
            ));
        }
        Ok(())
    }
}

/// HTTP client and fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum shop requests in flight for one state
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Where the directory web services live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Tehsil listing, queried with `statecode`
    #[serde(default = "defaults::tehsils_path")]
    pub tehsils_path: String,

    /// Shop listing, queried with `statecode`, `distcode` and `tehsilname`
    #[serde(default = "defaults::shops_path")]
    pub shops_path: String,
}

impl PortalConfig {
    /// Parsed base URL, normalized to end with a slash so paths join under it.
    pub fn base(&self) -> Result<Url> {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        Ok(Url::parse(&format!("{trimmed}/"))?)
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            tehsils_path: defaults::tehsils_path(),
            shops_path: defaults::shops_path(),
        }
    }
}

/// File layout relative to the storage directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding one JSON artifact per state
    #[serde(default = "defaults::states_dir")]
    pub states_dir: String,

    /// Consolidated CSV written by the latest run
    #[serde(default = "defaults::dataset_file")]
    pub dataset_file: String,

    /// The generation before `dataset_file`
    #[serde(default = "defaults::previous_dataset_file")]
    pub previous_dataset_file: String,

    /// Run statistics
    #[serde(default = "defaults::stats_file")]
    pub stats_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            states_dir: defaults::states_dir(),
            dataset_file: defaults::dataset_file(),
            previous_dataset_file: defaults::previous_dataset_file(),
            stats_file: defaults::stats_file(),
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; fps-crawler/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_concurrent() -> usize {
        8
    }

    // Portal defaults
    pub fn base_url() -> String {
        "https://impds.nic.in/sale".into()
    }
    pub fn tehsils_path() -> String {
        "fairPriceShopDetails".into()
    }
    pub fn shops_path() -> String {
        "FPSDetailsWebService".into()
    }

    // Path defaults
    pub fn states_dir() -> String {
        "states".into()
    }
    pub fn dataset_file() -> String {
        "ConsolidatedShops.csv".into()
    }
    pub fn previous_dataset_file() -> String {
        "previous_ConsolidatedShops.csv".into()
    }
    pub fn stats_file() -> String {
        "stats.json".into()
    }
}
