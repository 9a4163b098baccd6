use crate::error::{CollectorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the metadata collector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// What to collect and where to store it
    pub collector: CollectorConfig,

    /// HTTP fetch settings
    pub http: HttpConfig,

    /// Meta tag extraction settings
    pub extract: ExtractConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollectorConfig {
    /// Video identifiers to collect, in processing order
    pub video_ids: Vec<String>,

    /// Directory holding the date-stamped store files
    pub store_dir: PathBuf,

    /// Store file name prefix, followed by `YYYYMMDD.json`
    pub file_prefix: String,

    /// Stamp store files with the UTC date instead of the local date
    pub use_utc: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Watch page URL; the identifier is appended as the `v` query parameter
    pub base_url: String,

    /// User agent sent with every request
    pub user_agent: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Honor HTTP(S)_PROXY and friends from the environment
    pub use_system_proxy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractConfig {
    /// Attribute holding the property name
    pub name_attribute: String,

    /// Attribute holding the property value
    pub value_attribute: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when RUST_LOG is unset
    pub level: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            video_ids: vec![
                "GTWogFFA7TE".to_string(),
                "BKLVpDTZOPQ".to_string(),
                "qpfJRZfuesU".to_string(),
            ],
            store_dir: PathBuf::from("data/metadata/video"),
            file_prefix: "video_metadata_".to_string(),
            use_utc: false,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.youtube.com/watch".to_string(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            timeout_seconds: 30,
            use_system_proxy: true,
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            name_attribute: "itemprop".to_string(),
            value_attribute: "content".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Filter directive used when RUST_LOG is unset
    pub fn filter_directive(&self, verbose: bool) -> String {
        if verbose {
            "debug".to_string()
        } else {
            format!("tube_metadata={},warn", self.level)
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collector: CollectorConfig::default(),
            http: HttpConfig::default(),
            extract: ExtractConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, then apply
    /// environment overrides. Missing files are not an error.
    pub fn load() -> Result<Self> {
        let config_paths = ["tube-metadata.toml", "config/tube-metadata.toml"];

        let mut config = None;
        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(loaded) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        config = Some(loaded);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        let mut config = config.unwrap_or_default();
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from an explicit path. Unlike `load`, a missing or
    /// malformed file is an error.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str =
            std::fs::read_to_string(path).map_err(|e| CollectorError::io_at(path, e))?;
        let mut config: Config = toml::from_str(&config_str)?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        config.apply_env();
        Ok(config)
    }

    /// Apply `TUBE_METADATA_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(store_dir) = lookup("TUBE_METADATA_STORE_DIR") {
            self.collector.store_dir = PathBuf::from(store_dir);
        }

        if let Some(ids) = lookup("TUBE_METADATA_VIDEO_IDS") {
            self.collector.video_ids = ids
                .split(',')
                .map(|id| id.trim())
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(base_url) = lookup("TUBE_METADATA_BASE_URL") {
            self.http.base_url = base_url;
        }

        if let Some(timeout) = lookup("TUBE_METADATA_TIMEOUT") {
            match timeout.parse() {
                Ok(seconds) => self.http.timeout_seconds = seconds,
                Err(_) => tracing::warn!("Ignoring invalid TUBE_METADATA_TIMEOUT: {}", timeout),
            }
        }

        if let Some(user_agent) = lookup("TUBE_METADATA_USER_AGENT") {
            self.http.user_agent = user_agent;
        }

        if let Some(use_utc) = lookup("TUBE_METADATA_USE_UTC") {
            self.collector.use_utc = matches!(use_utc.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        if let Some(level) = lookup("TUBE_METADATA_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)
            .map_err(|e| CollectorError::Config(e.to_string()))?;
        std::fs::write(path, config_str).map_err(|e| CollectorError::io_at(path, e))?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.collector.video_ids.is_empty() {
            return Err(CollectorError::Config("video_ids must not be empty".to_string()));
        }

        if self.collector.video_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(CollectorError::Config("video_ids must not contain blank entries".to_string()));
        }

        if self.http.timeout_seconds == 0 {
            return Err(CollectorError::Config("timeout_seconds must be greater than 0".to_string()));
        }

        url::Url::parse(&self.http.base_url)?;

        if self.extract.name_attribute.is_empty() || self.extract.value_attribute.is_empty() {
            return Err(CollectorError::Config("extract attribute names must not be empty".to_string()));
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Tube Metadata Configuration:\n\
            - Videos: {}\n\
            - Store Directory: {}\n\
            - Date Stamp: {}\n\
            - Base URL: {}\n\
            - Timeout: {}s\n\
            - Attributes: {} / {}",
            self.collector.video_ids.join(", "),
            self.collector.store_dir.display(),
            if self.collector.use_utc { "UTC" } else { "local" },
            self.http.base_url,
            self.http.timeout_seconds,
            self.extract.name_attribute,
            self.extract.value_attribute,
        )
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

    pub fn with_video_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.collector.video_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_store_dir(mut self, dir: PathBuf) -> Self {
        self.config.collector.store_dir = dir;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.http.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.config.http.timeout_seconds = seconds;
        self
    }

    pub fn use_system_proxy(mut self, enable: bool) -> Self {
        self.config.http.use_system_proxy = enable;
        self
    }

    pub fn use_utc(mut self, enable: bool) -> Self {
        self.config.collector.use_utc = enable;
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
