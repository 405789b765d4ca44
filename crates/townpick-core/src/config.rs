use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// City search and geolocation settings
    #[serde(default)]
    pub cities: CitiesConfig,

    /// Saved cities storage
    #[serde(default)]
    pub storage: StorageConfig,
}

/// A fixed device position, used where no location service exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ManualPosition {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitiesConfig {
    /// Language used for search results and reverse lookups (e.g. "en", "ru")
    #[serde(default = "default_locale")]
    pub locale: String,

    /// City search endpoint (Nominatim compatible)
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// Reverse geocoding endpoint (Nominatim compatible)
    #[serde(default = "default_reverse_url")]
    pub reverse_url: String,

    /// User agent sent to the lookup service
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upper bound for a single remote search
    #[serde(default = "default_search_timeout_ms")]
    pub search_timeout_ms: u64,

    /// Hard upper bound for acquiring the device position
    #[serde(default = "default_geolocation_timeout_ms")]
    pub geolocation_timeout_ms: u64,

    /// Queries shorter than this (after trimming) are only filtered locally
    #[serde(default = "default_min_query_len")]
    pub min_query_len: usize,

    /// Maximum number of search results requested
    #[serde(default = "default_result_limit")]
    pub result_limit: u32,

    /// Optional tolerance in degrees for coordinate matching (exact when unset)
    #[serde(default)]
    pub coordinate_tolerance: Option<f64>,

    /// Fixed device position for machines without a location service
    #[serde(default)]
    pub manual_position: Option<ManualPosition>,
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_search_url() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}

fn default_reverse_url() -> String {
    "https://nominatim.openstreetmap.org/reverse".to_string()
}

fn default_user_agent() -> String {
    concat!("Townpick/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_search_timeout_ms() -> u64 {
    10_000
}

fn default_geolocation_timeout_ms() -> u64 {
    15_000
}

fn default_min_query_len() -> usize {
    3
}

fn default_result_limit() -> u32 {
    10
}

impl Default for CitiesConfig {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            search_url: default_search_url(),
            reverse_url: default_reverse_url(),
            user_agent: default_user_agent(),
            search_timeout_ms: default_search_timeout_ms(),
            geolocation_timeout_ms: default_geolocation_timeout_ms(),
            min_query_len: default_min_query_len(),
            result_limit: default_result_limit(),
            coordinate_tolerance: None,
            manual_position: None,
        }
    }
}

impl CitiesConfig {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    pub fn geolocation_timeout(&self) -> Duration {
        Duration::from_millis(self.geolocation_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file name, relative to the config directory
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

fn default_database_file() -> String {
    "cities.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("townpick");

        Self {
            config_dir,
            cities: CitiesConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file, creating a default one if it doesn't exist
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let mut config = Self::default();
            if let Some(parent) = config_path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.cities.search_url, "cities.search_url", &mut result);
        self.validate_url(&self.cities.reverse_url, "cities.reverse_url", &mut result);

        if self.cities.locale.trim().is_empty() {
            result.add_error("cities.locale", "Locale must not be empty");
        }

        if self.cities.user_agent.trim().is_empty() {
            result.add_error(
                "cities.user_agent",
                "User agent must not be empty (Nominatim rejects anonymous clients)",
            );
        }

        if self.cities.search_timeout_ms == 0 {
            result.add_error("cities.search_timeout_ms", "Search timeout must be greater than 0");
        }

        if self.cities.geolocation_timeout_ms == 0 {
            result.add_error(
                "cities.geolocation_timeout_ms",
                "Geolocation timeout must be greater than 0",
            );
        } else if self.cities.geolocation_timeout_ms > 60_000 {
            result.add_warning(
                "cities.geolocation_timeout_ms",
                "Geolocation timeout is longer than a minute",
            );
        }

        if self.cities.min_query_len == 0 {
            result.add_warning(
                "cities.min_query_len",
                "Every keystroke will trigger a remote search",
            );
        }

        if self.cities.result_limit == 0 {
            result.add_error("cities.result_limit", "Result limit must be greater than 0");
        }

        if let Some(tolerance) = self.cities.coordinate_tolerance {
            if !tolerance.is_finite() || tolerance < 0.0 {
                result.add_error(
                    "cities.coordinate_tolerance",
                    "Tolerance must be a non-negative number",
                );
            } else if tolerance > 0.1 {
                result.add_warning(
                    "cities.coordinate_tolerance",
                    "Tolerance above 0.1 degrees may merge neighbouring towns",
                );
            }
        }

        if let Some(position) = self.cities.manual_position {
            if !(-90.0..=90.0).contains(&position.latitude) {
                result.add_error("cities.manual_position.latitude", "Latitude out of range");
            }
            if !(-180.0..=180.0).contains(&position.longitude) {
                result.add_error("cities.manual_position.longitude", "Longitude out of range");
            }
        }

        if self.storage.database_file.trim().is_empty() {
            result.add_error("storage.database_file", "Database file name must not be empty");
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Full path of the saved cities database
    pub fn database_path(&self) -> PathBuf {
        self.config_dir.join(&self.storage.database_file)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("townpick");

        Ok(config_dir.join("config.toml"))
    }
}
