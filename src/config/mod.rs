use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the admin backend, including the `/api` prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Authenticate against the built-in mock identity service instead of the backend
    #[serde(default = "default_mock_mode")]
    pub mock_mode: bool,
    /// Store key under which the serialized session is persisted
    #[serde(default = "default_session_key")]
    pub session_key: String,
    /// Lifetime given to sessions whose sign-in response carries no expiry
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mock_mode: default_mock_mode(),
            session_key: default_session_key(),
            session_ttl_hours: default_session_ttl_hours(),
        }
    }
}

fn default_mock_mode() -> bool {
    true
}

fn default_session_key() -> String {
    "kilat-session".to_string()
}

fn default_session_ttl_hours() -> i64 {
    24
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Reject collection slugs that are not in the registry
    #[serde(default)]
    pub strict_collections: bool,
    /// Collection shown when the listing is first opened
    #[serde(default = "default_initial_collection")]
    pub initial_collection: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            strict_collections: false,
            initial_collection: default_initial_collection(),
        }
    }
}

fn default_page_size() -> usize {
    10
}

fn default_initial_collection() -> String {
    "blog-posts".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            auth: AuthConfig::default(),
            storage: StorageConfig::default(),
            listing: ListingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).with_context(|| "Failed to parse configuration file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listing.page_size == 0 {
            anyhow::bail!("listing.page_size must be greater than zero");
        }
        if let Err(e) = crate::storage::validate_key(&self.auth.session_key) {
            anyhow::bail!(
                "auth.session_key is used as a file name and may only contain letters, digits, '-', '_' and '.' ({})",
                e
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://localhost:3000/api");
        assert_eq!(config.auth.session_key, "kilat-session");
        assert!(config.auth.mock_mode);
        assert_eq!(config.listing.page_size, 10);
        assert_eq!(config.listing.initial_collection, "blog-posts");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [api]
            base_url = "https://cms.example.com/api"

            [listing]
            page_size = 25
            strict_collections = true
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://cms.example.com/api");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.listing.page_size, 25);
        assert!(config.listing.strict_collections);
        assert_eq!(config.auth.session_ttl_hours, 24);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let result = Config::from_toml("[listing]\npage_size = 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_session_key_rejected() {
        let err = Config::from_toml("[auth]\nsession_key = \"kilat session\"\n").unwrap_err();
        assert!(err.to_string().contains("auth.session_key"));

        assert!(Config::from_toml("[auth]\nsession_key = \".hidden\"\n").is_err());
        assert!(Config::from_toml("[auth]\nsession_key = \"../escape\"\n").is_err());

        let config = Config::from_toml("[auth]\nsession_key = \"admin.session_v2\"\n").unwrap();
        assert_eq!(config.auth.session_key, "admin.session_v2");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load(Path::new("/nonexistent/kilat.toml")).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("./data"));
    }
}
