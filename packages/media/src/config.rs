use common::StorageAppConfig;
use config::{Config, ConfigError, Environment, File};
use search::SearchAppConfig;
use serde::Deserialize;

/// Default config file, relative to the working directory, without extension.
const DEFAULT_CONFIG_FILE: &str = "config/media";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Deployment environment; namespaces vectors. Default: "development".
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub storage: StorageAppConfig,
    #[serde(default)]
    pub search: SearchAppConfig,
}

fn default_environment() -> String {
    "development".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            storage: StorageAppConfig::default(),
            search: SearchAppConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `config/media.toml` (or the file named by `MEDIA_CONFIG`),
    /// then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var("MEDIA_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        Self::load_from(&file)
    }

    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(file).required(false))
            // Override from environment (e.g., MEDIA__STORAGE__BACKEND=cloud)
            .add_source(
                Environment::with_prefix("MEDIA")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("storage.allowed_formats")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment.trim().is_empty() {
            return Err(ConfigError::Message("environment must not be empty".into()));
        }
        self.storage.validate().map_err(ConfigError::Message)?;
        self.search.validate().map_err(ConfigError::Message)?;
        Ok(())
    }
}
