/// Configuration management using figment
///
/// Loads configuration with this precedence (highest wins):
/// 1. Defaults (hardcoded)
/// 2. TOML file: placerecon.toml (in working directory)
/// 3. Environment variables: prefixed PLACERECON_, nested keys split on "__"
///    (e.g., PLACERECON_GAZETTEER__USERNAME=alice)

use figment::{
    Figment,
    providers::{Env, Format, Toml, Serialized},
};
use serde::{Deserialize, Serialize};
use crate::errors::ReconError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub gazetteer: GazetteerConfig,

    #[serde(default)]
    pub secondary: SecondaryConfig,
}

/// Primary gazetteer query service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GazetteerConfig {
    #[serde(default = "default_gazetteer_url")]
    pub endpoint_url: String,

    /// Basic auth is sent only when a username is set
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Prefix used to rebuild an entity URI from a bare numeric identifier
    #[serde(default = "default_entity_uri_base")]
    pub entity_uri_base: String,
}

/// Secondary knowledge graph, used for cross-references and fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryConfig {
    #[serde(default = "default_secondary_url")]
    pub endpoint_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_gazetteer_url() -> String {
    "https://dev.artresearch.net/sparql?repository=3rd-party".to_string()
}

fn default_secondary_url() -> String {
    "https://qlever.cs.uni-freiburg.de/api/wikidata".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_entity_uri_base() -> String {
    "http://vocab.getty.edu/tgn/".to_string()
}

impl Default for GazetteerConfig {
    fn default() -> Self {
        GazetteerConfig {
            endpoint_url: default_gazetteer_url(),
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
            entity_uri_base: default_entity_uri_base(),
        }
    }
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        SecondaryConfig {
            endpoint_url: default_secondary_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: default_log_level(),
            gazetteer: GazetteerConfig::default(),
            secondary: SecondaryConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, TOML file, and environment variables
    ///
    /// Environment variables override TOML file values.
    /// Example: PLACERECON_SECONDARY__TIMEOUT_SECS=30 overrides secondary.timeout_secs
    pub fn load() -> Result<Config, ReconError> {
        Self::figment("placerecon.toml")
            .extract()
            .map_err(|e| ReconError::Config(format!("Failed to load config: {}", e)))
    }

    fn figment(toml_path: &str) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(toml_path))
            .merge(Env::prefixed("PLACERECON_").split("__"))
    }
}
