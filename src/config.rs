use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ttn: TtnConfig,
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

/// The Things Stack (v3 API) settings used for device provisioning
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TtnConfig {
    /// API root, e.g. `https://eu1.cloud.thethings.network`
    pub base_url: String,
    /// Host name written into the join/network/application server address fields
    pub server_address: String,
    pub app_name: Option<String>,
    pub app_key: Option<String>,
    /// Bearer token with rights to create end devices in `app_name`
    pub api_key: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {:?}: {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;
        Ok(config)
    }

    /// Secrets and deployment-specific values may come from the environment
    /// instead of the config file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("BIND_ADDR") {
            self.server.bind = v;
        }
        if let Some(v) = lookup("DATABASE_PATH") {
            self.database.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("TTN_APP_NAME") {
            self.ttn.app_name = Some(v);
        }
        if let Some(v) = lookup("TTN_APP_KEY") {
            self.ttn.app_key = Some(v);
        }
        if let Some(v) = lookup("TTN_API_KEY") {
            self.ttn.api_key = v;
        }
        if let Some(v) = lookup("W3W_API_KEY") {
            self.geocoding.api_key = v;
        }
    }
}

impl TtnConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl GeocodingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// Keys are kept out of Debug output so the config can be logged.
impl std::fmt::Debug for TtnConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtnConfig")
            .field("base_url", &self.base_url)
            .field("server_address", &self.server_address)
            .field("app_name", &self.app_name)
            .field("app_key", &self.app_key.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for GeocodingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeocodingConfig")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            ttn: TtnConfig::default(),
            geocoding: GeocodingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/inventory.db"),
        }
    }
}

impl Default for TtnConfig {
    fn default() -> Self {
        Self {
            base_url: "https://eu1.cloud.thethings.network".to_string(),
            server_address: "eu1.cloud.thethings.network".to_string(),
            app_name: None,
            app_key: None,
            api_key: String::new(),
            timeout_secs: 10,
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.what3words.com".to_string(),
            api_key: String::new(),
            timeout_secs: 10,
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_partial_config_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [ttn]
            base_url = "http://localhost:1885"
            server_address = "localhost"
            app_name = "farm-app"
            api_key = "NNSXS.test"
            timeout_secs = 3

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.ttn.app_name.as_deref(), Some("farm-app"));
        assert!(config.ttn.app_key.is_none());
        assert_eq!(config.ttn.timeout(), Duration::from_secs(3));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.server.bind, "0.0.0.0:8000");
        assert_eq!(config.geocoding.base_url, "https://api.what3words.com");
    }

    #[test]
    fn test_env_overrides_replace_secrets() {
        let env: HashMap<&str, &str> = [
            ("TTN_APP_KEY", "00112233445566778899AABBCCDDEEFF"),
            ("TTN_API_KEY", "NNSXS.override"),
            ("W3W_API_KEY", "w3w-override"),
            ("DATABASE_PATH", "/tmp/devices.db"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(
            config.ttn.app_key.as_deref(),
            Some("00112233445566778899AABBCCDDEEFF")
        );
        assert_eq!(config.ttn.api_key, "NNSXS.override");
        assert_eq!(config.geocoding.api_key, "w3w-override");
        assert_eq!(config.database.path, PathBuf::from("/tmp/devices.db"));
        assert!(config.ttn.app_name.is_none());
    }

    #[test]
    fn test_debug_output_hides_keys() {
        let mut config = Config::default();
        config.ttn.app_key = Some("00112233445566778899AABBCCDDEEFF".to_string());
        config.ttn.api_key = "NNSXS.secret".to_string();
        config.geocoding.api_key = "w3w-secret".to_string();

        let printed = format!("{:?}", config);
        assert!(!printed.contains("00112233445566778899AABBCCDDEEFF"));
        assert!(!printed.contains("NNSXS.secret"));
        assert!(!printed.contains("w3w-secret"));
    }
}
