use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_IP_LOOKUP_URL: &str = "https://ipapi.co/json/";

/// Environment variables checked for the Gemini key, in order
const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// How the session obtains the user's position
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum GeolocationMode {
    /// Look up the approximate position from the public IP address
    #[default]
    Auto,
    /// Use the given coordinates
    Fixed { latitude: f64, longitude: f64 },
    /// No geolocation capability
    Off,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub model: String,
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub geolocation: GeolocationMode,
    pub ip_lookup_url: String,
    pub dictation_command: Option<Vec<String>>,
    pub history_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            geolocation: GeolocationMode::Auto,
            ip_lookup_url: DEFAULT_IP_LOOKUP_URL.to_string(),
            dictation_command: None,
            history_path: None,
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {}: {}", path.display(), e))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// API key from the environment first, then the config file.
    /// An empty value counts as unset.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|var| std::env::var(var).ok())
    }

    /// Same as `resolve_api_key` with the environment lookup supplied
    pub fn resolve_api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        let present = |key: &String| !key.trim().is_empty();
        API_KEY_VARS
            .iter()
            .find_map(|var| lookup(var).filter(present))
            .or_else(|| self.api_key.clone().filter(present))
    }

    /// True when requests go somewhere other than Google directly, e.g. a
    /// proxy that adds the credential server-side.
    pub fn uses_proxy(&self) -> bool {
        self.api_base_url.trim_end_matches('/') != DEFAULT_API_BASE_URL
    }

    /// Where the conversation database lives
    pub fn history_db_path(&self) -> Result<PathBuf> {
        match &self.history_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::get_data_dir()?.join("storage.db")),
        }
    }

    pub fn default_log_path() -> Result<PathBuf> {
        Ok(Self::get_data_dir()?.join("geochat.log"))
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("geochat").join("config.json"))
    }

    fn get_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;

        Ok(data_dir.join("geochat"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.model, DEFAULT_MODEL);
        assert!(!config.uses_proxy());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.geolocation = GeolocationMode::Fixed { latitude: 37.77, longitude: -122.41 };
        config.dictation_command = Some(vec!["whisper-stream".to_string(), "--lines".to_string()]);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"model": "gemini-2.5-pro", "geolocation": {"mode": "off"}}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.geolocation, GeolocationMode::Off);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_proxy_detection() {
        let mut config = Config::new();
        config.api_base_url = format!("{}/", DEFAULT_API_BASE_URL);
        assert!(!config.uses_proxy());
        config.api_base_url = "https://geochat.example.com/gemini".to_string();
        assert!(config.uses_proxy());
    }

    #[test]
    fn test_api_key_order_skips_empty_values() {
        let mut config = Config::new();
        config.api_key = Some("from-config".to_string());

        let env = |pairs: &'static [(&'static str, &'static str)]| {
            move |var: &str| {
                pairs
                    .iter()
                    .find(|(name, _)| *name == var)
                    .map(|(_, value)| value.to_string())
            }
        };

        assert_eq!(config.resolve_api_key_with(env(&[])).as_deref(), Some("from-config"));
        assert_eq!(
            config.resolve_api_key_with(env(&[("GEMINI_API_KEY", "")])).as_deref(),
            Some("from-config")
        );
        assert_eq!(
            config.resolve_api_key_with(env(&[("GEMINI_API_KEY", " "), ("API_KEY", "fallback")])).as_deref(),
            Some("fallback")
        );
        assert_eq!(
            config.resolve_api_key_with(env(&[("GEMINI_API_KEY", "primary"), ("API_KEY", "fallback")])).as_deref(),
            Some("primary")
        );

        config.api_key = Some("  ".to_string());
        assert_eq!(config.resolve_api_key_with(env(&[])), None);
    }
}
