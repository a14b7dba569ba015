//! Settings schema for the memo client.
//!
//! All settings structs use `#[serde(default)]` so a partial file is valid.

use serde::{Deserialize, Serialize};

/// Root settings structure.
///
/// Loaded from `~/.memo/settings.toml` with environment variable interpolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoSettings {
    /// Schema version for migrations
    pub version: u32,

    /// Backend connection
    pub backend: BackendSettings,

    /// Local state storage
    pub storage: StorageSettings,

    /// Log output
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Base URL of the backend API (supports $ENV_VAR syntax).
    /// Empty means `MEMO_BACKEND_URL`, then `http://localhost:8000`.
    pub base_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding `state.json`; defaults to `~/.memo`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter level for the `memo` target: "error" | "warn" | "info" | "debug" | "trace"
    pub level: String,
}

impl Default for MemoSettings {
    fn default() -> Self {
        Self {
            version: 1,
            backend: BackendSettings::default(),
            storage: StorageSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = MemoSettings::default();
        assert_eq!(settings.version, 1);
        assert!(settings.backend.base_url.is_empty());
        assert!(settings.storage.data_dir.is_none());
        assert_eq!(settings.logging.level, "warn");
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
            [backend]
            base_url = "https://memo.example.com"
        "#;

        let settings: MemoSettings = toml::from_str(toml).unwrap();
        assert_eq!(settings.backend.base_url, "https://memo.example.com");
        // Defaults fill in missing sections
        assert_eq!(settings.version, 1);
        assert_eq!(settings.logging.level, "warn");
    }

    #[test]
    fn test_serialize_settings() {
        let toml_str = toml::to_string_pretty(&MemoSettings::default()).unwrap();
        assert!(toml_str.contains("version = 1"));
        assert!(toml_str.contains("[backend]"));
        assert!(!toml_str.contains("data_dir"));
    }
}
