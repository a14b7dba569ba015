//! Settings loading, saving, and environment variable interpolation.
//!
//! The `SettingsManager` handles:
//! - Loading settings from `~/.memo/settings.toml`
//! - Resolving `$VAR` and `${VAR}` environment variable references
//! - Atomic file writes with temp file + rename
//! - First-run template generation

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::sync::RwLock;

use super::schema::MemoSettings;

/// Embedded template for first-run generation.
const TEMPLATE: &str = include_str!("template.toml");

/// Environment variables consulted when no backend URL is configured.
pub const BACKEND_URL_ENV: &[&str] = &["MEMO_BACKEND_URL"];

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Directory for settings and local state.
pub fn memo_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".memo")
}

/// Get the path to the global settings file.
pub fn settings_path() -> PathBuf {
    memo_home().join("settings.toml")
}

/// Manages settings loading, interpolation, and persistence.
pub struct SettingsManager {
    /// Cached settings (with env vars resolved)
    settings: RwLock<MemoSettings>,

    /// Path to the settings file
    path: PathBuf,
}

impl SettingsManager {
    /// Create a new SettingsManager, loading from disk if available.
    pub async fn new() -> Result<Self> {
        Self::with_path(settings_path()).await
    }

    /// Load settings from a specific file.
    pub async fn with_path(path: PathBuf) -> Result<Self> {
        let settings = Self::load_from_path(&path).await?;

        Ok(Self {
            settings: RwLock::new(settings),
            path,
        })
    }

    async fn load_from_path(path: &Path) -> Result<MemoSettings> {
        if !path.exists() {
            tracing::debug!("Settings file not found at {:?}, using defaults", path);
            return Ok(MemoSettings::default());
        }

        let contents = tokio::fs::read_to_string(path)
            .await
            .context("Failed to read settings file")?;

        let mut settings: MemoSettings =
            toml::from_str(&contents).context("Failed to deserialize settings")?;

        Self::resolve_env_vars(&mut settings);

        tracing::info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Resolve $ENV_VAR references in string fields.
    fn resolve_env_vars(settings: &mut MemoSettings) {
        fn resolve(value: &mut String) {
            if let Some(resolved) = resolve_env_ref(value) {
                *value = resolved;
            }
        }

        resolve(&mut settings.backend.base_url);
        resolve(&mut settings.logging.level);
        if let Some(dir) = settings.storage.data_dir.as_mut() {
            resolve(dir);
        }
    }

    /// Get the current settings (read-only).
    pub async fn get(&self) -> MemoSettings {
        self.settings.read().await.clone()
    }

    /// Update settings and persist to disk.
    pub async fn update(&self, new_settings: MemoSettings) -> Result<()> {
        *self.settings.write().await = new_settings.clone();

        let toml_string =
            toml::to_string_pretty(&new_settings).context("Failed to serialize settings")?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Atomic write: write to temp file, then rename
        let temp_path = self.path.with_extension("toml.tmp");
        tokio::fs::write(&temp_path, &toml_string).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        tracing::info!("Saved settings to {:?}", self.path);
        Ok(())
    }

    /// Get the settings file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure settings file exists, creating from template if needed.
    ///
    /// Returns `true` if a new file was created.
    pub async fn ensure_settings_file(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, TEMPLATE).await?;
        tracing::info!("Generated settings template at {:?}", self.path);
        Ok(true)
    }

    /// Backend URL from settings, then `MEMO_BACKEND_URL`, then the default.
    pub async fn backend_url(&self) -> String {
        let configured = Some(self.settings.read().await.backend.base_url.clone());
        get_with_env_fallback(
            &configured,
            BACKEND_URL_ENV,
            Some(DEFAULT_BACKEND_URL.to_string()),
        )
        .unwrap_or_default()
    }

    /// Data directory from settings, defaulting to `~/.memo`.
    pub async fn data_dir(&self) -> PathBuf {
        match &self.settings.read().await.storage.data_dir {
            Some(dir) if !dir.is_empty() => expand_home(dir),
            _ => memo_home(),
        }
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Resolve a $ENV_VAR or ${ENV_VAR} reference.
///
/// Returns `Some(resolved)` if the value starts with `$` and the env var exists.
/// Returns `None` if no env var reference or env var not set.
fn resolve_env_ref(value: &str) -> Option<String> {
    let trimmed = value.trim();

    let var_name = if let Some(inner) = trimmed
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
    {
        inner
    } else {
        trimmed.strip_prefix('$')?
    };

    std::env::var(var_name).ok()
}

/// Get a setting value with environment variable fallback.
///
/// Priority order:
/// 1. Settings value (if set and non-empty)
/// 2. Environment variable (first match from list)
/// 3. Default value
pub fn get_with_env_fallback(
    setting: &Option<String>,
    env_vars: &[&str],
    default: Option<String>,
) -> Option<String> {
    if let Some(v) = setting {
        if !v.is_empty() {
            return Some(v.clone());
        }
    }

    for env_var in env_vars {
        if let Ok(v) = std::env::var(env_var) {
            if !v.is_empty() {
                return Some(v);
            }
        }
    }

    default
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_env_ref_formats() {
        std::env::set_var("MEMO_TEST_VAR_1", "value_1");

        assert_eq!(resolve_env_ref("$MEMO_TEST_VAR_1"), Some("value_1".to_string()));
        assert_eq!(resolve_env_ref("${MEMO_TEST_VAR_1}"), Some("value_1".to_string()));

        std::env::remove_var("MEMO_TEST_VAR_1");
    }

    #[test]
    fn test_resolve_env_ref_no_match() {
        assert_eq!(resolve_env_ref("http://localhost:8000"), None);
        assert_eq!(resolve_env_ref("$NONEXISTENT_MEMO_VAR_12345"), None);
    }

    #[test]
    fn test_get_with_env_fallback_order() {
        let setting = Some("from_settings".to_string());
        assert_eq!(
            get_with_env_fallback(&setting, &["MEMO_UNSET_VAR_A"], None),
            Some("from_settings".to_string())
        );

        std::env::set_var("MEMO_FALLBACK_TEST", "from_env");
        let empty = Some(String::new());
        assert_eq!(
            get_with_env_fallback(&empty, &["MEMO_FALLBACK_TEST"], None),
            Some("from_env".to_string())
        );
        std::env::remove_var("MEMO_FALLBACK_TEST");

        assert_eq!(
            get_with_env_fallback(&None, &["MEMO_UNSET_VAR_B"], Some("default".to_string())),
            Some("default".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::with_path(dir.path().join("settings.toml"))
            .await
            .unwrap();

        assert_eq!(manager.get().await, MemoSettings::default());
    }

    #[tokio::test]
    async fn test_template_then_update_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let manager = SettingsManager::with_path(path.clone()).await.unwrap();

        assert!(manager.ensure_settings_file().await.unwrap());
        assert!(!manager.ensure_settings_file().await.unwrap());

        // The template itself must parse
        let reloaded = SettingsManager::with_path(path.clone()).await.unwrap();
        assert!(reloaded.get().await.backend.base_url.is_empty());

        let mut settings = manager.get().await;
        settings.backend.base_url = "https://memo.example.com".to_string();
        settings.storage.data_dir = Some("/tmp/memo-state".to_string());
        manager.update(settings).await.unwrap();

        assert!(!path.with_extension("toml.tmp").exists());
        let reloaded = SettingsManager::with_path(path).await.unwrap();
        assert_eq!(reloaded.backend_url().await, "https://memo.example.com");
        assert_eq!(reloaded.data_dir().await, PathBuf::from("/tmp/memo-state"));
    }

    #[tokio::test]
    async fn test_env_interpolation_on_load() {
        std::env::set_var("MEMO_TEST_BACKEND", "https://from-env.example.com");
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        tokio::fs::write(&path, "[backend]\nbase_url = \"${MEMO_TEST_BACKEND}\"\n")
            .await
            .unwrap();

        let manager = SettingsManager::with_path(path).await.unwrap();
        assert_eq!(
            manager.get().await.backend.base_url,
            "https://from-env.example.com"
        );
        std::env::remove_var("MEMO_TEST_BACKEND");
    }
}
