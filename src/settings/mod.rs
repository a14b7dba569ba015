//! TOML-based settings for the memo client.
//!
//! Settings are loaded from `~/.memo/settings.toml` with environment variable
//! interpolation. The backend URL falls back to `MEMO_BACKEND_URL` through
//! `get_with_env_fallback`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use memo_lib::settings::SettingsManager;
//!
//! let manager = SettingsManager::new().await?;
//! let base_url = manager.backend_url().await;
//! ```

pub mod loader;
pub mod schema;

pub use loader::{get_with_env_fallback, settings_path, SettingsManager};
pub use schema::MemoSettings;
