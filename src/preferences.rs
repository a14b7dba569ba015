//! User preferences kept across restarts.
//!
//! Every preference lives under its own key and falls back to a built-in
//! default when the key is absent or unreadable. Storage failures are logged
//! and reported through the event sink; they never fail the user action.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::events::{report_persistence_failure, EventSink, PersistenceOp};
use crate::storage::{keys, PersistentStore, StorageError};

/// System prompt used when a target has no custom prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
Act as a capable secretary helping the user clarify their task.
Rephrase the input as a clear, actionable task name and prefix it with a fitting emoji.
If an image is given, infer what the user intends to do with it and turn that into a task.
Do not reply conversationally.
Output only the string that works as the task name.";

/// Boolean UI switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Toggle {
    /// Show model id, token usage and cost under AI replies
    ShowModelInfo,
    /// Send the previewed target content as reference context
    IncludeReference,
}

impl Toggle {
    pub fn key(&self) -> &'static str {
        match self {
            Toggle::ShowModelInfo => keys::SHOW_MODEL_INFO,
            Toggle::IncludeReference => keys::INCLUDE_REFERENCE,
        }
    }

    pub fn default_value(&self) -> bool {
        match self {
            Toggle::ShowModelInfo => true,
            Toggle::IncludeReference => false,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "model-info" | "show_model_info" => Some(Toggle::ShowModelInfo),
            "reference" | "include_reference" => Some(Toggle::IncludeReference),
            _ => None,
        }
    }
}

/// Typed access to preference keys.
#[derive(Clone)]
pub struct Preferences {
    store: PersistentStore,
    sink: Arc<dyn EventSink>,
}

impl Preferences {
    pub fn new(store: PersistentStore, sink: Arc<dyn EventSink>) -> Self {
        Self { store, sink }
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(StorageError::Serialization { message, .. }) => {
                tracing::warn!("Ignoring unreadable preference '{}': {}", key, message);
                None
            }
            Err(e) => {
                report_persistence_failure(self.sink.as_ref(), key, PersistenceOp::Read, &e);
                None
            }
        }
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = self.store.set(key, value) {
            report_persistence_failure(self.sink.as_ref(), key, PersistenceOp::Write, &e);
        }
    }

    fn delete(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            report_persistence_failure(self.sink.as_ref(), key, PersistenceOp::Remove, &e);
        }
    }

    pub fn draft(&self) -> String {
        self.read(keys::DRAFT).unwrap_or_default()
    }

    /// Save the composer text. An empty draft removes the key.
    pub fn set_draft(&self, text: &str) {
        if text.is_empty() {
            self.delete(keys::DRAFT);
        } else {
            self.write(keys::DRAFT, text);
        }
    }

    pub fn last_target(&self) -> Option<String> {
        self.read(keys::LAST_TARGET)
    }

    pub fn set_last_target(&self, target_id: &str) {
        self.write(keys::LAST_TARGET, target_id);
    }

    pub fn clear_last_target(&self) {
        self.delete(keys::LAST_TARGET);
    }

    /// Custom prompt for a target, `None` meaning the default applies.
    pub fn custom_prompt(&self, target_id: &str) -> Option<String> {
        self.read(&keys::prompt(target_id))
    }

    pub fn effective_prompt(&self, target_id: &str) -> String {
        self.custom_prompt(target_id)
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
    }

    /// Store a custom prompt verbatim.
    ///
    /// Blank text or text equal to the default removes the override. Returns
    /// true when a custom prompt is now stored.
    pub fn set_prompt(&self, target_id: &str, text: &str) -> bool {
        let key = keys::prompt(target_id);
        if text.trim().is_empty() || text == DEFAULT_SYSTEM_PROMPT {
            self.delete(&key);
            false
        } else {
            self.write(&key, text);
            true
        }
    }

    /// Current toggle value. An absent key means the default; a stored value
    /// wins even when it equals the default.
    pub fn toggle(&self, toggle: Toggle) -> bool {
        self.read(toggle.key())
            .unwrap_or_else(|| toggle.default_value())
    }

    pub fn set_toggle(&self, toggle: Toggle, value: bool) {
        self.write(toggle.key(), &value);
    }

    pub fn selected_model(&self) -> Option<String> {
        self.read(keys::SELECTED_MODEL)
    }

    pub fn set_selected_model(&self, model_id: Option<&str>) {
        match model_id {
            Some(id) => self.write(keys::SELECTED_MODEL, id),
            None => self.delete(keys::SELECTED_MODEL),
        }
    }
}
