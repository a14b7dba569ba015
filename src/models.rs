//! Model catalog and selection.

use serde::Serialize;

use crate::api::{ModelDefaults, ModelDescriptor, ModelsResponse};
use crate::events::{self, ClientEvent, EventSink, NoticeLevel};
use crate::preferences::Preferences;

/// Which model the user asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "id", rename_all = "lowercase")]
pub enum ModelSelection {
    /// Pick the text or vision default per request
    #[default]
    Automatic,
    Explicit(String),
}

/// Models offered by the backend, held in memory only.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCatalog {
    all: Vec<ModelDescriptor>,
    text_only: Vec<ModelDescriptor>,
    vision_capable: Vec<ModelDescriptor>,
    defaults: ModelDefaults,
}

impl From<ModelsResponse> for ModelCatalog {
    fn from(response: ModelsResponse) -> Self {
        Self {
            all: response.all,
            text_only: response.text_only,
            vision_capable: response.vision_capable,
            defaults: response.defaults,
        }
    }
}

impl ModelCatalog {
    pub fn all(&self) -> &[ModelDescriptor] {
        &self.all
    }

    pub fn text_only(&self) -> &[ModelDescriptor] {
        &self.text_only
    }

    pub fn vision_capable(&self) -> &[ModelDescriptor] {
        &self.vision_capable
    }

    pub fn defaults(&self) -> &ModelDefaults {
        &self.defaults
    }

    pub fn get(&self, id: &str) -> Option<&ModelDescriptor> {
        self.all.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Model id to send for a request.
    pub fn resolve(&self, selection: &ModelSelection, has_image: bool) -> String {
        match selection {
            ModelSelection::Explicit(id) => id.clone(),
            ModelSelection::Automatic if has_image => self.defaults.multimodal.clone(),
            ModelSelection::Automatic => self.defaults.text.clone(),
        }
    }

    /// Restore the persisted selection against this catalog.
    ///
    /// A stored id the catalog no longer offers is cleared and the user is
    /// told the selection went back to automatic.
    pub fn validate_persisted(&self, prefs: &Preferences, sink: &dyn EventSink) -> ModelSelection {
        let Some(id) = prefs.selected_model() else {
            return ModelSelection::Automatic;
        };

        if self.contains(&id) {
            return ModelSelection::Explicit(id);
        }

        tracing::info!("Stored model '{}' is no longer offered", id);
        prefs.set_selected_model(None);
        events::emit(
            sink,
            ClientEvent::notice(
                NoticeLevel::Warning,
                format!(
                    "Model '{}' is no longer available. Switched to automatic selection.",
                    id
                ),
            ),
        );
        ModelSelection::Automatic
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::events::RecordingSink;
    use crate::storage::{keys, PersistentStore};

    fn model(id: &str, vision: bool) -> ModelDescriptor {
        ModelDescriptor {
            id: id.to_string(),
            name: id.to_string(),
            provider: "test".to_string(),
            supports_vision: vision,
            rate_limit_note: None,
        }
    }

    fn catalog() -> ModelCatalog {
        ModelCatalog::from(ModelsResponse {
            all: vec![model("text-1", false), model("vision-1", true)],
            text_only: vec![model("text-1", false)],
            vision_capable: vec![model("vision-1", true)],
            defaults: ModelDefaults {
                text: "text-1".to_string(),
                multimodal: "vision-1".to_string(),
            },
        })
    }

    #[test]
    fn test_automatic_resolves_by_image() {
        let catalog = catalog();
        assert_eq!(catalog.resolve(&ModelSelection::Automatic, false), "text-1");
        assert_eq!(catalog.resolve(&ModelSelection::Automatic, true), "vision-1");
        assert_eq!(
            catalog.resolve(&ModelSelection::Explicit("text-1".to_string()), true),
            "text-1"
        );
    }

    #[test]
    fn test_missing_persisted_model_reverts_to_automatic() {
        let store = PersistentStore::in_memory();
        let sink = RecordingSink::new();
        let prefs = Preferences::new(store.clone(), Arc::new(sink.clone()));
        prefs.set_selected_model(Some("retired-model"));

        let selection = catalog().validate_persisted(&prefs, &sink);

        assert_eq!(selection, ModelSelection::Automatic);
        assert!(store.get_raw(keys::SELECTED_MODEL).unwrap().is_none());
        let notices = sink.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].0, NoticeLevel::Warning);
        assert!(notices[0].1.contains("retired-model"));
    }

    #[test]
    fn test_known_persisted_model_is_kept() {
        let store = PersistentStore::in_memory();
        let sink = RecordingSink::new();
        let prefs = Preferences::new(store, Arc::new(sink.clone()));
        prefs.set_selected_model(Some("vision-1"));

        assert_eq!(
            catalog().validate_persisted(&prefs, &sink),
            ModelSelection::Explicit("vision-1".to_string())
        );
        assert!(sink.notices().is_empty());
    }
}
