use std::sync::Arc;

use crate::api::Target;
use crate::events::EventSink;
use crate::models::{ModelCatalog, ModelSelection};
use crate::preferences::Toggle;
use crate::session::SessionManager;
use crate::storage::PersistentStore;
use crate::target::{FormValues, SchemaState};

/// An image attached to the message being composed.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttachment {
    /// Base64 without the `data:` prefix
    pub data: String,
    pub mime: String,
}

/// Message being composed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composer {
    pub text: String,
    pub image: Option<ImageAttachment>,
}

impl Composer {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.image.is_none()
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.image = None;
    }
}

/// Everything the client knows at runtime, owned by the controller.
pub struct AppState {
    pub targets: Vec<Target>,
    pub schema: SchemaState,
    pub values: FormValues,
    pub session: SessionManager,
    pub composer: Composer,
    pub catalog: Option<ModelCatalog>,
    pub selection: ModelSelection,
    /// Text of the last loaded content preview
    pub reference: Option<String>,
    pub show_model_info: bool,
    pub include_reference: bool,
}

impl AppState {
    pub fn new(store: PersistentStore, sink: Arc<dyn EventSink>) -> Self {
        Self {
            targets: Vec::new(),
            schema: SchemaState::Idle,
            values: FormValues::default(),
            session: SessionManager::new(store, sink),
            composer: Composer::default(),
            catalog: None,
            selection: ModelSelection::Automatic,
            reference: None,
            show_model_info: Toggle::ShowModelInfo.default_value(),
            include_reference: Toggle::IncludeReference.default_value(),
        }
    }

    pub fn selected_target(&self) -> Option<&Target> {
        self.schema.target()
    }

    pub fn find_target(&self, id: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.id == id)
    }

    pub fn toggle(&self, toggle: Toggle) -> bool {
        match toggle {
            Toggle::ShowModelInfo => self.show_model_info,
            Toggle::IncludeReference => self.include_reference,
        }
    }
}
