//! Application controller.
//!
//! `AppController` owns the runtime state and the services around it. Front
//! ends call its operations and render the `ClientEvent`s it emits. User input
//! problems are reported as notices (and returned as
//! `ClientError::Validation`) without touching the network.

use std::sync::Arc;

use crate::api::{
    ApiError, BackendApi, ChatRequest, ChatResponse, ContentPreview, SaveRequest, SaveResult,
    Target, TargetType,
};
use crate::cache::{CacheManager, Clock};
use crate::error::{ClientError, Result};
use crate::events::{self, ClientEvent, EventSink, NoticeLevel};
use crate::models::{ModelCatalog, ModelSelection};
use crate::preferences::{Preferences, Toggle, DEFAULT_SYSTEM_PROMPT};
use crate::session::{
    embed_image, sanitize_image_data, strip_markup, ChatEntry, ChatKind, ModelInfo,
    SessionContextEntry,
};
use crate::state::{AppState, ImageAttachment};
use crate::storage::{keys, PersistentStore};
use crate::target::{
    self, FailureCategory, FormValue, FormValues, SchemaState, TargetCoordinator,
};

/// A chat request captured at send time.
///
/// The composer is cleared once this exists, so edits made while the request
/// is in flight cannot change what was sent.
#[derive(Debug, Clone)]
pub struct PendingChat {
    pub request: ChatRequest,
}

pub struct AppController {
    backend: Arc<dyn BackendApi>,
    cache: Arc<CacheManager>,
    prefs: Preferences,
    targets: TargetCoordinator,
    sink: Arc<dyn EventSink>,
    state: AppState,
}

impl AppController {
    pub fn new(
        backend: Arc<dyn BackendApi>,
        store: PersistentStore,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let cache = Arc::new(CacheManager::new(store.clone(), clock, sink.clone()));
        let prefs = Preferences::new(store.clone(), sink.clone());
        let targets =
            TargetCoordinator::new(backend.clone(), cache.clone(), prefs.clone(), sink.clone());

        Self {
            backend,
            cache,
            prefs,
            targets,
            state: AppState::new(store, sink.clone()),
            sink,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        events::emit(self.sink.as_ref(), ClientEvent::notice(level, message));
    }

    /// Report a validation problem and return it as an error.
    fn reject<T>(&self, message: &str) -> Result<T> {
        self.notice(NoticeLevel::Warning, message);
        Err(ClientError::validation(message))
    }

    fn report_api_error(&self, action: &str, error: &ApiError) {
        let message = match FailureCategory::classify(error) {
            FailureCategory::Connectivity => format!(
                "{} failed: could not reach the server. Check your connection.",
                action
            ),
            _ => format!("{} failed: {}", action, error),
        };
        tracing::warn!("{}", message);
        self.notice(NoticeLevel::Error, message);
    }

    /// Restore the previous session and load remote data.
    ///
    /// Remote failures are reported and do not abort startup.
    pub async fn initialize(&mut self) -> Result<()> {
        self.state.session.load();
        self.state.composer.text = self.prefs.draft();
        self.state.show_model_info = self.prefs.toggle(Toggle::ShowModelInfo);
        self.state.include_reference = self.prefs.toggle(Toggle::IncludeReference);

        let targets_loaded = match self.targets.load_targets().await {
            Ok(targets) => {
                self.state.targets = targets;
                true
            }
            Err(e) => {
                self.report_api_error("Loading targets", &e);
                false
            }
        };

        self.load_models().await;

        // Without a target list the remembered id cannot be checked; keep it
        if !targets_loaded {
            return Ok(());
        }
        if let Some(target) = self.targets.restore_last_target(&self.state.targets) {
            tracing::debug!("Restoring last target '{}'", target.id);
            self.load_target(target).await;
        }

        Ok(())
    }

    async fn load_models(&mut self) {
        match self.backend.list_models().await {
            Ok(response) => {
                let catalog = ModelCatalog::from(response);
                self.state.selection = catalog.validate_persisted(&self.prefs, self.sink.as_ref());
                tracing::debug!("Loaded {} models", catalog.all().len());
                self.state.catalog = Some(catalog);
            }
            Err(e) => self.report_api_error("Loading models", &e),
        }
    }

    /// Reload the target list through the cache.
    pub async fn refresh_targets(&mut self) -> Result<()> {
        match self.targets.load_targets().await {
            Ok(targets) => {
                self.state.targets = targets;
                Ok(())
            }
            Err(e) => {
                self.report_api_error("Loading targets", &e);
                Err(e.into())
            }
        }
    }

    pub async fn select_target(&mut self, target_id: &str) -> Result<()> {
        let Some(target) = self.state.find_target(target_id).cloned() else {
            self.notice(
                NoticeLevel::Warning,
                format!("Unknown target: {}", target_id),
            );
            return Err(ClientError::TargetNotFound(target_id.to_string()));
        };

        self.load_target(target).await;
        Ok(())
    }

    async fn load_target(&mut self, target: Target) {
        self.state.schema = SchemaState::Loading {
            target: target.clone(),
        };
        self.state.reference = None;
        self.state.values = FormValues::default();

        let loaded = self.targets.select(&target).await;
        if let Some(form) = loaded.form() {
            self.state.values = FormValues::for_model(form);
        }
        self.state.schema = loaded;
    }

    /// Update the composer text and save it as the draft.
    pub fn set_draft(&mut self, text: &str) {
        self.state.composer.text = text.to_string();
        self.prefs.set_draft(text);
    }

    pub fn attach_image(&mut self, data: String, mime: String) -> Result<()> {
        if !mime.starts_with("image/") {
            return self.reject(&format!("Unsupported attachment type: {}", mime));
        }
        if data.is_empty() {
            return self.reject("The attached image is empty");
        }

        self.state.composer.image = Some(ImageAttachment { data, mime });
        Ok(())
    }

    pub fn clear_image(&mut self) {
        self.state.composer.image = None;
    }

    /// Validate and capture the outgoing chat message.
    ///
    /// Clears the composer and draft, appends the user entry, and snapshots the
    /// context window before the new message joins the context.
    pub fn begin_chat(&mut self) -> Result<PendingChat> {
        if self.state.composer.is_empty() {
            return self.reject("Enter a message or attach an image");
        }
        let Some(target) = self.state.selected_target().cloned() else {
            return self.reject("Select a target first");
        };

        let text = self.state.composer.text.trim().to_string();
        let image = self.state.composer.image.take();
        self.state.composer.clear();
        self.prefs.set_draft("");

        let display = match &image {
            Some(img) => embed_image(&text, &img.mime, &img.data),
            None => text.clone(),
        };
        let entry = ChatEntry::user(display);
        let context = entry.to_context();
        self.state.session.append(entry);

        let session_history = self.state.session.window_for_request();
        if let Some(context) = context {
            self.state.session.push_context(context);
        }

        let reference_context = if self.state.include_reference {
            self.state.reference.clone()
        } else {
            None
        };

        let model = self
            .state
            .catalog
            .as_ref()
            .map(|c| c.resolve(&self.state.selection, image.is_some()));

        let request = ChatRequest {
            text,
            target_id: target.id.clone(),
            system_prompt: Some(self.prefs.effective_prompt(&target.id)),
            session_history,
            reference_context,
            image_data: image.as_ref().map(|i| i.data.clone()),
            image_mime_type: image.map(|i| i.mime),
            model,
        };

        tracing::debug!(
            "Chat request for '{}' with {} history entries",
            request.target_id,
            request.session_history.len()
        );
        events::emit(self.sink.as_ref(), ClientEvent::ChatPending);

        Ok(PendingChat { request })
    }

    /// Record the outcome of a chat request.
    pub fn finish_chat(
        &mut self,
        pending: PendingChat,
        result: std::result::Result<ChatResponse, ApiError>,
    ) -> Result<ChatResponse> {
        events::emit(self.sink.as_ref(), ClientEvent::ChatSettled);

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.report_api_error("Chat", &e);
                self.state
                    .session
                    .append(ChatEntry::system(format!("Error: {}", e)));
                return Err(e.into());
            }
        };

        let model_info = response.model.clone().map(|model_id| ModelInfo {
            model_id,
            usage: response.usage.clone(),
            cost: response.cost,
        });
        self.state
            .session
            .append(ChatEntry::ai(response.message.clone(), model_info));

        let reply = strip_markup(&response.message);
        if !reply.is_empty() {
            self.state
                .session
                .push_context(SessionContextEntry::assistant(reply));
        }

        if let Some(properties) = &response.properties {
            self.apply_suggestions(&pending.request.target_id, properties);
        }

        Ok(response)
    }

    fn apply_suggestions(&mut self, target_id: &str, properties: &serde_json::Value) {
        // The user may have switched targets while the request was in flight
        if self.state.selected_target().map(|t| t.id.as_str()) != Some(target_id) {
            tracing::debug!("Dropping suggestions for '{}', no longer selected", target_id);
            return;
        }
        let Some(form) = self.state.schema.form_mut() else {
            return;
        };

        let applied = self.state.values.apply_ai_properties(form, properties);
        if applied > 0 {
            events::emit(self.sink.as_ref(), ClientEvent::FormChanged);
        }
    }

    /// Send the composed message and record the reply.
    pub async fn send_chat(&mut self) -> Result<ChatResponse> {
        let pending = self.begin_chat()?;
        let result = self.backend.chat(&pending.request).await;
        self.finish_chat(pending, result)
    }

    /// Set one form field from user input.
    pub fn set_field(&mut self, name: &str, input: &str) -> Result<()> {
        let Some(field) = self
            .state
            .schema
            .form()
            .and_then(|form| form.field(name))
            .cloned()
        else {
            return self.reject(&format!("Unknown field: {}", name));
        };

        let value = match FormValue::parse(field.kind, input) {
            Ok(value) => value,
            Err(message) => return self.reject(&message),
        };

        if let Some(form_field) = self
            .state
            .schema
            .form_mut()
            .and_then(|form| form.field_mut(name))
        {
            match &value {
                FormValue::Select(Some(choice)) => {
                    form_field.add_ad_hoc_option(choice);
                }
                FormValue::MultiSelect(choices) => {
                    for choice in choices {
                        form_field.add_ad_hoc_option(choice);
                    }
                }
                _ => {}
            }
        }

        self.state.values.set(name, value);
        events::emit(self.sink.as_ref(), ClientEvent::FormChanged);
        Ok(())
    }

    /// Text saved alongside the properties: the composer if it has text,
    /// otherwise the latest AI reply. Inline images are removed.
    fn save_text(&self) -> Option<String> {
        let composed = self.state.composer.text.trim();
        let source = if composed.is_empty() {
            self.state
                .session
                .history()
                .iter()
                .rev()
                .find(|e| e.kind == ChatKind::Ai)
                .map(|e| e.content.as_str())?
        } else {
            composed
        };

        Some(sanitize_image_data(source)).filter(|s| !s.is_empty())
    }

    /// Write the current form to the selected target.
    pub async fn save_record(&mut self) -> Result<SaveResult> {
        let Some(target) = self.state.selected_target().cloned() else {
            return self.reject("Select a target first");
        };

        let properties = match self.state.schema.form() {
            Some(form) => self.state.values.to_properties(form),
            None => serde_json::Value::Object(Default::default()),
        };
        let text = self.save_text();

        let has_properties = properties.as_object().is_some_and(|p| !p.is_empty());
        if !has_properties && text.is_none() {
            return self.reject("Nothing to save");
        }

        let request = SaveRequest {
            target_db_id: target.id.clone(),
            target_type: target.target_type,
            text,
            properties,
        };

        match self.backend.save(&request).await {
            Ok(result) => {
                let message = match result.url.as_deref().filter(|u| !u.is_empty()) {
                    Some(url) => format!("Saved to {} ({})", target.title, url),
                    None => format!("Saved to {}", target.title),
                };
                tracing::info!("{}", message);
                self.state.session.append(ChatEntry::system(message.clone()));
                self.notice(NoticeLevel::Success, message);
                Ok(result)
            }
            Err(e) => {
                self.report_api_error("Save", &e);
                Err(e.into())
            }
        }
    }

    /// Create a page, refresh the target list and select the new page.
    pub async fn create_page(&mut self, name: &str) -> Result<Target> {
        let name = name.trim();
        if name.is_empty() {
            return self.reject("Enter a page name");
        }

        let created = match self.backend.create_page(name).await {
            Ok(created) => created,
            Err(e) => {
                self.report_api_error("Creating page", &e);
                return Err(e.into());
            }
        };

        self.cache.invalidate(keys::TARGETS);
        if let Err(e) = self.refresh_targets().await {
            tracing::debug!("Target refresh after page creation failed: {}", e);
        }

        let target = match self.state.find_target(&created.id) {
            Some(target) => target.clone(),
            None => {
                // Not listed yet; keep it locally until the next refresh
                let target = Target {
                    id: created.id.clone(),
                    title: created.title.clone().unwrap_or_else(|| name.to_string()),
                    target_type: TargetType::Page,
                };
                self.state.targets.push(target.clone());
                target
            }
        };

        self.notice(
            NoticeLevel::Success,
            format!("Created page {}", target.title),
        );
        self.load_target(target.clone()).await;
        Ok(target)
    }

    /// Fetch the content preview of the selected target.
    ///
    /// Database rows contribute ad-hoc select options, and the preview text
    /// becomes the reference context.
    pub async fn load_reference_preview(&mut self) -> Result<ContentPreview> {
        let Some(target) = self.state.selected_target().cloned() else {
            return self.reject("Select a target first");
        };

        let preview = match self.backend.get_content(&target).await {
            Ok(preview) => preview,
            Err(e) => {
                self.report_api_error("Loading preview", &e);
                return Err(e.into());
            }
        };

        if let Some(form) = self.state.schema.form_mut() {
            if target::update_dynamic_select_options(form, &preview) > 0 {
                events::emit(self.sink.as_ref(), ClientEvent::FormChanged);
            }
        }

        let text = target::reference_text(&preview);
        self.state.reference = Some(text).filter(|t| !t.is_empty());
        Ok(preview)
    }

    /// Choose a model by id, or automatic selection with `None`.
    pub fn select_model(&mut self, model_id: Option<&str>) -> Result<()> {
        match model_id {
            None => {
                self.state.selection = ModelSelection::Automatic;
                self.prefs.set_selected_model(None);
            }
            Some(id) => {
                if let Some(catalog) = &self.state.catalog {
                    if !catalog.contains(id) {
                        return self.reject(&format!("Unknown model: {}", id));
                    }
                }
                self.state.selection = ModelSelection::Explicit(id.to_string());
                self.prefs.set_selected_model(Some(id));
            }
        }
        Ok(())
    }

    /// Save a custom system prompt for the selected target.
    pub fn set_prompt(&mut self, text: &str) -> Result<()> {
        let Some(target) = self.state.selected_target().cloned() else {
            return self.reject("Select a target first");
        };

        let custom = self.prefs.set_prompt(&target.id, text);
        let message = if custom {
            format!("Prompt saved for {}", target.title)
        } else {
            format!("Using the default prompt for {}", target.title)
        };
        self.notice(NoticeLevel::Success, message);
        Ok(())
    }

    pub fn reset_prompt(&mut self) -> Result<()> {
        self.set_prompt(DEFAULT_SYSTEM_PROMPT)
    }

    /// Effective prompt of the selected target.
    pub fn current_prompt(&self) -> Option<String> {
        self.state
            .selected_target()
            .map(|t| self.prefs.effective_prompt(&t.id))
    }

    pub fn set_toggle(&mut self, toggle: Toggle, value: bool) {
        match toggle {
            Toggle::ShowModelInfo => self.state.show_model_info = value,
            Toggle::IncludeReference => self.state.include_reference = value,
        }
        self.prefs.set_toggle(toggle, value);
    }

    pub fn clear_session(&mut self) {
        self.state.session.clear();
        self.notice(NoticeLevel::Info, "Chat history cleared");
    }
}
