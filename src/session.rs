//! Chat history and AI session context.
//!
//! Two views of one conversation are kept:
//!
//! - the display history (`ChatEntry`), persisted as its most recent
//!   [`HISTORY_LIMIT`] entries
//! - the AI context (`SessionContextEntry`), a text-only projection of user and
//!   AI turns of which only the last [`CONTEXT_WINDOW`] are sent per request
//!
//! The context is never persisted. It is rebuilt from the history on load.

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::api::TokenUsage;
use crate::events::{self, report_persistence_failure, ClientEvent, EventSink, PersistenceOp};
use crate::storage::{keys, PersistentStore, StorageError};

/// Number of history entries kept on disk.
pub const HISTORY_LIMIT: usize = 50;

/// Number of context entries sent with each chat request.
pub const CONTEXT_WINDOW: usize = 10;

static HTML_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)<img\b[^>]*>"#).unwrap());

static MARKDOWN_DATA_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)!\[[^\]]*\]\(data:[^)]*\)"#).unwrap());

static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?i)<br\s*/?>"#).unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    User,
    Ai,
    System,
}

/// Model metadata attached to an AI reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

/// One displayed chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub kind: ChatKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_info: Option<ModelInfo>,
    pub created_at: DateTime<Utc>,
}

impl ChatEntry {
    pub fn new(kind: ChatKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            model_info: None,
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatKind::User, content)
    }

    pub fn ai(content: impl Into<String>, model_info: Option<ModelInfo>) -> Self {
        Self {
            model_info,
            ..Self::new(ChatKind::Ai, content)
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatKind::System, content)
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Context projection of this entry. System entries and entries that are
    /// empty once markup is removed have none.
    pub fn to_context(&self) -> Option<SessionContextEntry> {
        let role = match self.kind {
            ChatKind::User => ContextRole::User,
            ChatKind::Ai => ContextRole::Assistant,
            ChatKind::System => return None,
        };

        let content = strip_markup(&self.content);
        if content.is_empty() {
            return None;
        }

        Some(SessionContextEntry { role, content })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextRole {
    User,
    Assistant,
}

/// A text-only turn sent to the chat endpoint as history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContextEntry {
    pub role: ContextRole,
    pub content: String,
}

impl SessionContextEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ContextRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ContextRole::Assistant,
            content: content.into(),
        }
    }
}

/// Chat content with an inline image, as stored in the display history.
pub fn embed_image(text: &str, mime: &str, data: &str) -> String {
    let image = format!(r#"<img src="data:{};base64,{}">"#, mime, data);
    if text.is_empty() {
        image
    } else {
        format!("{}<br>{}", text, image)
    }
}

/// Remove image markup and turn `<br>` into newlines.
pub fn strip_markup(content: &str) -> String {
    let without_images = HTML_IMAGE.replace_all(content, "");
    let without_images = MARKDOWN_DATA_IMAGE.replace_all(&without_images, "");
    LINE_BREAK
        .replace_all(&without_images, "\n")
        .trim()
        .to_string()
}

/// Remove inline base64 images from text about to be saved.
pub fn sanitize_image_data(text: &str) -> String {
    let cleaned = MARKDOWN_DATA_IMAGE.replace_all(text, "");
    HTML_IMAGE
        .replace_all(&cleaned, |caps: &regex::Captures| {
            if caps[0].contains("data:") {
                String::new()
            } else {
                caps[0].to_string()
            }
        })
        .trim()
        .to_string()
}

/// Owns the chat history and the derived AI context.
pub struct SessionManager {
    store: PersistentStore,
    sink: Arc<dyn EventSink>,
    history: Vec<ChatEntry>,
    context: Vec<SessionContextEntry>,
}

impl SessionManager {
    pub fn new(store: PersistentStore, sink: Arc<dyn EventSink>) -> Self {
        Self {
            store,
            sink,
            history: Vec::new(),
            context: Vec::new(),
        }
    }

    pub fn history(&self) -> &[ChatEntry] {
        &self.history
    }

    pub fn context(&self) -> &[SessionContextEntry] {
        &self.context
    }

    /// Append a display entry and persist the most recent history.
    pub fn append(&mut self, entry: ChatEntry) {
        self.history.push(entry);
        self.persist();
        events::emit(
            self.sink.as_ref(),
            ClientEvent::HistoryChanged {
                len: self.history.len(),
            },
        );
    }

    /// Add a turn to the AI context only.
    pub fn push_context(&mut self, entry: SessionContextEntry) {
        self.context.push(entry);
    }

    /// The most recent context entries to send with a request, oldest first.
    pub fn window_for_request(&self) -> Vec<SessionContextEntry> {
        let start = self.context.len().saturating_sub(CONTEXT_WINDOW);
        self.context[start..].to_vec()
    }

    /// Tail of the history that is written to storage.
    pub fn history_for_persistence(&self) -> &[ChatEntry] {
        let start = self.history.len().saturating_sub(HISTORY_LIMIT);
        &self.history[start..]
    }

    /// Forget the whole conversation, in memory and on disk.
    pub fn clear(&mut self) {
        self.history.clear();
        self.context.clear();

        if let Err(e) = self.store.remove(keys::CHAT_HISTORY) {
            report_persistence_failure(
                self.sink.as_ref(),
                keys::CHAT_HISTORY,
                PersistenceOp::Remove,
                &e,
            );
        }

        events::emit(self.sink.as_ref(), ClientEvent::HistoryChanged { len: 0 });
    }

    /// Restore history from storage and rebuild the AI context.
    ///
    /// Unreadable history leaves the session empty.
    pub fn load(&mut self) {
        let history = match self.store.get::<Vec<ChatEntry>>(keys::CHAT_HISTORY) {
            Ok(history) => history.unwrap_or_default(),
            Err(StorageError::Serialization { message, .. }) => {
                tracing::warn!("Discarding unreadable chat history: {}", message);
                Vec::new()
            }
            Err(e) => {
                report_persistence_failure(
                    self.sink.as_ref(),
                    keys::CHAT_HISTORY,
                    PersistenceOp::Read,
                    &e,
                );
                Vec::new()
            }
        };

        self.context = history.iter().filter_map(ChatEntry::to_context).collect();
        self.history = history;

        tracing::debug!(
            "Loaded {} history entries ({} context entries)",
            self.history.len(),
            self.context.len()
        );

        events::emit(
            self.sink.as_ref(),
            ClientEvent::HistoryChanged {
                len: self.history.len(),
            },
        );
    }

    fn persist(&self) {
        if let Err(e) = self
            .store
            .set(keys::CHAT_HISTORY, self.history_for_persistence())
        {
            report_persistence_failure(
                self.sink.as_ref(),
                keys::CHAT_HISTORY,
                PersistenceOp::Write,
                &e,
            );
        }
    }
}
