//! Target selection and schema loading.
//!
//! Selecting a target moves the schema area through
//! `Idle -> Loading -> Ready | Failed`. Both the target list and each schema
//! go through the cache.

pub mod form;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::api::{ApiError, BackendApi, ContentPreview, Schema, Target};
use crate::cache::CacheManager;
use crate::events::{self, ClientEvent, EventSink, NoticeLevel};
use crate::preferences::Preferences;
use crate::storage::keys;

pub use form::{FormField, FormModel, FormOption, FormValue, FormValues, InputKind};

/// Inline text shown in the schema area when loading fails.
pub const SCHEMA_INLINE_ERROR: &str = "Failed to load schema";

/// Why a backend call failed, as far as the user is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Connectivity,
    NotFound,
    Authorization,
    Server,
    Other,
}

impl FailureCategory {
    pub fn classify(error: &ApiError) -> Self {
        if error.is_connectivity() {
            return FailureCategory::Connectivity;
        }
        match error.status() {
            Some(404) => FailureCategory::NotFound,
            Some(401 | 403) => FailureCategory::Authorization,
            Some(500..=599) => FailureCategory::Server,
            _ => FailureCategory::Other,
        }
    }

    /// One user-facing message per category.
    pub fn schema_message(&self, error: &ApiError) -> String {
        match self {
            FailureCategory::Connectivity => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            FailureCategory::NotFound => {
                "Target not found. It may have been deleted or the integration lacks access."
                    .to_string()
            }
            FailureCategory::Authorization => {
                "Not authorized to read this target. Check the integration permissions."
                    .to_string()
            }
            FailureCategory::Server => {
                format!("The server failed to load the schema: {}", error)
            }
            FailureCategory::Other => format!("Failed to load schema: {}", error),
        }
    }
}

/// Schema area state for the current selection.
#[derive(Debug, Clone, Default)]
pub enum SchemaState {
    #[default]
    Idle,
    Loading {
        target: Target,
    },
    Ready {
        target: Target,
        schema: Schema,
        form: FormModel,
    },
    Failed {
        target: Target,
        category: FailureCategory,
        message: String,
    },
}

impl SchemaState {
    /// The selected target, in any state but `Idle`.
    pub fn target(&self) -> Option<&Target> {
        match self {
            SchemaState::Idle => None,
            SchemaState::Loading { target }
            | SchemaState::Ready { target, .. }
            | SchemaState::Failed { target, .. } => Some(target),
        }
    }

    pub fn form(&self) -> Option<&FormModel> {
        match self {
            SchemaState::Ready { form, .. } => Some(form),
            _ => None,
        }
    }

    pub fn form_mut(&mut self) -> Option<&mut FormModel> {
        match self {
            SchemaState::Ready { form, .. } => Some(form),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SchemaState::Loading { .. })
    }
}

/// Loads targets and schemas and remembers the last selection.
pub struct TargetCoordinator {
    backend: Arc<dyn BackendApi>,
    cache: Arc<CacheManager>,
    prefs: Preferences,
    sink: Arc<dyn EventSink>,
}

impl TargetCoordinator {
    pub fn new(
        backend: Arc<dyn BackendApi>,
        cache: Arc<CacheManager>,
        prefs: Preferences,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            backend,
            cache,
            prefs,
            sink,
        }
    }

    /// Fetch the target list through the cache.
    pub async fn load_targets(&self) -> Result<Vec<Target>, ApiError> {
        let backend = self.backend.clone();
        let targets = self
            .cache
            .fetch_with_cache(keys::TARGETS, || async move { backend.list_targets().await })
            .await?;

        tracing::info!("Loaded {} targets", targets.len());
        events::emit(
            self.sink.as_ref(),
            ClientEvent::TargetsLoaded {
                count: targets.len(),
            },
        );
        Ok(targets)
    }

    /// Remember the selection and load its schema.
    ///
    /// Failures are classified and reported here; the returned state is
    /// either `Ready` or `Failed`.
    pub async fn select(&self, target: &Target) -> SchemaState {
        self.prefs.set_last_target(&target.id);
        events::emit(
            self.sink.as_ref(),
            ClientEvent::SchemaLoading {
                target_id: target.id.clone(),
            },
        );

        let backend = self.backend.clone();
        let target_id = target.id.clone();
        let result = self
            .cache
            .fetch_with_cache(&keys::schema(&target.id), || async move {
                backend.get_schema(&target_id).await
            })
            .await;

        match result {
            Ok(schema) => {
                let form = FormModel::build(&schema, target.target_type);
                tracing::debug!(
                    "Schema for '{}' ready with {} fields",
                    target.id,
                    form.fields.len()
                );
                events::emit(
                    self.sink.as_ref(),
                    ClientEvent::SchemaReady {
                        target_id: target.id.clone(),
                        field_count: form.fields.len(),
                    },
                );
                SchemaState::Ready {
                    target: target.clone(),
                    schema,
                    form,
                }
            }
            Err(e) => {
                let category = FailureCategory::classify(&e);
                tracing::warn!("Schema load for '{}' failed ({:?}): {}", target.id, category, e);

                events::emit(
                    self.sink.as_ref(),
                    ClientEvent::notice(NoticeLevel::Error, category.schema_message(&e)),
                );
                events::emit(
                    self.sink.as_ref(),
                    ClientEvent::SchemaFailed {
                        target_id: target.id.clone(),
                        category,
                        inline_error: SCHEMA_INLINE_ERROR.to_string(),
                    },
                );

                SchemaState::Failed {
                    target: target.clone(),
                    category,
                    message: SCHEMA_INLINE_ERROR.to_string(),
                }
            }
        }
    }

    /// The persisted last selection, if it is still listed.
    ///
    /// A remembered id that is no longer in `targets` is forgotten.
    pub fn restore_last_target(&self, targets: &[Target]) -> Option<Target> {
        let id = self.prefs.last_target()?;

        match targets.iter().find(|t| t.id == id) {
            Some(target) => Some(target.clone()),
            None => {
                tracing::debug!("Last target '{}' is no longer listed", id);
                self.prefs.clear_last_target();
                None
            }
        }
    }
}

/// Add select values found in database rows that the schema does not declare.
///
/// Cell values may be plain strings (comma-separated), option objects or
/// arrays of either. Existing options are never removed or reordered.
/// Returns the number of options added.
pub fn update_dynamic_select_options(form: &mut FormModel, preview: &ContentPreview) -> usize {
    let ContentPreview::Database { rows, .. } = preview else {
        return 0;
    };

    let mut added = 0;
    for row in rows {
        for (column, cell) in row {
            let Some(field) = form.field_mut(column) else {
                continue;
            };
            if !field.kind.has_options() {
                continue;
            }
            for name in cell_option_names(cell) {
                if field.add_ad_hoc_option(&name) {
                    added += 1;
                }
            }
        }
    }

    if added > 0 {
        tracing::debug!("Added {} ad-hoc select options from preview", added);
    }
    added
}

fn cell_option_names(cell: &Value) -> Vec<String> {
    match cell {
        Value::String(s) => form::split_names(s),
        Value::Array(items) => items.iter().flat_map(cell_option_names).collect(),
        Value::Object(_) => cell
            .get("name")
            .and_then(Value::as_str)
            .map(form::split_names)
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Plain-text rendering of a preview, sent as reference context.
pub fn reference_text(preview: &ContentPreview) -> String {
    match preview {
        ContentPreview::Page { blocks } => blocks
            .iter()
            .map(|b| b.content.trim())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        ContentPreview::Database { columns, rows } => rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .filter_map(|col| {
                        let cell = row.get(col)?;
                        let text = match cell {
                            Value::String(s) => s.clone(),
                            Value::Null => return None,
                            other => other.to_string(),
                        };
                        Some(format!("{}: {}", col, text))
                    })
                    .collect::<Vec<_>>()
                    .join(" | ")
            })
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;
    use crate::api::{PreviewBlock, PropertyDef, TargetType};

    fn row(cells: &[(&str, Value)]) -> HashMap<String, Value> {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_classify_failures() {
        let cases = [
            (ApiError::network(None, "refused"), FailureCategory::Connectivity),
            (ApiError::network(Some(404), "gone"), FailureCategory::NotFound),
            (ApiError::network(Some(401), "no"), FailureCategory::Authorization),
            (ApiError::network(Some(403), "no"), FailureCategory::Authorization),
            (ApiError::network(Some(503), "down"), FailureCategory::Server),
            (ApiError::network(Some(400), "bad"), FailureCategory::Other),
            (
                ApiError::Decode {
                    endpoint: "/api/schema/x".to_string(),
                    message: "eof".to_string(),
                },
                FailureCategory::Other,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(FailureCategory::classify(&error), expected, "{:?}", error);
        }
    }

    #[test]
    fn test_dynamic_options_append_only() {
        let schema = Schema::new()
            .with_property("Tags", PropertyDef::with_options("multi_select", &["urgent", "home"]))
            .with_property("Name", PropertyDef::new("title"));
        let mut form = FormModel::build(&schema, TargetType::Database);

        let preview = ContentPreview::Database {
            columns: vec!["Name".to_string(), "Tags".to_string()],
            rows: vec![
                row(&[("Name", json!("a, b")), ("Tags", json!("home, work"))]),
                row(&[("Tags", json!([{ "name": "errand" }, "work"]))]),
            ],
        };

        assert_eq!(update_dynamic_select_options(&mut form, &preview), 2);

        let tags = form.field("Tags").unwrap();
        let names: Vec<&str> = tags.options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["urgent", "home", "work", "errand"]);
        assert!(!tags.options[1].ad_hoc);
        assert!(tags.options[2].ad_hoc);
        // Title fields never get options
        assert!(form.field("Name").unwrap().options.is_empty());

        // Running again adds nothing
        assert_eq!(update_dynamic_select_options(&mut form, &preview), 0);
    }

    #[test]
    fn test_reference_text_for_page() {
        let preview = ContentPreview::Page {
            blocks: vec![
                PreviewBlock {
                    block_type: "paragraph".to_string(),
                    content: "first".to_string(),
                },
                PreviewBlock {
                    block_type: "divider".to_string(),
                    content: String::new(),
                },
                PreviewBlock {
                    block_type: "paragraph".to_string(),
                    content: "second".to_string(),
                },
            ],
        };
        assert_eq!(reference_text(&preview), "first\nsecond");
    }

    #[test]
    fn test_reference_text_for_database_follows_columns() {
        let preview = ContentPreview::Database {
            columns: vec!["Name".to_string(), "Count".to_string()],
            rows: vec![row(&[("Count", json!(2)), ("Name", json!("milk"))])],
        };
        assert_eq!(reference_text(&preview), "Name: milk | Count: 2");
    }
}
