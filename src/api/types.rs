//! Wire types for the backend JSON API.

use std::collections::HashMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::session::SessionContextEntry;

/// Kind of destination a note is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Database,
    Page,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Database => "database",
            TargetType::Page => "page",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A database or page the user can save notes into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub target_type: TargetType,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TargetsResponse {
    #[serde(default)]
    pub targets: Vec<Target>,
}

/// A declared option of a select-like property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaOption {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// One property definition: its type plus type-specific config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub config: Map<String, Value>,
}

impl PropertyDef {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            config: Map::new(),
        }
    }

    /// Property with declared options, in the backend's nested layout
    /// (`{"type": "select", "select": {"options": [...]}}`).
    pub fn with_options(kind: impl Into<String>, options: &[&str]) -> Self {
        let kind = kind.into();
        let options: Vec<Value> = options
            .iter()
            .map(|name| serde_json::json!({ "name": name }))
            .collect();

        let mut config = Map::new();
        config.insert(kind.clone(), serde_json::json!({ "options": options }));
        Self { kind, config }
    }

    /// Declared options for select, multi_select and status properties.
    ///
    /// Options are read from `config[kind].options`, falling back to a flat
    /// `config.options` list.
    pub fn options(&self) -> Vec<SchemaOption> {
        let raw = self
            .config
            .get(&self.kind)
            .and_then(|nested| nested.get("options"))
            .or_else(|| self.config.get("options"));

        match raw {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(name) => Some(SchemaOption {
                        name: name.clone(),
                        color: None,
                    }),
                    other => serde_json::from_value(other.clone()).ok(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Property definitions of a target, in declaration order.
///
/// Serialized as a JSON object; the order of keys is kept through
/// (de)serialization, which the form model depends on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    properties: Vec<(String, PropertyDef)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a property (replacing an existing one with the same name).
    pub fn with_property(mut self, name: impl Into<String>, def: PropertyDef) -> Self {
        let name = name.into();
        if let Some(slot) = self.properties.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = def;
        } else {
            self.properties.push((name, def));
        }
        self
    }

    pub fn properties(&self) -> impl DoubleEndedIterator<Item = (&str, &PropertyDef)> {
        self.properties.iter().map(|(n, d)| (n.as_str(), d))
    }

    pub fn get(&self, name: &str) -> Option<&PropertyDef> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.properties.len()))?;
        for (name, def) in &self.properties {
            map.serialize_entry(name, def)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SchemaVisitor;

        impl<'de> Visitor<'de> for SchemaVisitor {
            type Value = Schema;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of property name to property definition")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Schema, A::Error> {
                let mut schema = Schema::new();
                while let Some((name, def)) = access.next_entry::<String, PropertyDef>()? {
                    schema = schema.with_property(name, def);
                }
                Ok(schema)
            }
        }

        deserializer.deserialize_map(SchemaVisitor)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SchemaResponse {
    #[serde(default)]
    pub schema: Schema,
}

/// One block of page content in a preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub content: String,
}

/// Content preview of a target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPreview {
    Database {
        #[serde(default)]
        columns: Vec<String>,
        #[serde(default)]
        rows: Vec<HashMap<String, Value>>,
    },
    Page {
        #[serde(default)]
        blocks: Vec<PreviewBlock>,
    },
}

/// A model offered by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub supports_vision: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefaults {
    pub text: String,
    pub multimodal: String,
}

/// Response of `GET /api/models`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub all: Vec<ModelDescriptor>,
    #[serde(default)]
    pub text_only: Vec<ModelDescriptor>,
    #[serde(default)]
    pub vision_capable: Vec<ModelDescriptor>,
    pub defaults: ModelDefaults,
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub text: String,
    pub target_id: String,
    pub system_prompt: Option<String>,
    pub session_history: Vec<SessionContextEntry>,
    pub reference_context: Option<String>,
    pub image_data: Option<String>,
    pub image_mime_type: Option<String>,
    pub model: Option<String>,
}

/// Token accounting reported with a chat reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Response of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    #[serde(default)]
    pub properties: Option<Value>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
    #[serde(default)]
    pub cost: Option<f64>,
}

/// Body of `POST /api/save`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveRequest {
    pub target_db_id: String,
    pub target_type: TargetType,
    pub text: Option<String>,
    pub properties: Value,
}

/// Outcome of a successful save.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SaveResult {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatePageRequest<'a> {
    pub page_name: &'a str,
}

/// Response of `POST /api/pages/create`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedPage {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_keeps_declaration_order() {
        let json = r#"{"Zeta": {"type": "title"}, "Alpha": {"type": "rich_text"}, "Mid": {"type": "date"}}"#;
        let schema: Schema = serde_json::from_str(json).unwrap();

        let names: Vec<&str> = schema.properties().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);

        // And survives a write/read through the cache format
        let text = serde_json::to_string(&schema).unwrap();
        let again: Schema = serde_json::from_str(&text).unwrap();
        assert_eq!(again, schema);
    }

    #[test]
    fn test_property_options_nested_layout() {
        let json = r#"{"type": "multi_select", "id": "x", "multi_select": {"options": [{"name": "urgent", "color": "red"}, {"name": "home"}]}}"#;
        let def: PropertyDef = serde_json::from_str(json).unwrap();

        let options = def.options();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].name, "urgent");
        assert_eq!(options[0].color.as_deref(), Some("red"));
        assert_eq!(options[1].name, "home");
    }

    #[test]
    fn test_property_options_flat_layout() {
        let json = r#"{"type": "select", "options": ["a", {"name": "b"}]}"#;
        let def: PropertyDef = serde_json::from_str(json).unwrap();

        let names: Vec<String> = def.options().into_iter().map(|o| o.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_content_preview_variants() {
        let db: ContentPreview = serde_json::from_str(
            r#"{"type": "database", "columns": ["Name"], "rows": [{"Name": "milk"}]}"#,
        )
        .unwrap();
        assert!(matches!(db, ContentPreview::Database { ref rows, .. } if rows.len() == 1));

        let page: ContentPreview = serde_json::from_str(
            r#"{"type": "page", "blocks": [{"type": "paragraph", "content": "hello"}]}"#,
        )
        .unwrap();
        match page {
            ContentPreview::Page { blocks } => assert_eq!(blocks[0].content, "hello"),
            other => panic!("Expected page preview, got {:?}", other),
        }
    }

    #[test]
    fn test_chat_response_optional_fields() {
        let resp: ChatResponse = serde_json::from_str(r#"{"message": "ok"}"#).unwrap();
        assert_eq!(resp.message, "ok");
        assert!(resp.properties.is_none());
        assert!(resp.usage.is_none());
    }

    #[test]
    fn test_target_type_wire_name() {
        let target: Target =
            serde_json::from_str(r#"{"id": "p1", "title": "Inbox", "type": "page"}"#).unwrap();
        assert_eq!(target.target_type, TargetType::Page);
        assert_eq!(target.target_type.to_string(), "page");
    }
}
