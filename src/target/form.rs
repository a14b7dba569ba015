//! Form model built from a target schema, and the values the user edits in it.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::api::{Schema, TargetType};
use crate::session::sanitize_image_data;

/// Property types maintained by the backend that never appear in the form.
pub const SYSTEM_MANAGED_TYPES: &[&str] = &[
    "created_time",
    "last_edited_time",
    "created_by",
    "last_edited_by",
];

/// How a property is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Text,
    Textarea,
    Select,
    MultiSelect,
    Date,
    Checkbox,
    Number,
    Url,
    Email,
    Phone,
}

impl InputKind {
    pub fn for_property_type(property_type: &str) -> Self {
        match property_type {
            "title" => InputKind::Text,
            "rich_text" => InputKind::Textarea,
            "select" | "status" => InputKind::Select,
            "multi_select" => InputKind::MultiSelect,
            "date" => InputKind::Date,
            "checkbox" => InputKind::Checkbox,
            "number" => InputKind::Number,
            "url" => InputKind::Url,
            "email" => InputKind::Email,
            "phone_number" => InputKind::Phone,
            _ => InputKind::Text,
        }
    }

    pub fn has_options(&self) -> bool {
        matches!(self, InputKind::Select | InputKind::MultiSelect)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormOption {
    pub name: String,
    /// Discovered from saved data or an AI suggestion rather than declared
    pub ad_hoc: bool,
}

impl FormOption {
    /// Text shown to the user.
    pub fn label(&self) -> String {
        if self.ad_hoc {
            format!("{} (ad-hoc)", self.name)
        } else {
            self.name.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub name: String,
    pub property_type: String,
    pub kind: InputKind,
    pub options: Vec<FormOption>,
}

impl FormField {
    pub fn has_option(&self, name: &str) -> bool {
        self.options.iter().any(|o| o.name == name)
    }

    /// Append an ad-hoc option unless one with this name exists.
    /// Returns true when an option was added.
    pub fn add_ad_hoc_option(&mut self, name: &str) -> bool {
        if name.is_empty() || self.has_option(name) {
            return false;
        }
        self.options.push(FormOption {
            name: name.to_string(),
            ad_hoc: true,
        });
        true
    }
}

/// Fields rendered for the selected target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormModel {
    pub fields: Vec<FormField>,
    pub attributes_visible: bool,
    pub attributes_collapsed: bool,
}

impl FormModel {
    /// Build the form for a schema.
    ///
    /// Fields come out in reverse declaration order. Only database targets
    /// show the attribute section, and it starts collapsed.
    pub fn build(schema: &Schema, target_type: TargetType) -> Self {
        let fields = schema
            .properties()
            .rev()
            .filter(|(_, def)| !SYSTEM_MANAGED_TYPES.contains(&def.kind.as_str()))
            .map(|(name, def)| {
                let kind = InputKind::for_property_type(&def.kind);
                let options = if kind.has_options() {
                    def.options()
                        .into_iter()
                        .map(|o| FormOption {
                            name: o.name,
                            ad_hoc: false,
                        })
                        .collect()
                } else {
                    Vec::new()
                };
                FormField {
                    name: name.to_string(),
                    property_type: def.kind.clone(),
                    kind,
                    options,
                }
            })
            .collect();

        Self {
            fields,
            attributes_visible: target_type == TargetType::Database,
            attributes_collapsed: true,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut FormField> {
        self.fields.iter_mut().find(|f| f.name == name)
    }
}

/// Value of one form field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FormValue {
    Text(String),
    Select(Option<String>),
    MultiSelect(Vec<String>),
    Checkbox(bool),
    Number(Option<f64>),
}

impl FormValue {
    pub fn empty(kind: InputKind) -> Self {
        match kind {
            InputKind::Select => FormValue::Select(None),
            InputKind::MultiSelect => FormValue::MultiSelect(Vec::new()),
            InputKind::Checkbox => FormValue::Checkbox(false),
            InputKind::Number => FormValue::Number(None),
            _ => FormValue::Text(String::new()),
        }
    }

    /// Parse user input for a field of the given kind.
    pub fn parse(kind: InputKind, input: &str) -> Result<Self, String> {
        let input = input.trim();
        match kind {
            InputKind::Select => Ok(FormValue::Select(
                Some(input.to_string()).filter(|s| !s.is_empty()),
            )),
            InputKind::MultiSelect => Ok(FormValue::MultiSelect(split_names(input))),
            InputKind::Checkbox => match input.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(FormValue::Checkbox(true)),
                "false" | "no" | "off" | "0" | "" => Ok(FormValue::Checkbox(false)),
                other => Err(format!("Not a checkbox value: {}", other)),
            },
            InputKind::Number if input.is_empty() => Ok(FormValue::Number(None)),
            InputKind::Number => input
                .parse::<f64>()
                .map(|n| FormValue::Number(Some(n)))
                .map_err(|_| format!("Not a number: {}", input)),
            _ => Ok(FormValue::Text(input.to_string())),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            FormValue::Text(s) => s.is_empty(),
            FormValue::Select(v) => v.is_none(),
            FormValue::MultiSelect(v) => v.is_empty(),
            FormValue::Checkbox(_) => false,
            FormValue::Number(n) => n.is_none(),
        }
    }
}

/// Comma-separated names, trimmed, empties dropped.
pub(crate) fn split_names(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Current values of the form, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormValues {
    values: HashMap<String, FormValue>,
}

impl FormValues {
    /// Empty values for every field of the form.
    pub fn for_model(model: &FormModel) -> Self {
        let values = model
            .fields
            .iter()
            .map(|f| (f.name.clone(), FormValue::empty(f.kind)))
            .collect();
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: FormValue) {
        self.values.insert(name.into(), value);
    }

    /// Apply property values suggested by the chat endpoint.
    ///
    /// Values are read in the backend's property layout. Unknown properties are
    /// ignored. A suggested select value that is not an option of the field is
    /// added as an ad-hoc option before being selected. Returns the number of
    /// fields that were set.
    pub fn apply_ai_properties(&mut self, model: &mut FormModel, properties: &Value) -> usize {
        let Some(properties) = properties.as_object() else {
            return 0;
        };

        let mut applied = 0;
        for (name, raw) in properties {
            let Some(field) = model.field_mut(name) else {
                tracing::debug!("Ignoring suggested value for unknown property '{}'", name);
                continue;
            };

            let Some(value) = read_property_value(field, raw) else {
                continue;
            };

            match &value {
                FormValue::Select(Some(choice)) => {
                    field.add_ad_hoc_option(choice);
                }
                FormValue::MultiSelect(choices) => {
                    for choice in choices {
                        field.add_ad_hoc_option(choice);
                    }
                }
                _ => {}
            }

            self.values.insert(name.clone(), value);
            applied += 1;
        }

        applied
    }

    /// Render filled-in values as backend property JSON.
    pub fn to_properties(&self, model: &FormModel) -> Value {
        let mut out = Map::new();

        for field in &model.fields {
            let Some(value) = self.values.get(&field.name) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }

            let rendered = match (field.property_type.as_str(), value) {
                ("title", FormValue::Text(text)) => {
                    json!({ "title": [{ "text": { "content": sanitize_image_data(text) } }] })
                }
                ("rich_text", FormValue::Text(text)) => {
                    json!({ "rich_text": [{ "text": { "content": sanitize_image_data(text) } }] })
                }
                ("select", FormValue::Select(Some(name))) => json!({ "select": { "name": name } }),
                ("status", FormValue::Select(Some(name))) => json!({ "status": { "name": name } }),
                ("multi_select", FormValue::MultiSelect(names)) => {
                    let items: Vec<Value> = names.iter().map(|n| json!({ "name": n })).collect();
                    json!({ "multi_select": items })
                }
                ("date", FormValue::Text(start)) => json!({ "date": { "start": start } }),
                ("checkbox", FormValue::Checkbox(checked)) => json!({ "checkbox": checked }),
                ("number", FormValue::Number(Some(n))) => json!({ "number": n }),
                (kind @ ("url" | "email" | "phone_number"), FormValue::Text(text)) => {
                    json!({ kind: text })
                }
                (other, _) => {
                    tracing::debug!("Not saving property '{}' of type '{}'", field.name, other);
                    continue;
                }
            };

            out.insert(field.name.clone(), rendered);
        }

        Value::Object(out)
    }
}

/// Read a value in the backend property layout (or a bare scalar) for a field.
fn read_property_value(field: &FormField, raw: &Value) -> Option<FormValue> {
    let inner = raw.get(&field.property_type).unwrap_or(raw);

    match field.kind {
        InputKind::Text | InputKind::Textarea => read_text(inner).map(FormValue::Text),
        InputKind::Select => read_name(inner).map(|n| FormValue::Select(Some(n))),
        InputKind::MultiSelect => match inner {
            Value::Array(items) => Some(FormValue::MultiSelect(
                items.iter().filter_map(read_name).collect(),
            )),
            Value::String(s) => Some(FormValue::MultiSelect(split_names(s))),
            _ => None,
        },
        InputKind::Date => match inner {
            Value::String(s) => Some(FormValue::Text(s.clone())),
            other => other
                .get("start")
                .and_then(Value::as_str)
                .map(|s| FormValue::Text(s.to_string())),
        },
        InputKind::Checkbox => inner.as_bool().map(FormValue::Checkbox),
        InputKind::Number => inner.as_f64().map(|n| FormValue::Number(Some(n))),
        InputKind::Url | InputKind::Email | InputKind::Phone => {
            inner.as_str().map(|s| FormValue::Text(s.to_string()))
        }
    }
}

/// Text from a rich-text array (`text.content` or `plain_text`) or a string.
fn read_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => Some(
            parts
                .iter()
                .filter_map(|part| {
                    part.get("text")
                        .and_then(|t| t.get("content"))
                        .or_else(|| part.get("plain_text"))
                        .and_then(Value::as_str)
                })
                .collect(),
        ),
        _ => None,
    }
}

/// Option name from `{"name": ...}` or a string.
fn read_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        other => other
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|s| !s.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PropertyDef;

    fn task_schema() -> Schema {
        Schema::new()
            .with_property("Name", PropertyDef::new("title"))
            .with_property("Tags", PropertyDef::with_options("multi_select", &["urgent", "home"]))
            .with_property("Status", PropertyDef::with_options("status", &["Todo", "Done"]))
            .with_property("Created", PropertyDef::new("created_time"))
            .with_property("Editor", PropertyDef::new("last_edited_by"))
    }

    #[test]
    fn test_fields_in_reverse_order_without_system_types() {
        let schema = Schema::new()
            .with_property("A", PropertyDef::new("title"))
            .with_property("B", PropertyDef::new("rich_text"))
            .with_property("C", PropertyDef::new("number"));
        let form = FormModel::build(&schema, TargetType::Database);

        let names: Vec<&str> = form.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["C", "B", "A"]);

        let form = FormModel::build(&task_schema(), TargetType::Database);
        let names: Vec<&str> = form.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Status", "Tags", "Name"]);
    }

    #[test]
    fn test_attribute_section_by_target_type() {
        let db = FormModel::build(&task_schema(), TargetType::Database);
        assert!(db.attributes_visible);
        assert!(db.attributes_collapsed);

        let page = FormModel::build(&task_schema(), TargetType::Page);
        assert!(!page.attributes_visible);
    }

    #[test]
    fn test_input_kinds() {
        assert_eq!(InputKind::for_property_type("title"), InputKind::Text);
        assert_eq!(InputKind::for_property_type("rich_text"), InputKind::Textarea);
        assert_eq!(InputKind::for_property_type("status"), InputKind::Select);
        assert_eq!(InputKind::for_property_type("phone_number"), InputKind::Phone);
        assert_eq!(InputKind::for_property_type("formula"), InputKind::Text);
    }

    #[test]
    fn test_apply_selects_exactly_suggested_options() {
        let mut form = FormModel::build(&task_schema(), TargetType::Database);
        let mut values = FormValues::for_model(&form);

        let props = json!({
            "Tags": { "multi_select": [{ "name": "home" }] },
            "Name": { "title": [{ "text": { "content": "🥛 Buy milk" } }] },
            "Unknown": { "select": { "name": "x" } }
        });
        assert_eq!(values.apply_ai_properties(&mut form, &props), 2);

        assert_eq!(
            values.get("Tags"),
            Some(&FormValue::MultiSelect(vec!["home".to_string()]))
        );
        assert_eq!(
            values.get("Name"),
            Some(&FormValue::Text("🥛 Buy milk".to_string()))
        );
        // No options were invented for declared values
        assert_eq!(form.field("Tags").unwrap().options.len(), 2);
    }

    #[test]
    fn test_apply_adds_unknown_select_value_as_ad_hoc() {
        let mut form = FormModel::build(&task_schema(), TargetType::Database);
        let mut values = FormValues::for_model(&form);

        values.apply_ai_properties(&mut form, &json!({ "Status": { "status": { "name": "Blocked" } } }));

        let status = form.field("Status").unwrap();
        assert_eq!(status.options.len(), 3);
        assert!(status.options[2].ad_hoc);
        assert_eq!(status.options[2].label(), "Blocked (ad-hoc)");
        assert_eq!(
            values.get("Status"),
            Some(&FormValue::Select(Some("Blocked".to_string())))
        );
    }

    #[test]
    fn test_to_properties_skips_empty_and_strips_images() {
        let schema = Schema::new()
            .with_property("Name", PropertyDef::new("title"))
            .with_property("Notes", PropertyDef::new("rich_text"))
            .with_property("Done", PropertyDef::new("checkbox"))
            .with_property("Tags", PropertyDef::with_options("multi_select", &["a"]))
            .with_property("Due", PropertyDef::new("date"));
        let form = FormModel::build(&schema, TargetType::Database);
        let mut values = FormValues::for_model(&form);
        values.set("Name", FormValue::Text("Task".to_string()));
        values.set(
            "Notes",
            FormValue::Text(r#"see<img src="data:image/png;base64,AAAA">"#.to_string()),
        );

        let props = values.to_properties(&form);
        assert_eq!(props["Name"]["title"][0]["text"]["content"], "Task");
        assert_eq!(props["Notes"]["rich_text"][0]["text"]["content"], "see");
        assert_eq!(props["Done"]["checkbox"], false);
        assert!(props.get("Tags").is_none());
        assert!(props.get("Due").is_none());
    }

    #[test]
    fn test_parse_user_input() {
        assert_eq!(
            FormValue::parse(InputKind::MultiSelect, " a, b ,,c "),
            Ok(FormValue::MultiSelect(vec![
                "a".to_string(),
                "b".to_string(),
                "c".to_string()
            ]))
        );
        assert_eq!(
            FormValue::parse(InputKind::Checkbox, "Yes"),
            Ok(FormValue::Checkbox(true))
        );
        assert!(FormValue::parse(InputKind::Number, "ten").is_err());
        assert_eq!(
            FormValue::parse(InputKind::Select, ""),
            Ok(FormValue::Select(None))
        );
    }
}
