//! Persisted key names.
//!
//! Target ids are used as key suffixes for per-target entries.

pub const TARGETS: &str = "memo.targets";
pub const DRAFT: &str = "memo.draft";
pub const LAST_TARGET: &str = "memo.last_target";
pub const CHAT_HISTORY: &str = "memo.chat_history";
pub const SHOW_MODEL_INFO: &str = "memo.show_model_info";
pub const INCLUDE_REFERENCE: &str = "memo.include_reference";
pub const SELECTED_MODEL: &str = "memo.selected_model";

const SCHEMA_PREFIX: &str = "memo.schema.";
const PROMPT_PREFIX: &str = "memo.prompt.";

pub fn schema(target_id: &str) -> String {
    format!("{}{}", SCHEMA_PREFIX, target_id)
}

pub fn prompt(target_id: &str) -> String {
    format!("{}{}", PROMPT_PREFIX, target_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_target_keys_are_distinct() {
        assert_eq!(schema("db1"), "memo.schema.db1");
        assert_eq!(prompt("db1"), "memo.prompt.db1");
        assert_ne!(schema("db1"), schema("db2"));
    }
}
