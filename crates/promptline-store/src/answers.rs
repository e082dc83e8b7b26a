//! Ground-truth answer table keyed by subject id

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{StoreError, read_file};

#[derive(Debug, Deserialize)]
struct AnswerEntry {
    #[serde(default)]
    true_answer: Value,
}

/// Mapping `id -> true_answer`, loaded once per run and shared read-only.
///
/// The on-disk shape is `{"<id>": {"true_answer": <any JSON>}, ...}`.
#[derive(Debug, Clone, Default)]
pub struct AnswerTable {
    answers: HashMap<String, Value>,
}

impl AnswerTable {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let text = read_file(path)?;
        let entries: HashMap<String, AnswerEntry> =
            serde_json::from_str(&text).map_err(|e| StoreError::parse(path, e))?;
        let answers = entries
            .into_iter()
            .map(|(id, entry)| (id, entry.true_answer))
            .collect();
        Ok(Self { answers })
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.answers.get(id)
    }

    /// Answer for `id`, or `null` when the table has no entry.
    pub fn true_answer(&self, id: &str) -> Value {
        match self.answers.get(id) {
            Some(v) => v.clone(),
            None => {
                log::warn!("No true answer for ID {id}, recording null");
                Value::Null
            }
        }
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

impl FromIterator<(String, Value)> for AnswerTable {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            answers: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn load_keeps_arbitrary_answer_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answers.json");
        std::fs::write(
            &path,
            r#"{"X": {"true_answer": "guilty"},
                "Y": {"true_answer": {"months": 6}},
                "Z": {"true_answer": [1, 2]}}"#,
        )
        .unwrap();

        let table = AnswerTable::load(&path).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.true_answer("X"), json!("guilty"));
        assert_eq!(table.true_answer("Y"), json!({"months": 6}));
        assert_eq!(table.get("Z"), Some(&json!([1, 2])));
    }

    #[test]
    fn missing_id_is_null() {
        let table: AnswerTable = [("X".to_string(), json!("A"))].into_iter().collect();
        assert_eq!(table.true_answer("nope"), Value::Null);
        assert!(table.get("nope").is_none());
    }

    #[test]
    fn entry_without_answer_field_is_null() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answers.json");
        std::fs::write(&path, r#"{"X": {}}"#).unwrap();
        let table = AnswerTable::load(&path).unwrap();
        assert_eq!(table.get("X"), Some(&Value::Null));
    }

    #[test]
    fn array_top_level_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answers.json");
        std::fs::write(&path, "[]").unwrap();
        assert!(AnswerTable::load(&path).unwrap_err().is_corrupt());
    }
}
