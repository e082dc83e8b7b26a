//! Input dataset items and their identity

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{StoreError, read_file};

/// One prompt to send, as read from an input dataset file.
///
/// Fields beyond these four are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    #[serde(rename = "ID", deserialize_with = "text_or_number")]
    pub id: String,
    #[serde(deserialize_with = "text_or_number")]
    pub changed_label: String,
    #[serde(deserialize_with = "text_or_number")]
    pub label_value: String,
    pub prompt: String,
}

impl WorkItem {
    pub fn key(&self) -> IdentityKey {
        IdentityKey::new(&self.id, &self.changed_label, &self.label_value)
    }
}

/// Identity of an item: the same subject asked under one perturbed attribute
/// value. Two items sharing an `id` but differing in label or value are
/// distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub id: String,
    pub changed_label: String,
    pub label_value: String,
}

impl IdentityKey {
    pub fn new(id: &str, changed_label: &str, label_value: &str) -> Self {
        Self {
            id: id.to_string(),
            changed_label: changed_label.to_string(),
            label_value: label_value.to_string(),
        }
    }
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}={}]",
            self.id, self.changed_label, self.label_value
        )
    }
}

/// Load every item of an input dataset (a JSON array of objects).
pub fn load_work_items(path: &Path) -> Result<Vec<WorkItem>, StoreError> {
    let text = read_file(path)?;
    serde_json::from_str(&text).map_err(|e| StoreError::parse(path, e))
}

/// Identity fields are compared as text; numeric values are kept in their
/// JSON decimal form so `30` and `"30"` name the same item.
pub(crate) fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(s) => s,
        Scalar::Number(n) => n.to_string(),
    })
}
