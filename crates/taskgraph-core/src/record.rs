use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{GraphError, Result};

/// A task as serialized by the backend snapshot feed.
///
/// Only `id` and `state` are required. The state stays a raw string here so
/// that unrecognized values surface as `UnknownState` at build time instead of
/// being rejected while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// Unique task identifier.
    pub id: String,
    /// Task name (usually the registered task function).
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Raw state identifier.
    pub state: String,
    /// Ids of tasks this one depends on.
    #[serde(default, alias = "depends_on", deserialize_with = "null_as_default")]
    pub depends_on: Vec<String>,
    /// Optional cluster label.
    #[serde(default, alias = "group_key", skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,
}

impl TaskRecord {
    /// Create a record with no dependencies and no group.
    pub fn new(id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            state: state.into(),
            depends_on: Vec::new(),
            group_key: None,
        }
    }

    /// Set the task name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a dependency.
    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.depends_on.push(id.into());
        self
    }

    /// Set the group key.
    pub fn in_group(mut self, key: impl Into<String>) -> Self {
        self.group_key = Some(key.into());
        self
    }

    /// The group key, treating an empty string as absent.
    pub fn effective_group(&self) -> Option<&str> {
        self.group_key.as_deref().filter(|key| !key.is_empty())
    }
}

/// Decode a snapshot payload.
///
/// Accepts either an array of records or an object keyed by task id. In the
/// keyed form a record may omit `id`; the key fills it in.
pub fn records_from_json(payload: Value) -> Result<Vec<TaskRecord>> {
    match payload {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(GraphError::from))
            .collect(),
        Value::Object(entries) => entries
            .into_iter()
            .map(|(key, mut item)| {
                if let Value::Object(fields) = &mut item {
                    fields.entry("id").or_insert(Value::String(key));
                }
                serde_json::from_value(item).map_err(GraphError::from)
            })
            .collect(),
        other => Err(GraphError::InvalidSnapshot(format!(
            "expected an array or object of tasks, got {}",
            json_kind(&other)
        ))),
    }
}

/// Decode a snapshot payload from raw bytes.
pub fn records_from_slice(bytes: &[u8]) -> Result<Vec<TaskRecord>> {
    let payload: Value = serde_json::from_slice(bytes)?;
    records_from_json(payload)
}

/// Feeds send `null` for fields they have no value for.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
