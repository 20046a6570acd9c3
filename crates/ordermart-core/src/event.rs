use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Object-creation notification that starts a run. Only `bucket` drives behaviour; the
/// rest is carried for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    pub bucket: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectData {
    bucket: String,
    #[serde(default)]
    name: String,
}

impl StorageEvent {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            event_type: None,
            bucket: bucket.into(),
            name: name.into(),
        }
    }

    /// Decodes either a structured-mode CloudEvent (`{"id", "type", "data": {...}}`) or a
    /// binary-mode body (`{"bucket", "name"}`) whose id and type arrived as headers.
    pub fn from_cloud_event(
        body: &Value,
        header_id: Option<&str>,
        header_type: Option<&str>,
    ) -> Result<Self, serde_json::Error> {
        let (data, id, event_type) = match body.get("data") {
            Some(data) if data.is_object() => (
                data,
                body.get("id").and_then(Value::as_str).map(str::to_string),
                body.get("type").and_then(Value::as_str).map(str::to_string),
            ),
            _ => (body, None, None),
        };

        let object = ObjectData::deserialize(data)?;
        Ok(Self {
            id: id.or_else(|| header_id.map(str::to_string)),
            event_type: event_type.or_else(|| header_type.map(str::to_string)),
            bucket: object.bucket,
            name: object.name,
        })
    }
}
