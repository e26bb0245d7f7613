//! Wire models for the chat backend: sessions, messages, functions and the
//! realtime frame format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// --- Common Definitions ---

/// Ids are strings on the wire, but some deployments hand out integer keys.
/// Both are accepted and normalized to their string form.
mod flexible_id {
    use serde::{de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Uint(u64),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        match RawId::deserialize(d) {
            Ok(RawId::Text(s)) => Ok(s),
            Ok(RawId::Int(n)) => Ok(n.to_string()),
            Ok(RawId::Uint(n)) => Ok(n.to_string()),
            Err(_) => Err(de::Error::custom("expected a string or integer id")),
        }
    }

    pub fn deserialize_option<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<String>, D::Error> {
        match Option::<RawId>::deserialize(d) {
            Ok(None) => Ok(None),
            Ok(Some(RawId::Text(s))) => Ok(Some(s)),
            Ok(Some(RawId::Int(n))) => Ok(Some(n.to_string())),
            Ok(Some(RawId::Uint(n))) => Ok(Some(n.to_string())),
            Err(_) => Err(de::Error::custom("expected a string or integer id")),
        }
    }
}

/// The backend writes ISO-8601 timestamps without an offset. Those are read
/// as UTC; values carrying an offset are converted.
pub mod lenient_timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
            .ok_or_else(|| format!("invalid timestamp: {raw:?}"))
    }

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => s.serialize_str(&ts.to_rfc3339()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|raw| parse(&raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}

fn default_true() -> bool {
    true
}

// --- Sessions ---

/// A named conversation thread as stored by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    #[serde(deserialize_with = "flexible_id::deserialize")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub message_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateSessionRequest {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateSessionRequest {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateTitleRequest {
    pub message: String,
}

/// Answer of the title generation endpoint. `title` carries a fallback even
/// when `success` is false; only successful titles are applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedTitle {
    pub success: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// --- Messages ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    User,
    /// The realtime endpoint labels replies `ai`.
    #[serde(alias = "ai")]
    Assistant,
    System,
    Error,
}

/// A message as persisted by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageRecord {
    #[serde(deserialize_with = "flexible_id::deserialize")]
    pub id: String,
    #[serde(default, deserialize_with = "flexible_id::deserialize_option")]
    pub session_id: Option<String>,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub content: String,
    #[serde(default, with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateMessageRequest {
    pub content: String,
    pub message_type: MessageType,
}

/// A function invocation shown next to a message. Client-side only; never
/// sent to the message endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub result: Option<Value>,
}

// --- Functions ---

/// An entry of the function catalog.
///
/// Only the fields the client reasons about are typed; everything else the
/// backend sends (name, icon, parameters, ...) is kept in `extra` and written
/// back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogFunction {
    #[serde(deserialize_with = "flexible_id::deserialize")]
    pub id: String,
    #[serde(default)]
    pub category: String,
    #[serde(rename = "isEnabled", default = "default_true")]
    pub is_enabled: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CatalogFunction {
    pub fn name(&self) -> Option<&str> {
        self.extra.get("name").and_then(Value::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.extra.get("description").and_then(Value::as_str)
    }

    /// System functions are provided by the backend and cannot be deleted.
    pub fn is_system(&self) -> bool {
        self.extra
            .get("isSystem")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Body for creating a catalog function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewFunction {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub icon: String,
    pub category: String,
    #[serde(default)]
    pub parameters: Vec<Value>,
    #[serde(default)]
    pub implementation: Option<String>,
}

impl NewFunction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            icon: "gear".to_string(),
            category: "custom".to_string(),
            parameters: Vec::new(),
            implementation: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update for a catalog function. Unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FunctionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<String>,
}

impl FunctionPatch {
    pub fn enabled(is_enabled: bool) -> Self {
        Self {
            is_enabled: Some(is_enabled),
            ..Self::default()
        }
    }
}

// --- Realtime ---

/// Outbound realtime frame: a chat turn plus the functions selected for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatFrame {
    pub message: String,
    pub functions: Vec<String>,
    pub session_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn session_accepts_naive_timestamps_and_integer_ids() {
        let session: Session = serde_json::from_value(json!({
            "id": 1,
            "title": "Test",
            "description": null,
            "created_at": "2024-03-05T10:20:30.123456",
            "updated_at": "2024-03-05T10:20:30",
            "is_active": true,
            "metadata": null,
            "message_count": 0
        }))
        .unwrap();

        assert_eq!(session.id, "1");
        assert_eq!(
            session.updated_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 10, 20, 30).unwrap())
        );
        assert!(session.created_at.unwrap() > session.updated_at.unwrap());
    }

    #[test]
    fn session_tolerates_minimal_payload() {
        let session: Session =
            serde_json::from_value(json!({"id": "abc", "title": "Only title"})).unwrap();
        assert_eq!(session.created_at, None);
        assert!(session.is_active);
        assert_eq!(session.message_count, 0);
    }

    #[test]
    fn rfc3339_timestamps_are_converted_to_utc() {
        let ts = lenient_timestamp::parse("2024-03-05T12:00:00+02:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap());
        assert!(lenient_timestamp::parse("yesterday").is_err());
    }

    #[test]
    fn message_type_reads_realtime_alias() {
        let record: MessageRecord = serde_json::from_value(json!({
            "id": "m1",
            "type": "ai",
            "content": "hello",
            "timestamp": null
        }))
        .unwrap();
        assert_eq!(record.message_type, MessageType::Assistant);
        assert_eq!(
            serde_json::to_value(MessageType::Assistant).unwrap(),
            json!("assistant")
        );
    }

    #[test]
    fn catalog_function_keeps_unknown_fields() {
        let raw = json!({
            "id": "f1",
            "name": "weather",
            "category": "web",
            "isEnabled": false,
            "isSystem": true,
            "parameters": [{"name": "city", "type": "string"}],
            "metadata": {"source": "mcp"}
        });
        let func: CatalogFunction = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(func.name(), Some("weather"));
        assert!(!func.is_enabled);
        assert!(func.is_system());
        assert_eq!(serde_json::to_value(&func).unwrap(), raw);
    }

    #[test]
    fn function_patch_only_writes_set_fields() {
        let body = serde_json::to_value(FunctionPatch::enabled(false)).unwrap();
        assert_eq!(body, json!({"is_enabled": false}));
    }

    #[test]
    fn chat_frame_sends_null_session() {
        let frame = ChatFrame {
            message: "hi".into(),
            functions: vec!["f1".into()],
            session_id: None,
        };
        assert_eq!(
            serde_json::to_value(frame).unwrap(),
            json!({"message": "hi", "functions": ["f1"], "session_id": null})
        );
    }
}
