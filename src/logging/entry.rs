//! Log Entry Module

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::logging::LogLevel;

/// Structured key/value context attached to entries.
pub type LogContext = Map<String, Value>;

/// Turns a JSON object into a context; other values give `None`.
///
/// ```
/// use playground_core::logging::log_context;
/// use serde_json::json;
///
/// let ctx = log_context(json!({"route": "/tools"})).unwrap();
/// assert_eq!(ctx["route"], "/tools");
/// ```
pub fn log_context(value: Value) -> Option<LogContext> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

// == Log Entry ==
/// One emitted log record. Outputs only ever see it by shared reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<LogContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl LogEntry {
    /// Creates a bare entry stamped now.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            context: None,
            source: None,
            user_id: None,
            session_id: None,
            request_id: None,
            stack_trace: None,
            tags: Vec::new(),
        }
    }

    /// Looks up a context value.
    pub fn context_value(&self, key: &str) -> Option<&Value> {
        self.context.as_ref()?.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_serialization_skips_absent_fields() {
        let entry = LogEntry::new(LogLevel::Info, "hello");
        let json = serde_json::to_value(&entry).unwrap();
        let object = json.as_object().unwrap();

        assert_eq!(object["level"], "INFO");
        assert_eq!(object["message"], "hello");
        assert!(object.contains_key("timestamp"));
        assert!(!object.contains_key("context"));
        assert!(!object.contains_key("tags"));
    }

    #[test]
    fn test_entry_camel_case_fields() {
        let mut entry = LogEntry::new(LogLevel::Warn, "slow");
        entry.user_id = Some("u1".to_string());
        entry.request_id = Some("r1".to_string());
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["userId"], "u1");
        assert_eq!(json["requestId"], "r1");
    }

    #[test]
    fn test_entry_json_roundtrip() {
        let mut entry = LogEntry::new(LogLevel::Error, "boom");
        entry.context = log_context(json!({"a": 1}));
        entry.tags = vec!["api".to_string()];

        let line = serde_json::to_string(&entry).unwrap();
        let parsed: LogEntry = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, entry);
        assert_eq!(parsed.context_value("a"), Some(&json!(1)));
    }

    #[test]
    fn test_log_context_rejects_non_objects() {
        assert!(log_context(json!([1, 2])).is_none());
        assert!(log_context(json!({})).unwrap().is_empty());
    }
}
