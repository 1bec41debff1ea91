// event.rs — Telemetry event data model.
//
// Wire shape (one JSON object):
//   { "id", "type", "name", "payload": {...}, "metadata": {...}, "timestamp" }
//
// `timestamp` serializes as an RFC 3339 (ISO-8601) string in UTC.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// What kind of thing happened.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ToolCall,
    LlmInvoke,
    DataAccess,
    ApiCall,
    FileWrite,
    Decision,
    /// A request was denied by policy (whatever the enforcement mode did next).
    PolicyViolation,
    /// An outbound call passed through the interceptor.
    Interception,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ToolCall => "tool_call",
            EventType::LlmInvoke => "llm_invoke",
            EventType::DataAccess => "data_access",
            EventType::ApiCall => "api_call",
            EventType::FileWrite => "file_write",
            EventType::Decision => "decision",
            EventType::PolicyViolation => "policy_violation",
            EventType::Interception => "interception",
        }
    }
}

/// A single telemetry event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryEvent {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub name: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl TelemetryEvent {
    /// Create an event with a fresh UUID and the current time.
    pub fn new(event_type: EventType, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            name: name.into(),
            payload: Map::new(),
            metadata: Map::new(),
            timestamp: Utc::now(),
        }
    }

    /// Set one payload field and return self (builder pattern).
    pub fn with_payload(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Set one metadata field and return self.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
