//! Request and response envelopes exchanged on the request/reply path.
//!
//! Requests are `{"service": ..., "data": {...}}` with the send timestamp carried
//! inside `data`. Replies are read tolerantly: accessors return an empty value when
//! a key is missing or holds an unexpected type.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{Error as _, SerializeStruct};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{ChatError, ChatResult};

/// Key under which the send timestamp travels inside `data`.
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Server-side operation selected by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Login,
    Users,
    Channel,
    Channels,
    Publish,
    Message,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Login => "login",
            Service::Users => "users",
            Service::Channel => "channel",
            Service::Channels => "channels",
            Service::Publish => "publish",
            Service::Message => "message",
        }
    }
}

/// A single value in a request's `data` mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Bool(bool),
    List(Vec<String>),
    Timestamp(DateTime<Utc>),
}

impl Serialize for DataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DataValue::Text(text) => serializer.serialize_str(text),
            DataValue::Integer(n) => serializer.serialize_i64(*n),
            DataValue::Number(n) if n.is_finite() => serializer.serialize_f64(*n),
            DataValue::Number(n) => Err(S::Error::custom(format!(
                "non-finite number {} has no JSON representation",
                n
            ))),
            DataValue::Bool(b) => serializer.serialize_bool(*b),
            DataValue::List(items) => items.serialize(serializer),
            DataValue::Timestamp(at) => {
                serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
        }
    }
}

impl From<&str> for DataValue {
    fn from(s: &str) -> Self {
        DataValue::Text(s.to_string())
    }
}

impl From<String> for DataValue {
    fn from(s: String) -> Self {
        DataValue::Text(s)
    }
}

impl From<i64> for DataValue {
    fn from(n: i64) -> Self {
        DataValue::Integer(n)
    }
}

impl From<f64> for DataValue {
    fn from(n: f64) -> Self {
        DataValue::Number(n)
    }
}

impl From<bool> for DataValue {
    fn from(b: bool) -> Self {
        DataValue::Bool(b)
    }
}

impl From<Vec<String>> for DataValue {
    fn from(items: Vec<String>) -> Self {
        DataValue::List(items)
    }
}

impl From<DateTime<Utc>> for DataValue {
    fn from(at: DateTime<Utc>) -> Self {
        DataValue::Timestamp(at)
    }
}

/// Outgoing request. The service is fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    service: Service,
    data: BTreeMap<String, DataValue>,
    timestamp: Option<DateTime<Utc>>,
}

impl RequestEnvelope {
    pub fn new(service: Service) -> Self {
        Self {
            service,
            data: BTreeMap::new(),
            timestamp: None,
        }
    }

    /// Add a `data` entry. Keys never set are absent on the wire.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<DataValue>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn service(&self) -> Service {
        self.service
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Record the send time. Only the first call has an effect.
    pub fn stamp(&mut self) {
        self.stamp_at(Utc::now());
    }

    pub fn stamp_at(&mut self, at: DateTime<Utc>) {
        if self.timestamp.is_none() {
            self.timestamp = Some(at);
        }
    }

    /// Serialize to JSON bytes. Keys are emitted in sorted order.
    pub fn encode(&self) -> ChatResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ChatError::Encode(e.to_string()))
    }
}

impl Serialize for RequestEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RequestEnvelope", 2)?;
        state.serialize_field("service", &self.service)?;
        state.serialize_field("data", &WireData(self))?;
        state.end()
    }
}

/// `data` as sent: the caller's entries plus the timestamp, if stamped.
struct WireData<'a>(&'a RequestEnvelope);

impl Serialize for WireData<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let stamp = self.0.timestamp.map(DataValue::Timestamp);
        let mut merged: BTreeMap<&str, &DataValue> = self
            .0
            .data
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        if let Some(stamp) = stamp.as_ref() {
            merged.insert(TIMESTAMP_KEY, stamp);
        }
        serializer.collect_map(merged)
    }
}

/// Incoming reply. Only `data` is meaningful; `service` is kept when the server echoes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub data: Map<String, Value>,
}

impl ResponseEnvelope {
    pub fn new(data: Map<String, Value>) -> Self {
        Self {
            service: None,
            data,
        }
    }

    pub fn with_service(mut self, service: Service) -> Self {
        self.service = Some(service.as_str().to_string());
        self
    }

    /// Parse reply bytes. A missing or non-object `data` reads as empty.
    pub fn decode(bytes: &[u8]) -> ChatResult<Self> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| ChatError::Decode(e.to_string()))?;
        let Value::Object(mut top) = value else {
            return Err(ChatError::Decode(
                "reply is not a JSON object".to_string(),
            ));
        };
        let service = match top.remove("service") {
            Some(Value::String(service)) => Some(service),
            _ => None,
        };
        let data = match top.remove("data") {
            Some(Value::Object(data)) => data,
            _ => Map::new(),
        };
        Ok(Self { service, data })
    }

    pub fn encode(&self) -> ChatResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ChatError::Encode(e.to_string()))
    }

    fn text(&self, key: &str) -> String {
        self.data
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    pub fn status(&self) -> String {
        self.text("status")
    }

    pub fn description(&self) -> String {
        self.text("description")
    }

    pub fn message(&self) -> String {
        self.text("message")
    }

    /// String entries of `users`; anything else in the array is dropped.
    pub fn users(&self) -> Vec<String> {
        match self.data.get("users") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Server explanation for a failed request. Login and channel creation report
    /// it in `description`, publish and direct message in `message`.
    pub fn failure_text(&self) -> String {
        let description = self.description();
        if description.is_empty() {
            self.message()
        } else {
            description
        }
    }
}
