//! Broadcast payloads delivered on the subscribe channel.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ChatError, ChatResult};
use crate::models::topic::Topic;

/// A decoded broadcast, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Message published to a channel.
    Channel {
        channel: String,
        user: String,
        message: String,
        timestamp: String,
    },
    /// Message addressed to the logged-in user.
    Direct {
        src: String,
        message: String,
        timestamp: String,
    },
}

#[derive(Debug, Deserialize)]
struct ChannelPayload {
    user: String,
    message: String,
    #[serde(default)]
    timestamp: Value,
}

#[derive(Debug, Deserialize)]
struct DirectPayload {
    src: String,
    message: String,
    #[serde(default)]
    timestamp: Value,
}

impl Delivery {
    /// Decode a payload for an already classified topic. Unrecognized topics yield `None`.
    pub fn decode(topic: &Topic, payload: &[u8]) -> ChatResult<Option<Self>> {
        match topic {
            Topic::Channel(channel) => {
                let p: ChannelPayload = serde_json::from_slice(payload)
                    .map_err(|e| ChatError::Decode(format!("channel payload: {}", e)))?;
                Ok(Some(Delivery::Channel {
                    channel: channel.clone(),
                    user: p.user,
                    message: p.message,
                    timestamp: format_timestamp(&p.timestamp),
                }))
            }
            Topic::Direct(_) => {
                let p: DirectPayload = serde_json::from_slice(payload)
                    .map_err(|e| ChatError::Decode(format!("direct payload: {}", e)))?;
                Ok(Some(Delivery::Direct {
                    src: p.src,
                    message: p.message,
                    timestamp: format_timestamp(&p.timestamp),
                }))
            }
            Topic::Unrecognized => Ok(None),
        }
    }

    pub fn sender(&self) -> &str {
        match self {
            Delivery::Channel { user, .. } => user,
            Delivery::Direct { src, .. } => src,
        }
    }

    /// One display line for the terminal.
    pub fn render(&self) -> String {
        let (timestamp, body) = match self {
            Delivery::Channel {
                channel,
                user,
                message,
                timestamp,
            } => (timestamp, format!("#{} <{}> {}", channel, user, message)),
            Delivery::Direct {
                src,
                message,
                timestamp,
            } => (timestamp, format!("direct from {}: {}", src, message)),
        };
        if timestamp.is_empty() {
            body
        } else {
            format!("[{}] {}", timestamp, body)
        }
    }
}

/// Render a broadcast timestamp. Accepts ISO strings and `[y, m, d, h, min, s, ...]`
/// arrays as produced by Jackson's default `LocalDateTime` encoding.
pub fn format_timestamp(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(parts) => {
            let nums: Vec<u64> = parts.iter().take(6).filter_map(Value::as_u64).collect();
            match nums.as_slice() {
                [y, mo, d, h, mi, s] => {
                    format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, mo, d, h, mi, s)
                }
                [y, mo, d, h, mi] => format!("{:04}-{:02}-{:02} {:02}:{:02}", y, mo, d, h, mi),
                _ => String::new(),
            }
        }
        _ => String::new(),
    }
}
