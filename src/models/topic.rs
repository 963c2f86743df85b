//! Broadcast topics and their naming conventions.

/// Prefix of channel broadcast topics (`canal_<channel>`).
pub const CHANNEL_PREFIX: &str = "canal_";
/// Prefix of direct message topics (`user_<username>`).
pub const USER_PREFIX: &str = "user_";

/// Classification of a broadcast topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    /// Channel broadcast, carrying the channel name.
    Channel(String),
    /// Direct message, carrying the destination username.
    Direct(String),
    /// Anything else; callers drop these.
    Unrecognized,
}

impl Topic {
    /// Derive the topic kind from its name. Prefixes are matched exactly and case-sensitively.
    pub fn classify(topic: &str) -> Self {
        if let Some(channel) = topic.strip_prefix(CHANNEL_PREFIX) {
            Topic::Channel(channel.to_string())
        } else if let Some(user) = topic.strip_prefix(USER_PREFIX) {
            Topic::Direct(user.to_string())
        } else {
            Topic::Unrecognized
        }
    }

    /// Topic name for broadcasts on `channel`.
    pub fn channel(channel: &str) -> String {
        format!("{}{}", CHANNEL_PREFIX, channel)
    }

    /// Topic name for direct messages addressed to `user`.
    pub fn user(user: &str) -> String {
        format!("{}{}", USER_PREFIX, user)
    }
}
