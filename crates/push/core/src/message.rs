//! Application-level push message types.

use std::collections::BTreeMap;

/// Sentinel time-to-live meaning "let the provider decide".
pub const UNSET_TIME_TO_LIVE: i32 = -1;

/// Delivery priority requested by the sender.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

/// Notification content as submitted by the application.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Text shown to the user.
    #[serde(default)]
    pub alert: Option<String>,
    /// Sound file to play.
    #[serde(default)]
    pub sound: Option<String>,
    /// Badge count.
    #[serde(default)]
    pub badge: Option<i32>,
    #[serde(default)]
    pub priority: Priority,
    /// Free-form key/value pairs copied into the payload.
    #[serde(default)]
    pub user_data: BTreeMap<String, serde_json::Value>,
}

impl Message {
    /// Create an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the alert text.
    pub fn with_alert(mut self, alert: impl Into<String>) -> Self {
        self.alert = Some(alert.into());
        self
    }

    /// Set the sound.
    pub fn with_sound(mut self, sound: impl Into<String>) -> Self {
        self.sound = Some(sound.into());
        self
    }

    /// Set the badge count.
    pub fn with_badge(mut self, badge: i32) -> Self {
        self.badge = Some(badge);
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Add a user data entry.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.user_data.insert(key.into(), value.into());
        self
    }
}

/// Per-send delivery options.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOptions {
    /// Seconds the provider should keep the message; [`UNSET_TIME_TO_LIVE`] omits it.
    #[serde(default = "default_time_to_live")]
    pub time_to_live: i32,
}

impl DeliveryOptions {
    /// Options with an explicit time-to-live.
    pub fn with_time_to_live(time_to_live: i32) -> Self {
        Self { time_to_live }
    }

    /// Whether a time-to-live was supplied.
    pub fn has_time_to_live(&self) -> bool {
        self.time_to_live != UNSET_TIME_TO_LIVE
    }
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            time_to_live: UNSET_TIME_TO_LIVE,
        }
    }
}

fn default_time_to_live() -> i32 {
    UNSET_TIME_TO_LIVE
}

/// A message together with its delivery options.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PushMessage {
    pub message: Message,
    #[serde(default)]
    pub config: DeliveryOptions,
}

impl PushMessage {
    /// Create a push message with default delivery options.
    pub fn new(message: Message) -> Self {
        Self {
            message,
            config: DeliveryOptions::default(),
        }
    }

    /// Replace the delivery options.
    pub fn with_config(mut self, config: DeliveryOptions) -> Self {
        self.config = config;
        self
    }
}
