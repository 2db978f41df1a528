//! Provider payload construction.

use std::collections::BTreeMap;

use crate::{DeliveryOptions, Message, Priority};

/// Payload key carrying the alert text.
pub const ALERT_KEY: &str = "alert";
/// Payload key carrying the sound.
pub const SOUND_KEY: &str = "sound";
/// Payload key carrying the badge count.
pub const BADGE_KEY: &str = "badge";
/// Payload key correlating the device-side message with the originating send.
pub const PUSH_MESSAGE_ID_KEY: &str = "push-message-id";

/// Priority in the provider's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayPriority {
    Normal,
    High,
}

impl GatewayPriority {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayPriority::Normal => "normal",
            GatewayPriority::High => "high",
        }
    }
}

impl From<Priority> for GatewayPriority {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::High => GatewayPriority::High,
            Priority::Normal => GatewayPriority::Normal,
        }
    }
}

/// Provider payload, built once per dispatch.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Payload {
    data: BTreeMap<String, String>,
    priority: GatewayPriority,
    time_to_live: Option<i32>,
    correlation_id: String,
}

impl Payload {
    /// Build the provider payload for a message.
    ///
    /// Recognized fields land under fixed keys, user data is copied through
    /// and the correlation id is written last so user data cannot shadow it.
    /// A time-to-live equal to the unset sentinel is omitted; any other value
    /// is passed through untouched.
    pub fn build(message: &Message, options: &DeliveryOptions, correlation_id: &str) -> Self {
        let mut data = BTreeMap::new();

        if let Some(alert) = &message.alert {
            data.insert(ALERT_KEY.to_string(), alert.clone());
        }
        if let Some(sound) = &message.sound {
            data.insert(SOUND_KEY.to_string(), sound.clone());
        }
        if let Some(badge) = message.badge {
            data.insert(BADGE_KEY.to_string(), badge.to_string());
        }

        for (key, value) in &message.user_data {
            data.insert(key.clone(), render_value(value));
        }

        data.insert(PUSH_MESSAGE_ID_KEY.to_string(), correlation_id.to_string());

        Self {
            data,
            priority: message.priority.into(),
            time_to_live: options
                .has_time_to_live()
                .then_some(options.time_to_live),
            correlation_id: correlation_id.to_string(),
        }
    }

    /// All data entries sent to the device.
    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.data
    }

    pub fn priority(&self) -> GatewayPriority {
        self.priority
    }

    pub fn time_to_live(&self) -> Option<i32> {
        self.time_to_live
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn alert(&self) -> Option<&str> {
        self.data.get(ALERT_KEY).map(String::as_str)
    }
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
