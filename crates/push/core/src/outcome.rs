//! Gateway outcome types.

use std::collections::BTreeSet;

/// Bad registration id.
pub const ERROR_INVALID_REGISTRATION: &str = "InvalidRegistration";
/// The app was uninstalled or notifications were turned off.
pub const ERROR_NOT_REGISTERED: &str = "NotRegistered";
/// Token belongs to a different sender.
pub const ERROR_MISMATCH_SENDER_ID: &str = "MismatchSenderId";

/// Result for one target of a multicast send.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerTargetResult {
    /// Provider message id when the message was accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Provider error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Replacement id for a superseded device token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_replacement_id: Option<String>,
}

impl PerTargetResult {
    /// Delivered, nothing to reconcile.
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self {
            message_id: Some(message_id.into()),
            ..Default::default()
        }
    }

    /// Rejected with an error code.
    pub fn failed(error_code: impl Into<String>) -> Self {
        Self {
            error_code: Some(error_code.into()),
            ..Default::default()
        }
    }

    /// Delivered, but the token has been superseded.
    pub fn replaced(message_id: impl Into<String>, canonical: impl Into<String>) -> Self {
        Self {
            message_id: Some(message_id.into()),
            canonical_replacement_id: Some(canonical.into()),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error_code.is_none()
    }
}

/// Gateway response to a device-mode send, index-aligned with the targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MulticastOutcome {
    #[serde(default)]
    pub multicast_id: Option<i64>,
    pub results: Vec<PerTargetResult>,
}

impl MulticastOutcome {
    pub fn new(results: Vec<PerTargetResult>) -> Self {
        Self {
            multicast_id: None,
            results,
        }
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }

    pub fn canonical_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.canonical_replacement_id.is_some())
            .count()
    }
}

/// Gateway response to a single topic send.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TopicOutcome {
    pub topic: String,
    pub message_id: Option<i64>,
    pub error_code: Option<String>,
}

/// Error codes that mark a device token for removal.
///
/// Codes outside the set (transient or unknown) never touch the registry.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ActionableErrorCodes(BTreeSet<String>);

impl ActionableErrorCodes {
    /// Build an allow-list from explicit codes.
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(codes.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for ActionableErrorCodes {
    fn default() -> Self {
        Self::from_codes([
            ERROR_INVALID_REGISTRATION,
            ERROR_NOT_REGISTERED,
            ERROR_MISMATCH_SENDER_ID,
        ])
    }
}
