//! Follow-up work handed from the sender to the reconciler.

use crate::{MulticastOutcome, PerTargetResult};

/// Everything needed to reconcile one device-mode send.
///
/// Self-contained and serializable so it can be queued, retried or shipped to
/// another process.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationTask {
    pub variant_id: String,
    pub original_targets: Vec<String>,
    pub outcome: Vec<PerTargetResult>,
}

impl ReconciliationTask {
    /// Create a task from the submitted targets and the gateway response.
    pub fn new(
        variant_id: impl Into<String>,
        original_targets: Vec<String>,
        outcome: MulticastOutcome,
    ) -> Self {
        Self {
            variant_id: variant_id.into(),
            original_targets,
            outcome: outcome.results,
        }
    }

    /// Whether results and targets line up one to one.
    pub fn is_correlated(&self) -> bool {
        self.outcome.len() == self.original_targets.len()
    }

    /// Pair each submitted target with its result.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &PerTargetResult)> {
        self.original_targets
            .iter()
            .map(String::as_str)
            .zip(self.outcome.iter())
    }
}

/// A registry change derived from a gateway result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RegistryMutation {
    /// Remove the device holding `token`.
    Purge { variant_id: String, token: String },
    /// Rename the device holding `old_token`.
    ReplaceToken {
        variant_id: String,
        old_token: String,
        new_token: String,
    },
}
