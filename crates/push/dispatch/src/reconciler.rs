//! Reconciliation of multicast results against the device registry.

use std::collections::BTreeSet;

use push_core::{ActionableErrorCodes, ReconciliationTask, RegistryMutation};
use push_storage::DeviceRegistry;

use crate::ReconcileError;

/// Mutations applied by one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Renames in discovery order, then one purge entry per distinct token.
    pub mutations: Vec<RegistryMutation>,
    /// Devices the registry actually removed.
    pub removed: usize,
}

impl ReconcileReport {
    /// Tokens submitted for purge.
    pub fn purged_tokens(&self) -> BTreeSet<&str> {
        self.mutations
            .iter()
            .filter_map(|m| match m {
                RegistryMutation::Purge { token, .. } => Some(token.as_str()),
                RegistryMutation::ReplaceToken { .. } => None,
            })
            .collect()
    }

    /// `(old, new)` token pairs that were renamed.
    pub fn renamed_tokens(&self) -> Vec<(&str, &str)> {
        self.mutations
            .iter()
            .filter_map(|m| match m {
                RegistryMutation::ReplaceToken {
                    old_token,
                    new_token,
                    ..
                } => Some((old_token.as_str(), new_token.as_str())),
                RegistryMutation::Purge { .. } => None,
            })
            .collect()
    }
}

/// Turns gateway results into registry mutations.
pub struct ResultReconciler<R> {
    registry: R,
    actionable: ActionableErrorCodes,
}

impl<R> ResultReconciler<R> {
    /// Create a reconciler with the default actionable error codes.
    pub fn new(registry: R) -> Self {
        Self {
            registry,
            actionable: ActionableErrorCodes::default(),
        }
    }

    /// Replace the set of error codes that purge a device.
    pub fn with_actionable_codes(mut self, actionable: ActionableErrorCodes) -> Self {
        self.actionable = actionable;
        self
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }
}

impl<R: DeviceRegistry> ResultReconciler<R> {
    /// Walk the results of one multicast send and update the registry.
    ///
    /// A replacement id wins over an error code on the same result. Renames
    /// are written as they are found; purges are collected and issued as one
    /// call at the end. Running the same task twice leaves the registry as a
    /// single run does.
    pub fn reconcile(&self, task: &ReconciliationTask) -> Result<ReconcileReport, ReconcileError> {
        if !task.is_correlated() {
            return Err(ReconcileError::Correlation {
                variant_id: task.variant_id.clone(),
                targets: task.original_targets.len(),
                results: task.outcome.len(),
            });
        }

        let variant_id = task.variant_id.as_str();
        let mut report = ReconcileReport::default();
        let mut inactive_tokens = BTreeSet::new();

        for (token, result) in task.pairs() {
            if let Some(code) = &result.error_code {
                tracing::info!(
                    variant_id = %variant_id,
                    token = %token,
                    error_code = %code,
                    "processing error code from gateway response"
                );
            }

            if let Some(canonical) = &result.canonical_replacement_id {
                // token is already canonical; neither rename nor purge
                if canonical == token {
                    continue;
                }

                if self
                    .registry
                    .find_by_variant_and_token(variant_id, canonical)?
                    .is_some()
                {
                    // the device already registered its new token, drop the stale one
                    inactive_tokens.insert(token.to_string());
                    continue;
                }

                match self.registry.find_by_variant_and_token(variant_id, token)? {
                    Some(device) => {
                        tracing::info!(
                            variant_id = %variant_id,
                            old_token = %token,
                            new_token = %canonical,
                            "replacing device token with canonical id"
                        );
                        self.registry.update_token(&device, canonical)?;
                        report.mutations.push(RegistryMutation::ReplaceToken {
                            variant_id: variant_id.to_string(),
                            old_token: token.to_string(),
                            new_token: canonical.clone(),
                        });
                    }
                    None => {
                        tracing::debug!(
                            variant_id = %variant_id,
                            token = %token,
                            "no device for superseded token"
                        );
                    }
                }
            } else if result
                .error_code
                .as_deref()
                .is_some_and(|code| self.actionable.contains(code))
            {
                inactive_tokens.insert(token.to_string());
            }
        }

        if !inactive_tokens.is_empty() {
            tracing::info!(
                variant_id = %variant_id,
                count = inactive_tokens.len(),
                "deleting invalid or duplicated installations"
            );

            report.removed = self
                .registry
                .purge_by_variant_and_tokens(variant_id, &inactive_tokens)?;

            report
                .mutations
                .extend(inactive_tokens.into_iter().map(|token| RegistryMutation::Purge {
                    variant_id: variant_id.to_string(),
                    token,
                }));
        }

        Ok(report)
    }
}
