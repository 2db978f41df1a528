//! Dispatch and reconciliation errors.

use std::time::Duration;

use push_core::BatchError;

/// Why a dispatch call failed.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("Error sending payload to FCM server: {0:#}")]
    Gateway(color_eyre::eyre::Report),

    #[error("Error sending payload to FCM server: no response within {0:?}")]
    Timeout(Duration),
}

/// Why a reconciliation pass stopped.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("task for variant {variant_id} has {results} results for {targets} targets")]
    Correlation {
        variant_id: String,
        targets: usize,
        results: usize,
    },

    #[error("registry call failed: {0:#}")]
    Registry(color_eyre::eyre::Report),
}

impl From<color_eyre::eyre::Report> for ReconcileError {
    fn from(err: color_eyre::eyre::Report) -> Self {
        Self::Registry(err)
    }
}

/// Why a task could not be queued.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("follow-up queue closed, dropping task for variant {variant_id}")]
    Closed { variant_id: String },
}
