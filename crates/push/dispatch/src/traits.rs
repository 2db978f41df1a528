//! Dispatch traits.

use push_core::ReconciliationTask;

use crate::PublishError;

/// Receives the result of a dispatch call.
pub trait DispatchCallback: Send + Sync {
    /// The batch was handed to the gateway.
    fn on_success(&self);

    /// The batch could not be sent.
    fn on_error(&self, reason: &str);
}

/// Hand-off point for follow-up reconciliation work.
///
/// Publishing waits for queue capacity at most, never for reconciliation.
#[trait_variant::make(Send)]
pub trait FollowUpSink: Send + Sync {
    /// Queue a task for exactly one consumer.
    async fn publish(&self, task: ReconciliationTask) -> Result<(), PublishError>;
}
