//! Batch dispatch.

use std::future::Future;
use std::time::Duration;

use push_core::{DispatchBatch, DispatchMode, Payload, PushMessage, ReconciliationTask, Variant};
use push_gateway::PushGateway;

use crate::{DispatchCallback, DispatchError, FollowUpSink};

/// Default bound on a single gateway call.
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends batches and hands device-mode results to the follow-up sink.
pub struct DispatchRouter<G, P> {
    gateway: G,
    follow_up: P,
    timeout: Duration,
}

impl<G, P> DispatchRouter<G, P>
where
    G: PushGateway,
    P: FollowUpSink,
{
    pub fn new(gateway: G, follow_up: P) -> Self {
        Self {
            gateway,
            follow_up,
            timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send one batch to the gateway, reporting through `callback`.
    ///
    /// A device-mode batch publishes its reconciliation task before
    /// `on_success` fires. Reconciliation itself never runs on this path.
    pub async fn dispatch<C>(
        &self,
        variant: &Variant,
        targets: &[String],
        push: &PushMessage,
        push_message_id: &str,
        callback: &C,
    ) where
        C: DispatchCallback + ?Sized,
    {
        match self
            .try_dispatch(variant, targets, push, push_message_id)
            .await
        {
            Ok(()) => callback.on_success(),
            Err(err) => {
                tracing::warn!(
                    variant_id = %variant.id,
                    push_message_id = %push_message_id,
                    error = %err,
                    "dispatch failed"
                );
                callback.on_error(&err.to_string());
            }
        }
    }

    async fn try_dispatch(
        &self,
        variant: &Variant,
        targets: &[String],
        push: &PushMessage,
        push_message_id: &str,
    ) -> Result<(), DispatchError> {
        if targets.is_empty() {
            tracing::debug!(variant_id = %variant.id, "empty batch, nothing to send");
            return Ok(());
        }

        let batch = DispatchBatch::new(variant.id.clone(), targets.to_vec())?;
        let payload = Payload::build(&push.message, &push.config, push_message_id);

        tracing::info!(
            variant_id = %variant.id,
            push_message_id = %push_message_id,
            mode = %batch.mode,
            targets = batch.targets.len(),
            "sending payload"
        );

        match batch.mode {
            DispatchMode::Topic => self.send_topics(variant, &payload, &batch.targets).await,
            DispatchMode::Device => self.send_devices(variant, &payload, batch.targets).await,
        }
    }

    async fn send_topics(
        &self,
        variant: &Variant,
        payload: &Payload,
        topics: &[String],
    ) -> Result<(), DispatchError> {
        for topic in topics {
            let outcome = self
                .bounded(self.gateway.send_to_topic(variant, payload, topic))
                .await?;

            match outcome.error_code {
                Some(code) => tracing::warn!(
                    variant_id = %variant.id,
                    topic = %topic,
                    error_code = %code,
                    "topic send rejected"
                ),
                None => tracing::debug!(
                    variant_id = %variant.id,
                    topic = %topic,
                    message_id = ?outcome.message_id,
                    "topic send accepted"
                ),
            }
        }

        Ok(())
    }

    async fn send_devices(
        &self,
        variant: &Variant,
        payload: &Payload,
        targets: Vec<String>,
    ) -> Result<(), DispatchError> {
        let outcome = self
            .bounded(self.gateway.send_multicast(variant, payload, &targets))
            .await?;

        tracing::info!(
            variant_id = %variant.id,
            success = outcome.success_count(),
            failure = outcome.failure_count(),
            canonical_ids = outcome.canonical_count(),
            "multicast sent"
        );

        let task = ReconciliationTask::new(variant.id.clone(), targets, outcome);
        if let Err(err) = self.follow_up.publish(task).await {
            // the send already happened, so the caller still sees success
            tracing::error!(error = %err, "lost reconciliation task");
        }

        Ok(())
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = color_eyre::eyre::Result<T>>,
    ) -> Result<T, DispatchError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(DispatchError::Gateway(err)),
            Err(_) => Err(DispatchError::Timeout(self.timeout)),
        }
    }
}
