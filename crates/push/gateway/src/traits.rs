//! Push gateway traits.

use push_core::{MulticastOutcome, Payload, TopicOutcome, Variant};

/// Provider gateway.
///
/// Implementations make exactly one attempt per call; retry policy belongs to
/// the caller.
#[trait_variant::make(Send)]
pub trait PushGateway: Send + Sync {
    /// Send a payload to device tokens.
    ///
    /// The outcome's results are index-aligned with `targets`.
    async fn send_multicast(
        &self,
        variant: &Variant,
        payload: &Payload,
        targets: &[String],
    ) -> color_eyre::eyre::Result<MulticastOutcome>;

    /// Send a payload to one topic.
    async fn send_to_topic(
        &self,
        variant: &Variant,
        payload: &Payload,
        topic: &str,
    ) -> color_eyre::eyre::Result<TopicOutcome>;
}
