//! FCM legacy HTTP gateway.

use std::collections::BTreeMap;

use color_eyre::eyre::WrapErr as _;
use push_core::{MulticastOutcome, Payload, PerTargetResult, TopicOutcome, Variant};

use crate::PushGateway;

/// Default FCM send endpoint.
pub const DEFAULT_FCM_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";

/// FCM gateway using server-key authentication.
#[derive(Debug, Clone)]
pub struct FcmGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl FcmGateway {
    /// Create a gateway for the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> color_eyre::eyre::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .wrap_err("failed to create FCM HTTP client")?;

        Ok(Self::with_client(client, endpoint))
    }

    /// Create a gateway around an existing HTTP client.
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    async fn post<T>(&self, server_key: &str, body: &FcmRequest<'_>) -> color_eyre::eyre::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, format!("key={server_key}"))
            .json(body)
            .send()
            .await
            .wrap_err("FCM request failed")?
            .error_for_status()
            .wrap_err("FCM rejected the request")?;

        response.json::<T>().await.wrap_err("malformed FCM response")
    }
}

impl PushGateway for FcmGateway {
    async fn send_multicast(
        &self,
        variant: &Variant,
        payload: &Payload,
        targets: &[String],
    ) -> color_eyre::eyre::Result<MulticastOutcome> {
        tracing::debug!(variant_id = %variant.id, targets = targets.len(), "sending FCM multicast");

        let body = FcmRequest::multicast(payload, targets);
        let response: FcmMulticastResponse = self.post(&variant.server_key, &body).await?;

        tracing::trace!(?response, "FCM multicast response");

        response.into_outcome(targets.len())
    }

    async fn send_to_topic(
        &self,
        variant: &Variant,
        payload: &Payload,
        topic: &str,
    ) -> color_eyre::eyre::Result<TopicOutcome> {
        tracing::debug!(variant_id = %variant.id, topic = %topic, "sending FCM topic message");

        let body = FcmRequest::topic(payload, topic);
        let response: FcmTopicResponse = self.post(&variant.server_key, &body).await?;

        tracing::trace!(?response, "FCM topic response");

        Ok(TopicOutcome {
            topic: topic.to_string(),
            message_id: response.message_id,
            error_code: response.error,
        })
    }
}

/// Request body. Exactly one of `registration_ids` and `to` is set.
#[derive(Debug, serde::Serialize)]
struct FcmRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    registration_ids: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<&'a str>,
    priority: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_to_live: Option<i32>,
    data: &'a BTreeMap<String, String>,
}

impl<'a> FcmRequest<'a> {
    fn multicast(payload: &'a Payload, targets: &'a [String]) -> Self {
        Self {
            registration_ids: Some(targets),
            to: None,
            priority: payload.priority().as_str(),
            time_to_live: payload.time_to_live(),
            data: payload.data(),
        }
    }

    fn topic(payload: &'a Payload, topic: &'a str) -> Self {
        Self {
            registration_ids: None,
            to: Some(topic),
            priority: payload.priority().as_str(),
            time_to_live: payload.time_to_live(),
            data: payload.data(),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct FcmMulticastResponse {
    #[serde(default)]
    multicast_id: Option<i64>,
    #[serde(default)]
    results: Vec<FcmResult>,
}

#[derive(Debug, serde::Deserialize)]
struct FcmResult {
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    registration_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct FcmTopicResponse {
    #[serde(default)]
    message_id: Option<i64>,
    #[serde(default)]
    error: Option<String>,
}

impl FcmMulticastResponse {
    fn into_outcome(self, target_count: usize) -> color_eyre::eyre::Result<MulticastOutcome> {
        if self.results.len() != target_count {
            color_eyre::eyre::bail!(
                "FCM returned {} results for {} targets",
                self.results.len(),
                target_count
            );
        }

        let results = self
            .results
            .into_iter()
            .map(|r| PerTargetResult {
                message_id: r.message_id,
                error_code: r.error,
                canonical_replacement_id: r.registration_id,
            })
            .collect();

        Ok(MulticastOutcome {
            multicast_id: self.multicast_id,
            results,
        })
    }
}
