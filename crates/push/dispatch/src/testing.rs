//! In-memory fakes shared by the dispatch tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use color_eyre::eyre::{Result, bail};
use push_core::{
    Installation, MulticastOutcome, Payload, PerTargetResult, ReconciliationTask, TokenCriteria,
    TopicOutcome, Variant,
};
use push_gateway::PushGateway;
use push_storage::{DeviceRegistry, InstallationStore};

use crate::{DispatchCallback, FollowUpSink, PublishError};

/// Ordered record of side effects across fakes.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Registry backed by a vector of installations.
#[derive(Default)]
pub struct MemoryRegistry {
    installations: Mutex<Vec<Installation>>,
    lookups: AtomicUsize,
    purges: Mutex<Vec<BTreeSet<String>>>,
    failing: AtomicBool,
}

impl MemoryRegistry {
    pub fn with_tokens(variant_id: &str, tokens: &[&str]) -> Self {
        let registry = Self::default();
        registry.insert_tokens(variant_id, tokens);
        registry
    }

    pub fn insert_tokens(&self, variant_id: &str, tokens: &[&str]) {
        let mut installations = self.installations.lock().unwrap();
        for token in tokens {
            let mut installation = Installation::new(*token);
            installation.id = format!("{variant_id}/{token}");
            installation.variant_id = variant_id.to_string();
            installations.push(installation);
        }
    }

    pub fn insert(&self, installation: Installation) {
        self.installations.lock().unwrap().push(installation);
    }

    /// Sorted tokens registered for a variant.
    pub fn tokens(&self, variant_id: &str) -> Vec<String> {
        let mut tokens: Vec<String> = self
            .installations
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.variant_id == variant_id)
            .map(|i| i.device_token.clone())
            .collect();
        tokens.sort();
        tokens
    }

    pub fn snapshot(&self) -> Vec<Installation> {
        let mut all = self.installations.lock().unwrap().clone();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn purge_calls(&self) -> usize {
        self.purges.lock().unwrap().len()
    }

    pub fn last_purge(&self) -> Option<BTreeSet<String>> {
        self.purges.lock().unwrap().last().cloned()
    }

    pub fn fail_lookups(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn matches(installation: &Installation, variant_id: &str, criteria: &TokenCriteria) -> bool {
        installation.variant_id == variant_id
            && installation.enabled
            && (criteria.aliases.is_empty()
                || installation
                    .alias
                    .as_ref()
                    .is_some_and(|a| criteria.aliases.contains(a)))
            && (criteria.device_types.is_empty()
                || installation
                    .device_type
                    .as_ref()
                    .is_some_and(|d| criteria.device_types.contains(d)))
            && (criteria.categories.is_empty()
                || criteria
                    .categories
                    .iter()
                    .any(|c| installation.categories.contains(c)))
    }
}

impl DeviceRegistry for MemoryRegistry {
    fn find_by_variant_and_token(
        &self,
        variant_id: &str,
        token: &str,
    ) -> Result<Option<Installation>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            bail!("registry unavailable");
        }

        Ok(self
            .installations
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.variant_id == variant_id && i.device_token == token)
            .cloned())
    }

    fn update_token(&self, installation: &Installation, new_token: &str) -> Result<()> {
        let mut installations = self.installations.lock().unwrap();
        if let Some(stored) = installations.iter_mut().find(|i| i.id == installation.id) {
            stored.device_token = new_token.to_string();
        }
        Ok(())
    }

    fn purge_by_variant_and_tokens(
        &self,
        variant_id: &str,
        tokens: &BTreeSet<String>,
    ) -> Result<usize> {
        self.purges.lock().unwrap().push(tokens.clone());

        let mut installations = self.installations.lock().unwrap();
        let before = installations.len();
        installations.retain(|i| !(i.variant_id == variant_id && tokens.contains(&i.device_token)));
        Ok(before - installations.len())
    }
}

impl InstallationStore for MemoryRegistry {
    fn add_installation(&self, variant: &Variant, installation: &Installation) -> Result<()> {
        self.add_installations(variant, std::slice::from_ref(installation))
            .map(|_| ())
    }

    fn add_installations(&self, variant: &Variant, installations: &[Installation]) -> Result<usize> {
        let mut added = 0;
        for installation in installations.iter().filter(|i| i.has_token()) {
            if self.tokens(&variant.id).contains(&installation.device_token) {
                continue;
            }
            let mut stored = installation.clone();
            stored.id = format!("{}/{}", variant.id, installation.device_token);
            stored.variant_id = variant.id.clone();
            self.insert(stored);
            added += 1;
        }
        Ok(added)
    }

    fn find_by_id(&self, id: &str) -> Result<Option<Installation>> {
        Ok(self
            .installations
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == id)
            .cloned())
    }

    fn remove_installation(&self, id: &str) -> Result<()> {
        self.installations.lock().unwrap().retain(|i| i.id != id);
        Ok(())
    }

    fn find_device_tokens(
        &self,
        variant_id: &str,
        criteria: &TokenCriteria,
        max_results: i64,
        after_token: Option<&str>,
    ) -> Result<Vec<String>> {
        let mut tokens: Vec<String> = self
            .installations
            .lock()
            .unwrap()
            .iter()
            .filter(|i| Self::matches(i, variant_id, criteria))
            .filter(|i| after_token.is_none_or(|after| i.device_token.as_str() > after))
            .map(|i| i.device_token.clone())
            .collect();
        tokens.sort();
        tokens.truncate(max_results.max(0) as usize);
        Ok(tokens)
    }

    fn count_device_tokens(&self, variant_id: &str, criteria: &TokenCriteria) -> Result<i64> {
        Ok(self
            .installations
            .lock()
            .unwrap()
            .iter()
            .filter(|i| Self::matches(i, variant_id, criteria))
            .count() as i64)
    }
}

/// A request seen by [`FakeGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Multicast(Vec<String>),
    Topic(String),
}

/// Gateway answering from a per-token table.
#[derive(Default)]
pub struct FakeGateway {
    journal: Journal,
    calls: Mutex<Vec<GatewayCall>>,
    payloads: Mutex<Vec<Payload>>,
    responses: BTreeMap<String, PerTargetResult>,
    topic_errors: BTreeMap<String, String>,
    truncate_results: bool,
    failing: bool,
    delay: Option<Duration>,
}

impl FakeGateway {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Default::default()
        }
    }

    pub fn respond(mut self, token: &str, result: PerTargetResult) -> Self {
        self.responses.insert(token.to_string(), result);
        self
    }

    pub fn topic_error(mut self, topic: &str, code: &str) -> Self {
        self.topic_errors.insert(topic.to_string(), code.to_string());
        self
    }

    /// Drop the last result of every multicast response.
    pub fn truncating(mut self) -> Self {
        self.truncate_results = true;
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn payloads(&self) -> Vec<Payload> {
        self.payloads.lock().unwrap().clone()
    }

    async fn enter(&self, call: GatewayCall, payload: &Payload) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        self.payloads.lock().unwrap().push(payload.clone());
        self.journal.record("gateway");

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            bail!("connection refused");
        }
        Ok(())
    }
}

impl PushGateway for FakeGateway {
    async fn send_multicast(
        &self,
        _variant: &Variant,
        payload: &Payload,
        targets: &[String],
    ) -> Result<MulticastOutcome> {
        self.enter(GatewayCall::Multicast(targets.to_vec()), payload)
            .await?;

        let mut results: Vec<PerTargetResult> = targets
            .iter()
            .map(|t| {
                self.responses
                    .get(t)
                    .cloned()
                    .unwrap_or_else(|| PerTargetResult::delivered("m"))
            })
            .collect();
        if self.truncate_results {
            results.pop();
        }

        Ok(MulticastOutcome {
            multicast_id: Some(1),
            results,
        })
    }

    async fn send_to_topic(
        &self,
        _variant: &Variant,
        payload: &Payload,
        topic: &str,
    ) -> Result<TopicOutcome> {
        self.enter(GatewayCall::Topic(topic.to_string()), payload)
            .await?;

        let error_code = self.topic_errors.get(topic).cloned();
        Ok(TopicOutcome {
            topic: topic.to_string(),
            message_id: error_code.is_none().then_some(1),
            error_code,
        })
    }
}

/// Callback writing its outcome to the journal.
pub struct RecordingCallback {
    journal: Journal,
}

impl RecordingCallback {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl DispatchCallback for RecordingCallback {
    fn on_success(&self) {
        self.journal.record("success");
    }

    fn on_error(&self, reason: &str) {
        self.journal.record(format!("error: {reason}"));
    }
}

/// Sink keeping published tasks in memory.
#[derive(Default)]
pub struct RecordingSink {
    journal: Journal,
    tasks: Mutex<Vec<ReconciliationTask>>,
    closed: bool,
}

impl RecordingSink {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Default::default()
        }
    }

    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    pub fn tasks(&self) -> Vec<ReconciliationTask> {
        self.tasks.lock().unwrap().clone()
    }
}

impl FollowUpSink for RecordingSink {
    async fn publish(&self, task: ReconciliationTask) -> Result<(), PublishError> {
        if self.closed {
            return Err(PublishError::Closed {
                variant_id: task.variant_id,
            });
        }

        self.journal.record("publish");
        self.tasks.lock().unwrap().push(task);
        Ok(())
    }
}

pub fn android_variant() -> Variant {
    Variant {
        id: "android-1".to_string(),
        kind: push_core::VariantKind::Android,
        server_key: "secret".to_string(),
    }
}

pub fn targets(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}
