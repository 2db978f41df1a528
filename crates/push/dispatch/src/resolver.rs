//! Selection of dispatch targets for a variant.

use color_eyre::eyre::{Result, WrapErr as _};
use push_core::{TokenCriteria, Variant, topic_for_category};
use push_storage::InstallationStore;

/// Largest audience still addressed through topics.
pub const MAX_TOPIC_SUBSCRIBERS: i64 = 500_000;

/// Turns installation criteria into homogeneous dispatch batches.
pub struct TargetResolver<S> {
    store: S,
    max_topic_subscribers: i64,
}

impl<S: InstallationStore> TargetResolver<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_topic_subscribers: MAX_TOPIC_SUBSCRIBERS,
        }
    }

    pub fn with_max_topic_subscribers(mut self, max: i64) -> Self {
        self.max_topic_subscribers = max;
        self
    }

    /// Split the matching audience into batches of at most `batch_size`.
    ///
    /// Category sends to topic-capable variants become a single topic batch
    /// while the audience is small enough; everything else is paged by token.
    pub fn batches(
        &self,
        variant: &Variant,
        criteria: &TokenCriteria,
        batch_size: i64,
    ) -> Result<Vec<Vec<String>>> {
        if variant.supports_topics() && !criteria.categories.is_empty() {
            let audience = self
                .store
                .count_device_tokens(&variant.id, criteria)
                .wrap_err("failed to count topic audience")?;

            if audience <= self.max_topic_subscribers {
                tracing::debug!(variant_id = %variant.id, audience, "addressing categories as topics");
                let topics = criteria
                    .categories
                    .iter()
                    .map(|c| topic_for_category(c))
                    .collect();
                return Ok(vec![topics]);
            }
        }

        let batch_size = batch_size.max(1);
        let mut batches = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let page = self
                .store
                .find_device_tokens(&variant.id, criteria, batch_size, after.as_deref())
                .wrap_err("failed to load device tokens")?;

            let Some(last) = page.last() else {
                break;
            };
            after = Some(last.clone());

            let full = page.len() as i64 == batch_size;
            batches.push(page);
            if !full {
                break;
            }
        }

        tracing::debug!(variant_id = %variant.id, batches = batches.len(), "resolved token batches");
        Ok(batches)
    }
}
