//! Dispatch batch classification.

/// Prefix marking a target as a topic rather than a device token.
pub const TOPIC_PREFIX: &str = "/topics/";

/// Whether a target names a topic.
pub fn is_topic(target: &str) -> bool {
    target.starts_with(TOPIC_PREFIX)
}

/// Format a topic target for a category name.
pub fn topic_for_category(category: &str) -> String {
    format!("{TOPIC_PREFIX}{category}")
}

/// How a batch is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// One multicast request addressed to device tokens.
    Device,
    /// One request per topic.
    Topic,
}

impl DispatchMode {
    fn of(target: &str) -> Self {
        if is_topic(target) {
            DispatchMode::Topic
        } else {
            DispatchMode::Device
        }
    }
}

impl std::fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchMode::Device => f.write_str("device"),
            DispatchMode::Topic => f.write_str("topic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("batch has no targets")]
    Empty,
    #[error("batch mixes targets: expected {expected} targets, found {found} target at index {index}")]
    MixedTargets {
        expected: DispatchMode,
        found: DispatchMode,
        index: usize,
    },
}

/// A homogeneous set of targets for one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchBatch {
    pub variant_id: String,
    pub targets: Vec<String>,
    pub mode: DispatchMode,
}

impl DispatchBatch {
    /// Classify a target list.
    ///
    /// The first target decides the mode; every other target must agree.
    pub fn new(variant_id: impl Into<String>, targets: Vec<String>) -> Result<Self, BatchError> {
        let first = targets.first().ok_or(BatchError::Empty)?;
        let mode = DispatchMode::of(first);

        if let Some((index, target)) = targets
            .iter()
            .enumerate()
            .find(|(_, t)| DispatchMode::of(t) != mode)
        {
            return Err(BatchError::MixedTargets {
                expected: mode,
                found: DispatchMode::of(target),
                index,
            });
        }

        Ok(Self {
            variant_id: variant_id.into(),
            targets,
            mode,
        })
    }
}
