//! Variants and device installations.

use std::collections::BTreeSet;

/// Push network a variant targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
    Android,
    Ios,
}

impl VariantKind {
    /// Platform name recorded on installations.
    pub fn platform(&self) -> &'static str {
        match self {
            VariantKind::Android => "android",
            VariantKind::Ios => "ios",
        }
    }
}

/// One application flavor registered with a push network.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Variant {
    pub id: String,
    pub kind: VariantKind,
    /// Gateway credential for this variant.
    pub server_key: String,
}

impl Variant {
    /// Only Android variants can fan out through topics.
    pub fn supports_topics(&self) -> bool {
        self.kind == VariantKind::Android
    }
}

/// A device registered for a variant.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installation {
    /// Storage id; empty until stored.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub variant_id: String,
    #[serde(default)]
    pub device_token: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub operating_system: Option<String>,
    #[serde(default)]
    pub os_version: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub categories: BTreeSet<String>,
}

impl Installation {
    /// A new, enabled installation for a token.
    pub fn new(device_token: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            variant_id: String::new(),
            device_token: device_token.into(),
            alias: None,
            device_type: None,
            operating_system: None,
            os_version: None,
            platform: None,
            enabled: true,
            categories: BTreeSet::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = Some(device_type.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.insert(category.into());
        self
    }

    pub fn has_token(&self) -> bool {
        !self.device_token.is_empty()
    }
}

fn default_enabled() -> bool {
    true
}

/// Filters for selecting device tokens of a variant.
///
/// Empty lists do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenCriteria {
    pub categories: Vec<String>,
    pub aliases: Vec<String>,
    pub device_types: Vec<String>,
}

impl TokenCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_types.push(device_type.into());
        self
    }
}
