//! Storage traits.

use std::collections::BTreeSet;

use push_core::{Installation, TokenCriteria, Variant};

/// Device lookups and mutations driven by gateway results.
///
/// Every call commits on its own; callers get no transaction spanning calls.
pub trait DeviceRegistry: Send + Sync {
    /// Find the device holding `token` for a variant.
    fn find_by_variant_and_token(
        &self,
        variant_id: &str,
        token: &str,
    ) -> color_eyre::eyre::Result<Option<Installation>>;

    /// Change the token of an existing device.
    fn update_token(
        &self,
        installation: &Installation,
        new_token: &str,
    ) -> color_eyre::eyre::Result<()>;

    /// Remove every device of the variant holding one of `tokens`.
    ///
    /// Returns the number of removed devices; absent tokens are ignored.
    fn purge_by_variant_and_tokens(
        &self,
        variant_id: &str,
        tokens: &BTreeSet<String>,
    ) -> color_eyre::eyre::Result<usize>;
}

/// Installation registration and token queries.
pub trait InstallationStore: Send + Sync {
    /// Register a device, or refresh the metadata of an enabled one.
    fn add_installation(
        &self,
        variant: &Variant,
        installation: &Installation,
    ) -> color_eyre::eyre::Result<()>;

    /// Import devices, skipping known and empty tokens. Returns the stored count.
    fn add_installations(
        &self,
        variant: &Variant,
        installations: &[Installation],
    ) -> color_eyre::eyre::Result<usize>;

    /// Get an installation by storage id.
    fn find_by_id(&self, id: &str) -> color_eyre::eyre::Result<Option<Installation>>;

    /// Delete an installation by storage id.
    fn remove_installation(&self, id: &str) -> color_eyre::eyre::Result<()>;

    /// Tokens of enabled devices matching `criteria`, ordered, after `after_token`.
    fn find_device_tokens(
        &self,
        variant_id: &str,
        criteria: &TokenCriteria,
        max_results: i64,
        after_token: Option<&str>,
    ) -> color_eyre::eyre::Result<Vec<String>>;

    /// Number of enabled devices matching `criteria`.
    fn count_device_tokens(
        &self,
        variant_id: &str,
        criteria: &TokenCriteria,
    ) -> color_eyre::eyre::Result<i64>;
}

/// Combined storage trait.
pub trait AllStorage: DeviceRegistry + InstallationStore {}

impl<T> AllStorage for T where T: DeviceRegistry + InstallationStore {}

impl<T: DeviceRegistry + ?Sized> DeviceRegistry for std::sync::Arc<T> {
    fn find_by_variant_and_token(
        &self,
        variant_id: &str,
        token: &str,
    ) -> color_eyre::eyre::Result<Option<Installation>> {
        (**self).find_by_variant_and_token(variant_id, token)
    }

    fn update_token(
        &self,
        installation: &Installation,
        new_token: &str,
    ) -> color_eyre::eyre::Result<()> {
        (**self).update_token(installation, new_token)
    }

    fn purge_by_variant_and_tokens(
        &self,
        variant_id: &str,
        tokens: &BTreeSet<String>,
    ) -> color_eyre::eyre::Result<usize> {
        (**self).purge_by_variant_and_tokens(variant_id, tokens)
    }
}

impl<T: InstallationStore + ?Sized> InstallationStore for std::sync::Arc<T> {
    fn add_installation(
        &self,
        variant: &Variant,
        installation: &Installation,
    ) -> color_eyre::eyre::Result<()> {
        (**self).add_installation(variant, installation)
    }

    fn add_installations(
        &self,
        variant: &Variant,
        installations: &[Installation],
    ) -> color_eyre::eyre::Result<usize> {
        (**self).add_installations(variant, installations)
    }

    fn find_by_id(&self, id: &str) -> color_eyre::eyre::Result<Option<Installation>> {
        (**self).find_by_id(id)
    }

    fn remove_installation(&self, id: &str) -> color_eyre::eyre::Result<()> {
        (**self).remove_installation(id)
    }

    fn find_device_tokens(
        &self,
        variant_id: &str,
        criteria: &TokenCriteria,
        max_results: i64,
        after_token: Option<&str>,
    ) -> color_eyre::eyre::Result<Vec<String>> {
        (**self).find_device_tokens(variant_id, criteria, max_results, after_token)
    }

    fn count_device_tokens(
        &self,
        variant_id: &str,
        criteria: &TokenCriteria,
    ) -> color_eyre::eyre::Result<i64> {
        (**self).count_device_tokens(variant_id, criteria)
    }
}
