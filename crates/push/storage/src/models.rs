//! Database models.

use std::collections::BTreeSet;

use diesel::prelude::*;

use crate::schema::{installation_categories, installations};

/// Installation record.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = installations)]
pub struct InstallationRow {
    pub id: String,
    pub variant_id: String,
    pub device_token: String,
    pub alias: Option<String>,
    pub device_type: Option<String>,
    pub operating_system: Option<String>,
    pub os_version: Option<String>,
    pub platform: Option<String>,
    pub enabled: bool,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

impl InstallationRow {
    /// Convert into the domain type.
    pub fn into_installation(self, categories: BTreeSet<String>) -> push_core::Installation {
        push_core::Installation {
            id: self.id,
            variant_id: self.variant_id,
            device_token: self.device_token,
            alias: self.alias,
            device_type: self.device_type,
            operating_system: self.operating_system,
            os_version: self.os_version,
            platform: self.platform,
            enabled: self.enabled,
            categories,
        }
    }
}

/// New installation for insertion.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = installations)]
pub struct NewInstallation<'a> {
    pub id: &'a str,
    pub variant_id: &'a str,
    pub device_token: &'a str,
    pub alias: Option<&'a str>,
    pub device_type: Option<&'a str>,
    pub operating_system: Option<&'a str>,
    pub os_version: Option<&'a str>,
    pub platform: Option<&'a str>,
    pub enabled: bool,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

/// Category membership for insertion.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = installation_categories)]
pub struct NewInstallationCategory<'a> {
    pub installation_id: &'a str,
    pub category: &'a str,
}
