//! SQLite storage implementation.

use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use color_eyre::eyre::WrapErr as _;
use diesel::connection::SimpleConnection as _;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::sqlite::{Sqlite, SqliteConnection};

use crate::models::*;
use crate::schema::*;
use crate::traits::*;
use push_core::{Installation, TokenCriteria, Variant, VariantKind};

type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;

/// How long a connection waits on another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-connection pragmas applied when the pool opens a connection.
///
/// Pooled connections write concurrently, so each one waits for the write
/// lock instead of failing with `SQLITE_BUSY`.
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    busy_timeout: Duration,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;",
            self.busy_timeout.as_millis()
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// SQLite-based storage.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage from a database URL.
    pub fn new(database_url: &str) -> color_eyre::eyre::Result<Self> {
        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(10)
            .connection_customizer(Box::new(ConnectionOptions {
                busy_timeout: BUSY_TIMEOUT,
            }))
            .build(manager)
            .wrap_err("failed to create connection pool")?;

        Ok(Self { pool })
    }

    /// Run migrations.
    pub fn run_migrations(&self) -> color_eyre::eyre::Result<()> {
        use diesel_migrations::MigrationHarness as _;

        let mut conn = self
            .pool
            .get()
            .wrap_err("failed to get connection for migrations")?;

        conn.run_pending_migrations(crate::MIGRATIONS)
            .map_err(|e| color_eyre::eyre::eyre!("migration failed: {}", e))?;

        Ok(())
    }

    fn conn(
        &self,
    ) -> color_eyre::eyre::Result<diesel::r2d2::PooledConnection<ConnectionManager<SqliteConnection>>>
    {
        self.pool
            .get()
            .wrap_err("failed to get database connection")
    }
}

/// iOS tokens are stored lower case.
fn normalize_token(variant: &Variant, token: &str) -> String {
    match variant.kind {
        VariantKind::Ios => token.to_lowercase(),
        VariantKind::Android => token.to_string(),
    }
}

fn load_categories(
    conn: &mut SqliteConnection,
    installation_id: &str,
) -> QueryResult<BTreeSet<String>> {
    let names: Vec<String> = installation_categories::table
        .filter(installation_categories::installation_id.eq(installation_id))
        .select(installation_categories::category)
        .load(conn)?;

    Ok(names.into_iter().collect())
}

fn replace_categories(
    conn: &mut SqliteConnection,
    installation_id: &str,
    categories: &BTreeSet<String>,
) -> QueryResult<()> {
    diesel::delete(
        installation_categories::table
            .filter(installation_categories::installation_id.eq(installation_id)),
    )
    .execute(conn)?;

    let rows: Vec<NewInstallationCategory<'_>> = categories
        .iter()
        .map(|category| NewInstallationCategory {
            installation_id,
            category,
        })
        .collect();

    if !rows.is_empty() {
        diesel::insert_into(installation_categories::table)
            .values(&rows)
            .execute(conn)?;
    }

    Ok(())
}

fn insert_installation(
    conn: &mut SqliteConnection,
    variant: &Variant,
    installation: &Installation,
) -> QueryResult<String> {
    let id = uuid::Uuid::new_v4().to_string();
    let token = normalize_token(variant, &installation.device_token);
    let now = chrono::Utc::now().naive_utc();

    let new_installation = NewInstallation {
        id: &id,
        variant_id: &variant.id,
        device_token: &token,
        alias: installation.alias.as_deref(),
        device_type: installation.device_type.as_deref(),
        operating_system: installation.operating_system.as_deref(),
        os_version: installation.os_version.as_deref(),
        platform: Some(variant.kind.platform()),
        enabled: installation.enabled,
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(installations::table)
        .values(&new_installation)
        .execute(conn)?;

    replace_categories(conn, &id, &installation.categories)?;

    Ok(id)
}

fn update_metadata(
    conn: &mut SqliteConnection,
    variant: &Variant,
    id: &str,
    installation: &Installation,
) -> QueryResult<()> {
    let token = normalize_token(variant, &installation.device_token);
    let now = chrono::Utc::now().naive_utc();

    diesel::update(installations::table.find(id))
        .set((
            installations::device_token.eq(&token),
            installations::alias.eq(installation.alias.as_deref()),
            installations::device_type.eq(installation.device_type.as_deref()),
            installations::operating_system.eq(installation.operating_system.as_deref()),
            installations::os_version.eq(installation.os_version.as_deref()),
            installations::platform.eq(Some(variant.kind.platform())),
            installations::enabled.eq(installation.enabled),
            installations::updated_at.eq(now),
        ))
        .execute(conn)?;

    replace_categories(conn, id, &installation.categories)
}

/// Enabled installations of a variant, narrowed by the non-empty criteria.
fn criteria_query<'a>(
    variant_id: &'a str,
    criteria: &'a TokenCriteria,
) -> installations::BoxedQuery<'a, Sqlite> {
    let mut query = installations::table
        .filter(installations::variant_id.eq(variant_id))
        .filter(installations::enabled.eq(true))
        .into_boxed();

    if !criteria.aliases.is_empty() {
        query = query.filter(installations::alias.eq_any(&criteria.aliases));
    }

    if !criteria.device_types.is_empty() {
        query = query.filter(installations::device_type.eq_any(&criteria.device_types));
    }

    if !criteria.categories.is_empty() {
        let tagged = installation_categories::table
            .filter(installation_categories::category.eq_any(&criteria.categories))
            .select(installation_categories::installation_id);
        query = query.filter(installations::id.eq_any(tagged));
    }

    query
}

impl DeviceRegistry for SqliteStorage {
    fn find_by_variant_and_token(
        &self,
        variant_id: &str,
        token: &str,
    ) -> color_eyre::eyre::Result<Option<Installation>> {
        let mut conn = self.conn()?;

        let row: Option<InstallationRow> = installations::table
            .filter(installations::variant_id.eq(variant_id))
            .filter(installations::device_token.eq(token))
            .select(InstallationRow::as_select())
            .first(&mut conn)
            .optional()
            .wrap_err("failed to find installation by token")?;

        match row {
            Some(row) => {
                let categories = load_categories(&mut conn, &row.id)
                    .wrap_err("failed to load installation categories")?;
                Ok(Some(row.into_installation(categories)))
            }
            None => Ok(None),
        }
    }

    fn update_token(
        &self,
        installation: &Installation,
        new_token: &str,
    ) -> color_eyre::eyre::Result<()> {
        let mut conn = self.conn()?;
        let now = chrono::Utc::now().naive_utc();

        diesel::update(installations::table.find(&installation.id))
            .set((
                installations::device_token.eq(new_token),
                installations::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .wrap_err("failed to update device token")?;

        Ok(())
    }

    fn purge_by_variant_and_tokens(
        &self,
        variant_id: &str,
        tokens: &BTreeSet<String>,
    ) -> color_eyre::eyre::Result<usize> {
        if tokens.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;

        let removed = conn
            .immediate_transaction::<_, diesel::result::Error, _>(|conn| {
                let ids: Vec<String> = installations::table
                    .filter(installations::variant_id.eq(variant_id))
                    .filter(installations::device_token.eq_any(tokens))
                    .select(installations::id)
                    .load(conn)?;

                diesel::delete(
                    installation_categories::table
                        .filter(installation_categories::installation_id.eq_any(&ids)),
                )
                .execute(conn)?;

                diesel::delete(installations::table.filter(installations::id.eq_any(&ids)))
                    .execute(conn)
            })
            .wrap_err("failed to purge installations")?;

        tracing::debug!(variant_id = %variant_id, removed, "purged installations");

        Ok(removed)
    }
}

impl InstallationStore for SqliteStorage {
    fn add_installation(
        &self,
        variant: &Variant,
        installation: &Installation,
    ) -> color_eyre::eyre::Result<()> {
        let mut conn = self.conn()?;
        let token = normalize_token(variant, &installation.device_token);

        conn.immediate_transaction::<_, diesel::result::Error, _>(|conn| {
            let existing: Option<InstallationRow> = installations::table
                .filter(installations::variant_id.eq(&variant.id))
                .filter(installations::device_token.eq(&token))
                .select(InstallationRow::as_select())
                .first(conn)
                .optional()?;

            match existing {
                None => {
                    tracing::debug!(variant_id = %variant.id, "registering new installation");
                    insert_installation(conn, variant, installation)?;
                }
                Some(row) if row.enabled => {
                    tracing::debug!(variant_id = %variant.id, id = %row.id, "updating installation metadata");
                    update_metadata(conn, variant, &row.id, installation)?;
                }
                Some(row) => {
                    tracing::debug!(variant_id = %variant.id, id = %row.id, "installation disabled, ignoring update");
                }
            }

            Ok(())
        })
        .wrap_err("failed to add installation")
    }

    fn add_installations(
        &self,
        variant: &Variant,
        installations: &[Installation],
    ) -> color_eyre::eyre::Result<usize> {
        if installations.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;

        let stored = conn
            .immediate_transaction::<_, diesel::result::Error, _>(|conn| {
                let mut known: HashSet<String> = installations::table
                    .filter(installations::variant_id.eq(&variant.id))
                    .select(installations::device_token)
                    .load::<String>(conn)?
                    .into_iter()
                    .collect();

                let mut stored = 0;
                for installation in installations {
                    let token = normalize_token(variant, &installation.device_token);

                    if !installation.has_token() || known.contains(&token) {
                        tracing::debug!(variant_id = %variant.id, "skipping known or empty token");
                        continue;
                    }

                    insert_installation(conn, variant, installation)?;
                    known.insert(token);
                    stored += 1;
                }

                Ok(stored)
            })
            .wrap_err("failed to import installations")?;

        tracing::info!(
            variant_id = %variant.id,
            stored,
            submitted = installations.len(),
            "imported installations"
        );

        Ok(stored)
    }

    fn find_by_id(&self, id: &str) -> color_eyre::eyre::Result<Option<Installation>> {
        let mut conn = self.conn()?;

        let row: Option<InstallationRow> = installations::table
            .find(id)
            .select(InstallationRow::as_select())
            .first(&mut conn)
            .optional()
            .wrap_err("failed to find installation")?;

        match row {
            Some(row) => {
                let categories = load_categories(&mut conn, &row.id)
                    .wrap_err("failed to load installation categories")?;
                Ok(Some(row.into_installation(categories)))
            }
            None => Ok(None),
        }
    }

    fn remove_installation(&self, id: &str) -> color_eyre::eyre::Result<()> {
        let mut conn = self.conn()?;

        conn.immediate_transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::delete(
                installation_categories::table
                    .filter(installation_categories::installation_id.eq(id)),
            )
            .execute(conn)?;

            diesel::delete(installations::table.find(id)).execute(conn)?;

            Ok(())
        })
        .wrap_err("failed to remove installation")
    }

    fn find_device_tokens(
        &self,
        variant_id: &str,
        criteria: &TokenCriteria,
        max_results: i64,
        after_token: Option<&str>,
    ) -> color_eyre::eyre::Result<Vec<String>> {
        let mut conn = self.conn()?;

        let mut query = criteria_query(variant_id, criteria);
        if let Some(after) = after_token {
            query = query.filter(installations::device_token.gt(after));
        }

        query
            .select(installations::device_token)
            .order(installations::device_token.asc())
            .limit(max_results)
            .load::<String>(&mut conn)
            .wrap_err("failed to find device tokens")
    }

    fn count_device_tokens(
        &self,
        variant_id: &str,
        criteria: &TokenCriteria,
    ) -> color_eyre::eyre::Result<i64> {
        let mut conn = self.conn()?;

        criteria_query(variant_id, criteria)
            .count()
            .get_result(&mut conn)
            .wrap_err("failed to count device tokens")
    }
}
