//! Schema definition, versioning and drift detection.
//!
//! The expected schema is declared once as [`TABLES`]. Its DDL is hashed into
//! a fingerprint stored next to the schema version in `store_metadata`. On
//! open, [`SchemaManager::ensure`] creates a fresh schema, verifies an
//! existing one against the declaration, runs a registered migration chain,
//! or falls back to the configured [`UpgradePolicy`].

use std::fmt;

use chatvault_core::event::EventBus;
use chatvault_types::config::UpgradePolicy;
use chatvault_types::error::RepositoryError;
use chatvault_types::event::StoreEvent;
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::{debug, info, warn};

use super::error::map_sqlx_error;

/// Version of the schema declared in [`TABLES`].
pub const SCHEMA_VERSION: i64 = 3;

const CREATE_METADATA: &str = "CREATE TABLE IF NOT EXISTS store_metadata (\
id INTEGER PRIMARY KEY CHECK (id = 1), \
schema_version INTEGER NOT NULL, \
identity_hash TEXT NOT NULL)";

/// Expected shape of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub decl_type: &'static str,
    pub not_null: bool,
    pub primary_key: bool,
}

/// Expected foreign key of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKeySpec {
    pub column: &'static str,
    pub parent_table: &'static str,
    pub parent_column: &'static str,
    pub on_update: &'static str,
    pub on_delete: &'static str,
}

/// Expected explicitly created index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub unique: bool,
    pub columns: &'static [&'static str],
    pub ddl: &'static str,
}

/// Expected table together with its DDL.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub ddl: &'static str,
    pub columns: &'static [ColumnSpec],
    pub foreign_keys: &'static [ForeignKeySpec],
    pub indexes: &'static [IndexSpec],
}

const fn column(
    name: &'static str,
    decl_type: &'static str,
    not_null: bool,
    primary_key: bool,
) -> ColumnSpec {
    ColumnSpec {
        name,
        decl_type,
        not_null,
        primary_key,
    }
}

/// Tables of the current schema, parents before children.
pub const TABLES: &[TableSpec] = &[
    TableSpec {
        name: "chat_sessions",
        ddl: "CREATE TABLE IF NOT EXISTS chat_sessions (\
id TEXT NOT NULL, \
user_id TEXT NOT NULL, \
title TEXT NOT NULL, \
is_offline_only INTEGER NOT NULL, \
last_updated INTEGER NOT NULL, \
PRIMARY KEY(id))",
        columns: &[
            column("id", "TEXT", true, true),
            column("user_id", "TEXT", true, false),
            column("title", "TEXT", true, false),
            column("is_offline_only", "INTEGER", true, false),
            column("last_updated", "INTEGER", true, false),
        ],
        foreign_keys: &[],
        indexes: &[],
    },
    TableSpec {
        name: "messages",
        ddl: "CREATE TABLE IF NOT EXISTS messages (\
id TEXT NOT NULL, \
session_id TEXT NOT NULL, \
role TEXT NOT NULL, \
content TEXT NOT NULL, \
timestamp INTEGER NOT NULL, \
image_path TEXT, \
PRIMARY KEY(id), \
FOREIGN KEY(session_id) REFERENCES chat_sessions(id) ON UPDATE NO ACTION ON DELETE CASCADE)",
        columns: &[
            column("id", "TEXT", true, true),
            column("session_id", "TEXT", true, false),
            column("role", "TEXT", true, false),
            column("content", "TEXT", true, false),
            column("timestamp", "INTEGER", true, false),
            column("image_path", "TEXT", false, false),
        ],
        foreign_keys: &[ForeignKeySpec {
            column: "session_id",
            parent_table: "chat_sessions",
            parent_column: "id",
            on_update: "NO ACTION",
            on_delete: "CASCADE",
        }],
        indexes: &[IndexSpec {
            name: "index_messages_session_id",
            unique: false,
            columns: &["session_id"],
            ddl: "CREATE INDEX IF NOT EXISTS index_messages_session_id ON messages (session_id)",
        }],
    },
];

/// SHA-256 hex digest of the schema DDL in [`TABLES`].
pub fn identity_hash() -> String {
    let mut hasher = Sha256::new();
    for table in TABLES {
        hasher.update(table.ddl.as_bytes());
        hasher.update(b"\n");
        for index in table.indexes {
            hasher.update(index.ddl.as_bytes());
            hasher.update(b"\n");
        }
    }
    format!("{:x}", hasher.finalize())
}

/// One step of a migration chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub from: i64,
    pub to: i64,
    /// One or more `;`-separated statements.
    pub sql: String,
}

impl Migration {
    pub fn new(from: i64, to: i64, sql: impl Into<String>) -> Self {
        Self {
            from,
            to,
            sql: sql.into(),
        }
    }
}

/// What `SchemaManager::ensure` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaOutcome {
    /// Storage was empty and the schema was created.
    Created,
    /// The stored schema matched the declaration.
    Verified,
    /// Matching tables without a metadata record were adopted.
    Adopted,
    Migrated { from: i64, to: i64 },
    /// Every table was dropped and the schema recreated.
    Reset { from: Option<i64> },
}

impl fmt::Display for SchemaOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaOutcome::Created => write!(f, "created"),
            SchemaOutcome::Verified => write!(f, "verified"),
            SchemaOutcome::Adopted => write!(f, "adopted"),
            SchemaOutcome::Migrated { from, to } => write!(f, "migrated {from} -> {to}"),
            SchemaOutcome::Reset { from: Some(v) } => write!(f, "reset from version {v}"),
            SchemaOutcome::Reset { from: None } => write!(f, "reset"),
        }
    }
}

/// Stored `(schema_version, identity_hash)` record.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredIdentity {
    version: i64,
    hash: String,
}

/// Creates, verifies and upgrades the schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaManager {
    policy: UpgradePolicy,
    migrations: Vec<Migration>,
    events: Option<EventBus>,
}

impl SchemaManager {
    pub fn new(policy: UpgradePolicy) -> Self {
        Self {
            policy,
            migrations: Vec::new(),
            events: None,
        }
    }

    /// Register one step of a migration chain.
    pub fn with_migration(mut self, migration: Migration) -> Self {
        self.migrations.push(migration);
        self
    }

    /// Publish reset and migration events on `events`.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn policy(&self) -> UpgradePolicy {
        self.policy
    }

    /// Bring the schema of the database behind `pool` to [`SCHEMA_VERSION`].
    ///
    /// Must run on the writer before any other connection uses the file.
    pub async fn ensure(&self, pool: &SqlitePool) -> Result<SchemaOutcome, RepositoryError> {
        let tables = user_tables(pool).await?;
        if tables.is_empty() {
            create_schema(pool).await?;
            info!(version = SCHEMA_VERSION, "created chat store schema");
            return Ok(SchemaOutcome::Created);
        }

        match read_identity(pool).await? {
            Some(stored) if stored.version == SCHEMA_VERSION => {
                self.validate(pool).await?;
                debug!(version = SCHEMA_VERSION, "schema verified");
                Ok(SchemaOutcome::Verified)
            }
            Some(stored) => match self.migration_chain(stored.version) {
                Some(chain) => self.migrate(pool, stored.version, &chain).await,
                None => self.apply_policy(pool, Some(stored.version), &tables).await,
            },
            None => {
                let differences = structure_differences(pool).await?;
                if differences.is_empty() {
                    write_identity(pool).await?;
                    info!(version = SCHEMA_VERSION, "adopted existing schema");
                    Ok(SchemaOutcome::Adopted)
                } else {
                    debug!(?differences, "unversioned tables do not match the schema");
                    self.apply_policy(pool, None, &tables).await
                }
            }
        }
    }

    /// Check the live schema against the declaration.
    ///
    /// Fails with `SchemaMismatch` listing every difference: a wrong stored
    /// version or fingerprint, missing or altered columns, foreign keys or
    /// indexes.
    pub async fn validate(&self, pool: &SqlitePool) -> Result<(), RepositoryError> {
        let mut problems = Vec::new();
        match read_identity(pool).await? {
            None => problems.push("no schema metadata record".to_string()),
            Some(stored) => {
                if stored.version != SCHEMA_VERSION {
                    problems.push(format!(
                        "stored version {} differs from {SCHEMA_VERSION}",
                        stored.version
                    ));
                }
                if stored.hash != identity_hash() {
                    problems.push(format!(
                        "stored identity hash {} differs from {}",
                        stored.hash,
                        identity_hash()
                    ));
                }
            }
        }
        problems.extend(structure_differences(pool).await?);

        if problems.is_empty() {
            Ok(())
        } else {
            Err(RepositoryError::SchemaMismatch(problems.join("; ")))
        }
    }

    /// Steps leading from `from` to [`SCHEMA_VERSION`], if registered.
    fn migration_chain(&self, from: i64) -> Option<Vec<&Migration>> {
        let mut chain = Vec::new();
        let mut current = from;
        while current != SCHEMA_VERSION {
            if chain.len() >= self.migrations.len() {
                return None;
            }
            let step = self.migrations.iter().find(|m| m.from == current)?;
            chain.push(step);
            current = step.to;
        }
        Some(chain)
    }

    async fn migrate(
        &self,
        pool: &SqlitePool,
        from: i64,
        chain: &[&Migration],
    ) -> Result<SchemaOutcome, RepositoryError> {
        let mut tx = pool.begin().await.map_err(map_sqlx_error)?;
        for step in chain {
            debug!(from = step.from, to = step.to, "applying migration");
            sqlx::raw_sql(&step.sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryError::SchemaMismatch(format!(
                    "migration {} -> {} failed: {e}",
                    step.from, step.to
                )))?;
        }
        upsert_identity(&mut tx).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        self.validate(pool).await?;
        info!(from, to = SCHEMA_VERSION, "migrated chat store schema");
        if let Some(events) = &self.events {
            events.publish(StoreEvent::Migrated {
                from_version: from,
                to_version: SCHEMA_VERSION,
            });
        }
        Ok(SchemaOutcome::Migrated {
            from,
            to: SCHEMA_VERSION,
        })
    }

    async fn apply_policy(
        &self,
        pool: &SqlitePool,
        from: Option<i64>,
        tables: &[String],
    ) -> Result<SchemaOutcome, RepositoryError> {
        match self.policy {
            UpgradePolicy::Fail => Err(RepositoryError::SchemaMismatch(match from {
                Some(v) => format!("no migration path from version {v} to {SCHEMA_VERSION}"),
                None => "existing tables do not match the schema and carry no version".to_string(),
            })),
            UpgradePolicy::DestructiveReset => {
                let mut tx = pool.begin().await.map_err(map_sqlx_error)?;
                sqlx::query("PRAGMA defer_foreign_keys = ON")
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
                for table in tables {
                    sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
                        .execute(&mut *tx)
                        .await
                        .map_err(map_sqlx_error)?;
                }
                create_in(&mut tx).await?;
                tx.commit().await.map_err(map_sqlx_error)?;

                warn!(
                    from_version = ?from,
                    to_version = SCHEMA_VERSION,
                    "schema reset destructively, all stored chats were discarded"
                );
                if let Some(events) = &self.events {
                    events.publish(StoreEvent::DestructiveReset {
                        from_version: from,
                        to_version: SCHEMA_VERSION,
                    });
                }
                Ok(SchemaOutcome::Reset { from })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Creation and metadata
// ---------------------------------------------------------------------------

async fn create_schema(pool: &SqlitePool) -> Result<(), RepositoryError> {
    let mut tx = pool.begin().await.map_err(map_sqlx_error)?;
    create_in(&mut tx).await?;
    tx.commit().await.map_err(map_sqlx_error)
}

async fn create_in(tx: &mut sqlx::SqliteConnection) -> Result<(), RepositoryError> {
    for table in TABLES {
        sqlx::query(table.ddl)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        for index in table.indexes {
            sqlx::query(index.ddl)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }
    }
    upsert_identity(tx).await
}

async fn upsert_identity(conn: &mut sqlx::SqliteConnection) -> Result<(), RepositoryError> {
    sqlx::query(CREATE_METADATA)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
    sqlx::query(
        r#"INSERT INTO store_metadata (id, schema_version, identity_hash) VALUES (1, ?, ?)
           ON CONFLICT(id) DO UPDATE SET schema_version = excluded.schema_version,
                                         identity_hash = excluded.identity_hash"#,
    )
    .bind(SCHEMA_VERSION)
    .bind(identity_hash())
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

async fn write_identity(pool: &SqlitePool) -> Result<(), RepositoryError> {
    let mut tx = pool.begin().await.map_err(map_sqlx_error)?;
    upsert_identity(&mut tx).await?;
    tx.commit().await.map_err(map_sqlx_error)
}

async fn read_identity(pool: &SqlitePool) -> Result<Option<StoredIdentity>, RepositoryError> {
    let exists: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'store_metadata'",
    )
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_error)?;
    if exists == 0 {
        return Ok(None);
    }

    let row = sqlx::query("SELECT schema_version, identity_hash FROM store_metadata WHERE id = 1")
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx_error)?;

    match row {
        Some(row) => Ok(Some(StoredIdentity {
            version: row.try_get("schema_version").map_err(map_sqlx_error)?,
            hash: row.try_get("identity_hash").map_err(map_sqlx_error)?,
        })),
        None => Ok(None),
    }
}

async fn user_tables(pool: &SqlitePool) -> Result<Vec<String>, RepositoryError> {
    sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .map_err(map_sqlx_error)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// ---------------------------------------------------------------------------
// Introspection
// ---------------------------------------------------------------------------

/// Differences between the live tables and [`TABLES`]. Empty when they match.
async fn structure_differences(pool: &SqlitePool) -> Result<Vec<String>, RepositoryError> {
    let present = user_tables(pool).await?;
    let mut differences = Vec::new();

    let unexpected: Vec<&String> = present
        .iter()
        .filter(|name| *name != "store_metadata" && !TABLES.iter().any(|t| t.name == *name))
        .collect();
    if !unexpected.is_empty() {
        debug!(?unexpected, "ignoring tables outside the chat schema");
    }

    for table in TABLES {
        if !present.iter().any(|name| name == table.name) {
            differences.push(format!("table {} is missing", table.name));
            continue;
        }
        diff_columns(pool, table, &mut differences).await?;
        diff_foreign_keys(pool, table, &mut differences).await?;
        diff_indexes(pool, table, &mut differences).await?;
    }

    Ok(differences)
}

async fn diff_columns(
    pool: &SqlitePool,
    table: &TableSpec,
    differences: &mut Vec<String>,
) -> Result<(), RepositoryError> {
    let rows = sqlx::query(r#"SELECT name, type, "notnull", pk FROM pragma_table_info(?)"#)
        .bind(table.name)
        .fetch_all(pool)
        .await
        .map_err(map_sqlx_error)?;

    let mut live = Vec::with_capacity(rows.len());
    for row in &rows {
        let name: String = row.try_get("name").map_err(map_sqlx_error)?;
        let decl_type: String = row.try_get("type").map_err(map_sqlx_error)?;
        let not_null: i64 = row.try_get("notnull").map_err(map_sqlx_error)?;
        let pk: i64 = row.try_get("pk").map_err(map_sqlx_error)?;
        live.push((name, decl_type.to_uppercase(), not_null != 0, pk != 0));
    }

    for expected in table.columns {
        match live.iter().find(|(name, ..)| name == expected.name) {
            None => differences.push(format!("column {}.{} is missing", table.name, expected.name)),
            Some((_, decl_type, not_null, pk)) => {
                if decl_type != expected.decl_type {
                    differences.push(format!(
                        "column {}.{} has type {decl_type}, expected {}",
                        table.name, expected.name, expected.decl_type
                    ));
                }
                if *not_null != expected.not_null {
                    differences.push(format!(
                        "column {}.{} not-null is {not_null}, expected {}",
                        table.name, expected.name, expected.not_null
                    ));
                }
                if *pk != expected.primary_key {
                    differences.push(format!(
                        "column {}.{} primary key is {pk}, expected {}",
                        table.name, expected.name, expected.primary_key
                    ));
                }
            }
        }
    }
    for (name, ..) in &live {
        if !table.columns.iter().any(|c| c.name == name) {
            differences.push(format!("column {}.{name} is unexpected", table.name));
        }
    }
    Ok(())
}

/// Foreign key as reported by `pragma_foreign_key_list`.
struct LiveForeignKey {
    column: String,
    parent_table: String,
    parent_column: String,
    on_update: String,
    on_delete: String,
}

async fn diff_foreign_keys(
    pool: &SqlitePool,
    table: &TableSpec,
    differences: &mut Vec<String>,
) -> Result<(), RepositoryError> {
    let rows = sqlx::query(
        r#"SELECT "from", "table", "to", on_update, on_delete FROM pragma_foreign_key_list(?)"#,
    )
    .bind(table.name)
    .fetch_all(pool)
    .await
    .map_err(map_sqlx_error)?;

    let mut live = Vec::with_capacity(rows.len());
    for row in &rows {
        let column: String = row.try_get("from").map_err(map_sqlx_error)?;
        let parent_table: String = row.try_get("table").map_err(map_sqlx_error)?;
        let parent_column: Option<String> = row.try_get("to").map_err(map_sqlx_error)?;
        let on_update: String = row.try_get("on_update").map_err(map_sqlx_error)?;
        let on_delete: String = row.try_get("on_delete").map_err(map_sqlx_error)?;
        live.push(LiveForeignKey {
            column,
            parent_table,
            parent_column: parent_column.unwrap_or_default(),
            on_update: on_update.to_uppercase(),
            on_delete: on_delete.to_uppercase(),
        });
    }

    for expected in table.foreign_keys {
        let found = live.iter().any(|fk| {
            fk.column == expected.column
                && fk.parent_table == expected.parent_table
                && fk.parent_column == expected.parent_column
                && fk.on_update == expected.on_update
                && fk.on_delete == expected.on_delete
        });
        if !found {
            differences.push(format!(
                "foreign key {}.{} -> {}({}) ON UPDATE {} ON DELETE {} is missing",
                table.name,
                expected.column,
                expected.parent_table,
                expected.parent_column,
                expected.on_update,
                expected.on_delete
            ));
        }
    }
    if live.len() != table.foreign_keys.len() {
        differences.push(format!(
            "table {} has {} foreign keys, expected {}",
            table.name,
            live.len(),
            table.foreign_keys.len()
        ));
    }
    Ok(())
}

async fn diff_indexes(
    pool: &SqlitePool,
    table: &TableSpec,
    differences: &mut Vec<String>,
) -> Result<(), RepositoryError> {
    let rows = sqlx::query(r#"SELECT name, "unique" FROM pragma_index_list(?) WHERE origin = 'c'"#)
        .bind(table.name)
        .fetch_all(pool)
        .await
        .map_err(map_sqlx_error)?;

    let mut live = Vec::with_capacity(rows.len());
    for row in &rows {
        let name: String = row.try_get("name").map_err(map_sqlx_error)?;
        let unique: i64 = row.try_get("unique").map_err(map_sqlx_error)?;
        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_index_info(?) ORDER BY seqno")
                .bind(&name)
                .fetch_all(pool)
                .await
                .map_err(map_sqlx_error)?;
        live.push((name, unique != 0, columns));
    }

    for expected in table.indexes {
        match live.iter().find(|(name, ..)| name == expected.name) {
            None => differences.push(format!("index {} is missing", expected.name)),
            Some((_, unique, columns)) => {
                if *unique != expected.unique {
                    differences.push(format!(
                        "index {} unique is {unique}, expected {}",
                        expected.name, expected.unique
                    ));
                }
                if columns.iter().map(String::as_str).ne(expected.columns.iter().copied()) {
                    differences.push(format!(
                        "index {} covers ({}), expected ({})",
                        expected.name,
                        columns.join(", "),
                        expected.columns.join(", ")
                    ));
                }
            }
        }
    }
    for (name, ..) in &live {
        if !table.indexes.iter().any(|i| i.name == name) {
            differences.push(format!("index {name} on {} is unexpected", table.name));
        }
    }
    Ok(())
}
