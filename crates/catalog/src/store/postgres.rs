//! PostgreSQL-backed document store.
//!
//! A catalog maps to a schema and a collection to a table of JSONB documents:
//!
//! ```text
//! "<catalog>"."<collection>" (id UUID PRIMARY KEY, doc JSONB NOT NULL)
//! "<catalog>"."_indexes"     (collection, name, spec)
//! ```
//!
//! Scalar indexes are btree expression indexes over `doc #> '{path}'`, array
//! indexes are GIN. `_indexes` records each declaration so that a different
//! definition under an existing name, or a second index on the same field, is
//! reported as a conflict.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgDatabaseError, PgPoolOptions};
use sqlx::types::Json;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    DocumentStore, IndexKind, IndexModel, InsertManyOptions, InsertManyResult, Namespace,
    ReplaceOutcome, check_index_conflict, ensure_object, validate_identifier,
};
use crate::errors::{StoreError, WriteError, WriteErrorKind};
use crate::filter::Filter;
use crate::query_builder::{QueryBuilder, json_path_expr};

/// Table holding index declarations in every catalog schema.
const INDEX_TABLE: &str = "_indexes";

/// How long `connect` waits for the server before giving up.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLSTATE for a relation that already exists.
const DUPLICATE_RELATION: &str = "42P07";

fn quote_ident(name: &str) -> String {
    format!("\"{name}\"")
}

fn table_name(ns: &Namespace) -> String {
    format!("{}.{}", quote_ident(ns.catalog()), quote_ident(ns.collection()))
}

fn index_table_name(ns: &Namespace) -> String {
    format!("{}.{}", quote_ident(ns.catalog()), quote_ident(INDEX_TABLE))
}

/// Index names are schema-wide in PostgreSQL, so they carry the collection as a prefix.
fn physical_index_name(ns: &Namespace, name: &str) -> Result<String, StoreError> {
    let physical = format!("{}_{}", ns.collection(), name);
    validate_identifier(&physical)?;
    Ok(physical)
}

fn logical_index_name<'a>(ns: &Namespace, physical: &'a str) -> &'a str {
    physical
        .strip_prefix(ns.collection())
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(physical)
}

/// Builds the CREATE INDEX statement for a validated index model.
pub(crate) fn index_ddl(ns: &Namespace, index: &IndexModel) -> Result<String, StoreError> {
    let physical = quote_ident(&physical_index_name(ns, &index.index_name())?);
    let table = table_name(ns);
    let expr = json_path_expr(&index.field);

    Ok(match index.kind {
        IndexKind::Scalar => {
            let unique = if index.unique { "UNIQUE " } else { "" };
            format!("CREATE {unique}INDEX {physical} ON {table} (({expr}))")
        }
        IndexKind::Array => {
            format!("CREATE INDEX {physical} ON {table} USING GIN (({expr}))")
        }
    })
}

/// Extracts a duplicate-key write error from a unique violation.
fn duplicate_key(err: &sqlx::Error, ns: &Namespace) -> Option<WriteErrorKind> {
    let sqlx::Error::Database(db) = err else {
        return None;
    };
    if !db.is_unique_violation() {
        return None;
    }

    let index = db
        .constraint()
        .map(|c| logical_index_name(ns, c).to_string())
        .unwrap_or_default();
    let key = db
        .try_downcast_ref::<PgDatabaseError>()
        .and_then(PgDatabaseError::detail)
        .unwrap_or_else(|| db.message())
        .to_string();

    Some(WriteErrorKind::DuplicateKey { index, key })
}

/// Maps a failed CREATE INDEX. A duplicate relation means the physical index
/// exists without a registry entry.
fn index_creation_error(err: sqlx::Error, ns: &Namespace, name: &str) -> StoreError {
    if let Some(kind) = duplicate_key(&err, ns) {
        return StoreError::InvalidIndex(format!("{name}: {kind}"));
    }
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(DUPLICATE_RELATION) {
            return StoreError::InvalidIndex(format!(
                "{name}: index exists in {ns} but is not registered"
            ));
        }
    }
    StoreError::Database(err)
}

fn write_error(err: sqlx::Error, ns: &Namespace) -> StoreError {
    match duplicate_key(&err, ns) {
        Some(kind) => StoreError::Write(kind),
        None => StoreError::Database(err),
    }
}

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    /// Namespaces whose schema and tables are known to exist.
    ensured: Arc<Mutex<HashSet<Namespace>>>,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            ensured: Arc::default(),
        }
    }

    /// Opens a single connection used for the lifetime of the store.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        Self::connect_with_timeout(database_url, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Like [`connect`](Self::connect), failing once `timeout` passes without a connection.
    /// There is no retry beyond that window.
    pub async fn connect_with_timeout(
        database_url: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(timeout)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Returns a reference to the pool for advanced usage.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the catalog schema, its index registry and the collection table.
    async fn ensure_collection(&self, ns: &Namespace) -> Result<(), StoreError> {
        if ns.collection() == INDEX_TABLE {
            return Err(StoreError::InvalidName(ns.collection().to_string()));
        }
        let mut ensured = self.ensured.lock().await;
        if ensured.contains(ns) {
            return Ok(());
        }

        debug!("Ensuring collection {ns}");

        sqlx::query(&format!(
            "CREATE SCHEMA IF NOT EXISTS {}",
            quote_ident(ns.catalog())
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                collection TEXT NOT NULL,
                name TEXT NOT NULL,
                spec JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (collection, name)
            )
            "#,
            index_table_name(ns)
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (id UUID PRIMARY KEY, doc JSONB NOT NULL)",
            table_name(ns)
        ))
        .execute(&self.pool)
        .await?;

        ensured.insert(ns.clone());
        Ok(())
    }

    async fn collection_exists(&self, ns: &Namespace) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = $1 AND table_name = $2
            )
            "#,
        )
        .bind(ns.catalog())
        .bind(ns.collection())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_one(&self, ns: &Namespace, doc: &Value) -> Result<Uuid, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query(&format!(
            "INSERT INTO {} (id, doc) VALUES ($1, $2)",
            table_name(ns)
        ))
        .bind(id)
        .bind(Json(doc))
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// Drops a catalog schema with every collection in it.
    ///
    /// **WARNING**: This deletes all data in the catalog. Use with caution.
    pub async fn drop_catalog(&self, catalog: &str) -> Result<(), StoreError> {
        validate_identifier(catalog)?;
        info!("Dropping catalog {catalog}");
        sqlx::query(&format!(
            "DROP SCHEMA IF EXISTS {} CASCADE",
            quote_ident(catalog)
        ))
        .execute(&self.pool)
        .await?;
        self.ensured.lock().await.retain(|ns| ns.catalog() != catalog);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert_many(
        &self,
        ns: &Namespace,
        docs: Vec<Value>,
        options: InsertManyOptions,
    ) -> Result<InsertManyResult, StoreError> {
        docs.iter().try_for_each(ensure_object)?;
        self.ensure_collection(ns).await?;

        let mut result = InsertManyResult::default();
        for (position, doc) in docs.iter().enumerate() {
            match self.insert_one(ns, doc).await {
                Ok(id) => result.inserted_ids.push((position, id)),
                Err(err) => {
                    let Some(kind) = duplicate_key(&err, ns) else {
                        return Err(err.into());
                    };
                    debug!("Rejected document {position} in {ns}: {kind}");
                    result.write_errors.push(WriteError { position, kind });
                    if options.ordered {
                        break;
                    }
                }
            }
        }

        Ok(result)
    }

    async fn replace_one(
        &self,
        ns: &Namespace,
        filter: &Filter,
        doc: Value,
        upsert: bool,
    ) -> Result<ReplaceOutcome, StoreError> {
        ensure_object(&doc)?;
        self.ensure_collection(ns).await?;

        let mut qb = QueryBuilder::starting_at(2);
        qb.add_filter(filter)?;
        let table = table_name(ns);
        let sql = format!(
            "UPDATE {table} SET doc = $1 WHERE id = (SELECT id FROM {table}{} LIMIT 1)",
            qb.where_sql()
        );

        let mut query = sqlx::query(&sql).bind(Json(&doc));
        for param in qb.params() {
            query = query.bind(Json(param));
        }
        let replaced = query
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, ns))?
            .rows_affected();

        if replaced > 0 {
            return Ok(ReplaceOutcome::Replaced);
        }
        if !upsert {
            return Ok(ReplaceOutcome::NotFound);
        }

        self.insert_one(ns, &doc)
            .await
            .map_err(|e| write_error(e, ns))?;
        Ok(ReplaceOutcome::Inserted)
    }

    async fn create_index(&self, ns: &Namespace, index: &IndexModel) -> Result<String, StoreError> {
        index.validate()?;
        self.ensure_collection(ns).await?;

        let name = index.index_name();
        let mut tx = self.pool.begin().await?;

        let existing: Vec<Json<IndexModel>> = sqlx::query_scalar(&format!(
            "SELECT spec FROM {} WHERE collection = $1 FOR UPDATE",
            index_table_name(ns)
        ))
        .bind(ns.collection())
        .fetch_all(&mut *tx)
        .await?;

        if check_index_conflict(existing.iter().map(|Json(spec)| spec), index)? {
            debug!("Index {name} on {ns} already declared");
            return Ok(name);
        }

        sqlx::query(&index_ddl(ns, index)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| index_creation_error(e, ns, &name))?;

        sqlx::query(&format!(
            "INSERT INTO {} (collection, name, spec) VALUES ($1, $2, $3)",
            index_table_name(ns)
        ))
        .bind(ns.collection())
        .bind(&name)
        .bind(Json(index))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!("Created index {name} on {ns}");
        Ok(name)
    }

    async fn count_documents(&self, ns: &Namespace, filter: &Filter) -> Result<u64, StoreError> {
        let mut qb = QueryBuilder::new();
        qb.add_filter(filter)?;
        if !self.collection_exists(ns).await? {
            return Ok(0);
        }

        let sql = format!("SELECT COUNT(*) FROM {}{}", table_name(ns), qb.where_sql());
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for param in qb.params() {
            query = query.bind(Json(param));
        }
        let count = query.fetch_one(&self.pool).await?;

        Ok(count as u64)
    }

    async fn find(&self, ns: &Namespace, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        let mut qb = QueryBuilder::new();
        qb.add_filter(filter)?;
        if !self.collection_exists(ns).await? {
            return Ok(Vec::new());
        }

        let sql = format!("SELECT doc FROM {}{}", table_name(ns), qb.where_sql());
        let mut query = sqlx::query_scalar::<_, Json<Value>>(&sql);
        for param in qb.params() {
            query = query.bind(Json(param));
        }
        let docs = query.fetch_all(&self.pool).await?;

        Ok(docs.into_iter().map(|Json(doc)| doc).collect())
    }

    async fn delete_many(&self, ns: &Namespace, filter: &Filter) -> Result<u64, StoreError> {
        let mut qb = QueryBuilder::new();
        qb.add_filter(filter)?;
        if !self.collection_exists(ns).await? {
            return Ok(0);
        }

        let sql = format!("DELETE FROM {}{}", table_name(ns), qb.where_sql());
        let mut query = sqlx::query(&sql);
        for param in qb.params() {
            query = query.bind(Json(param));
        }
        let deleted = query.execute(&self.pool).await?.rows_affected();

        Ok(deleted)
    }
}
