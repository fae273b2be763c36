//! Document-store access.
//!
//! [`DocumentStore`] is the interface the seeder talks to. Documents are JSON
//! objects addressed by a [`Namespace`]; collections and their catalog come
//! into existence on first write or index declaration.

mod memory;
mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::{StoreError, WriteError};
use crate::filter::Filter;

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

/// Longest identifier PostgreSQL accepts without truncation.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Checks a catalog or collection name.
pub fn validate_identifier(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

/// Checks a dotted field path such as `specifications.batteryLife`.
pub fn validate_field_path(path: &str) -> Result<(), StoreError> {
    path.split('.')
        .try_for_each(validate_identifier)
        .map_err(|_| StoreError::InvalidName(path.to_string()))
}

/// A collection within a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    catalog: String,
    collection: String,
}

impl Namespace {
    pub fn new(
        catalog: impl Into<String>,
        collection: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let catalog = catalog.into();
        let collection = collection.into();
        validate_identifier(&catalog)?;
        validate_identifier(&collection)?;
        Ok(Self {
            catalog,
            collection,
        })
    }

    pub fn catalog(&self) -> &str {
        &self.catalog
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.catalog, self.collection)
    }
}

/// How an indexed field is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Equality and range lookups on a single value.
    Scalar,
    /// Membership lookups on an array of values.
    Array,
}

/// Declaration of a single-field index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexModel {
    pub field: String,
    pub kind: IndexKind,
    pub unique: bool,
    pub name: Option<String>,
}

impl IndexModel {
    pub fn scalar(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: IndexKind::Scalar,
            unique: false,
            name: None,
        }
    }

    pub fn array(field: impl Into<String>) -> Self {
        Self {
            kind: IndexKind::Array,
            ..Self::scalar(field)
        }
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Explicit name, or `<field>_1` with dots replaced by underscores.
    pub fn index_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}_1", self.field.replace('.', "_")),
        }
    }

    /// Compares field, kind, uniqueness and effective name.
    pub fn same_definition(&self, other: &IndexModel) -> bool {
        self.field == other.field
            && self.kind == other.kind
            && self.unique == other.unique
            && self.index_name() == other.index_name()
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        validate_field_path(&self.field)?;
        validate_identifier(&self.index_name())?;
        if self.unique && self.kind == IndexKind::Array {
            return Err(StoreError::InvalidIndex(format!(
                "array index on {} cannot be unique",
                self.field
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InsertManyOptions {
    /// Stop at the first write error instead of attempting every document.
    pub ordered: bool,
}

impl Default for InsertManyOptions {
    fn default() -> Self {
        Self { ordered: true }
    }
}

impl InsertManyOptions {
    pub fn unordered() -> Self {
        Self { ordered: false }
    }
}

/// Outcome of a bulk insert: what went in and what was refused.
#[derive(Debug, Clone, Default)]
pub struct InsertManyResult {
    /// Store-assigned ids keyed by position in the batch.
    pub inserted_ids: Vec<(usize, Uuid)>,
    pub write_errors: Vec<WriteError>,
}

impl InsertManyResult {
    pub fn inserted_count(&self) -> usize {
        self.inserted_ids.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Replaced,
    Inserted,
    NotFound,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts documents, reporting per-document failures as write errors.
    async fn insert_many(
        &self,
        ns: &Namespace,
        docs: Vec<Value>,
        options: InsertManyOptions,
    ) -> Result<InsertManyResult, StoreError>;

    /// Replaces the first document matching `filter`, inserting when `upsert` is set
    /// and nothing matches.
    async fn replace_one(
        &self,
        ns: &Namespace,
        filter: &Filter,
        doc: Value,
        upsert: bool,
    ) -> Result<ReplaceOutcome, StoreError>;

    /// Declares an index and returns its name. Re-declaring an identical index is a no-op.
    async fn create_index(&self, ns: &Namespace, index: &IndexModel) -> Result<String, StoreError>;

    async fn count_documents(&self, ns: &Namespace, filter: &Filter) -> Result<u64, StoreError>;

    async fn find(&self, ns: &Namespace, filter: &Filter) -> Result<Vec<Value>, StoreError>;

    async fn find_one(&self, ns: &Namespace, filter: &Filter) -> Result<Option<Value>, StoreError> {
        Ok(self.find(ns, filter).await?.into_iter().next())
    }

    /// Deletes matching documents and returns how many were removed.
    async fn delete_many(&self, ns: &Namespace, filter: &Filter) -> Result<u64, StoreError>;
}

/// Checks a new declaration against the indexes already on a collection.
///
/// Returns `Ok(true)` when an identical index exists. Any other index with the
/// same name or on the same field is a conflict.
fn check_index_conflict<'a>(
    existing: impl IntoIterator<Item = &'a IndexModel>,
    index: &IndexModel,
) -> Result<bool, StoreError> {
    let name = index.index_name();
    let existing: Vec<&IndexModel> = existing.into_iter().collect();
    if existing.iter().any(|other| other.same_definition(index)) {
        return Ok(true);
    }
    match existing
        .into_iter()
        .find(|other| other.index_name() == name || other.field == index.field)
    {
        Some(other) => Err(StoreError::IndexConflict {
            name: other.index_name(),
            existing: Box::new(other.clone()),
            requested: Box::new(index.clone()),
        }),
        None => Ok(false),
    }
}

fn ensure_object(doc: &Value) -> Result<(), StoreError> {
    if doc.is_object() {
        Ok(())
    } else {
        Err(StoreError::NotAnObject)
    }
}
