//! In-process document store with the same semantics as the PostgreSQL store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{
    DocumentStore, IndexModel, InsertManyOptions, InsertManyResult, Namespace, ReplaceOutcome,
    check_index_conflict, ensure_object,
};
use crate::errors::{StoreError, WriteError, WriteErrorKind};
use crate::filter::{Filter, resolve};

#[derive(Debug, Default)]
struct Collection {
    docs: Vec<(Uuid, Value)>,
    indexes: BTreeMap<String, IndexModel>,
}

impl Collection {
    /// Finds a unique index the document would violate, ignoring the document with `skip` id.
    fn duplicate_key(&self, doc: &Value, skip: Option<Uuid>) -> Option<WriteErrorKind> {
        self.indexes
            .iter()
            .filter(|(_, index)| index.unique)
            .find_map(|(name, index)| {
                let key = resolve(doc, &index.field)?;
                let clash = self
                    .docs
                    .iter()
                    .filter(|(id, _)| Some(*id) != skip)
                    .any(|(_, other)| resolve(other, &index.field) == Some(key));
                clash.then(|| WriteErrorKind::DuplicateKey {
                    index: name.clone(),
                    key: key.to_string(),
                })
            })
    }
}

/// Document store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<Namespace, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_many(
        &self,
        ns: &Namespace,
        docs: Vec<Value>,
        options: InsertManyOptions,
    ) -> Result<InsertManyResult, StoreError> {
        docs.iter().try_for_each(ensure_object)?;

        let mut collections = self.collections.lock().await;
        let collection = collections.entry(ns.clone()).or_default();
        let mut result = InsertManyResult::default();

        for (position, doc) in docs.into_iter().enumerate() {
            if let Some(kind) = collection.duplicate_key(&doc, None) {
                debug!("Rejected document {position} in {ns}: {kind}");
                result.write_errors.push(WriteError { position, kind });
                if options.ordered {
                    break;
                }
                continue;
            }
            let id = Uuid::new_v4();
            collection.docs.push((id, doc));
            result.inserted_ids.push((position, id));
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
        filter.validate()?;

        let mut collections = self.collections.lock().await;
        let collection = collections.entry(ns.clone()).or_default();
        let target = collection
            .docs
            .iter()
            .find(|(_, existing)| filter.matches(existing))
            .map(|(id, _)| *id);

        if target.is_none() && !upsert {
            return Ok(ReplaceOutcome::NotFound);
        }
        if let Some(kind) = collection.duplicate_key(&doc, target) {
            return Err(StoreError::Write(kind));
        }

        match target {
            Some(id) => {
                if let Some(slot) = collection.docs.iter_mut().find(|(other, _)| *other == id) {
                    slot.1 = doc;
                }
                Ok(ReplaceOutcome::Replaced)
            }
            None => {
                collection.docs.push((Uuid::new_v4(), doc));
                Ok(ReplaceOutcome::Inserted)
            }
        }
    }

    async fn create_index(&self, ns: &Namespace, index: &IndexModel) -> Result<String, StoreError> {
        index.validate()?;
        let name = index.index_name();

        let mut collections = self.collections.lock().await;
        let collection = collections.entry(ns.clone()).or_default();

        if check_index_conflict(collection.indexes.values(), index)? {
            return Ok(name);
        }

        if index.unique {
            let mut seen = Vec::new();
            for (_, doc) in &collection.docs {
                if let Some(key) = resolve(doc, &index.field) {
                    if seen.contains(&key) {
                        return Err(StoreError::InvalidIndex(format!(
                            "{name}: existing documents share key {key}"
                        )));
                    }
                    seen.push(key);
                }
            }
        }

        collection.indexes.insert(name.clone(), index.clone());
        Ok(name)
    }

    async fn count_documents(&self, ns: &Namespace, filter: &Filter) -> Result<u64, StoreError> {
        Ok(self.find(ns, filter).await?.len() as u64)
    }

    async fn find(&self, ns: &Namespace, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        filter.validate()?;
        let collections = self.collections.lock().await;
        Ok(collections
            .get(ns)
            .map(|c| {
                c.docs
                    .iter()
                    .filter(|(_, doc)| filter.matches(doc))
                    .map(|(_, doc)| doc.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_many(&self, ns: &Namespace, filter: &Filter) -> Result<u64, StoreError> {
        filter.validate()?;
        let mut collections = self.collections.lock().await;
        let Some(collection) = collections.get_mut(ns) else {
            return Ok(0);
        };
        let before = collection.docs.len();
        collection.docs.retain(|(_, doc)| !filter.matches(doc));
        Ok((before - collection.docs.len()) as u64)
    }
}
