//! Catalog seeding.

use catalog::models::validate_batch;
use catalog::{
    DocumentStore, Filter, InsertManyOptions, Namespace, Product, ProductError, ReplaceOutcome,
    StoreError, WriteErrorKind,
};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::config::{SeedConfig, SeedMode};
use crate::dataset::product_indexes;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Invalid seed data: {0}")]
    InvalidData(#[from] ProductError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A seed record the store refused.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    /// Position of the record in the seeded batch.
    pub position: usize,
    pub product_id: String,
    pub reason: WriteErrorKind,
}

/// Summary of a seeding run.
#[derive(Debug, Clone, Default)]
pub struct SeedReport {
    /// Documents removed by the reset step.
    pub cleared: u64,
    pub inserted: usize,
    /// Existing documents overwritten in upsert mode.
    pub replaced: usize,
    pub rejected: Vec<RejectedRecord>,
    pub indexes: Vec<String>,
    /// Collection size read back after seeding.
    pub document_count: u64,
}

impl SeedReport {
    /// True when every seed record was written.
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Seeds a product collection and declares its indexes.
pub struct Seeder<S> {
    store: S,
    ns: Namespace,
    mode: SeedMode,
    reset: bool,
}

impl<S: DocumentStore> Seeder<S> {
    /// Creates a new seeder writing into the given namespace.
    pub fn new(store: S, ns: Namespace) -> Self {
        Self {
            store,
            ns,
            mode: SeedMode::Insert,
            reset: false,
        }
    }

    /// Creates a seeder for the namespace, mode and reset flag of a configuration.
    pub fn from_config(store: S, config: &SeedConfig) -> Result<Self, SeedError> {
        Ok(Self::new(store, config.namespace()?)
            .with_mode(config.mode)
            .with_reset(config.reset))
    }

    pub fn with_mode(mut self, mode: SeedMode) -> Self {
        self.mode = mode;
        self
    }

    /// Clears the collection before seeding.
    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    /// Runs the full sequence: optional reset, write the records, declare the
    /// indexes, read back the count.
    ///
    /// Rejected records do not abort the run; they are listed in the report.
    /// Store failures and index conflicts do.
    pub async fn run(&self, products: &[Product]) -> Result<SeedReport, SeedError> {
        info!("Initializing {} catalog...", self.ns.catalog());
        validate_batch(products)?;

        let mut report = SeedReport::default();

        if self.reset {
            report.cleared = self.clear_all().await?;
        }

        match self.mode {
            SeedMode::Insert => {
                let (inserted, rejected) = self.seed_products(products).await?;
                report.inserted = inserted;
                report.rejected = rejected;
            }
            SeedMode::Upsert => {
                let (inserted, replaced) = self.upsert_products(products).await?;
                report.inserted = inserted;
                report.replaced = replaced;
            }
        }

        report.indexes = self.declare_indexes().await?;
        report.document_count = self.count().await?;

        if report.is_clean() {
            info!("Catalog initialization completed successfully!");
        } else {
            warn!(
                "Catalog initialization completed with {} rejected records",
                report.rejected.len()
            );
        }
        info!("Sample data inserted: {} products", report.document_count);

        Ok(report)
    }

    /// Inserts products, reporting each one refused by a unique index.
    pub async fn seed_products(
        &self,
        products: &[Product],
    ) -> Result<(usize, Vec<RejectedRecord>), SeedError> {
        info!("Seeding {} products into {}...", products.len(), self.ns);

        let docs = stamped_documents(products)?;
        let result = self
            .store
            .insert_many(&self.ns, docs, InsertManyOptions::unordered())
            .await?;

        let rejected: Vec<RejectedRecord> = result
            .write_errors
            .into_iter()
            .map(|e| RejectedRecord {
                position: e.position,
                product_id: products[e.position].product_id.clone(),
                reason: e.kind,
            })
            .collect();

        for r in &rejected {
            warn!("Product {} was not inserted: {}", r.product_id, r.reason);
        }

        info!("Seeded {} products", result.inserted_ids.len());
        Ok((result.inserted_ids.len(), rejected))
    }

    /// Inserts or replaces products keyed on productId.
    /// Returns the number of inserted and replaced records.
    pub async fn upsert_products(&self, products: &[Product]) -> Result<(usize, usize), SeedError> {
        info!("Upserting {} products into {}...", products.len(), self.ns);

        let mut inserted = 0;
        let mut replaced = 0;

        for (product, doc) in products.iter().zip(stamped_documents(products)?) {
            let filter = Filter::eq(Product::ID_FIELD, product.product_id.as_str());
            match self.store.replace_one(&self.ns, &filter, doc, true).await? {
                ReplaceOutcome::Inserted => inserted += 1,
                ReplaceOutcome::Replaced => replaced += 1,
                ReplaceOutcome::NotFound => {}
            }
        }

        info!("Upserted products: {inserted} inserted, {replaced} replaced");
        Ok((inserted, replaced))
    }

    /// Declares the product indexes and returns their names.
    pub async fn declare_indexes(&self) -> Result<Vec<String>, SeedError> {
        let indexes = product_indexes();
        info!("Declaring {} indexes on {}...", indexes.len(), self.ns);

        let mut names = Vec::with_capacity(indexes.len());
        for index in &indexes {
            names.push(self.store.create_index(&self.ns, index).await?);
        }

        Ok(names)
    }

    /// Counts the documents in the collection.
    pub async fn count(&self) -> Result<u64, SeedError> {
        Ok(self.store.count_documents(&self.ns, &Filter::all()).await?)
    }

    /// Deletes every document of the collection. Index declarations are kept.
    ///
    /// **WARNING**: This deletes all product data. Use with caution.
    pub async fn clear_all(&self) -> Result<u64, SeedError> {
        info!("Clearing {}...", self.ns);
        let deleted = self.store.delete_many(&self.ns, &Filter::all()).await?;
        info!("Cleared {deleted} documents");
        Ok(deleted)
    }

    pub fn namespace(&self) -> &Namespace {
        &self.ns
    }

    /// Returns a reference to the store for advanced usage.
    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Serializes products with `createdAt` set to the time of writing.
fn stamped_documents(products: &[Product]) -> Result<Vec<serde_json::Value>, SeedError> {
    let now = OffsetDateTime::now_utc();
    products
        .iter()
        .map(|p| -> Result<serde_json::Value, SeedError> {
            let mut product = p.clone();
            product.created_at = now;
            Ok(serde_json::to_value(&product)?)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::sample_products;
    use catalog::{IndexModel, MemoryStore};
    use serde_json::json;

    fn seeder() -> Seeder<MemoryStore> {
        let ns = Namespace::new("ecommerce_db", "products").unwrap();
        Seeder::new(MemoryStore::new(), ns)
    }

    async fn count(seeder: &Seeder<MemoryStore>, filter: Filter) -> u64 {
        seeder
            .store()
            .count_documents(seeder.namespace(), &filter)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_clean_run() {
        let seeder = seeder();
        let report = seeder.run(&sample_products()).await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.inserted, 3);
        assert_eq!(report.document_count, 3);
        assert_eq!(
            report.indexes,
            vec!["productId_1", "category_1", "brand_1", "price_1", "tags_1"]
        );
    }

    #[tokio::test]
    async fn test_query_properties_after_seeding() {
        let seeder = seeder();
        seeder.run(&sample_products()).await.unwrap();

        assert_eq!(count(&seeder, Filter::eq("inStock", true)).await, 2);
        assert_eq!(count(&seeder, Filter::eq("inStock", false)).await, 1);
        assert_eq!(count(&seeder, Filter::eq("category", "Electronics")).await, 1);
        assert_eq!(count(&seeder, Filter::eq("productId", "PROD002")).await, 1);
        assert_eq!(count(&seeder, Filter::contains("tags", "wireless")).await, 1);
        assert_eq!(
            count(&seeder, Filter::eq("specifications.batteryLife", "20 hours")).await,
            1
        );
    }

    #[tokio::test]
    async fn test_rerun_rejects_every_record() {
        let seeder = seeder();
        seeder.run(&sample_products()).await.unwrap();

        let report = seeder.run(&sample_products()).await.unwrap();

        assert_eq!(report.inserted, 0);
        assert_eq!(report.document_count, 3);
        let ids: Vec<&str> = report
            .rejected
            .iter()
            .map(|r| r.product_id.as_str())
            .collect();
        assert_eq!(ids, vec!["PROD001", "PROD002", "PROD003"]);
        assert!(report.rejected.iter().all(|r| matches!(
            &r.reason,
            WriteErrorKind::DuplicateKey { index, .. } if index == "productId_1"
        )));
    }

    #[tokio::test]
    async fn test_duplicate_insert_leaves_existing_record() {
        let seeder = seeder();
        seeder.run(&sample_products()).await.unwrap();

        let impostor = Product::new("PROD001", "Wired Headphones", "Other", 5.0, "Electronics");
        let (inserted, rejected) = seeder.seed_products(&[impostor]).await.unwrap();

        assert_eq!(inserted, 0);
        assert_eq!(rejected.len(), 1);

        let stored = seeder
            .store()
            .find_one(seeder.namespace(), &Filter::eq("productId", "PROD001"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["name"], json!("Wireless Bluetooth Headphones"));
        assert_eq!(count(&seeder, Filter::all()).await, 3);
    }

    #[tokio::test]
    async fn test_upsert_rerun_is_idempotent() {
        let seeder = seeder().with_mode(SeedMode::Upsert);

        let first = seeder.run(&sample_products()).await.unwrap();
        let second = seeder.run(&sample_products()).await.unwrap();

        assert_eq!((first.inserted, first.replaced), (3, 0));
        assert_eq!((second.inserted, second.replaced), (0, 3));
        assert!(second.is_clean());
        assert_eq!(second.document_count, 3);
    }

    #[tokio::test]
    async fn test_reset_makes_insert_rerunnable() {
        let seeder = seeder();
        seeder.run(&sample_products()).await.unwrap();

        let seeder = seeder.with_reset(true);
        let report = seeder.run(&sample_products()).await.unwrap();

        assert_eq!(report.cleared, 3);
        assert!(report.is_clean());
        assert_eq!(report.document_count, 3);
    }

    #[tokio::test]
    async fn test_conflicting_index_aborts() {
        let seeder = seeder();
        seeder
            .store()
            .create_index(seeder.namespace(), &IndexModel::scalar("productId"))
            .await
            .unwrap();

        let result = seeder.run(&sample_products()).await;

        assert!(matches!(
            result,
            Err(SeedError::Store(StoreError::IndexConflict { .. }))
        ));
    }

    #[tokio::test]
    async fn test_invalid_data_touches_nothing() {
        let seeder = seeder();
        let mut products = sample_products();
        products[1].price = -10.0;

        let result = seeder.run(&products).await;

        assert!(matches!(result, Err(SeedError::InvalidData(_))));
        assert_eq!(count(&seeder, Filter::all()).await, 0);
    }
}
