//! Integration tests for seeding a PostgreSQL-backed catalog.
//!
//! These tests verify end-to-end behavior against a real database:
//! - A clean run inserts the sample products and declares five indexes
//! - Query filters return the expected subsets
//! - Re-running in insert mode rejects every record without changing the count
//! - Upsert mode and reset make re-runs succeed
//! - Index conflicts, unregistered indexes and a dropped catalog are errors
//!
//! To run these tests, set DATABASE_URL to a PostgreSQL database the user may
//! create schemas in.
//!
//! Run with: `DATABASE_URL=postgres://... cargo nextest run -p catalog-seed seed_postgres`
//!
//! Note: Every test seeds its own uniquely named catalog schema and drops it
//! afterwards, so they can safely run against a development database.

use std::env;

use catalog::{DocumentStore, Filter, IndexModel, Namespace, PgDocumentStore, StoreError};
use catalog_seed::config::SeedMode;
use catalog_seed::dataset::sample_products;
use catalog_seed::db::{SeedError, Seeder};
use serde_json::json;
use uuid::Uuid;

/// Get a store, skipping tests if DATABASE_URL is not set.
async fn get_test_store() -> Option<PgDocumentStore> {
    let database_url = match env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: DATABASE_URL not set");
            return None;
        }
    };

    match PgDocumentStore::connect(&database_url).await {
        Ok(store) => Some(store),
        Err(e) => {
            eprintln!("Skipping test: Failed to connect to database: {e}");
            None
        }
    }
}

/// Namespace in a fresh catalog schema.
fn test_namespace() -> Namespace {
    let catalog = format!("seed_test_{}", Uuid::new_v4().simple());
    Namespace::new(catalog, "products").expect("valid namespace")
}

/// Cleanup helper to remove the test catalog.
async fn cleanup(store: &PgDocumentStore, ns: &Namespace) {
    let _ = store.drop_catalog(ns.catalog()).await;
}

#[tokio::test]
async fn test_clean_run_and_queries() {
    let Some(store) = get_test_store().await else {
        return;
    };
    let ns = test_namespace();
    let seeder = Seeder::new(store.clone(), ns.clone());

    let report = seeder
        .run(&sample_products())
        .await
        .expect("Failed to seed catalog");

    assert!(report.is_clean());
    assert_eq!(report.document_count, 3);
    assert_eq!(report.indexes.len(), 5);

    let count = |filter: Filter| {
        let store = store.clone();
        let ns = ns.clone();
        async move { store.count_documents(&ns, &filter).await.unwrap() }
    };

    assert_eq!(count(Filter::eq("inStock", true)).await, 2);
    assert_eq!(count(Filter::eq("inStock", false)).await, 1);
    assert_eq!(count(Filter::eq("category", "Electronics")).await, 1);
    assert_eq!(count(Filter::eq("productId", "PROD003")).await, 1);
    assert_eq!(count(Filter::contains("tags", "bluetooth")).await, 1);
    assert_eq!(count(Filter::eq("price", 199.99)).await, 1);

    let watch = store
        .find_one(&ns, &Filter::eq("productId", "PROD002"))
        .await
        .unwrap()
        .expect("PROD002 should exist");
    assert_eq!(watch["brand"], json!("FitTech"));
    assert_eq!(watch["specifications"]["waterResistant"], json!("5ATM"));

    cleanup(&store, &ns).await;
}

#[tokio::test]
async fn test_insert_rerun_reports_duplicates() {
    let Some(store) = get_test_store().await else {
        return;
    };
    let ns = test_namespace();
    let seeder = Seeder::new(store.clone(), ns.clone());

    seeder.run(&sample_products()).await.expect("first run");
    let report = seeder.run(&sample_products()).await.expect("second run");

    assert_eq!(report.inserted, 0);
    assert_eq!(report.rejected.len(), 3);
    assert!(
        report
            .rejected
            .iter()
            .all(|r| r.reason.to_string().contains("productId_1"))
    );
    assert_eq!(report.document_count, 3);

    cleanup(&store, &ns).await;
}

#[tokio::test]
async fn test_upsert_and_reset_reruns() {
    let Some(store) = get_test_store().await else {
        return;
    };
    let ns = test_namespace();

    let upsert = Seeder::new(store.clone(), ns.clone()).with_mode(SeedMode::Upsert);
    upsert.run(&sample_products()).await.expect("first upsert");
    let report = upsert.run(&sample_products()).await.expect("second upsert");
    assert_eq!(report.replaced, 3);
    assert_eq!(report.document_count, 3);

    let reset = Seeder::new(store.clone(), ns.clone()).with_reset(true);
    let report = reset.run(&sample_products()).await.expect("reset run");
    assert_eq!(report.cleared, 3);
    assert!(report.is_clean());
    assert_eq!(report.document_count, 3);

    cleanup(&store, &ns).await;
}

#[tokio::test]
async fn test_index_redeclaration() {
    let Some(store) = get_test_store().await else {
        return;
    };
    let ns = test_namespace();
    let seeder = Seeder::new(store.clone(), ns.clone());
    seeder.run(&sample_products()).await.expect("seed");

    let names = seeder.declare_indexes().await.expect("redeclare");
    assert_eq!(names.len(), 5);

    let conflict = store
        .create_index(&ns, &IndexModel::scalar("productId"))
        .await;
    assert!(matches!(conflict, Err(StoreError::IndexConflict { .. })));

    let result = seeder.seed_products(&sample_products()[..1]).await;
    assert!(matches!(result, Ok((0, ref rejected)) if rejected.len() == 1));

    // Seeding errors that are not write rejections still abort.
    let bad = Seeder::new(store.clone(), ns.clone());
    let mut products = sample_products();
    products[0].product_id.clear();
    assert!(matches!(
        bad.run(&products).await,
        Err(SeedError::InvalidData(_))
    ));

    cleanup(&store, &ns).await;
}

#[tokio::test]
async fn test_second_index_on_same_field_conflicts() {
    let Some(store) = get_test_store().await else {
        return;
    };
    let ns = test_namespace();
    let seeder = Seeder::new(store.clone(), ns.clone());
    seeder.run(&sample_products()).await.expect("seed");

    let renamed = IndexModel::scalar("productId").unique(true).named("pid");
    let conflict = store.create_index(&ns, &renamed).await;
    assert!(matches!(
        conflict,
        Err(StoreError::IndexConflict { ref name, .. }) if name == "productId_1"
    ));

    let names = seeder.declare_indexes().await.expect("redeclare");
    assert_eq!(names.len(), 5);

    cleanup(&store, &ns).await;
}

#[tokio::test]
async fn test_unregistered_physical_index_is_reported() {
    let Some(store) = get_test_store().await else {
        return;
    };
    let ns = test_namespace();
    let seeder = Seeder::new(store.clone(), ns.clone());
    seeder
        .seed_products(&sample_products())
        .await
        .expect("seed products");

    // Index left behind without a row in _indexes.
    sqlx::query(&format!(
        r#"CREATE INDEX "products_brand_1" ON "{}"."products" ((doc #> '{{brand}}'))"#,
        ns.catalog()
    ))
    .execute(store.pool())
    .await
    .expect("create physical index");

    let result = store.create_index(&ns, &IndexModel::scalar("brand")).await;
    assert!(matches!(result, Err(StoreError::InvalidIndex(_))));

    cleanup(&store, &ns).await;
}

#[tokio::test]
async fn test_dropped_catalog_fails_the_run() {
    let Some(store) = get_test_store().await else {
        return;
    };
    let ns = test_namespace();
    let seeder = Seeder::new(store.clone(), ns.clone());
    seeder.run(&sample_products()).await.expect("first run");

    // Dropped behind the store's back, so its collection cache is stale.
    sqlx::query(&format!(r#"DROP SCHEMA "{}" CASCADE"#, ns.catalog()))
        .execute(store.pool())
        .await
        .expect("drop schema");

    let result = seeder.run(&sample_products()).await;
    assert!(matches!(
        result,
        Err(SeedError::Store(StoreError::Database(_)))
    ));

    cleanup(&store, &ns).await;
}
