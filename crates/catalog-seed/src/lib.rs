//! Sample data seeding for the product catalog.
//!
//! This crate inserts a small fixed set of product records into a catalog
//! collection and declares the indexes the practice queries rely on.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use catalog_seed::prelude::*;
//!
//! let store = PgDocumentStore::connect(&config.database_url).await?;
//! let report = Seeder::from_config(store, &config)?
//!     .run(&sample_products())
//!     .await?;
//! assert_eq!(report.document_count, 3);
//! ```

pub mod config;
pub mod dataset;
pub mod db;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::config::{SeedConfig, SeedMode};
    pub use crate::dataset::{product_indexes, sample_products};
    pub use crate::db::{RejectedRecord, SeedReport, Seeder};
    pub use catalog::{DocumentStore, Filter, MemoryStore, Namespace, PgDocumentStore, Product};
}
