//! Product catalog model and document-store access.
//!
//! Products are stored as JSON documents in a [`store::DocumentStore`]. Two
//! stores are provided: [`store::PgDocumentStore`] keeps each collection in a
//! PostgreSQL table of JSONB documents, [`store::MemoryStore`] keeps them in
//! process.

pub mod errors;
pub mod filter;
pub mod models;
pub mod query_builder;
pub mod store;

pub use errors::{StoreError, WriteError, WriteErrorKind};
pub use filter::Filter;
pub use models::{Product, ProductError, SpecValue};
pub use store::{
    DocumentStore, IndexKind, IndexModel, InsertManyOptions, InsertManyResult, MemoryStore,
    Namespace, PgDocumentStore, ReplaceOutcome,
};
