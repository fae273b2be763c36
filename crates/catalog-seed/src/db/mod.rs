//! Database integration for seeding the catalog.
//!
//! The [`Seeder`] writes the sample products into any
//! [`DocumentStore`](catalog::DocumentStore), declares the query indexes and
//! reports what happened in a [`SeedReport`].

mod seeder;

pub use seeder::{RejectedRecord, SeedError, SeedReport, Seeder};
