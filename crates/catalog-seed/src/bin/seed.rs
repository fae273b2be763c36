//! Seeds the product catalog with the sample records and query indexes.
//!
//! Run with:
//! ```
//! cargo run -p catalog-seed --bin seed
//! ```
//!
//! Set `SEED_MODE=upsert` to make re-runs idempotent, `SEED_RESET=true` to
//! clear the collection first, or `SEED_DRY_RUN=true` to seed an in-memory
//! store without touching the database.

use catalog::{DocumentStore, MemoryStore, PgDocumentStore};
use catalog_seed::config::SeedConfig;
use catalog_seed::dataset::sample_products;
use catalog_seed::db::{SeedReport, Seeder};
use tracing_subscriber::EnvFilter;

async fn seed<S: DocumentStore>(store: S, config: &SeedConfig) -> anyhow::Result<SeedReport> {
    let seeder = Seeder::from_config(store, config)?;
    Ok(seeder.run(&sample_products()).await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = SeedConfig::from_env()?;

    let report = if config.dry_run {
        tracing::info!("Dry run: seeding an in-memory store");
        seed(MemoryStore::new(), &config).await?
    } else {
        let store = PgDocumentStore::connect(&config.database_url).await?;
        tracing::info!("Connected to database");
        seed(store, &config).await?
    };

    // Summary output
    tracing::info!("Seed completed!");
    tracing::info!("  Mode: {:?}", config.mode);
    tracing::info!("  Inserted: {}", report.inserted);
    tracing::info!("  Replaced: {}", report.replaced);
    tracing::info!("  Rejected: {}", report.rejected.len());
    tracing::info!("  Indexes: {}", report.indexes.join(", "));
    tracing::info!("  Documents: {}", report.document_count);

    if !report.is_clean() {
        anyhow::bail!(
            "{} seed records were rejected as duplicates \
             (rerun with SEED_RESET=true or SEED_MODE=upsert)",
            report.rejected.len()
        );
    }

    Ok(())
}
