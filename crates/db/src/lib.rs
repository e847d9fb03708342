pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use fixtures::{CatalogSeed, SeedResult, VerificationResult};
pub use repositories::{
    load_catalog, InMemoryOrderRepository, InMemoryProductRepository, OrderRepository,
    ProductRepository, RepositoryError, SqlOrderRepository, SqlProductRepository, StoredOrder,
};
