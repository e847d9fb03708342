use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use tallyline_core::catalog::Catalog;
use tallyline_core::domain::order::{OrderDraft, OrderId};
use tallyline_core::domain::product::{ProductCatalogEntry, ProductId};
use tallyline_core::errors::ApplicationError;

pub mod memory;
pub mod order;
pub mod product;

pub use memory::{InMemoryOrderRepository, InMemoryProductRepository};
pub use order::SqlOrderRepository;
pub use product::SqlProductRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &ProductId,
    ) -> Result<Option<ProductCatalogEntry>, RepositoryError>;
    async fn save(&self, product: ProductCatalogEntry) -> Result<(), RepositoryError>;
    async fn list(&self) -> Result<Vec<ProductCatalogEntry>, RepositoryError>;
}

/// A committed order as read back from the store.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoredOrder {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    pub draft: OrderDraft,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Stores the draft and its items as one unit and returns the new order id.
    async fn insert(&self, draft: &OrderDraft) -> Result<OrderId, RepositoryError>;
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<StoredOrder>, RepositoryError>;
    async fn count(&self) -> Result<u64, RepositoryError>;
}

/// Snapshot of every stored product, ordered by id.
pub async fn load_catalog(repository: &dyn ProductRepository) -> Result<Catalog, RepositoryError> {
    let mut products = repository.list().await?;
    products.sort_by(|left, right| left.id.as_str().cmp(right.id.as_str()));
    Ok(Catalog::new(products))
}

pub(crate) fn new_order_id() -> OrderId {
    OrderId(format!("ORD-{}", uuid::Uuid::new_v4()))
}

pub(crate) fn parse_decimal(field: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value)
        .map_err(|err| RepositoryError::Decode(format!("invalid {field} amount '{value}': {err}")))
}

pub(crate) fn parse_rfc3339(field: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc)).map_err(|err| {
        RepositoryError::Decode(format!("invalid {field} timestamp '{value}': {err}"))
    })
}
