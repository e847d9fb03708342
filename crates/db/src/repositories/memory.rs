use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use tallyline_core::domain::order::{OrderDraft, OrderId};
use tallyline_core::domain::product::{ProductCatalogEntry, ProductId};
use tallyline_core::errors::ApplicationError;
use tallyline_core::review::OrderSink;

use super::{new_order_id, OrderRepository, ProductRepository, RepositoryError, StoredOrder};

#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<HashMap<String, ProductCatalogEntry>>,
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_id(
        &self,
        id: &ProductId,
    ) -> Result<Option<ProductCatalogEntry>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.get(&id.0).cloned())
    }

    async fn save(&self, product: ProductCatalogEntry) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        products.insert(product.id.0.clone(), product);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ProductCatalogEntry>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.values().cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, StoredOrder>>,
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, draft: &OrderDraft) -> Result<OrderId, RepositoryError> {
        let id = new_order_id();
        let stored = StoredOrder { id: id.clone(), created_at: Utc::now(), draft: draft.clone() };
        let mut orders = self.orders.write().await;
        orders.insert(id.0.clone(), stored);
        Ok(id)
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<StoredOrder>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.len() as u64)
    }
}

#[async_trait::async_trait]
impl OrderSink for InMemoryOrderRepository {
    async fn save(&self, draft: &OrderDraft) -> Result<OrderId, ApplicationError> {
        self.insert(draft).await.map_err(ApplicationError::from)
    }
}
