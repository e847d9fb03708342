use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};
use tallyline_core::domain::product::{ProductCatalogEntry, ProductId};

use super::{parse_decimal, ProductRepository, RepositoryError};
use crate::DbPool;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    pub category: String,
    pub cost_ratio: String,
    pub default_unit_price: String,
}

impl TryFrom<ProductRecord> for ProductCatalogEntry {
    type Error = RepositoryError;

    fn try_from(value: ProductRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ProductId(value.id),
            name: value.name,
            category: value.category,
            cost_ratio: parse_decimal("product cost_ratio", &value.cost_ratio)?,
            default_unit_price: parse_decimal(
                "product default_unit_price",
                &value.default_unit_price,
            )?,
        })
    }
}

impl From<&ProductCatalogEntry> for ProductRecord {
    fn from(value: &ProductCatalogEntry) -> Self {
        Self {
            id: value.id.0.clone(),
            name: value.name.clone(),
            category: value.category.clone(),
            cost_ratio: value.cost_ratio.normalize().to_string(),
            default_unit_price: value.default_unit_price.normalize().to_string(),
        }
    }
}

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn find_by_id(
        &self,
        id: &ProductId,
    ) -> Result<Option<ProductCatalogEntry>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, category, cost_ratio, default_unit_price FROM product WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| product_record_from_row(&r).and_then(ProductCatalogEntry::try_from))
            .transpose()
    }

    async fn save(&self, product: ProductCatalogEntry) -> Result<(), RepositoryError> {
        let record = ProductRecord::from(&product);
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO product (
                id, name, category, cost_ratio, default_unit_price, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category,
                cost_ratio = excluded.cost_ratio,
                default_unit_price = excluded.default_unit_price,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.category)
        .bind(&record.cost_ratio)
        .bind(&record.default_unit_price)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<ProductCatalogEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, category, cost_ratio, default_unit_price FROM product ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| product_record_from_row(row).and_then(ProductCatalogEntry::try_from))
            .collect()
    }
}

fn product_record_from_row(row: &SqliteRow) -> Result<ProductRecord, RepositoryError> {
    Ok(ProductRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        cost_ratio: row.try_get("cost_ratio")?,
        default_unit_price: row.try_get("default_unit_price")?,
    })
}
