use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;

use tallyline_core::domain::order::{
    BalanceCheck, Confidence, ItemStub, OrderDraft, OrderId, OrderStatus, OrderType, PaymentMethod,
};
use tallyline_core::domain::product::ProductId;
use tallyline_core::errors::ApplicationError;
use tallyline_core::review::OrderSink;

use super::{
    new_order_id, parse_decimal, parse_rfc3339, OrderRepository, RepositoryError, StoredOrder,
};
use crate::DbPool;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SalesOrderRecord {
    pub id: String,
    pub order_date: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub order_type: String,
    pub payment_method: String,
    pub status: String,
    pub reported_total: String,
    pub line_sum: String,
    pub balanced: bool,
    pub note: String,
    pub source_line: String,
    pub created_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SalesOrderItemRecord {
    pub product_id: Option<String>,
    pub product_name: String,
    pub category: String,
    pub quantity: String,
    pub catalog_unit_price: String,
    pub unit_price: String,
    pub line_total: String,
    pub unit_cogs: String,
    pub line_cogs: String,
    pub cost_ratio: String,
    pub confidence: String,
    pub source_description: String,
}

impl TryFrom<SalesOrderItemRecord> for ItemStub {
    type Error = RepositoryError;

    fn try_from(value: SalesOrderItemRecord) -> Result<Self, Self::Error> {
        let confidence = Confidence::parse(&value.confidence).ok_or_else(|| {
            RepositoryError::Decode(format!("invalid item confidence: {}", value.confidence))
        })?;

        Ok(Self {
            quantity: parse_decimal("item quantity", &value.quantity)?,
            product_id: value.product_id.map(ProductId),
            product_name: value.product_name,
            category: value.category,
            catalog_unit_price: parse_decimal("item catalog_unit_price", &value.catalog_unit_price)?,
            unit_price: parse_decimal("item unit_price", &value.unit_price)?,
            line_total: parse_decimal("item line_total", &value.line_total)?,
            unit_cogs: parse_decimal("item unit_cogs", &value.unit_cogs)?,
            line_cogs: parse_decimal("item line_cogs", &value.line_cogs)?,
            cost_ratio: parse_decimal("item cost_ratio", &value.cost_ratio)?,
            confidence,
            source_description: value.source_description,
        })
    }
}

impl From<&ItemStub> for SalesOrderItemRecord {
    fn from(value: &ItemStub) -> Self {
        Self {
            product_id: value.product_id.as_ref().map(|id| id.0.clone()),
            product_name: value.product_name.clone(),
            category: value.category.clone(),
            quantity: money_text(value.quantity),
            catalog_unit_price: money_text(value.catalog_unit_price),
            unit_price: money_text(value.unit_price),
            line_total: money_text(value.line_total),
            unit_cogs: money_text(value.unit_cogs),
            line_cogs: money_text(value.line_cogs),
            cost_ratio: money_text(value.cost_ratio),
            confidence: value.confidence.as_str().to_string(),
            source_description: value.source_description.clone(),
        }
    }
}

fn decode_order(
    record: SalesOrderRecord,
    items: Vec<ItemStub>,
) -> Result<StoredOrder, RepositoryError> {
    let date = NaiveDate::parse_from_str(&record.order_date, "%Y-%m-%d").map_err(|err| {
        RepositoryError::Decode(format!("invalid order date '{}': {err}", record.order_date))
    })?;
    let order_type = record
        .order_type
        .parse::<OrderType>()
        .map_err(|err| RepositoryError::Decode(err.to_string()))?;
    let payment_method = record
        .payment_method
        .parse::<PaymentMethod>()
        .map_err(|err| RepositoryError::Decode(err.to_string()))?;
    let status = record
        .status
        .parse::<OrderStatus>()
        .map_err(|err| RepositoryError::Decode(err.to_string()))?;
    let reported_total = parse_decimal("order reported_total", &record.reported_total)?;
    let line_sum = parse_decimal("order line_sum", &record.line_sum)?;

    Ok(StoredOrder {
        id: OrderId(record.id),
        created_at: parse_rfc3339("order created_at", &record.created_at)?,
        draft: OrderDraft {
            date,
            customer_name: record.customer_name,
            customer_phone: record.customer_phone,
            order_type,
            payment_method,
            status,
            reported_total,
            note: record.note,
            source_line: record.source_line,
            items,
            balance: BalanceCheck {
                line_sum,
                diff: line_sum - reported_total,
                balanced: record.balanced,
            },
        },
    })
}

fn money_text(value: Decimal) -> String {
    value.normalize().to_string()
}

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn insert(&self, draft: &OrderDraft) -> Result<OrderId, RepositoryError> {
        let id = new_order_id();
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sales_order (
                id, order_date, customer_name, customer_phone, order_type, payment_method,
                status, reported_total, line_sum, total_cogs, balanced, note, source_line,
                created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id.0)
        .bind(draft.date.format("%Y-%m-%d").to_string())
        .bind(&draft.customer_name)
        .bind(&draft.customer_phone)
        .bind(draft.order_type.label())
        .bind(draft.payment_method.label())
        .bind(draft.status.label())
        .bind(money_text(draft.reported_total))
        .bind(money_text(draft.balance.line_sum))
        .bind(money_text(draft.total_cogs()))
        .bind(draft.balance.balanced)
        .bind(&draft.note)
        .bind(&draft.source_line)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        for (line_no, item) in draft.items.iter().enumerate() {
            let record = SalesOrderItemRecord::from(item);
            sqlx::query(
                r#"
                INSERT INTO sales_order_item (
                    order_id, line_no, product_id, product_name, category, quantity,
                    catalog_unit_price, unit_price, line_total, unit_cogs, line_cogs,
                    cost_ratio, confidence, source_description
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id.0)
            .bind(line_no as i64)
            .bind(&record.product_id)
            .bind(&record.product_name)
            .bind(&record.category)
            .bind(&record.quantity)
            .bind(&record.catalog_unit_price)
            .bind(&record.unit_price)
            .bind(&record.line_total)
            .bind(&record.unit_cogs)
            .bind(&record.line_cogs)
            .bind(&record.cost_ratio)
            .bind(&record.confidence)
            .bind(&record.source_description)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            event_name = "db.order.inserted",
            order_id = %id,
            items = draft.items.len(),
            "sales order stored"
        );
        Ok(id)
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<StoredOrder>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT
                id, order_date, customer_name, customer_phone, order_type, payment_method,
                status, reported_total, line_sum, balanced, note, source_line, created_at
            FROM sales_order
            WHERE id = ?
            "#,
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let record = sales_order_record_from_row(&row)?;

        let item_rows = sqlx::query(
            r#"
            SELECT
                product_id, product_name, category, quantity, catalog_unit_price, unit_price,
                line_total, unit_cogs, line_cogs, cost_ratio, confidence, source_description
            FROM sales_order_item
            WHERE order_id = ?
            ORDER BY line_no ASC
            "#,
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        let items = item_rows
            .iter()
            .map(|row| sales_order_item_record_from_row(row).and_then(ItemStub::try_from))
            .collect::<Result<Vec<_>, _>>()?;

        decode_order(record, items).map(Some)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM sales_order").fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl OrderSink for SqlOrderRepository {
    async fn save(&self, draft: &OrderDraft) -> Result<OrderId, ApplicationError> {
        self.insert(draft).await.map_err(ApplicationError::from)
    }
}

fn sales_order_record_from_row(row: &SqliteRow) -> Result<SalesOrderRecord, RepositoryError> {
    Ok(SalesOrderRecord {
        id: row.try_get("id")?,
        order_date: row.try_get("order_date")?,
        customer_name: row.try_get("customer_name")?,
        customer_phone: row.try_get("customer_phone")?,
        order_type: row.try_get("order_type")?,
        payment_method: row.try_get("payment_method")?,
        status: row.try_get("status")?,
        reported_total: row.try_get("reported_total")?,
        line_sum: row.try_get("line_sum")?,
        balanced: row.try_get("balanced")?,
        note: row.try_get("note")?,
        source_line: row.try_get("source_line")?,
        created_at: row.try_get("created_at")?,
    })
}

fn sales_order_item_record_from_row(
    row: &SqliteRow,
) -> Result<SalesOrderItemRecord, RepositoryError> {
    Ok(SalesOrderItemRecord {
        product_id: row.try_get("product_id")?,
        product_name: row.try_get("product_name")?,
        category: row.try_get("category")?,
        quantity: row.try_get("quantity")?,
        catalog_unit_price: row.try_get("catalog_unit_price")?,
        unit_price: row.try_get("unit_price")?,
        line_total: row.try_get("line_total")?,
        unit_cogs: row.try_get("unit_cogs")?,
        line_cogs: row.try_get("line_cogs")?,
        cost_ratio: row.try_get("cost_ratio")?,
        confidence: row.try_get("confidence")?,
        source_description: row.try_get("source_description")?,
    })
}
