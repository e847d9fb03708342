//! Operator review of one parsed batch before it is committed.
//!
//! A [`ReviewSession`] is owned by a single operator. Edits touch only the addressed
//! stub or header; nothing is re-scaled after a human sets a value, so the balance
//! flag may flip as edits land. Committing hands each draft to an [`OrderSink`] as its
//! own unit of work.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::{Catalog, CatalogLookup};
use crate::domain::order::{
    money_in_range, quantity_in_range, round_money, Confidence, ItemStub, OrderDraft, OrderId,
    OrderStatus, OrderType, PaymentMethod, MAX_ITEM_QUANTITY, MAX_MONEY_UNITS, MAX_QUANTITY_SCALE,
};
use crate::domain::product::ProductId;
use crate::errors::{ApplicationError, DomainError, InterfaceError};
use crate::intake::extract::{normalize_customer, normalize_phone};
use crate::intake::ParseOutcome;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Empty,
    Parsed,
    Committed,
    Discarded,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Discarded)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemEdit {
    Product(ProductId),
    Quantity(Decimal),
    UnitPrice(Decimal),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeaderEdit {
    Customer(String),
    Phone(Option<String>),
    PaymentMethod(PaymentMethod),
    OrderType(OrderType),
    Status(OrderStatus),
    Note(String),
}

/// Persistence collaborator that stores one reviewed draft.
#[async_trait]
pub trait OrderSink: Send + Sync {
    async fn save(&self, draft: &OrderDraft) -> Result<OrderId, ApplicationError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommittedOrder {
    pub order_idx: usize,
    pub order_id: OrderId,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CommitFailure {
    pub order_idx: usize,
    pub error: String,
    /// Operator-facing summary of `error`.
    pub user_message: &'static str,
    /// The draft as it stood at commit time, for a retry in a fresh session.
    pub draft: OrderDraft,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CommitReport {
    pub committed: Vec<CommittedOrder>,
    pub failures: Vec<CommitFailure>,
}

impl CommitReport {
    pub fn committed_count(&self) -> usize {
        self.committed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn order_ids(&self) -> impl Iterator<Item = &OrderId> {
        self.committed.iter().map(|entry| &entry.order_id)
    }

    pub fn failed_drafts(&self) -> Vec<OrderDraft> {
        self.failures.iter().map(|failure| failure.draft.clone()).collect()
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("no orders were found in the report ({lines_scanned} lines scanned)")]
    NoOrdersFound { lines_scanned: usize },
    #[error(transparent)]
    Transition(#[from] DomainError),
    #[error("order index {index} is out of range ({len} orders in session)")]
    OrderIndexOutOfRange { index: usize, len: usize },
    #[error("item index {index} is out of range ({len} items on order {order_idx})")]
    ItemIndexOutOfRange { order_idx: usize, index: usize, len: usize },
    #[error("product `{0}` is not in the catalog")]
    UnknownProduct(ProductId),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ReviewError {
    /// True when the caller used the session incorrectly; retrying the same call fails again.
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            Self::Transition(_)
                | Self::OrderIndexOutOfRange { .. }
                | Self::ItemIndexOutOfRange { .. }
                | Self::UnknownProduct(_)
                | Self::InvalidValue { .. }
        )
    }
}

pub struct ReviewSession {
    state: SessionState,
    drafts: Vec<OrderDraft>,
    catalog: Arc<Catalog>,
    tolerance: Decimal,
}

impl ReviewSession {
    pub fn new(catalog: Arc<Catalog>, tolerance: Decimal) -> Self {
        Self { state: SessionState::Empty, drafts: Vec::new(), catalog, tolerance }
    }

    /// Session pre-loaded with drafts, typically the failures of an earlier commit.
    pub fn from_drafts(catalog: Arc<Catalog>, tolerance: Decimal, drafts: Vec<OrderDraft>) -> Self {
        let state = if drafts.is_empty() { SessionState::Empty } else { SessionState::Parsed };
        Self { state, drafts, catalog, tolerance }
    }

    /// Session built from drafts edited outside the tool, such as a saved `parse` payload.
    ///
    /// Matched stubs are re-seeded from the catalog (name, category, cost ratio) while
    /// keeping the reviewed quantity and unit price; every line total, cost figure and
    /// balance is recomputed.
    pub fn from_reviewed(
        catalog: Arc<Catalog>,
        tolerance: Decimal,
        mut drafts: Vec<OrderDraft>,
    ) -> Result<Self, ReviewError> {
        for draft in &mut drafts {
            check_money("reported_total", draft.reported_total)?;
            draft.reported_total = round_money(draft.reported_total);
            for item in &mut draft.items {
                check_quantity(item.quantity)?;
                check_money("unit_price", item.unit_price)?;
                reseed_from_catalog(&catalog, item)?;
                item.unit_price = round_money(item.unit_price);
                item.recompute_totals();
            }
            draft.refresh_balance(tolerance);
        }

        Ok(Self::from_drafts(catalog, tolerance, drafts))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn drafts(&self) -> &[OrderDraft] {
        &self.drafts
    }

    pub fn draft(&self, order_idx: usize) -> Option<&OrderDraft> {
        self.drafts.get(order_idx)
    }

    pub fn load(&mut self, outcome: ParseOutcome) -> Result<usize, ReviewError> {
        self.ensure_state(SessionState::Empty, SessionState::Parsed)?;

        match outcome {
            ParseOutcome::Orders(report) => {
                self.drafts = report.drafts;
                self.state = SessionState::Parsed;
                Ok(self.drafts.len())
            }
            ParseOutcome::NoOrdersFound { lines_scanned, .. } => {
                Err(ReviewError::NoOrdersFound { lines_scanned })
            }
        }
    }

    pub fn edit_item(
        &mut self,
        order_idx: usize,
        item_idx: usize,
        edit: ItemEdit,
    ) -> Result<(), ReviewError> {
        self.ensure_state(SessionState::Parsed, SessionState::Parsed)?;
        let catalog = Arc::clone(&self.catalog);
        let tolerance = self.tolerance;
        let draft = self.draft_mut(order_idx)?;
        let len = draft.items.len();
        let item = draft
            .items
            .get_mut(item_idx)
            .ok_or(ReviewError::ItemIndexOutOfRange { order_idx, index: item_idx, len })?;

        match edit {
            ItemEdit::Product(product_id) => {
                let entry = catalog
                    .get_by_id(&product_id)
                    .ok_or_else(|| ReviewError::UnknownProduct(product_id.clone()))?;
                item.product_id = Some(entry.id.clone());
                item.product_name = entry.name.clone();
                item.category = entry.category.clone();
                item.cost_ratio = entry.cost_ratio;
                item.catalog_unit_price = entry.default_unit_price;
                item.unit_price = entry.default_unit_price;
                item.confidence = Confidence::High;
            }
            ItemEdit::Quantity(quantity) => {
                check_quantity(quantity)?;
                item.quantity = quantity;
            }
            ItemEdit::UnitPrice(unit_price) => {
                check_money("unit_price", unit_price)?;
                item.unit_price = round_money(unit_price);
            }
        }

        item.recompute_totals();
        draft.refresh_balance(tolerance);
        Ok(())
    }

    pub fn edit_order_header(
        &mut self,
        order_idx: usize,
        edit: HeaderEdit,
    ) -> Result<(), ReviewError> {
        self.ensure_state(SessionState::Parsed, SessionState::Parsed)?;
        let draft = self.draft_mut(order_idx)?;

        match edit {
            HeaderEdit::Customer(name) => draft.customer_name = normalize_customer(&name),
            HeaderEdit::Phone(phone) => {
                draft.customer_phone = phone.as_deref().and_then(normalize_phone)
            }
            HeaderEdit::PaymentMethod(method) => draft.payment_method = method,
            HeaderEdit::OrderType(order_type) => draft.order_type = order_type,
            HeaderEdit::Status(status) => draft.status = status,
            HeaderEdit::Note(note) => draft.note = note.trim().to_string(),
        }

        Ok(())
    }

    pub fn discard(&mut self) -> Result<(), ReviewError> {
        if self.state.is_terminal() {
            return Err(self.transition_error(SessionState::Discarded));
        }

        self.drafts.clear();
        self.state = SessionState::Discarded;
        info!(event_name = "review.session.discarded", "review session discarded");
        Ok(())
    }

    /// Saves every draft through `sink`, continuing past failures.
    pub async fn commit(&mut self, sink: &dyn OrderSink) -> Result<CommitReport, ReviewError> {
        self.ensure_state(SessionState::Parsed, SessionState::Committed)?;

        let mut report = CommitReport::default();
        for (order_idx, draft) in self.drafts.iter().enumerate() {
            match sink.save(draft).await {
                Ok(order_id) => {
                    info!(
                        event_name = "review.commit.order_saved",
                        order_idx,
                        order_id = %order_id,
                        "order committed"
                    );
                    report.committed.push(CommittedOrder { order_idx, order_id });
                }
                Err(error) => {
                    warn!(
                        event_name = "review.commit.order_failed",
                        order_idx,
                        error = %error,
                        "order commit failed"
                    );
                    report.failures.push(CommitFailure {
                        order_idx,
                        error: error.to_string(),
                        user_message: InterfaceError::from(error).user_message(),
                        draft: draft.clone(),
                    });
                }
            }
        }

        self.state = SessionState::Committed;
        info!(
            event_name = "review.commit.completed",
            committed = report.committed_count(),
            failed = report.failures.len(),
            "review session committed"
        );
        Ok(report)
    }

    fn draft_mut(&mut self, order_idx: usize) -> Result<&mut OrderDraft, ReviewError> {
        let len = self.drafts.len();
        self.drafts
            .get_mut(order_idx)
            .ok_or(ReviewError::OrderIndexOutOfRange { index: order_idx, len })
    }

    fn ensure_state(&self, required: SessionState, to: SessionState) -> Result<(), ReviewError> {
        if self.state == required {
            Ok(())
        } else {
            Err(self.transition_error(to))
        }
    }

    fn transition_error(&self, to: SessionState) -> ReviewError {
        ReviewError::Transition(DomainError::InvalidSessionTransition { from: self.state, to })
    }
}

fn check_quantity(quantity: Decimal) -> Result<(), ReviewError> {
    if quantity_in_range(quantity) {
        return Ok(());
    }
    Err(ReviewError::InvalidValue {
        field: "quantity",
        reason: format!(
            "must be positive and at most {MAX_ITEM_QUANTITY} \
             with up to {MAX_QUANTITY_SCALE} decimals, got {quantity}"
        ),
    })
}

fn check_money(field: &'static str, amount: Decimal) -> Result<(), ReviewError> {
    if money_in_range(amount) {
        return Ok(());
    }
    Err(ReviewError::InvalidValue {
        field,
        reason: format!("must be between 0 and {MAX_MONEY_UNITS}, got {amount}"),
    })
}

fn reseed_from_catalog(catalog: &Catalog, item: &mut ItemStub) -> Result<(), ReviewError> {
    if !item.is_matched() {
        if item.cost_ratio < Decimal::ZERO || item.cost_ratio > Decimal::ONE {
            return Err(ReviewError::InvalidValue {
                field: "cost_ratio",
                reason: format!("must be between 0 and 1, got {}", item.cost_ratio),
            });
        }
        return Ok(());
    }

    let Some(product_id) = item.product_id.as_ref() else {
        return Ok(());
    };
    let entry = catalog
        .get_by_id(product_id)
        .ok_or_else(|| ReviewError::UnknownProduct(product_id.clone()))?;
    item.product_name = entry.name.clone();
    item.category = entry.category.clone();
    item.cost_ratio = entry.cost_ratio;
    item.catalog_unit_price = entry.default_unit_price;
    Ok(())
}
