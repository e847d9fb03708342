use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::IntakeConfig;
use crate::domain::order::{round_money, BalanceCheck, Confidence, ItemStub};

pub const UNKNOWN_ITEM_NAME: &str = "Unknown Item";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ReconciliationStrategy {
    /// No items were listed; one placeholder stub carries the whole total.
    Synthesized,
    /// No stub had a catalog price.
    EvenSplit,
    Scaled { scale: Decimal },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reconciliation {
    pub items: Vec<ItemStub>,
    pub strategy: ReconciliationStrategy,
    pub balance: BalanceCheck,
}

pub trait ReconciliationEngine: Send + Sync {
    fn reconcile(&self, reported_total: Decimal, items: Vec<ItemStub>) -> Reconciliation;
}

/// Scales catalog prices so the lines add up to the reported total.
#[derive(Clone, Debug, Default)]
pub struct ProportionalReconciliation {
    defaults: IntakeConfig,
}

impl ProportionalReconciliation {
    pub fn new(defaults: IntakeConfig) -> Self {
        Self { defaults }
    }

    fn synthesize(&self, reported_total: Decimal) -> ItemStub {
        let mut stub = ItemStub {
            quantity: Decimal::ONE,
            product_id: None,
            product_name: UNKNOWN_ITEM_NAME.to_string(),
            category: self.defaults.default_category.clone(),
            catalog_unit_price: Decimal::ZERO,
            unit_price: reported_total,
            line_total: Decimal::ZERO,
            unit_cogs: Decimal::ZERO,
            line_cogs: Decimal::ZERO,
            cost_ratio: self.defaults.default_cost_ratio,
            confidence: Confidence::Low,
            source_description: String::new(),
        };
        stub.recompute_totals();
        stub
    }

    fn split_evenly(&self, reported_total: Decimal, items: &mut [ItemStub]) {
        let count = Decimal::from(items.len());
        let share = round_money(reported_total / count);
        let mut drift = share * count - reported_total;

        for item in items.iter_mut() {
            item.line_total = share;
            if drift.abs() > self.defaults.balance_tolerance {
                let step =
                    if drift.is_sign_positive() { Decimal::ONE } else { Decimal::NEGATIVE_ONE };
                item.line_total -= step;
                drift -= step;
            }
            item.unit_price = round_money(item.line_total / item.quantity);
            item.recompute_costs();
        }
    }

    fn scale_to_total(
        &self,
        reported_total: Decimal,
        known_total: Decimal,
        items: &mut [ItemStub],
    ) -> Decimal {
        let scale = reported_total / known_total;
        let even_share = reported_total / Decimal::from(items.len());

        for item in items.iter_mut() {
            item.unit_price = if item.catalog_unit_price > Decimal::ZERO {
                round_money(item.catalog_unit_price * scale)
            } else {
                round_money(even_share / item.quantity)
            };
            item.recompute_totals();
        }

        scale
    }
}

impl ReconciliationEngine for ProportionalReconciliation {
    fn reconcile(&self, reported_total: Decimal, mut items: Vec<ItemStub>) -> Reconciliation {
        let strategy = if items.is_empty() {
            items.push(self.synthesize(reported_total));
            ReconciliationStrategy::Synthesized
        } else {
            let known_total: Decimal = items
                .iter()
                .filter(|item| item.catalog_unit_price > Decimal::ZERO)
                .map(|item| item.quantity * item.catalog_unit_price)
                .sum();

            if known_total.is_zero() {
                self.split_evenly(reported_total, &mut items);
                ReconciliationStrategy::EvenSplit
            } else {
                let scale = self.scale_to_total(reported_total, known_total, &mut items);
                ReconciliationStrategy::Scaled { scale }
            }
        };

        let balance =
            BalanceCheck::evaluate(reported_total, &items, self.defaults.balance_tolerance);
        Reconciliation { items, strategy, balance }
    }
}
