use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::errors::DomainError;

pub const WALK_IN_CUSTOMER: &str = "Walk-in";

/// Largest item quantity a report line or review edit may carry.
pub const MAX_ITEM_QUANTITY: i64 = 10_000;
/// Quantities finer than this many decimal places are rejected.
pub const MAX_QUANTITY_SCALE: u32 = 3;
/// Largest total or unit price, in whole currency units.
pub const MAX_MONEY_UNITS: i64 = 1_000_000_000_000;

/// Quantity the price arithmetic can carry without overflowing.
pub fn quantity_in_range(quantity: Decimal) -> bool {
    quantity > Decimal::ZERO
        && quantity <= Decimal::from(MAX_ITEM_QUANTITY)
        && quantity.normalize().scale() <= MAX_QUANTITY_SCALE
}

pub fn money_in_range(amount: Decimal) -> bool {
    amount >= Decimal::ZERO && amount <= Decimal::from(MAX_MONEY_UNITS)
}

/// Rounds a currency amount to whole units, half-to-even.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the resolver arrived at a product match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Matched through the alias table.
    High,
    /// Matched by catalog name substring.
    Medium,
    /// Not matched; the stub needs a reviewer.
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn needs_review(&self) -> bool {
        matches!(self, Self::Low)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    DineIn,
    TakeOut,
    Delivery,
}

impl OrderType {
    pub const ALL: [OrderType; 3] = [Self::DineIn, Self::TakeOut, Self::Delivery];

    pub fn label(&self) -> &'static str {
        match self {
            Self::DineIn => "Dine-in",
            Self::TakeOut => "Take-out",
            Self::Delivery => "Delivery",
        }
    }
}

impl std::str::FromStr for OrderType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace(['-', '_'], " ").as_str() {
            "dine in" => Ok(Self::DineIn),
            "take out" | "takeout" => Ok(Self::TakeOut),
            "delivery" => Ok(Self::Delivery),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported order type `{other}` (expected dine-in|take-out|delivery)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Pos,
    Opay,
    BankTransfer,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [Self::Cash, Self::Pos, Self::Opay, Self::BankTransfer];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Cash => "Cash",
            Self::Pos => "POS",
            Self::Opay => "Opay",
            Self::BankTransfer => "Bank Transfer",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace(['-', '_'], " ").as_str() {
            "cash" => Ok(Self::Cash),
            "pos" => Ok(Self::Pos),
            "opay" => Ok(Self::Opay),
            "bank transfer" | "transfer" => Ok(Self::BankTransfer),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported payment method `{other}` (expected cash|pos|opay|bank_transfer)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Confirmed,
    Pending,
    Cancelled,
}

impl OrderStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Confirmed => "Confirmed",
            Self::Pending => "Pending",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "confirmed" => Ok(Self::Confirmed),
            "pending" => Ok(Self::Pending),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported order status `{other}` (expected confirmed|pending|cancelled)"
            ))),
        }
    }
}

/// One resolved line of an order draft.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemStub {
    pub quantity: Decimal,
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub category: String,
    /// Price the catalog reported when the stub was resolved; zero when unknown.
    pub catalog_unit_price: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub unit_cogs: Decimal,
    pub line_cogs: Decimal,
    pub cost_ratio: Decimal,
    pub confidence: Confidence,
    pub source_description: String,
}

impl ItemStub {
    pub fn is_matched(&self) -> bool {
        self.product_id.is_some()
    }

    /// Recomputes `line_total` from `unit_price` and then the cost fields.
    pub fn recompute_totals(&mut self) {
        self.line_total = round_money(self.unit_price * self.quantity);
        self.recompute_costs();
    }

    pub fn recompute_costs(&mut self) {
        self.unit_cogs = round_money(self.unit_price * self.cost_ratio);
        self.line_cogs = round_money(self.unit_cogs * self.quantity);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceCheck {
    pub line_sum: Decimal,
    /// `line_sum - reported_total`.
    pub diff: Decimal,
    pub balanced: bool,
}

impl BalanceCheck {
    pub fn evaluate(reported_total: Decimal, items: &[ItemStub], tolerance: Decimal) -> Self {
        let line_sum: Decimal = items.iter().map(|item| item.line_total).sum();
        let diff = line_sum - reported_total;
        Self { line_sum, diff, balanced: diff.abs() <= tolerance }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub date: NaiveDate,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub order_type: OrderType,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub reported_total: Decimal,
    pub note: String,
    pub source_line: String,
    pub items: Vec<ItemStub>,
    pub balance: BalanceCheck,
}

impl OrderDraft {
    pub fn refresh_balance(&mut self, tolerance: Decimal) {
        self.balance = BalanceCheck::evaluate(self.reported_total, &self.items, tolerance);
    }

    pub fn is_balanced(&self) -> bool {
        self.balance.balanced
    }

    pub fn total_cogs(&self) -> Decimal {
        self.items.iter().map(|item| item.line_cogs).sum()
    }

    pub fn low_confidence_items(&self) -> impl Iterator<Item = (usize, &ItemStub)> {
        self.items.iter().enumerate().filter(|(_, item)| item.confidence.needs_review())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        money_in_range, quantity_in_range, round_money, Confidence, ItemStub, OrderType,
        PaymentMethod,
    };

    fn stub(quantity: i64, unit_price: i64, cost_ratio: Decimal) -> ItemStub {
        ItemStub {
            quantity: Decimal::from(quantity),
            product_id: None,
            product_name: "Coffee".to_string(),
            category: "Cafe".to_string(),
            catalog_unit_price: Decimal::ZERO,
            unit_price: Decimal::from(unit_price),
            line_total: Decimal::ZERO,
            unit_cogs: Decimal::ZERO,
            line_cogs: Decimal::ZERO,
            cost_ratio,
            confidence: Confidence::Low,
            source_description: "coffee".to_string(),
        }
    }

    #[test]
    fn money_rounds_half_to_even() {
        assert_eq!(round_money(Decimal::new(25, 1)), Decimal::from(2));
        assert_eq!(round_money(Decimal::new(35, 1)), Decimal::from(4));
        assert_eq!(round_money(Decimal::new(2051, 3)), Decimal::from(2));
    }

    #[test]
    fn quantity_and_money_bounds() {
        assert!(quantity_in_range(Decimal::new(15, 1)));
        assert!(quantity_in_range(Decimal::from(10_000)));
        assert!(!quantity_in_range(Decimal::ZERO));
        assert!(!quantity_in_range(Decimal::from(10_001)));
        assert!(!quantity_in_range(Decimal::new(1, 4)));
        assert!(quantity_in_range(Decimal::new(1500, 3)));

        assert!(money_in_range(Decimal::ZERO));
        assert!(money_in_range(Decimal::from(1_000_000_000_000_i64)));
        assert!(!money_in_range(Decimal::from(1_000_000_000_001_i64)));
        assert!(!money_in_range(Decimal::NEGATIVE_ONE));
    }

    #[test]
    fn recompute_totals_derives_line_and_cost_figures() {
        let mut item = stub(2, 4840, Decimal::new(30, 2));
        item.recompute_totals();

        assert_eq!(item.line_total, Decimal::from(9680));
        assert_eq!(item.unit_cogs, Decimal::from(1452));
        assert_eq!(item.line_cogs, Decimal::from(2904));
    }

    #[test]
    fn labels_parse_back_into_enums() {
        for method in PaymentMethod::ALL {
            assert_eq!(method.label().parse::<PaymentMethod>().expect("payment label"), method);
        }
        for order_type in OrderType::ALL {
            assert_eq!(order_type.label().parse::<OrderType>().expect("order label"), order_type);
        }
    }
}
