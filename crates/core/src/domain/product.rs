use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One sellable product as the catalog collaborator knows it.
///
/// `default_unit_price` is in whole currency units; zero means the catalog has no
/// price on record and reconciliation must infer one from the reported total.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCatalogEntry {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub cost_ratio: Decimal,
    pub default_unit_price: Decimal,
}

impl ProductCatalogEntry {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        cost_ratio: Decimal,
        default_unit_price: Decimal,
    ) -> Self {
        Self {
            id: ProductId::new(id),
            name: name.into(),
            category: category.into(),
            cost_ratio,
            default_unit_price,
        }
    }
}
