//! Default cafe catalog used to bootstrap a fresh database.
//!
//! Seeding is an upsert keyed on product id, so re-running it restores the default
//! names, prices and cost ratios without touching committed orders.

use rust_decimal::Decimal;
use tallyline_core::domain::product::{ProductCatalogEntry, ProductId};

use crate::repositories::{ProductRepository, RepositoryError};

/// (id, name, category, cost ratio in hundredths, default unit price)
const DEFAULT_CATALOG: &[(&str, &str, &str, i64, i64)] = &[
    ("p01", "Pancakes", "Cafe", 38, 3765),
    ("p02", "Fruit Smoothie", "Cafe", 40, 4840),
    ("p03", "Books", "Retail", 55, 0),
    ("p04", "Puff Puff", "Cafe", 30, 3765),
    ("p05", "Spicy Chicken Wrap", "Cafe", 42, 10750),
    ("p06", "Chicken Wings", "Cafe", 45, 8065),
    ("p07", "Tapioca", "Cafe", 35, 4300),
    ("p08", "Coffee", "Cafe", 28, 3765),
    ("p09", "Iced Coffee", "Cafe", 30, 4840),
    ("p10", "Zobo", "Cafe", 25, 3765),
    ("p11", "Parfait & Wings Combo", "Cafe", 45, 8600),
    ("p12", "Parfait Cafe", "Cafe", 40, 5375),
    ("p13", "Granola 500g", "Packaged", 50, 6757),
    ("p14", "Spicy Coconut Flakes", "Packaged", 48, 3765),
    ("p15", "Honey Coconut Cashew", "Packaged", 50, 0),
    ("p16", "CCB", "Packaged", 50, 0),
    ("p17", "Wholesale (B2B)", "B2B", 55, 0),
    ("p18", "Take Away", "Cafe", 40, 0),
    ("p19", "Water", "Cafe", 20, 0),
    ("p20", "Space Rental", "Other", 5, 0),
];

pub fn default_catalog_entries() -> Vec<ProductCatalogEntry> {
    DEFAULT_CATALOG
        .iter()
        .map(|(id, name, category, ratio_hundredths, price)| {
            ProductCatalogEntry::new(
                *id,
                *name,
                *category,
                Decimal::new(*ratio_hundredths, 2),
                Decimal::from(*price),
            )
        })
        .collect()
}

pub struct CatalogSeed;

impl CatalogSeed {
    pub async fn load(repository: &dyn ProductRepository) -> Result<SeedResult, RepositoryError> {
        let entries = default_catalog_entries();
        let mut products_seeded = Vec::with_capacity(entries.len());

        for entry in entries {
            products_seeded.push(entry.id.clone());
            repository.save(entry).await?;
        }

        Ok(SeedResult { products_seeded })
    }

    /// Checks every default product is present with its default price and ratio.
    pub async fn verify(
        repository: &dyn ProductRepository,
    ) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(DEFAULT_CATALOG.len());

        for expected in default_catalog_entries() {
            let stored = repository.find_by_id(&expected.id).await?;
            let matches = stored.is_some_and(|stored| {
                stored.name == expected.name
                    && stored.category == expected.category
                    && stored.cost_ratio == expected.cost_ratio
                    && stored.default_unit_price == expected.default_unit_price
            });
            checks.push((expected.id, matches));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub products_seeded: Vec<ProductId>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(ProductId, bool)>,
}
