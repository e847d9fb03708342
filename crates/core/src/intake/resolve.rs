use rust_decimal::Decimal;
use tracing::warn;

use crate::aliases::AliasTable;
use crate::catalog::CatalogLookup;
use crate::config::IntakeConfig;
use crate::domain::order::{Confidence, ItemStub};
use crate::domain::product::ProductCatalogEntry;
use crate::intake::phrase::ItemPhrase;

/// Maps free-text item descriptions to catalog products: alias table first, then catalog
/// name search, then an unmatched low-confidence stub.
pub struct ProductResolver<'a> {
    aliases: &'a AliasTable,
    catalog: &'a dyn CatalogLookup,
    defaults: &'a IntakeConfig,
}

impl<'a> ProductResolver<'a> {
    pub fn new(
        aliases: &'a AliasTable,
        catalog: &'a dyn CatalogLookup,
        defaults: &'a IntakeConfig,
    ) -> Self {
        Self { aliases, catalog, defaults }
    }

    pub fn resolve(&self, phrase: &ItemPhrase) -> ItemStub {
        let description = phrase.description.trim();

        if let Some(rule) = self.aliases.best_match(description) {
            match self.catalog.get_by_id(&rule.product_id) {
                Some(entry) => {
                    return matched_stub(phrase, entry, rule.category.clone(), Confidence::High)
                }
                None => warn!(
                    event_name = "intake.resolve.alias_target_missing",
                    keyword = %rule.keyword,
                    product_id = %rule.product_id,
                    "alias points at a product missing from the catalog"
                ),
            }
        }

        if let Some(entry) = self.catalog.search_by_name_substring(description) {
            return matched_stub(phrase, entry, entry.category.clone(), Confidence::Medium);
        }

        self.unmatched_stub(phrase)
    }

    pub fn resolve_all(&self, phrases: &[ItemPhrase]) -> Vec<ItemStub> {
        phrases.iter().map(|phrase| self.resolve(phrase)).collect()
    }

    fn unmatched_stub(&self, phrase: &ItemPhrase) -> ItemStub {
        let mut stub = ItemStub {
            quantity: phrase.quantity,
            product_id: None,
            product_name: title_case(&phrase.description),
            category: self.defaults.default_category.clone(),
            catalog_unit_price: Decimal::ZERO,
            unit_price: Decimal::ZERO,
            line_total: Decimal::ZERO,
            unit_cogs: Decimal::ZERO,
            line_cogs: Decimal::ZERO,
            cost_ratio: self.defaults.default_cost_ratio,
            confidence: Confidence::Low,
            source_description: phrase.description.clone(),
        };
        stub.recompute_totals();
        stub
    }
}

fn matched_stub(
    phrase: &ItemPhrase,
    entry: &ProductCatalogEntry,
    category: String,
    confidence: Confidence,
) -> ItemStub {
    let mut stub = ItemStub {
        quantity: phrase.quantity,
        product_id: Some(entry.id.clone()),
        product_name: entry.name.clone(),
        category,
        catalog_unit_price: entry.default_unit_price,
        unit_price: entry.default_unit_price,
        line_total: Decimal::ZERO,
        unit_cogs: Decimal::ZERO,
        line_cogs: Decimal::ZERO,
        cost_ratio: entry.cost_ratio,
        confidence,
        source_description: phrase.description.clone(),
    };
    stub.recompute_totals();
    stub
}

pub(crate) fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
