//! Keyword aliases consulted before generic catalog name matching.
//!
//! Operators write "iced coffee", "zobo" or "wings" rather than catalog names, so a
//! fixed keyword table maps those shorthands to catalog ids. Matching is a
//! case-insensitive substring test; the longest matching keyword wins and equal
//! lengths keep whichever rule appears first in the table.

use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRule {
    pub keyword: String,
    pub product_id: ProductId,
    pub category: String,
}

impl AliasRule {
    pub fn new(
        keyword: impl Into<String>,
        product_id: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            keyword: keyword.into().to_lowercase(),
            product_id: ProductId::new(product_id),
            category: category.into(),
        }
    }

    fn keyword_len(&self) -> usize {
        self.keyword.chars().count()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AliasTable {
    rules: Vec<AliasRule>,
}

impl AliasTable {
    pub fn new(rules: Vec<AliasRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| AliasRule { keyword: rule.keyword.trim().to_lowercase(), ..rule })
            .filter(|rule| !rule.keyword.is_empty())
            .collect();
        Self { rules }
    }

    /// Shorthands used in the cafe's daily reports, keyed to the default catalog ids.
    pub fn builtin() -> Self {
        const RULES: &[(&str, &str, &str)] = &[
            ("pancake", "p01", "Cafe"),
            ("smoothie", "p02", "Cafe"),
            ("book", "p03", "Retail"),
            ("puff", "p04", "Cafe"),
            ("wrap", "p05", "Cafe"),
            ("chicken wrap", "p05", "Cafe"),
            ("wing", "p06", "Cafe"),
            ("chicken wings", "p06", "Cafe"),
            ("tapioca", "p07", "Cafe"),
            ("coffee", "p08", "Cafe"),
            ("iced coffee", "p09", "Cafe"),
            ("ice coffee", "p09", "Cafe"),
            ("zobo", "p10", "Cafe"),
            ("combo", "p11", "Cafe"),
            ("parfait", "p12", "Cafe"),
            ("granola", "p13", "Packaged"),
            ("flakes", "p14", "Packaged"),
            ("cashew", "p15", "Packaged"),
            ("ccb", "p16", "Packaged"),
            ("wholesale", "p17", "B2B"),
            ("b2b", "p17", "B2B"),
            ("take away", "p18", "Cafe"),
            ("takeaway pack", "p18", "Cafe"),
            ("water", "p19", "Cafe"),
            ("space", "p20", "Other"),
            ("rental", "p20", "Other"),
        ];

        Self::new(
            RULES
                .iter()
                .map(|(keyword, product_id, category)| {
                    AliasRule::new(*keyword, *product_id, *category)
                })
                .collect(),
        )
    }

    pub fn rules(&self) -> &[AliasRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Longest keyword contained in `description`; the first rule wins on equal length.
    pub fn best_match(&self, description: &str) -> Option<&AliasRule> {
        let haystack = description.to_lowercase();
        let mut best: Option<&AliasRule> = None;

        for rule in self.rules.iter().filter(|rule| haystack.contains(&rule.keyword)) {
            match best {
                Some(current) if current.keyword_len() >= rule.keyword_len() => {}
                _ => best = Some(rule),
            }
        }

        best
    }
}
