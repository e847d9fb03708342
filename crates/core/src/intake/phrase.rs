use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::domain::order::quantity_in_range;

static QUANTITY_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<qty>\d+(?:\.\d+)?)\s*(?:(?:kg|g|pcs|pc|x)\b)?\s*(?P<desc>.*)$")
        .expect("quantity prefix pattern compiles")
});

const PHRASE_SEPARATORS: [char; 3] = [',', '+', '&'];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemPhrase {
    pub quantity: Decimal,
    pub description: String,
}

/// Splits an item-list fragment like `1 granola 500g, 2 zobo` into phrases, in order.
pub fn parse_item_phrases(fragment: &str) -> Vec<ItemPhrase> {
    fragment
        .split(PHRASE_SEPARATORS)
        .map(str::trim)
        .filter(|phrase| !phrase.is_empty())
        .map(parse_phrase)
        .collect()
}

pub fn parse_phrase(phrase: &str) -> ItemPhrase {
    let phrase = phrase.trim();
    let whole = || ItemPhrase { quantity: Decimal::ONE, description: phrase.to_string() };

    let Some(caps) = QUANTITY_PREFIX.captures(phrase) else {
        return whole();
    };

    let quantity = caps.name("qty").and_then(|m| m.as_str().parse::<Decimal>().ok());
    let description = caps.name("desc").map_or("", |m| m.as_str().trim());

    match quantity {
        Some(quantity) if quantity_in_range(quantity) && !description.is_empty() => {
            ItemPhrase { quantity, description: description.to_string() }
        }
        _ => whole(),
    }
}
