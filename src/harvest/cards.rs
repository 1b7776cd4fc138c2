//! Job card discovery in list markup

use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;

fn list_item_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("li").expect("li is a valid selector"))
}

/// A card found in the job list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRef {
    /// Stable record identifier
    pub identifier: String,
    /// DOM `id` of the card, used to click it
    pub dom_id: Option<String>,
}

/// Enumerate cards in `html`
///
/// A card is an `li` with a class token containing `card_class` and a
/// non-empty `id_attribute`. Duplicates keep their first occurrence.
pub fn extract_cards(html: &str, card_class: &str, id_attribute: &str) -> Vec<CardRef> {
    let fragment = Html::parse_fragment(html);
    let mut seen = HashSet::new();
    let mut cards = Vec::new();

    for element in fragment.select(list_item_selector()) {
        let value = element.value();
        if !value.classes().any(|class| class.contains(card_class)) {
            continue;
        }

        let Some(identifier) = value.attr(id_attribute).map(str::trim).filter(|id| !id.is_empty()) else {
            continue;
        };

        if seen.insert(identifier.to_string()) {
            cards.push(CardRef {
                identifier: identifier.to_string(),
                dom_id: value.id().filter(|id| !id.is_empty()).map(|id| id.to_string()),
            });
        }
    }

    cards
}
