// src/domain/keys.rs

use crate::domain::parser::parse_room_description;

/// Derives the key used to re-identify the same physical room across scrapes.
///
/// The key is `{label_without_spaces}_{integer monthly price}` (or `unknown`
/// when no price parsed). Label alone is not unique (re-lets reuse "Room 1"
/// style labels at different prices) and price alone is not unique either, so
/// the pair is the best disambiguator a free-text source gives us.
///
/// Known limitation, kept deliberately: because the price is part of the key,
/// a genuine price change between scrapes changes the key too. The matcher
/// compensates with a label-based fallback so a repriced room is tracked as a
/// price change rather than a disappearance plus a discovery.
pub fn stable_room_key(raw: &str) -> String {
    let parsed = match parse_room_description(raw) {
        Ok(p) => p,
        Err(_) => return "Unknown_unknown".to_string(),
    };

    let label = parsed.room_label.replace(' ', "");
    let price_key = match parsed.price_monthly {
        Some(price) => (price as i64).to_string(),
        None => "unknown".to_string(),
    };

    format!("{label}_{price_key}")
}
