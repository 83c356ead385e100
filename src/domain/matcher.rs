// src/domain/matcher.rs

use crate::domain::keys::stable_room_key;
use crate::domain::parser::ParsedRoom;
use crate::domain::room::TrackedRoom;
use std::collections::HashSet;

/// Finds the existing room that represents the same physical room as the new
/// description, by exact stable-key equality against each room's current raw
/// identifier. First hit wins; no fuzzy matching. The room set for one
/// property is expected to be small (low tens), so a linear scan is fine.
///
/// Two existing rooms sharing a key is a data-integrity defect in the store,
/// not a runtime error; it is surfaced as a warning rather than silently
/// picking one.
pub fn match_room_index(rooms: &[TrackedRoom], raw: &str) -> Option<usize> {
    let key = stable_room_key(raw);

    let mut first: Option<usize> = None;
    for (idx, room) in rooms.iter().enumerate() {
        if stable_room_key(&room.raw_identifier) == key {
            match first {
                None => first = Some(idx),
                Some(kept) => {
                    eprintln!(
                        "⚠️ Duplicate stable key '{}' for rooms {} and {} (property {}); keeping first match",
                        key, rooms[kept].id, room.id, room.property_id
                    );
                }
            }
        }
    }
    first
}

pub fn match_room<'a>(rooms: &'a [TrackedRoom], raw: &str) -> Option<&'a TrackedRoom> {
    match_room_index(rooms, raw).map(|idx| &rooms[idx])
}

/// Fallback used only when the exact stable key found nothing: the same
/// label with a different price is more likely a re-priced room than a brand
/// new one, so a genuine price change becomes a tracked price change instead
/// of "disappeared + discovered".
///
/// Guard rails: the label must be meaningful (not "Unknown"), both sides must
/// carry a price, the candidate must still be listed and not already matched
/// this scrape. With several candidates the closest price wins.
pub fn match_price_drifted_room(
    rooms: &[TrackedRoom],
    parsed: &ParsedRoom,
    already_matched: &HashSet<i64>,
) -> Option<usize> {
    let new_price = parsed.price_monthly?;
    if parsed.room_label == "Unknown" {
        return None;
    }

    let mut best: Option<(usize, f64)> = None;
    for (idx, room) in rooms.iter().enumerate() {
        if already_matched.contains(&room.id) || !room.is_currently_listed {
            continue;
        }
        if room.room_label != parsed.room_label {
            continue;
        }
        let prev_price = match room.current_price {
            Some(p) => p,
            None => continue,
        };

        let distance = (prev_price - new_price).abs();
        match best {
            Some((_, d)) if d <= distance => {}
            _ => best = Some((idx, distance)),
        }
    }

    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::room::RoomStatus;
    use chrono::NaiveDate;

    fn room(id: i64, raw: &str) -> TrackedRoom {
        let t = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        TrackedRoom {
            id,
            property_id: 1,
            raw_identifier: raw.to_string(),
            room_label: "Room".to_string(),
            price_text: None,
            room_type: None,
            current_price: None,
            original_price: None,
            current_status: RoomStatus::Available,
            is_currently_listed: true,
            first_seen_date: t,
            last_seen_date: t,
            times_seen: 1,
            times_changed: 0,
            current_period_id: None,
            date_gone: None,
            date_returned: None,
            total_availability_periods: 0,
            average_availability_duration: None,
        }
    }

    #[test]
    fn matches_same_room_despite_status_churn() {
        let rooms = vec![
            room(1, "Room 1 - £500 pcm (En-suite)"),
            room(2, "Room 2 - £600 pcm (Double)"),
        ];

        let hit = match_room(&rooms, "Room 1 - £500 pcm (NOW LET)").unwrap();
        assert_eq!(hit.id, 1);
    }

    #[test]
    fn no_match_for_new_room() {
        let rooms = vec![room(1, "Room 1 - £500 pcm (Double)")];
        assert!(match_room(&rooms, "Room 2 - £650 pcm (Double)").is_none());
    }

    #[test]
    fn price_change_does_not_match() {
        // Price is part of the stable key, so a changed price looks like a
        // different room. Documented behavior, not an accident.
        let rooms = vec![room(1, "Room 1 - £500 pcm (Double)")];
        assert!(match_room(&rooms, "Room 1 - £520 pcm (Double)").is_none());
    }

    #[test]
    fn price_drift_fallback_matches_by_label() {
        use crate::domain::parser::parse_room_description;

        let mut existing = room(1, "Room 1 - £500 pcm (Double)");
        existing.room_label = "Room 1".to_string();
        existing.current_price = Some(500.0);
        let rooms = vec![existing];

        let parsed = parse_room_description("Room 1 - £520 pcm (Double)").unwrap();
        let idx = match_price_drifted_room(&rooms, &parsed, &HashSet::new());
        assert_eq!(idx, Some(0));
    }

    #[test]
    fn price_drift_fallback_prefers_closest_price() {
        use crate::domain::parser::parse_room_description;

        let mut far = room(1, "Room 1 - £300 pcm (Double)");
        far.room_label = "Room 1".to_string();
        far.current_price = Some(300.0);
        let mut near = room(2, "Room 1 - £510 pcm (Double)");
        near.room_label = "Room 1".to_string();
        near.current_price = Some(510.0);
        let rooms = vec![far, near];

        let parsed = parse_room_description("Room 1 - £520 pcm (Double)").unwrap();
        let idx = match_price_drifted_room(&rooms, &parsed, &HashSet::new());
        assert_eq!(idx, Some(1));
    }

    #[test]
    fn price_drift_fallback_skips_unknown_label_and_matched_rooms() {
        use crate::domain::parser::parse_room_description;

        let mut existing = room(1, "Room 1 - £500 pcm (Double)");
        existing.room_label = "Room 1".to_string();
        existing.current_price = Some(500.0);
        let rooms = vec![existing];

        let parsed = parse_room_description("Room 1 - £520 pcm (Double)").unwrap();
        let mut matched = HashSet::new();
        matched.insert(1);
        assert_eq!(match_price_drifted_room(&rooms, &parsed, &matched), None);

        let anon = parse_room_description("£520 pcm").unwrap();
        assert_eq!(anon.room_label, "Unknown");
        assert_eq!(match_price_drifted_room(&rooms, &anon, &HashSet::new()), None);
    }

    #[test]
    fn duplicate_keys_keep_first_match() {
        let rooms = vec![
            room(7, "Room 1 - £500 pcm (Double)"),
            room(9, "Room 1 - £500 pcm (Single)"),
        ];
        let hit = match_room(&rooms, "Room 1 - £500 pcm (NOW LET)").unwrap();
        assert_eq!(hit.id, 7);
    }
}
