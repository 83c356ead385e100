// src/db/rooms.rs
//
// The room lifecycle engine. One call to `analyze_property` applies a full
// scrape's worth of room descriptions to a property's tracked room set, inside
// a single transaction: either every room/period/change/price write for the
// scrape commits, or none of them do.

use crate::db::connection::Database;
use crate::db::{changes, periods, price_history, properties};
use crate::domain::matcher::{match_price_drifted_room, match_room_index};
use crate::domain::parser::{parse_room_description, ParsedRoom, ParsedStatus};
use crate::domain::room::{AnalysisSummary, ChangeType, RoomStatus, TrackedRoom};
use crate::errors::ServerError;
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use std::collections::HashSet;

/// Prices are pennies-precision; smaller drift is float noise, not a change.
const PRICE_EPSILON: f64 = 0.005;

const ROOM_COLUMNS: &str = "id, property_id, raw_identifier, room_label, price_text, room_type, \
     current_price, original_price, current_status, is_currently_listed, \
     first_seen_date, last_seen_date, times_seen, times_changed, \
     current_period_id, date_gone, date_returned, \
     total_availability_periods, average_availability_duration";

fn row_to_room(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrackedRoom> {
    let status_str: String = row.get(8)?;
    Ok(TrackedRoom {
        id: row.get(0)?,
        property_id: row.get(1)?,
        raw_identifier: row.get(2)?,
        room_label: row.get(3)?,
        price_text: row.get(4)?,
        room_type: row.get(5)?,
        current_price: row.get(6)?,
        original_price: row.get(7)?,
        current_status: RoomStatus::from_str(&status_str).unwrap_or(RoomStatus::Offline),
        is_currently_listed: row.get(9)?,
        first_seen_date: row.get(10)?,
        last_seen_date: row.get(11)?,
        times_seen: row.get(12)?,
        times_changed: row.get(13)?,
        current_period_id: row.get(14)?,
        date_gone: row.get(15)?,
        date_returned: row.get(16)?,
        total_availability_periods: row.get(17)?,
        average_availability_duration: row.get(18)?,
    })
}

pub fn get_rooms_for_property(
    conn: &Connection,
    property_id: i64,
) -> Result<Vec<TrackedRoom>, ServerError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ROOM_COLUMNS} FROM rooms WHERE property_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt.query_map(params![property_id], row_to_room)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Applies one scrape's room descriptions to the property. `expired` means
/// the scraper determined the whole listing is no longer accepting
/// applications; in that case the per-room diff is skipped entirely and every
/// available room is forced to taken instead.
pub fn analyze_property(
    db: &Database,
    property_id: i64,
    descriptions: &[String],
    analysis_id: i64,
    expired: bool,
) -> Result<AnalysisSummary, ServerError> {
    analyze_property_at(
        db,
        property_id,
        descriptions,
        analysis_id,
        expired,
        Utc::now().naive_utc(),
    )
}

/// Same as `analyze_property` with an explicit observation time, so tests can
/// replay scrapes days apart.
pub fn analyze_property_at(
    db: &Database,
    property_id: i64,
    descriptions: &[String],
    analysis_id: i64,
    expired: bool,
    now: NaiveDateTime,
) -> Result<AnalysisSummary, ServerError> {
    db.with_conn(|conn| {
        let tx = conn.transaction()?;

        let summary = if expired {
            expire_listing(&tx, property_id, analysis_id, now)?
        } else {
            run_lifecycle_pass(&tx, property_id, descriptions, analysis_id, now)?
        };

        tx.commit()?;
        Ok(summary)
    })
}

/// The normal per-scrape diff: a strictly ordered reduction over the
/// description list. Later descriptions must see the effects of earlier ones
/// (a room created by one description has to be matchable by a duplicate later
/// in the same scrape), so the in-memory room set is updated as we go.
fn run_lifecycle_pass(
    tx: &Connection,
    property_id: i64,
    descriptions: &[String],
    analysis_id: i64,
    now: NaiveDateTime,
) -> Result<AnalysisSummary, ServerError> {
    let mut rooms = get_rooms_for_property(tx, property_id)?;
    let mut matched: HashSet<i64> = HashSet::new();
    let mut summary = AnalysisSummary::default();

    for raw in descriptions {
        let parsed = match parse_room_description(raw) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("⚠️ Skipping room description for property {property_id}: {e}");
                summary.skipped_descriptions += 1;
                continue;
            }
        };

        summary.rooms_seen += 1;
        match parsed.status {
            ParsedStatus::Available => summary.available_rooms += 1,
            ParsedStatus::Taken => summary.taken_rooms += 1,
            ParsedStatus::Uncertain => summary.uncertain_rooms += 1,
        }

        // Exact stable-key match first; failing that, the documented
        // price-drift fallback so a re-priced room is tracked as a price
        // change rather than disappear + discover.
        let hit = match_room_index(&rooms, raw)
            .or_else(|| match_price_drifted_room(&rooms, &parsed, &matched));

        match hit {
            None => {
                let room = create_room(tx, property_id, raw, &parsed, analysis_id, now)?;
                matched.insert(room.id);
                rooms.push(room);
                summary.new_rooms += 1;
            }
            Some(idx) => {
                matched.insert(rooms[idx].id);
                update_matched_room(tx, &mut rooms[idx], raw, &parsed, analysis_id, now)?;
                summary.updated_rooms += 1;
            }
        }
    }

    // Anything previously listed that no scrape line matched has disappeared.
    for room in &mut rooms {
        if matched.contains(&room.id) || !room.is_currently_listed {
            continue;
        }
        mark_room_disappeared(tx, room, analysis_id, now)?;
        summary.disappeared_rooms += 1;
    }

    properties::refresh_income_estimates(tx, property_id)?;

    Ok(summary)
}

fn create_room(
    tx: &Connection,
    property_id: i64,
    raw: &str,
    parsed: &ParsedRoom,
    analysis_id: i64,
    now: NaiveDateTime,
) -> Result<TrackedRoom, ServerError> {
    let status = RoomStatus::from_parsed(parsed.status);

    tx.execute(
        r#"
        INSERT INTO rooms (
            property_id, raw_identifier, room_label, price_text, room_type,
            current_price, original_price, current_status, is_currently_listed,
            first_seen_date, last_seen_date, times_seen, times_changed
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7, 1, ?8, ?8, 1, 0)
        "#,
        params![
            property_id,
            raw,
            parsed.room_label,
            parsed.price_text,
            parsed.room_type,
            parsed.price_monthly,
            status.as_str(),
            now
        ],
    )?;
    let room_id = tx.last_insert_rowid();

    let price_part = match parsed.price_monthly {
        Some(p) => format!(" at £{p:.0} pcm"),
        None => String::new(),
    };
    changes::log_room_change(
        tx,
        room_id,
        analysis_id,
        ChangeType::Discovered,
        None,
        status.as_str(),
        &format!("Discovered {} ({}){}", parsed.room_label, status.as_str(), price_part),
        now,
    )?;

    let mut current_period_id = None;
    if status == RoomStatus::Available {
        current_period_id = Some(periods::open_period(
            tx, room_id, now, raw, parsed, analysis_id,
        )?);
    }

    Ok(TrackedRoom {
        id: room_id,
        property_id,
        raw_identifier: raw.to_string(),
        room_label: parsed.room_label.clone(),
        price_text: parsed.price_text.clone(),
        room_type: parsed.room_type.clone(),
        current_price: parsed.price_monthly,
        original_price: parsed.price_monthly,
        current_status: status,
        is_currently_listed: true,
        first_seen_date: now,
        last_seen_date: now,
        times_seen: 1,
        times_changed: 0,
        current_period_id,
        date_gone: None,
        date_returned: current_period_id.map(|_| now),
        total_availability_periods: if current_period_id.is_some() { 1 } else { 0 },
        average_availability_duration: None,
    })
}

/// Applies one re-observation to an existing room: status transitions open or
/// close availability periods, an unchanged-available room with a new price
/// goes to the price history, and the bookkeeping fields (raw identifier,
/// counters, timestamps) are always refreshed.
fn update_matched_room(
    tx: &Connection,
    room: &mut TrackedRoom,
    raw: &str,
    parsed: &ParsedRoom,
    analysis_id: i64,
    now: NaiveDateTime,
) -> Result<bool, ServerError> {
    let old_status = room.current_status;
    let new_status = RoomStatus::from_parsed(parsed.status);

    let mut changed = false;
    let mut price = room.current_price;
    let mut price_text = room.price_text.clone();
    let mut date_gone = room.date_gone;
    let mut date_returned = room.date_returned;
    let mut current_period_id = room.current_period_id;

    if old_status != new_status {
        if old_status == RoomStatus::Available {
            periods::close_period(tx, room.id, now, analysis_id)?;
            current_period_id = None;
            date_gone = Some(now);
            date_returned = None;
        } else if new_status == RoomStatus::Available {
            let pid = periods::open_period(tx, room.id, now, raw, parsed, analysis_id)?;
            current_period_id = Some(pid);
            date_returned = Some(now);
            date_gone = None;
        }

        changes::log_room_change(
            tx,
            room.id,
            analysis_id,
            ChangeType::StatusChange,
            Some(old_status.as_str()),
            new_status.as_str(),
            &format!(
                "{} changed from {} to {}",
                room.room_label,
                old_status.as_str(),
                new_status.as_str()
            ),
            now,
        )?;
        changed = true;
    } else if new_status == RoomStatus::Available {
        // Still available: a different numeric price is a tracked change.
        if let Some(new_price) = parsed.price_monthly {
            let differs = match room.current_price {
                Some(prev) => (prev - new_price).abs() > PRICE_EPSILON,
                None => true,
            };
            if differs {
                price_history::track_price_change(
                    tx,
                    room.id,
                    room.current_price,
                    new_price,
                    room.price_text.as_deref(),
                    parsed.price_text.as_deref(),
                    analysis_id,
                    "scrape_update",
                    now,
                )?;

                let summary = match room.current_price {
                    Some(prev) => format!(
                        "{} price changed from £{prev:.0} to £{new_price:.0}",
                        room.room_label
                    ),
                    None => format!("{} price recorded as £{new_price:.0}", room.room_label),
                };
                changes::log_room_change(
                    tx,
                    room.id,
                    analysis_id,
                    ChangeType::PriceChange,
                    room.current_price.map(|p| format!("{p:.0}")).as_deref(),
                    &format!("{new_price:.0}"),
                    &summary,
                    now,
                )?;

                price = Some(new_price);
                price_text = parsed.price_text.clone();
                changed = true;
            }
        }
    }

    tx.execute(
        r#"
        UPDATE rooms SET
            raw_identifier = ?1,
            room_type = ?2,
            current_status = ?3,
            current_price = ?4,
            price_text = ?5,
            times_seen = times_seen + 1,
            times_changed = times_changed + ?6,
            last_seen_date = ?7,
            is_currently_listed = 1
        WHERE id = ?8
        "#,
        params![
            raw,
            parsed.room_type,
            new_status.as_str(),
            price,
            price_text,
            changed as i64,
            now,
            room.id
        ],
    )?;

    room.raw_identifier = raw.to_string();
    room.room_type = parsed.room_type.clone();
    room.current_status = new_status;
    room.current_price = price;
    room.price_text = price_text;
    room.times_seen += 1;
    if changed {
        room.times_changed += 1;
    }
    room.last_seen_date = now;
    room.is_currently_listed = true;
    room.current_period_id = current_period_id;
    room.date_gone = date_gone;
    room.date_returned = date_returned;

    Ok(changed)
}

fn mark_room_disappeared(
    tx: &Connection,
    room: &mut TrackedRoom,
    analysis_id: i64,
    now: NaiveDateTime,
) -> Result<(), ServerError> {
    // No-op when the room had no open period (it was already taken).
    periods::close_period(tx, room.id, now, analysis_id)?;

    tx.execute(
        r#"
        UPDATE rooms SET
            is_currently_listed = 0,
            current_status = 'offline',
            times_changed = times_changed + 1
        WHERE id = ?1
        "#,
        params![room.id],
    )?;

    changes::log_room_change(
        tx,
        room.id,
        analysis_id,
        ChangeType::Disappeared,
        Some(room.current_status.as_str()),
        RoomStatus::Offline.as_str(),
        &format!("{} disappeared from the listing", room.room_label),
        now,
    )?;

    if room.current_status == RoomStatus::Available {
        room.current_period_id = None;
        room.date_gone = Some(now);
        room.date_returned = None;
    }
    room.current_status = RoomStatus::Offline;
    room.is_currently_listed = false;
    room.times_changed += 1;

    Ok(())
}

/// The expired-listing path: no fresh room list exists, so instead of the
/// normal diff every currently-available room is forced to taken. Income
/// estimates computed before the expiry are deliberately left untouched; they
/// represent the property's demonstrated earning potential.
fn expire_listing(
    tx: &Connection,
    property_id: i64,
    analysis_id: i64,
    now: NaiveDateTime,
) -> Result<AnalysisSummary, ServerError> {
    let rooms = get_rooms_for_property(tx, property_id)?;
    let mut summary = AnalysisSummary {
        expired_listing: true,
        ..AnalysisSummary::default()
    };

    for room in &rooms {
        if room.current_status != RoomStatus::Available {
            continue;
        }

        periods::close_period(tx, room.id, now, analysis_id)?;
        tx.execute(
            "UPDATE rooms SET current_status = 'taken', times_changed = times_changed + 1 WHERE id = ?1",
            params![room.id],
        )?;
        changes::log_room_change(
            tx,
            room.id,
            analysis_id,
            ChangeType::StatusChange,
            Some(RoomStatus::Available.as_str()),
            RoomStatus::Taken.as_str(),
            &format!(
                "Listing expired (no longer accepting applications); {} assumed taken",
                room.room_label
            ),
            now,
        )?;

        summary.updated_rooms += 1;
        summary.taken_rooms += 1;
    }

    Ok(summary)
}

/// A room with its availability-period history, for the reporting surface.
#[derive(Debug)]
pub struct RoomWithHistory {
    pub room: TrackedRoom,
    pub periods: Vec<periods::AvailabilityPeriod>,
}

pub fn get_property_rooms_with_history(
    db: &Database,
    property_id: i64,
    period_limit: i64,
) -> Result<Vec<RoomWithHistory>, ServerError> {
    db.with_conn(|conn| {
        let rooms = get_rooms_for_property(conn, property_id)?;

        let mut out = Vec::with_capacity(rooms.len());
        for room in rooms {
            let room_periods = periods::get_periods(conn, room.id, period_limit)?;
            out.push(RoomWithHistory {
                room,
                periods: room_periods,
            });
        }
        Ok(out)
    })
}
