use crate::db::connection::Database;
use crate::domain::parser::ParsedRoom;
use crate::domain::room::RoomStatus;
use crate::errors::ServerError;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

/// One contiguous interval during which a room was continuously available.
/// Periods for a room never overlap and at most one is open at a time.
#[derive(Debug, Clone)]
pub struct AvailabilityPeriod {
    pub id: i64,
    pub room_id: i64,
    pub period_start_date: NaiveDateTime,
    pub period_end_date: Option<NaiveDateTime>,
    pub price_at_start: Option<f64>,
    pub price_text_at_start: Option<String>,
    pub room_type_at_start: Option<String>,
    pub raw_identifier_at_start: String,
    pub discovered_by_analysis_id: i64,
    pub closed_by_analysis_id: Option<i64>,
    pub duration_days: Option<i64>,
    pub is_current_period: bool,
}

/// Per-room statistics over closed periods, for the property summary.
#[derive(Debug)]
pub struct RoomPeriodStats {
    pub room_id: i64,
    pub room_label: String,
    pub current_status: RoomStatus,
    pub period_count: i64,
    pub closed_period_count: i64,
    pub avg_duration_days: Option<f64>,
    pub min_duration_days: Option<i64>,
    pub max_duration_days: Option<i64>,
    pub open_period_started: Option<NaiveDateTime>,
}

#[derive(Debug)]
pub struct PropertyPeriodSummary {
    pub property_id: i64,
    pub rooms: Vec<RoomPeriodStats>,
    pub current_available_rooms: i64,
    /// None while any room is available; otherwise the moment the last room
    /// stopped being available.
    pub property_date_gone: Option<NaiveDateTime>,
}

fn row_to_period(row: &rusqlite::Row<'_>) -> rusqlite::Result<AvailabilityPeriod> {
    Ok(AvailabilityPeriod {
        id: row.get(0)?,
        room_id: row.get(1)?,
        period_start_date: row.get(2)?,
        period_end_date: row.get(3)?,
        price_at_start: row.get(4)?,
        price_text_at_start: row.get(5)?,
        room_type_at_start: row.get(6)?,
        raw_identifier_at_start: row.get(7)?,
        discovered_by_analysis_id: row.get(8)?,
        closed_by_analysis_id: row.get(9)?,
        duration_days: row.get(10)?,
        is_current_period: row.get(11)?,
    })
}

const PERIOD_COLUMNS: &str = "id, room_id, period_start_date, period_end_date, price_at_start, \
     price_text_at_start, room_type_at_start, raw_identifier_at_start, \
     discovered_by_analysis_id, closed_by_analysis_id, duration_days, is_current_period";

/// Opens a new availability period for a room, snapshotting the parsed price,
/// type and raw text at the moment the room became available. If an open
/// period already exists it is closed first; the lifecycle engine should make
/// that impossible, so a warning is logged when it happens.
pub fn open_period(
    tx: &Connection,
    room_id: i64,
    start: NaiveDateTime,
    raw_identifier: &str,
    parsed: &ParsedRoom,
    analysis_id: i64,
) -> Result<i64, ServerError> {
    if find_open_period(tx, room_id)?.is_some() {
        eprintln!("⚠️ Room {room_id} already has an open availability period; closing it first");
        close_period(tx, room_id, start, analysis_id)?;
    }

    tx.execute(
        r#"
        INSERT INTO room_availability_periods (
            room_id, period_start_date,
            price_at_start, price_text_at_start, room_type_at_start, raw_identifier_at_start,
            discovered_by_analysis_id, is_current_period
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)
        "#,
        params![
            room_id,
            start,
            parsed.price_monthly,
            parsed.price_text,
            parsed.room_type,
            raw_identifier,
            analysis_id
        ],
    )?;
    let period_id = tx.last_insert_rowid();

    tx.execute(
        r#"
        UPDATE rooms SET
            current_period_id = ?1,
            date_returned = ?2,
            date_gone = NULL,
            total_availability_periods = (
                SELECT COUNT(*) FROM room_availability_periods WHERE room_id = ?3
            )
        WHERE id = ?3
        "#,
        params![period_id, start, room_id],
    )?;

    Ok(period_id)
}

/// Closes the room's current open period, computing its duration. Returns the
/// closed period's id, or None when there was nothing open (a no-op).
pub fn close_period(
    tx: &Connection,
    room_id: i64,
    end: NaiveDateTime,
    analysis_id: i64,
) -> Result<Option<i64>, ServerError> {
    let open = match find_open_period(tx, room_id)? {
        Some(p) => p,
        None => return Ok(None),
    };

    let duration_days = (end - open.period_start_date).num_days().max(0);

    tx.execute(
        r#"
        UPDATE room_availability_periods SET
            period_end_date = ?1,
            duration_days = ?2,
            closed_by_analysis_id = ?3,
            is_current_period = 0
        WHERE id = ?4
        "#,
        params![end, duration_days, analysis_id, open.id],
    )?;

    tx.execute(
        r#"
        UPDATE rooms SET
            current_period_id = NULL,
            date_gone = ?1,
            date_returned = NULL,
            average_availability_duration = (
                SELECT AVG(duration_days) FROM room_availability_periods
                WHERE room_id = ?2 AND duration_days IS NOT NULL
            )
        WHERE id = ?2
        "#,
        params![end, room_id],
    )?;

    Ok(Some(open.id))
}

pub fn find_open_period(
    conn: &Connection,
    room_id: i64,
) -> Result<Option<AvailabilityPeriod>, ServerError> {
    conn.query_row(
        &format!(
            "SELECT {PERIOD_COLUMNS} FROM room_availability_periods \
             WHERE room_id = ?1 AND is_current_period = 1"
        ),
        params![room_id],
        row_to_period,
    )
    .optional()
    .map_err(|e| ServerError::DbError(e.to_string()))
}

/// Periods for one room, newest start first.
pub fn get_periods(
    conn: &Connection,
    room_id: i64,
    limit: i64,
) -> Result<Vec<AvailabilityPeriod>, ServerError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PERIOD_COLUMNS} FROM room_availability_periods \
         WHERE room_id = ?1 ORDER BY period_start_date DESC LIMIT ?2"
    ))?;

    let rows = stmt.query_map(params![room_id, limit], row_to_period)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Periods for a property that started inside the trend window.
pub fn get_periods_in_window(
    conn: &Connection,
    property_id: i64,
    since: NaiveDateTime,
) -> Result<Vec<AvailabilityPeriod>, ServerError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PERIOD_COLUMNS} FROM room_availability_periods p \
         WHERE p.room_id IN (SELECT id FROM rooms WHERE property_id = ?1) \
           AND p.period_start_date >= ?2 \
         ORDER BY p.period_start_date"
    ))?;

    let rows = stmt.query_map(params![property_id, since], row_to_period)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Per-room period statistics plus the property-level availability picture.
pub fn get_property_period_summary(
    db: &Database,
    property_id: i64,
) -> Result<PropertyPeriodSummary, ServerError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            r#"
            SELECT
                r.id,
                r.room_label,
                r.current_status,
                (SELECT COUNT(*) FROM room_availability_periods p WHERE p.room_id = r.id),
                (SELECT COUNT(*) FROM room_availability_periods p
                    WHERE p.room_id = r.id AND p.duration_days IS NOT NULL),
                (SELECT AVG(duration_days) FROM room_availability_periods p
                    WHERE p.room_id = r.id AND p.duration_days IS NOT NULL),
                (SELECT MIN(duration_days) FROM room_availability_periods p
                    WHERE p.room_id = r.id AND p.duration_days IS NOT NULL),
                (SELECT MAX(duration_days) FROM room_availability_periods p
                    WHERE p.room_id = r.id AND p.duration_days IS NOT NULL),
                (SELECT period_start_date FROM room_availability_periods p
                    WHERE p.room_id = r.id AND p.is_current_period = 1)
            FROM rooms r
            WHERE r.property_id = ?1
            ORDER BY r.room_label
            "#,
        )?;

        let rows = stmt.query_map(params![property_id], |row| {
            let status_str: String = row.get(2)?;
            Ok(RoomPeriodStats {
                room_id: row.get(0)?,
                room_label: row.get(1)?,
                current_status: RoomStatus::from_str(&status_str)
                    .unwrap_or(RoomStatus::Offline),
                period_count: row.get(3)?,
                closed_period_count: row.get(4)?,
                avg_duration_days: row.get(5)?,
                min_duration_days: row.get(6)?,
                max_duration_days: row.get(7)?,
                open_period_started: row.get(8)?,
            })
        })?;

        let mut rooms = Vec::new();
        for r in rows {
            rooms.push(r?);
        }

        let current_available_rooms = rooms
            .iter()
            .filter(|r| r.current_status == RoomStatus::Available)
            .count() as i64;

        let property_date_gone = if current_available_rooms > 0 {
            None
        } else {
            conn.query_row(
                "SELECT MAX(date_gone) FROM rooms WHERE property_id = ?1",
                params![property_id],
                |row| row.get(0),
            )?
        };

        Ok(PropertyPeriodSummary {
            property_id,
            rooms,
            current_available_rooms,
            property_date_gone,
        })
    })
}
