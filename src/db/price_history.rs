use crate::db::connection::Database;
use crate::domain::trends::{mean, population_std_dev, price_trend_direction, TrendDirection};
use crate::errors::ServerError;
use chrono::{Duration, NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;

/// One immutable price-change record for a room that stayed available across
/// the change.
#[derive(Debug, Clone)]
pub struct RoomPriceHistory {
    pub id: i64,
    pub room_id: i64,
    pub previous_price: Option<f64>,
    pub new_price: f64,
    pub previous_text: Option<String>,
    pub new_text: Option<String>,
    pub change_amount: Option<f64>,
    pub change_percentage: Option<f64>,
    pub change_reason: String,
    pub analysis_id: i64,
    pub effective_date: NaiveDateTime,
}

#[derive(Debug)]
pub struct RoomPriceTrend {
    pub room_id: i64,
    pub room_label: String,
    pub change_count: usize,
    pub total_delta: f64,
    pub latest_price: f64,
    pub changes: Vec<RoomPriceHistory>,
}

#[derive(Debug)]
pub struct PriceTrendSummary {
    pub property_id: i64,
    pub window_days: i64,
    pub total_changes: usize,
    pub avg_change_amount: Option<f64>,
    pub avg_change_percentage: Option<f64>,
    pub trend_direction: TrendDirection,
    /// Population standard deviation of deltas; 0 with fewer than 2 points.
    pub volatility: f64,
    pub rooms: Vec<RoomPriceTrend>,
}

/// Records a detected price change. Delta is new − previous; the percentage
/// is left null when the previous price is zero or absent.
pub fn track_price_change(
    tx: &Connection,
    room_id: i64,
    previous_price: Option<f64>,
    new_price: f64,
    previous_text: Option<&str>,
    new_text: Option<&str>,
    analysis_id: i64,
    reason: &str,
    now: NaiveDateTime,
) -> Result<i64, ServerError> {
    let change_amount = previous_price.map(|prev| new_price - prev);
    let change_percentage = match previous_price {
        Some(prev) if prev != 0.0 => Some((new_price - prev) / prev * 100.0),
        _ => None,
    };

    tx.execute(
        r#"
        INSERT INTO room_price_history (
            room_id, previous_price, new_price, previous_text, new_text,
            change_amount, change_percentage, change_reason, analysis_id, effective_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            room_id,
            previous_price,
            new_price,
            previous_text,
            new_text,
            change_amount,
            change_percentage,
            reason,
            analysis_id,
            now
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Aggregates all price-history rows for a property inside the window into a
/// trend summary, with per-room detail.
pub fn get_property_price_trends(
    db: &Database,
    property_id: i64,
    days: i64,
) -> Result<PriceTrendSummary, ServerError> {
    let since = Utc::now().naive_utc() - Duration::days(days);

    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            r#"
            SELECT h.id, h.room_id, r.room_label,
                   h.previous_price, h.new_price, h.previous_text, h.new_text,
                   h.change_amount, h.change_percentage, h.change_reason,
                   h.analysis_id, h.effective_date
            FROM room_price_history h
            JOIN rooms r ON r.id = h.room_id
            WHERE r.property_id = ?1 AND h.effective_date >= ?2
            ORDER BY h.effective_date
            "#,
        )?;

        let rows = stmt.query_map(params![property_id, since], |row| {
            let label: String = row.get(2)?;
            Ok((
                label,
                RoomPriceHistory {
                    id: row.get(0)?,
                    room_id: row.get(1)?,
                    previous_price: row.get(3)?,
                    new_price: row.get(4)?,
                    previous_text: row.get(5)?,
                    new_text: row.get(6)?,
                    change_amount: row.get(7)?,
                    change_percentage: row.get(8)?,
                    change_reason: row.get(9)?,
                    analysis_id: row.get(10)?,
                    effective_date: row.get(11)?,
                },
            ))
        })?;

        let mut entries = Vec::new();
        for r in rows {
            entries.push(r?);
        }

        let deltas: Vec<f64> = entries
            .iter()
            .filter_map(|(_, h)| h.change_amount)
            .collect();
        let percentages: Vec<f64> = entries
            .iter()
            .filter_map(|(_, h)| h.change_percentage)
            .collect();

        let mut by_room: BTreeMap<i64, RoomPriceTrend> = BTreeMap::new();
        for (label, change) in entries {
            let entry = by_room.entry(change.room_id).or_insert_with(|| RoomPriceTrend {
                room_id: change.room_id,
                room_label: label,
                change_count: 0,
                total_delta: 0.0,
                latest_price: change.new_price,
                changes: Vec::new(),
            });
            entry.change_count += 1;
            entry.total_delta += change.change_amount.unwrap_or(0.0);
            entry.latest_price = change.new_price;
            entry.changes.push(change);
        }

        Ok(PriceTrendSummary {
            property_id,
            window_days: days,
            total_changes: by_room.values().map(|r| r.change_count).sum(),
            avg_change_amount: mean(&deltas),
            avg_change_percentage: mean(&percentages),
            trend_direction: price_trend_direction(&deltas),
            volatility: population_std_dev(&deltas),
            rooms: by_room.into_values().collect(),
        })
    })
}

/// Price-history rows for a property inside the trend window, oldest first.
pub fn get_history_in_window(
    conn: &Connection,
    property_id: i64,
    since: NaiveDateTime,
) -> Result<Vec<RoomPriceHistory>, ServerError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT h.id, h.room_id, h.previous_price, h.new_price, h.previous_text,
               h.new_text, h.change_amount, h.change_percentage, h.change_reason,
               h.analysis_id, h.effective_date
        FROM room_price_history h
        WHERE h.room_id IN (SELECT id FROM rooms WHERE property_id = ?1)
          AND h.effective_date >= ?2
        ORDER BY h.effective_date
        "#,
    )?;

    let rows = stmt.query_map(params![property_id, since], |row| {
        Ok(RoomPriceHistory {
            id: row.get(0)?,
            room_id: row.get(1)?,
            previous_price: row.get(2)?,
            new_price: row.get(3)?,
            previous_text: row.get(4)?,
            new_text: row.get(5)?,
            change_amount: row.get(6)?,
            change_percentage: row.get(7)?,
            change_reason: row.get(8)?,
            analysis_id: row.get(9)?,
            effective_date: row.get(10)?,
        })
    })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}
