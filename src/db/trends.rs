use crate::db::connection::Database;
use crate::db::{periods, price_history, properties};
use crate::domain::trends::{
    estimated_vacancy_rate, income_stability, mean, population_std_dev, price_trend_direction,
    turnover_rate,
};
use crate::errors::ServerError;
use chrono::{Duration, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodType {
    Weekly,
    Monthly,
    Quarterly,
}

impl PeriodType {
    pub fn days(&self) -> i64 {
        match self {
            PeriodType::Weekly => 7,
            PeriodType::Monthly => 30,
            PeriodType::Quarterly => 90,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Weekly => "weekly",
            PeriodType::Monthly => "monthly",
            PeriodType::Quarterly => "quarterly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "weekly" => Some(PeriodType::Weekly),
            "monthly" => Some(PeriodType::Monthly),
            "quarterly" => Some(PeriodType::Quarterly),
            _ => None,
        }
    }
}

/// One periodic aggregate snapshot per (property, period type, period start).
/// Snapshots are immutable: recalculating an existing window returns the
/// stored row instead of overwriting it.
#[derive(Debug, Clone)]
pub struct PropertyTrend {
    pub id: i64,
    pub property_id: i64,
    pub period_type: String,
    pub period_start: NaiveDateTime,
    pub avg_availability_duration: Option<f64>,
    pub availability_period_count: i64,
    pub turnover_rate: f64,
    pub avg_price: Option<f64>,
    pub price_volatility: f64,
    pub price_trend_direction: String,
    pub price_change_percentage: Option<f64>,
    pub income_stability: f64,
    pub vacancy_impact: Option<f64>,
    pub confidence: f64,
    pub created_at: NaiveDateTime,
}

fn row_to_trend(row: &rusqlite::Row<'_>) -> rusqlite::Result<PropertyTrend> {
    Ok(PropertyTrend {
        id: row.get(0)?,
        property_id: row.get(1)?,
        period_type: row.get(2)?,
        period_start: row.get(3)?,
        avg_availability_duration: row.get(4)?,
        availability_period_count: row.get(5)?,
        turnover_rate: row.get(6)?,
        avg_price: row.get(7)?,
        price_volatility: row.get(8)?,
        price_trend_direction: row.get(9)?,
        price_change_percentage: row.get(10)?,
        income_stability: row.get(11)?,
        vacancy_impact: row.get(12)?,
        confidence: row.get(13)?,
        created_at: row.get(14)?,
    })
}

const TREND_COLUMNS: &str = "id, property_id, period_type, period_start, avg_availability_duration, \
     availability_period_count, turnover_rate, avg_price, price_volatility, \
     price_trend_direction, price_change_percentage, income_stability, \
     vacancy_impact, confidence, created_at";

/// Rolls the availability periods and price history inside the window up into
/// one stored trend snapshot for the property.
pub fn calculate_and_store_trends(
    db: &Database,
    property_id: i64,
    period_type: PeriodType,
) -> Result<PropertyTrend, ServerError> {
    let now = Utc::now().naive_utc();
    let window_days = period_type.days();
    let period_start = now - Duration::days(window_days);

    db.with_conn(|conn| {
        let window_periods = periods::get_periods_in_window(conn, property_id, period_start)?;
        let history = price_history::get_history_in_window(conn, property_id, period_start)?;

        // Availability metrics: mean over periods with a known duration,
        // turnover over closed periods.
        let durations: Vec<f64> = window_periods
            .iter()
            .filter_map(|p| p.duration_days.map(|d| d as f64))
            .collect();
        let avg_duration = mean(&durations);
        let closed_count = durations.len();
        let turnover = turnover_rate(closed_count, window_days);

        // Price metrics over the in-window history.
        let prices: Vec<f64> = history.iter().map(|h| h.new_price).collect();
        let deltas: Vec<f64> = history.iter().filter_map(|h| h.change_amount).collect();
        let avg_price = mean(&prices);
        let volatility = population_std_dev(&deltas);
        let direction = price_trend_direction(&deltas);

        // Percentage change relative to the oldest in-window price.
        let price_change_percentage = match (history.first(), history.last()) {
            (Some(oldest), Some(latest)) => {
                let base = oldest.previous_price.unwrap_or(oldest.new_price);
                if base != 0.0 {
                    Some((latest.new_price - base) / base * 100.0)
                } else {
                    None
                }
            }
            _ => None,
        };

        let stability = income_stability(turnover);
        let vacancy_rate = estimated_vacancy_rate(turnover, avg_duration);
        let monthly_income = properties::get_property(conn, property_id)?
            .and_then(|p| p.estimated_monthly_income);
        let vacancy_impact = monthly_income.map(|income| income * vacancy_rate);

        let confidence = if window_periods.len() > 3 { 0.8 } else { 0.5 };

        let inserted = conn.execute(
            r#"
            INSERT INTO property_trends (
                property_id, period_type, period_start,
                avg_availability_duration, availability_period_count, turnover_rate,
                avg_price, price_volatility, price_trend_direction, price_change_percentage,
                income_stability, vacancy_impact, confidence, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(property_id, period_type, period_start) DO NOTHING
            "#,
            params![
                property_id,
                period_type.as_str(),
                period_start,
                avg_duration,
                window_periods.len() as i64,
                turnover,
                avg_price,
                volatility,
                direction.as_str(),
                price_change_percentage,
                stability,
                vacancy_impact,
                confidence,
                now
            ],
        )?;

        if inserted == 0 {
            eprintln!(
                "Trend snapshot for property {property_id} ({}) already exists; keeping it",
                period_type.as_str()
            );
        }

        conn.query_row(
            &format!(
                "SELECT {TREND_COLUMNS} FROM property_trends \
                 WHERE property_id = ?1 AND period_type = ?2 AND period_start = ?3"
            ),
            params![property_id, period_type.as_str(), period_start],
            row_to_trend,
        )
        .map_err(|e| ServerError::DbError(e.to_string()))
    })
}

pub fn get_trends_for_property(
    db: &Database,
    property_id: i64,
    limit: i64,
) -> Result<Vec<PropertyTrend>, ServerError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {TREND_COLUMNS} FROM property_trends \
             WHERE property_id = ?1 ORDER BY created_at DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![property_id, limit], row_to_trend)?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

/// The most recent snapshot of a given granularity, if any.
pub fn get_latest_trend(
    conn: &Connection,
    property_id: i64,
    period_type: PeriodType,
) -> Result<Option<PropertyTrend>, ServerError> {
    conn.query_row(
        &format!(
            "SELECT {TREND_COLUMNS} FROM property_trends \
             WHERE property_id = ?1 AND period_type = ?2 \
             ORDER BY created_at DESC LIMIT 1"
        ),
        params![property_id, period_type.as_str()],
        row_to_trend,
    )
    .optional()
    .map_err(|e| ServerError::DbError(e.to_string()))
}
