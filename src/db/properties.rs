use crate::db::connection::Database;
use crate::errors::ServerError;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, Clone)]
pub struct Property {
    pub id: i64,
    pub url: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub estimated_monthly_income: Option<f64>,
    pub estimated_annual_income: Option<f64>,
    pub first_seen_at: NaiveDateTime,
    pub last_seen_at: NaiveDateTime,
}

fn row_to_property(row: &rusqlite::Row<'_>) -> rusqlite::Result<Property> {
    Ok(Property {
        id: row.get(0)?,
        url: row.get(1)?,
        name: row.get(2)?,
        location: row.get(3)?,
        estimated_monthly_income: row.get(4)?,
        estimated_annual_income: row.get(5)?,
        first_seen_at: row.get(6)?,
        last_seen_at: row.get(7)?,
    })
}

const PROPERTY_COLUMNS: &str = "id, url, name, location, estimated_monthly_income, \
     estimated_annual_income, first_seen_at, last_seen_at";

/// Creates the property on first sight of a URL, or refreshes its metadata.
pub fn upsert_property(
    conn: &Connection,
    url: &str,
    name: Option<&str>,
    location: Option<&str>,
    now: NaiveDateTime,
) -> Result<i64, ServerError> {
    conn.execute(
        r#"
        INSERT INTO properties (url, name, location, first_seen_at, last_seen_at)
        VALUES (?1, ?2, ?3, ?4, ?4)
        ON CONFLICT(url) DO UPDATE SET
            name = COALESCE(excluded.name, name),
            location = COALESCE(excluded.location, location),
            last_seen_at = excluded.last_seen_at
        "#,
        params![url, name, location, now],
    )?;

    let id: i64 = conn.query_row(
        "SELECT id FROM properties WHERE url = ?1",
        params![url],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub fn get_property(conn: &Connection, id: i64) -> Result<Option<Property>, ServerError> {
    conn.query_row(
        &format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = ?1"),
        params![id],
        row_to_property,
    )
    .optional()
    .map_err(|e| ServerError::DbError(e.to_string()))
}

pub fn list_properties(db: &Database) -> Result<Vec<Property>, ServerError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties ORDER BY last_seen_at DESC"
        ))?;
        let rows = stmt.query_map([], row_to_property)?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

/// Every (id, url) pair we track, for bulk re-checks.
pub fn get_tracked_property_urls(db: &Database) -> Result<Vec<(i64, String)>, ServerError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT id, url FROM properties ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

/// Recomputes the income estimates from the currently-available rooms. Called
/// at the end of a normal lifecycle pass, never on the expired path: estimates
/// computed before an expiry represent demonstrated earning potential and are
/// preserved.
pub fn refresh_income_estimates(
    conn: &Connection,
    property_id: i64,
) -> Result<(), ServerError> {
    let monthly: Option<f64> = conn.query_row(
        r#"
        SELECT SUM(current_price) FROM rooms
        WHERE property_id = ?1
          AND current_status = 'available'
          AND is_currently_listed = 1
        "#,
        params![property_id],
        |row| row.get(0),
    )?;

    conn.execute(
        r#"
        UPDATE properties SET
            estimated_monthly_income = COALESCE(?1, estimated_monthly_income),
            estimated_annual_income = COALESCE(?2, estimated_annual_income)
        WHERE id = ?3
        "#,
        params![monthly, monthly.map(|m| m * 12.0), property_id],
    )?;
    Ok(())
}
