use crate::db::connection::Database;
use crate::errors::ServerError;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

#[derive(Debug)]
pub struct AnalysisRun {
    pub id: i64,
    pub property_id: i64,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
    pub rooms_seen: Option<i64>,
    pub success: bool,
    pub error_message: Option<String>,
}

pub fn start_analysis(
    conn: &Connection,
    property_id: i64,
    now: NaiveDateTime,
) -> Result<i64, ServerError> {
    conn.execute(
        "INSERT INTO analyses (property_id, started_at, success) VALUES (?, ?, 0)",
        params![property_id, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn end_analysis(
    conn: &Connection,
    analysis_id: i64,
    now: NaiveDateTime,
    rooms_seen: usize,
    success: bool,
    error: Option<String>,
) -> Result<(), ServerError> {
    conn.execute(
        "UPDATE analyses SET finished_at = ?, rooms_seen = ?, success = ?, error_message = ? WHERE id = ?",
        params![now, rooms_seen as i64, success, error, analysis_id],
    )?;
    Ok(())
}

pub fn get_recent_analyses(db: &Database, limit: i64) -> Result<Vec<AnalysisRun>, ServerError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, property_id, started_at, finished_at, rooms_seen, success, error_message \
             FROM analyses ORDER BY started_at DESC LIMIT ?",
        )?;

        let rows = stmt.query_map(params![limit], |row| {
            Ok(AnalysisRun {
                id: row.get(0)?,
                property_id: row.get(1)?,
                started_at: row.get(2)?,
                finished_at: row.get(3)?,
                rooms_seen: row.get(4)?,
                success: row.get(5)?,
                error_message: row.get(6)?,
            })
        })?;

        let mut runs = Vec::new();
        for r in rows {
            runs.push(r?);
        }
        Ok(runs)
    })
}
