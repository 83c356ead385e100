use crate::db::connection::Database;
use crate::domain::room::ChangeType;
use crate::errors::ServerError;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

/// One immutable audit log entry: a transition the lifecycle engine detected.
#[derive(Debug, Clone)]
pub struct RoomChange {
    pub id: i64,
    pub room_id: i64,
    pub room_label: String,
    pub analysis_id: i64,
    pub change_type: String,
    pub old_value: Option<String>,
    pub new_value: String,
    pub summary: String,
    pub observed_at: NaiveDateTime,
}

/// Appends to the audit log. Rows are created here and never mutated or
/// deleted anywhere in the codebase.
pub fn log_room_change(
    tx: &Connection,
    room_id: i64,
    analysis_id: i64,
    change_type: ChangeType,
    old_value: Option<&str>,
    new_value: &str,
    summary: &str,
    now: NaiveDateTime,
) -> Result<(), ServerError> {
    tx.execute(
        r#"
        INSERT INTO room_changes (room_id, analysis_id, change_type, old_value, new_value, summary, observed_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            room_id,
            analysis_id,
            change_type.as_str(),
            old_value,
            new_value,
            summary,
            now
        ],
    )?;
    Ok(())
}

fn row_to_change(row: &rusqlite::Row<'_>) -> rusqlite::Result<RoomChange> {
    Ok(RoomChange {
        id: row.get(0)?,
        room_id: row.get(1)?,
        room_label: row.get(2)?,
        analysis_id: row.get(3)?,
        change_type: row.get(4)?,
        old_value: row.get(5)?,
        new_value: row.get(6)?,
        summary: row.get(7)?,
        observed_at: row.get(8)?,
    })
}

pub fn get_changes_for_room(
    conn: &Connection,
    room_id: i64,
    limit: i64,
) -> Result<Vec<RoomChange>, ServerError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT c.id, c.room_id, r.room_label, c.analysis_id, c.change_type,
               c.old_value, c.new_value, c.summary, c.observed_at
        FROM room_changes c
        JOIN rooms r ON r.id = c.room_id
        WHERE c.room_id = ?1
        ORDER BY c.observed_at DESC
        LIMIT ?2
        "#,
    )?;

    let rows = stmt.query_map(params![room_id, limit], row_to_change)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn get_recent_changes_for_property(
    db: &Database,
    property_id: i64,
    limit: i64,
) -> Result<Vec<RoomChange>, ServerError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            r#"
            SELECT c.id, c.room_id, r.room_label, c.analysis_id, c.change_type,
                   c.old_value, c.new_value, c.summary, c.observed_at
            FROM room_changes c
            JOIN rooms r ON r.id = c.room_id
            WHERE r.property_id = ?1
            ORDER BY c.observed_at DESC
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![property_id, limit], row_to_change)?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}
